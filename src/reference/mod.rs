//! Reference capacity-factor datasets
//!
//! Solar and wind availability per country and hour. Both tables are read once
//! at process start, shared behind an `Arc` and never mutated afterwards.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::domain::JobError;

pub const TIME_COLUMN: &str = "time";
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Suffix of the onshore wind column of a country.
pub const ONSHORE_SUFFIX: &str = "_ON";

/// One dataset: a timestamp index and one column of values per series.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesTable {
    index: HashMap<NaiveDateTime, usize>,
    columns: HashMap<String, Vec<f64>>,
}

impl TimeSeriesTable {
    pub fn from_columns(
        times: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        for (name, values) in &columns {
            anyhow::ensure!(
                values.len() == times.len(),
                "column {name} has {} values for {} timestamps",
                values.len(),
                times.len()
            );
        }
        let mut index = HashMap::with_capacity(times.len());
        for (i, t) in times.into_iter().enumerate() {
            let previous = index.insert(t, i);
            anyhow::ensure!(previous.is_none(), "duplicate timestamp {t} at row {i}");
        }
        Ok(Self {
            index,
            columns: columns.into_iter().collect(),
        })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening reference dataset '{}'", path.display()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("reading reference dataset '{}'", path.display()))
    }

    /// Expects a `time` column followed by one column per series.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers().context("reading CSV header")?.clone();
        anyhow::ensure!(
            headers.get(0).map(str::trim) == Some(TIME_COLUMN),
            "first column must be '{TIME_COLUMN}'"
        );
        let names: Vec<String> =
            headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

        let mut times = Vec::new();
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("parsing row {row}"))?;
            let raw_time = record.get(0).unwrap_or_default().trim();
            let time = parse_time(raw_time)
                .with_context(|| format!("row {row}: bad timestamp '{raw_time}'"))?;
            times.push(time);
            for (col, column) in values.iter_mut().enumerate() {
                let cell = record.get(col + 1).unwrap_or_default().trim();
                let value: f64 = cell.parse().with_context(|| {
                    format!("row {row}, column {}: bad value '{cell}'", names[col])
                })?;
                column.push(value);
            }
        }

        Self::from_columns(times, names.into_iter().zip(values).collect())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Values of `column` at each requested timestamp.
    pub fn sample(&self, column: &str, at: &[NaiveDateTime]) -> Result<Vec<f64>, JobError> {
        let values = self
            .columns
            .get(column)
            .ok_or_else(|| JobError::ReferenceData(format!("no series named {column}")))?;
        at.iter()
            .map(|t| {
                self.index.get(t).map(|&i| values[i]).ok_or_else(|| {
                    JobError::ReferenceData(format!("series {column} has no value for {t}"))
                })
            })
            .collect()
    }
}

fn parse_time(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .map_err(Into::into)
}

/// The solar and wind capacity-factor datasets.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    solar: TimeSeriesTable,
    wind: TimeSeriesTable,
}

impl ReferenceData {
    pub fn new(solar: TimeSeriesTable, wind: TimeSeriesTable) -> Self {
        Self { solar, wind }
    }

    pub fn load(solar_path: &Path, wind_path: &Path) -> Result<Self> {
        let solar = TimeSeriesTable::from_csv_path(solar_path)?;
        let wind = TimeSeriesTable::from_csv_path(wind_path)?;
        tracing::info!(
            solar_hours = solar.len(),
            wind_hours = wind.len(),
            countries = solar.column_names().filter(|c| wind.has_column(&onshore(c))).count(),
            "reference datasets loaded"
        );
        Ok(Self::new(solar, wind))
    }

    /// A country is valid when it has both a solar and an onshore wind series.
    pub fn has_country(&self, country: &str) -> bool {
        self.solar.has_column(country) && self.wind.has_column(&onshore(country))
    }

    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self
            .solar
            .column_names()
            .filter(|c| self.has_country(c))
            .map(str::to_string)
            .collect();
        countries.sort();
        countries
    }

    pub fn solar_series(&self, country: &str, at: &[NaiveDateTime]) -> Result<Vec<f64>, JobError> {
        self.solar.sample(country, at)
    }

    pub fn wind_series(&self, country: &str, at: &[NaiveDateTime]) -> Result<Vec<f64>, JobError> {
        self.wind.sample(&onshore(country), at)
    }
}

fn onshore(country: &str) -> String {
    format!("{country}{ONSHORE_SUFFIX}")
}
