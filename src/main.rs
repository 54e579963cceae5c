use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use whobs_server::config::{Config, DEFAULT_CONFIG_FILE};
use whobs_server::domain::RawAssumptions;
use whobs_server::jobs::{JobId, JobQueue, JobRunner, JobStore};
use whobs_server::optimizer::LopfSolver;
use whobs_server::reference::ReferenceData;
use whobs_server::telemetry::{init_tracing, shutdown_signal};

/// Run capacity expansion jobs and print their results as JSON lines.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Assumption files (JSON objects). Reads one object from stdin if none given.
    assumptions: Vec<PathBuf>,

    #[clap(long, default_value = DEFAULT_CONFIG_FILE, env = "WHOBS_CONFIG")]
    config: PathBuf,

    /// Status polling interval in milliseconds.
    #[clap(long, default_value = "500")]
    poll_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let cfg = Config::load_from(&args.config)?;

    let reference = Arc::new(ReferenceData::load(&cfg.data.solar_path, &cfg.data.wind_path)?);
    info!(countries = reference.countries().len(), "reference data loaded");

    let runner = JobRunner::new(
        reference,
        Arc::new(LopfSolver),
        cfg.solver.name.clone(),
        JobStore::new(cfg.jobs.finished_job_capacity),
        cfg.jobs.results_dir.clone(),
    );
    let (queue, workers) =
        JobQueue::start(Arc::new(runner), cfg.jobs.workers, cfg.jobs.queue_capacity);

    let mut ids = Vec::new();
    for raw in read_inputs(&args.assumptions).await? {
        ids.push(queue.enqueue(raw).await?);
    }

    let poll = Duration::from_millis(args.poll_ms.max(10));
    let interrupted = tokio::select! {
        _ = wait_for(&queue, &ids, poll) => false,
        res = shutdown_signal() => {
            res?;
            true
        }
    };

    for id in &ids {
        let view = queue.fetch(*id).await;
        let mut body = serde_json::to_value(&view)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("jobid".into(), id.to_string().into());
        }
        println!("{body}");
    }

    if interrupted {
        warn!(active = queue.active_jobs().await.len(), "interrupted, abandoning active jobs");
        return Ok(());
    }

    drop(queue);
    futures::future::join_all(workers).await;
    info!(jobs = ids.len(), "all jobs done");
    Ok(())
}

async fn read_inputs(paths: &[PathBuf]) -> Result<Vec<RawAssumptions>> {
    if paths.is_empty() {
        let mut body = String::new();
        tokio::io::stdin().read_to_string(&mut body).await.context("reading stdin")?;
        return Ok(vec![serde_json::from_str(&body).context("parsing assumptions from stdin")?]);
    }
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let raw: RawAssumptions = serde_json::from_str(&body)
            .with_context(|| format!("parsing {}", path.display()))?;
        inputs.push(raw);
    }
    Ok(inputs)
}

async fn wait_for(queue: &JobQueue, ids: &[JobId], poll: Duration) {
    loop {
        let mut pending = 0;
        for id in ids {
            if !queue.fetch(*id).await.is_terminal() {
                pending += 1;
            }
        }
        if pending == 0 {
            return;
        }
        tokio::time::sleep(poll).await;
    }
}
