pub mod assumptions;
pub mod error;
pub mod technology;

pub use assumptions::*;
pub use error::*;
pub use technology::*;
