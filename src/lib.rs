pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod logger;
pub mod scaler;
pub mod stats;

pub use config::ScalerConfig;
pub use error::{Error, Result};
pub use scaler::Scaler;
