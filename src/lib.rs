//! Cortisol Tracker - Fitbit export aggregation and diurnal cortisol projection
//!
//! The tracker reads a local Fitbit export folder and turns it into per-day
//! wearable signals and a projected cortisol curve through a deterministic
//! pipeline: scan -> normalize -> aggregate -> feature rows -> wake prediction
//! -> curve projection.
//!
//! ## Modules
//!
//! - **Export access**: `scanner`, `normalizer`, `sleep`, `aggregator`
//! - **Projection**: `features`, `predictor`, `curve`
//! - **Orchestration**: `pipeline`, `config`, and `http` (feature `server`)

pub mod aggregator;
pub mod config;
pub mod curve;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod predictor;
pub mod scanner;
pub mod sleep;
pub mod types;

#[cfg(feature = "server")]
pub mod http;

pub use config::Config;
pub use curve::CurveProjector;
pub use error::ComputeError;
pub use pipeline::{ExportStore, IntradaySource, PredictionService};
pub use predictor::{LinearWakeModel, WakePredictor, WakeScale};
pub use scanner::{classify, ExportScanner};

/// Crate version reported by the binaries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the binaries
pub const PRODUCER_NAME: &str = "cortisol-tracker";
