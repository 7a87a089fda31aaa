//! Runtime configuration
//!
//! Values come from `CORTISOL_*` environment variables. `from_env_with`
//! takes the lookup as a closure so tests never touch the process
//! environment.

use crate::curve::{CurveProjector, ProjectorConfig};
use crate::error::ComputeError;
use crate::pipeline::ExportStore;
use crate::predictor::{CommandPredictor, LinearWakeModel, WakePredictor};
use crate::scanner::{ExportScanner, ScanOptions, DEFAULT_MAX_DEPTH};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_DATA_ROOT: &str = "data/Fitbit";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3000";

/// Where wake predictions come from
#[derive(Debug, Clone, PartialEq)]
pub enum PredictorConfig {
    /// Built-in linear model with zero weights
    Baseline,
    /// Linear model loaded from a JSON file
    LinearModel(PathBuf),
    /// External program speaking the JSON stdin/stdout protocol
    Command(CommandPredictor),
}

impl PredictorConfig {
    pub fn build(&self) -> Result<Arc<dyn WakePredictor>, ComputeError> {
        Ok(match self {
            PredictorConfig::Baseline => Arc::new(LinearWakeModel::default()),
            PredictorConfig::LinearModel(path) => Arc::new(LinearWakeModel::load(path)?),
            PredictorConfig::Command(cmd) => Arc::new(cmd.clone()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_root: PathBuf,
    pub address: SocketAddr,
    pub max_scan_depth: usize,
    pub projector: ProjectorConfig,
    pub predictor: PredictorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_scan_depth: DEFAULT_MAX_DEPTH,
            projector: ProjectorConfig::default(),
            predictor: PredictorConfig::Baseline,
        }
    }
}

fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>, ComputeError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ComputeError::Config(format!("{name}={value:?}: {e}")))
    })
    .transpose()
}

impl Config {
    pub fn from_env() -> Result<Self, ComputeError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Read configuration through `get`, falling back to defaults for
    /// anything unset.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, ComputeError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let data_root = get("CORTISOL_DATA_ROOT")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_root);
        let address = parse_var("CORTISOL_ADDRESS", get("CORTISOL_ADDRESS"))?
            .unwrap_or(defaults.address);
        let max_scan_depth =
            parse_var("CORTISOL_MAX_SCAN_DEPTH", get("CORTISOL_MAX_SCAN_DEPTH"))?
                .unwrap_or(defaults.max_scan_depth);

        let mut projector = defaults.projector;
        if let Some(level) =
            parse_var::<f64>("CORTISOL_POPULATION_WAKE", get("CORTISOL_POPULATION_WAKE"))?
        {
            projector.population_wake_level = level;
        }
        if let Some(band) =
            parse_var::<f64>("CORTISOL_BAND_PCT", get("CORTISOL_BAND_PCT"))?
        {
            projector.band_pct = band;
        }
        if let Some(hour) =
            parse_var::<u32>("CORTISOL_WAKE_HOUR", get("CORTISOL_WAKE_HOUR"))?
        {
            projector.assumed_wake_hour = hour;
        }
        projector.validate()?;

        let model_path = get("CORTISOL_MODEL_PATH").filter(|s| !s.trim().is_empty());
        let command = get("CORTISOL_PREDICTOR_CMD").and_then(|s| CommandPredictor::parse(&s));
        let predictor = match (model_path, command) {
            (Some(_), Some(_)) => {
                return Err(ComputeError::Config(
                    "set only one of CORTISOL_MODEL_PATH and CORTISOL_PREDICTOR_CMD".into(),
                ))
            }
            (Some(path), None) => PredictorConfig::LinearModel(PathBuf::from(path)),
            (None, Some(cmd)) => PredictorConfig::Command(cmd),
            (None, None) => PredictorConfig::Baseline,
        };

        Ok(Self {
            data_root,
            address,
            max_scan_depth,
            projector,
            predictor,
        })
    }

    pub fn scanner(&self) -> ExportScanner {
        ExportScanner::with_options(
            self.data_root.clone(),
            ScanOptions {
                max_depth: self.max_scan_depth,
                ..ScanOptions::default()
            },
        )
    }

    pub fn store(&self) -> ExportStore {
        ExportStore::new(self.scanner())
    }

    pub fn curve_projector(&self) -> Result<CurveProjector, ComputeError> {
        CurveProjector::new(self.projector.clone())
    }
}
