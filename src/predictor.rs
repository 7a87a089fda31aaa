//! Wake-level prediction
//!
//! Feature rows are turned into a normalized wake prediction by a
//! [`WakePredictor`], then mapped onto ug/dL with a [`WakeScale`]. Two
//! predictors are provided: an in-process linear model and a bridge to an
//! external program speaking JSON over stdin/stdout.

use crate::curve::round2;
use crate::error::ComputeError;
use crate::types::{FeatureRow, WakeLevel, WakePrediction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Feature names in model order
pub const FEATURES: [&str; 4] = [
    "avg_hr_intensity_prev_day",
    "steps_prev_day",
    "sleep_minutes_prev_night",
    "sleep_eff_prev_night",
];

/// Produces one normalized wake prediction per feature row
pub trait WakePredictor: Send + Sync {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ComputeError>;
}

fn feature_value(row: &FeatureRow, name: &str) -> f64 {
    match name {
        "avg_hr_intensity_prev_day" => row.avg_hr_intensity_prev_day,
        "steps_prev_day" => row.steps_prev_day,
        "sleep_minutes_prev_night" => row.sleep_minutes_prev_night,
        "sleep_eff_prev_night" => row.sleep_eff_prev_night,
        _ => 0.0,
    }
}

/// Linear model over the feature row
///
/// The default model has zero weights and predicts the population mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearWakeModel {
    #[serde(default)]
    pub intercept: f64,
    /// Weight per feature name; unknown names are ignored, missing ones are 0
    #[serde(default)]
    pub coefficients: HashMap<String, f64>,
}

impl LinearWakeModel {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn predict_row(&self, row: &FeatureRow) -> f64 {
        FEATURES.iter().fold(self.intercept, |acc, name| {
            let weight = self.coefficients.get(*name).copied().unwrap_or(0.0);
            acc + weight * feature_value(row, name)
        })
    }
}

impl WakePredictor for LinearWakeModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ComputeError> {
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }
}

/// External predictor process
///
/// Receives `{"rows": [...]}` on stdin and must print
/// `{"predictions": [{"predicted_wake_cortisol_norm": x}, ...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPredictor {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Serialize)]
struct CommandInput<'a> {
    rows: &'a [FeatureRow],
}

#[derive(Deserialize)]
struct CommandOutput {
    #[serde(default)]
    predictions: Vec<CommandPrediction>,
}

#[derive(Deserialize)]
struct CommandPrediction {
    predicted_wake_cortisol_norm: Option<f64>,
}

impl CommandPredictor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl WakePredictor for CommandPredictor {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ComputeError> {
        let input = serde_json::to_vec(&CommandInput { rows })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ComputeError::Prediction(format!("cannot start {}: {}", self.program, e)))?;

        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&input),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if let Err(e) = written {
            return Err(ComputeError::Prediction(format!(
                "cannot write rows to {}: {} ({})",
                self.program, e, output.status
            )));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ComputeError::Prediction(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }

        let parsed: CommandOutput = serde_json::from_slice(&output.stdout)
            .map_err(|_| ComputeError::Prediction("Failed to parse predictor output".to_string()))?;

        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| p.predicted_wake_cortisol_norm.unwrap_or(f64::NAN))
            .collect())
    }
}

/// Mapping from normalized predictions to ug/dL
#[derive(Debug, Clone, PartialEq)]
pub struct WakeScale {
    /// Population mean wake level (ug/dL)
    pub mean: f64,
    /// Population standard deviation (ug/dL)
    pub sd: f64,
    /// Levels below this are `Low`
    pub low_below: f64,
    /// Levels above this are `High`
    pub high_above: f64,
}

impl Default for WakeScale {
    fn default() -> Self {
        Self {
            mean: 10.0,
            sd: 5.0,
            low_below: 7.0,
            high_above: 13.0,
        }
    }
}

impl WakeScale {
    pub fn to_ug_dl(&self, norm: f64) -> f64 {
        self.mean + norm * self.sd
    }

    pub fn level(&self, ug_dl: f64) -> WakeLevel {
        if ug_dl < self.low_below {
            WakeLevel::Low
        } else if ug_dl > self.high_above {
            WakeLevel::High
        } else {
            WakeLevel::Normal
        }
    }

    pub fn prediction(&self, date: &str, norm: f64) -> WakePrediction {
        let ug_dl = self.to_ug_dl(norm);
        let percent = (ug_dl - self.mean) / self.mean * 100.0;
        WakePrediction {
            date: date.to_string(),
            predicted_wake_cortisol_norm: norm,
            predicted_wake_cortisol_ug_dl: round2(ug_dl),
            percent_vs_national_avg: (percent * 10.0).round() / 10.0,
            level: self.level(ug_dl),
        }
    }
}
