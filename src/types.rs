//! Core types for the cortisol tracker
//!
//! This module defines the data structures that flow through each stage:
//! classified export files, intraday points, sleep summaries, feature rows,
//! and the projection payloads returned to callers.

use serde::{Deserialize, Serialize};

/// Signal category of an export file, decided from its basename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Sleep,
    Steps,
    HeartRate,
    Unknown,
}

impl SignalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Sleep => "sleep",
            SignalCategory::Steps => "steps",
            SignalCategory::HeartRate => "heart_rate",
            SignalCategory::Unknown => "unknown",
        }
    }
}

/// A single minute-granularity sample of a monitored signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayPoint {
    /// Time of day, always `HH:mm`
    pub time: String,
    /// Finite sample value
    pub value: f64,
}

impl IntradayPoint {
    pub fn new(time: impl Into<String>, value: f64) -> Self {
        Self {
            time: time.into(),
            value,
        }
    }
}

/// Per-night sleep totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepDay {
    /// Date of sleep (YYYY-MM-DD)
    pub date: String,
    /// Sum of minutes asleep across the night's entries
    pub minutes_asleep: u32,
    /// Rounded mean efficiency (0-100)
    pub efficiency: u32,
}

/// Why a discovered file was left out of aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SkipReason {
    Unreadable(String),
    InvalidJson(String),
}

/// A file that matched a category but contributed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: SkipReason,
}

/// Shape summary of the first parsed file of a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSample {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub keys: Option<Vec<String>>,
    pub sample: serde_json::Value,
}

/// Diagnostics attached to an intraday report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntradayDebug {
    pub steps_files: usize,
    pub hr_files: usize,
    pub steps_debug_sample: Option<DebugSample>,
    pub hr_debug_sample: Option<DebugSample>,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
}

/// Merged heart-rate and step series for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntradayReport {
    pub date: String,
    pub heart_rate: Vec<IntradayPoint>,
    pub steps: Vec<IntradayPoint>,
    pub sleep_summary: Option<SleepDay>,
    pub debug: IntradayDebug,
}

/// Sleep overview returned when no intraday detail is requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepOverview {
    pub sleep_file_count: usize,
    pub sleep_entry_count: usize,
    pub sleep_day_count: usize,
    /// Most recent summarized days, oldest first
    pub sleep_days: Vec<SleepDay>,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
}

/// Per-date inputs to the wake-level prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: String,
    pub avg_hr_intensity_prev_day: f64,
    pub steps_prev_day: f64,
    pub sleep_minutes_prev_night: f64,
    /// Efficiency as a fraction (0-1)
    pub sleep_eff_prev_night: f64,
}

/// Reference curve value at an integer hour since wake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCurvePoint {
    pub hour: u32,
    pub value: f64,
}

/// User curve next to the population curve at an integer hour since wake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveComparisonPoint {
    pub hour: u32,
    pub you: f64,
    pub avg: f64,
}

/// Point-in-time metrics derived from a wake level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub wake_ugdl: f64,
    pub current_ugdl: f64,
    pub average_ugdl_today: f64,
    pub peak_ugdl_today: f64,
    pub avg_national_now: f64,
    pub percent_vs_avg_now: f64,
    pub in_national_range_now: bool,
    pub band_low: f64,
    pub band_high: f64,
}

/// Classification of a predicted wake level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeLevel {
    Low,
    Normal,
    High,
}

/// Wake-level prediction for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakePrediction {
    pub date: String,
    pub predicted_wake_cortisol_norm: f64,
    #[serde(rename = "predicted_wake_cortisol_ug_dL")]
    pub predicted_wake_cortisol_ug_dl: f64,
    pub percent_vs_national_avg: f64,
    pub level: WakeLevel,
}

/// Single-day dashboard projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayProjection {
    pub date: String,
    #[serde(flatten)]
    pub projection: Projection,
}

/// Multi-day prediction list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiDayPrediction {
    pub predictions: Vec<WakePrediction>,
    #[serde(rename = "average_predicted_wake_cortisol_ug_dL")]
    pub average_predicted_wake_cortisol_ug_dl: Option<f64>,
}

/// Result of a projection query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Single(DayProjection),
    Multi(MultiDayPrediction),
}
