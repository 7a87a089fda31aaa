//! Request orchestration
//!
//! This module provides the public API for the tracker. It connects the
//! scanner, normalizer, aggregator and sleep summarizer into the two read
//! operations on an export folder, and runs the prediction fan-out:
//! intraday source -> feature rows -> wake predictor -> curve projector.

use crate::aggregator::IntradayAggregator;
use crate::curve::{hours_since_wake, round2, CurveProjector};
use crate::error::ComputeError;
use crate::features::FeatureDeriver;
use crate::predictor::{WakePredictor, WakeScale};
use crate::scanner::{ExportScanner, ExportSet};
use crate::sleep::{most_recent, sleep_entries, summarize_sleep, OVERVIEW_DAYS};
use crate::types::{
    DayProjection, IntradayDebug, IntradayReport, MultiDayPrediction, PredictionResponse,
    SignalCategory, SkippedFile, SleepDay, SleepOverview,
};
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Upper bound on the `days` parameter of a prediction request
pub const MAX_PREDICTION_DAYS: u32 = 90;

/// Anything that can produce the intraday report of a date
pub trait IntradaySource: Send + Sync {
    fn intraday(&self, date: NaiveDate) -> Result<IntradayReport, ComputeError>;
}

/// Parse a `YYYY-MM-DD` query date
pub fn parse_date(raw: &str) -> Result<NaiveDate, ComputeError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ComputeError::DateParseError(format!("expected YYYY-MM-DD, got {:?}", raw)))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Read access to an export folder.
///
/// Every call scans the folder again, so files added between requests are
/// picked up.
#[derive(Debug, Clone)]
pub struct ExportStore {
    scanner: ExportScanner,
}

impl ExportStore {
    pub fn new(scanner: ExportScanner) -> Self {
        Self { scanner }
    }

    pub fn root(&self) -> &Path {
        self.scanner.root()
    }

    pub fn scan(&self) -> Result<ExportSet, ComputeError> {
        self.scanner.scan()
    }

    /// Summary of every sleep file, limited to the most recent nights
    pub fn sleep_overview(&self) -> Result<SleepOverview, ComputeError> {
        let exports = self.scanner.scan()?;
        let loaded = exports.load(SignalCategory::Sleep);

        let entries: Vec<_> = loaded
            .documents
            .iter()
            .flat_map(|doc| sleep_entries(&doc.value))
            .collect();
        let days = summarize_sleep(entries.iter().copied());

        Ok(SleepOverview {
            sleep_file_count: loaded.documents.len() + loaded.skipped.len(),
            sleep_entry_count: entries.len(),
            sleep_day_count: days.len(),
            sleep_days: most_recent(&days, OVERVIEW_DAYS),
            skipped: loaded.skipped,
        })
    }

    fn sleep_summary(exports: &ExportSet, date: &str) -> (Option<SleepDay>, Vec<SkippedFile>) {
        let loaded = exports.load(SignalCategory::Sleep);
        let summary = summarize_sleep(
            loaded
                .documents
                .iter()
                .flat_map(|doc| sleep_entries(&doc.value))
                .filter(|entry| entry.get("dateOfSleep").and_then(|d| d.as_str()) == Some(date)),
        )
        .into_iter()
        .next();
        (summary, loaded.skipped)
    }
}

impl IntradaySource for ExportStore {
    fn intraday(&self, date: NaiveDate) -> Result<IntradayReport, ComputeError> {
        let exports = self.scanner.scan()?;
        let target = format_date(date);

        let aggregate = IntradayAggregator::aggregate(&exports, date);
        let (sleep_summary, sleep_skipped) = Self::sleep_summary(&exports, &target);

        let mut skipped = aggregate.steps.skipped;
        skipped.extend(aggregate.heart_rate.skipped);
        skipped.extend(sleep_skipped);
        skipped.sort_by(|a, b| a.file.cmp(&b.file));
        skipped.dedup();

        Ok(IntradayReport {
            date: target,
            heart_rate: aggregate.heart_rate.points,
            steps: aggregate.steps.points,
            sleep_summary,
            debug: IntradayDebug {
                steps_files: aggregate.steps.file_count,
                hr_files: aggregate.heart_rate.file_count,
                steps_debug_sample: aggregate.steps.sample,
                hr_debug_sample: aggregate.heart_rate.sample,
                skipped,
            },
        })
    }
}

/// Dates covered by a request ending at `end_date`, oldest first
pub fn date_range(end_date: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .rev()
        .filter_map(|offset| end_date.checked_sub_days(Days::new(offset as u64)))
        .collect()
}

/// Dates whose intraday data the request needs: each date and the day before
pub fn needed_dates(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut needed = BTreeSet::new();
    for date in dates {
        needed.insert(*date);
        if let Some(previous) = date.pred_opt() {
            needed.insert(previous);
        }
    }
    needed.into_iter().collect()
}

/// Multi-day and single-day wake predictions
pub struct PredictionService {
    source: Arc<dyn IntradaySource>,
    predictor: Arc<dyn WakePredictor>,
    projector: CurveProjector,
    scale: WakeScale,
}

impl PredictionService {
    pub fn new(
        source: Arc<dyn IntradaySource>,
        predictor: Arc<dyn WakePredictor>,
        projector: CurveProjector,
    ) -> Self {
        Self {
            source,
            predictor,
            projector,
            scale: WakeScale::default(),
        }
    }

    pub fn with_scale(mut self, scale: WakeScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn projector(&self) -> &CurveProjector {
        &self.projector
    }

    /// Predict the `days` days ending at `end_date`.
    ///
    /// One day yields the dashboard projection at `now`; more yield the list
    /// of per-day wake predictions and their average.
    pub async fn predict(
        &self,
        days: u32,
        end_date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<PredictionResponse, ComputeError> {
        if days == 0 || days > MAX_PREDICTION_DAYS {
            return Err(ComputeError::InvalidQuery(format!(
                "days must be between 1 and {}, got {}",
                MAX_PREDICTION_DAYS, days
            )));
        }

        let dates = date_range(end_date, days);
        let reports = self.fetch_all(&needed_dates(&dates)).await?;

        let rows: Vec<_> = dates
            .iter()
            .map(|date| {
                let previous = date.pred_opt().and_then(|d| reports.get(&d));
                FeatureDeriver::derive(&format_date(*date), previous, reports.get(date))
            })
            .collect();

        let predictor = Arc::clone(&self.predictor);
        let (rows, norms) = tokio::task::spawn_blocking(move || {
            let norms = predictor.predict(&rows);
            (rows, norms)
        })
        .await
        .map_err(|e| ComputeError::Prediction(e.to_string()))?;
        let norms = norms?;

        let predictions: Vec<_> = rows
            .iter()
            .zip(norms)
            .filter(|(_, norm)| norm.is_finite())
            .map(|(row, norm)| self.scale.prediction(&row.date, norm))
            .collect();

        tracing::info!(
            days,
            end_date = %end_date,
            fetched = reports.len(),
            predicted = predictions.len(),
            "wake predictions computed"
        );

        if days == 1 {
            let Some(prediction) = predictions.first() else {
                return Err(ComputeError::Prediction(
                    "No wake prediction available.".to_string(),
                ));
            };
            let wake = prediction.predicted_wake_cortisol_ug_dl;
            let h = hours_since_wake(now, self.projector.config().assumed_wake_hour);
            return Ok(PredictionResponse::Single(DayProjection {
                date: prediction.date.clone(),
                projection: self.projector.project(wake, h),
            }));
        }

        let average = if predictions.is_empty() {
            None
        } else {
            let sum: f64 = predictions
                .iter()
                .map(|p| p.predicted_wake_cortisol_ug_dl)
                .sum();
            Some(round2(sum / predictions.len() as f64))
        };

        Ok(PredictionResponse::Multi(MultiDayPrediction {
            predictions,
            average_predicted_wake_cortisol_ug_dl: average,
        }))
    }

    /// Fetch every date concurrently; the first failure aborts the request.
    async fn fetch_all(
        &self,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, IntradayReport>, ComputeError> {
        let tasks = dates.iter().map(|&date| {
            let source = Arc::clone(&self.source);
            async move {
                let report = tokio::task::spawn_blocking(move || source.intraday(date))
                    .await
                    .map_err(|e| ComputeError::Upstream {
                        date: format_date(date),
                        message: e.to_string(),
                    })?
                    .map_err(|e| ComputeError::Upstream {
                        date: format_date(date),
                        message: e.to_string(),
                    })?;
                Ok::<_, ComputeError>((date, report))
            }
        });

        let reports = futures_util::future::try_join_all(tasks).await?;
        Ok(reports.into_iter().collect())
    }
}
