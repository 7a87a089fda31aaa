//! Intraday aggregation
//!
//! Fans in every steps and heart-rate export for one date into a single
//! deduplicated, time-sorted series per signal.

use crate::normalizer::RecordNormalizer;
use crate::scanner::{ExportSet, LoadedDocument};
use crate::types::{DebugSample, IntradayPoint, SignalCategory, SkippedFile};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

const SAMPLE_KEYS: usize = 30;
const SAMPLE_ENTRIES: usize = 3;

/// Collapse points sharing a `time` key, keeping the last one seen.
///
/// Output is sorted by time. Applying it twice gives the same result.
pub fn dedupe_by_time<I>(points: I) -> Vec<IntradayPoint>
where
    I: IntoIterator<Item = IntradayPoint>,
{
    let mut by_time: BTreeMap<String, f64> = BTreeMap::new();
    for point in points {
        by_time.insert(point.time, point.value);
    }
    by_time
        .into_iter()
        .map(|(time, value)| IntradayPoint { time, value })
        .collect()
}

/// Merged series for one signal
#[derive(Debug, Clone, Default)]
pub struct SignalSeries {
    pub points: Vec<IntradayPoint>,
    pub file_count: usize,
    pub sample: Option<DebugSample>,
    pub skipped: Vec<SkippedFile>,
}

/// Heart-rate and steps series for one date
#[derive(Debug, Clone, Default)]
pub struct IntradayAggregate {
    pub heart_rate: SignalSeries,
    pub steps: SignalSeries,
}

/// Aggregator over a scanned export set
pub struct IntradayAggregator;

impl IntradayAggregator {
    pub fn aggregate(exports: &ExportSet, date: NaiveDate) -> IntradayAggregate {
        let target = date.format("%Y-%m-%d").to_string();
        IntradayAggregate {
            heart_rate: Self::series(exports, SignalCategory::HeartRate, &target),
            steps: Self::series(exports, SignalCategory::Steps, &target),
        }
    }

    fn series(exports: &ExportSet, category: SignalCategory, target: &str) -> SignalSeries {
        let loaded = exports.load(category);
        let file_count = loaded.documents.len() + loaded.skipped.len();
        let sample = loaded.documents.first().map(debug_sample);

        let merged = loaded
            .documents
            .iter()
            .flat_map(|doc| RecordNormalizer::extract(&doc.value, target));

        let points = dedupe_by_time(merged);
        tracing::debug!(
            category = category.as_str(),
            date = target,
            files = file_count,
            points = points.len(),
            "aggregated intraday series"
        );

        SignalSeries {
            points,
            file_count,
            sample,
            skipped: loaded.skipped,
        }
    }
}

/// Shape summary of a parsed document
pub fn debug_sample(doc: &LoadedDocument) -> DebugSample {
    let (kind, keys, sample) = match &doc.value {
        Value::Array(entries) => (
            "array",
            None,
            Value::Array(entries.iter().take(SAMPLE_ENTRIES).cloned().collect()),
        ),
        Value::Object(map) => (
            "object",
            Some(map.keys().take(SAMPLE_KEYS).cloned().collect()),
            doc.value.clone(),
        ),
        Value::String(_) => ("string", None, doc.value.clone()),
        Value::Number(_) => ("number", None, doc.value.clone()),
        Value::Bool(_) => ("boolean", None, doc.value.clone()),
        Value::Null => ("object", None, Value::Null),
    };
    DebugSample {
        file: doc.file.display_name(),
        kind: kind.to_string(),
        keys,
        sample,
    }
}
