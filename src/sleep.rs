//! Sleep summarization
//!
//! Groups sleep log entries by `dateOfSleep` into one [`SleepDay`] per night.

use crate::normalizer::numeric_value;
use crate::types::SleepDay;
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of most recent nights included in an overview
pub const OVERVIEW_DAYS: usize = 30;

/// Sleep entries carried by one document.
///
/// Exports write a bare array; the Web API wraps it in `{"sleep": [...]}`.
pub fn sleep_entries(document: &Value) -> &[Value] {
    match document {
        Value::Array(entries) => entries.as_slice(),
        other => other
            .get("sleep")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    }
}

#[derive(Default)]
struct NightAccumulator {
    minutes_asleep: f64,
    efficiency_sum: f64,
    count: u32,
}

/// Summarize entries into per-night totals, sorted by date.
///
/// Entries without a date are skipped. Missing or non-numeric minutes and
/// efficiencies count as zero.
pub fn summarize_sleep<'a, I>(entries: I) -> Vec<SleepDay>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut nights: BTreeMap<String, NightAccumulator> = BTreeMap::new();

    for entry in entries {
        let Some(date) = entry
            .get("dateOfSleep")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
        else {
            continue;
        };

        let night = nights.entry(date.to_string()).or_default();
        night.minutes_asleep += field_or_zero(entry, "minutesAsleep");
        night.efficiency_sum += field_or_zero(entry, "efficiency");
        night.count += 1;
    }

    nights
        .into_iter()
        .map(|(date, night)| {
            let efficiency = if night.count > 0 {
                (night.efficiency_sum / night.count as f64).round()
            } else {
                0.0
            };
            SleepDay {
                date,
                minutes_asleep: night.minutes_asleep.round().max(0.0) as u32,
                efficiency: efficiency.clamp(0.0, 100.0) as u32,
            }
        })
        .collect()
}

fn field_or_zero(entry: &Value, key: &str) -> f64 {
    entry.get(key).and_then(numeric_value).unwrap_or(0.0)
}

/// The last `n` days of a date-sorted summary
pub fn most_recent(days: &[SleepDay], n: usize) -> Vec<SleepDay> {
    days[days.len().saturating_sub(n)..].to_vec()
}
