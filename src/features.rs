//! Feature derivation
//!
//! This module derives the per-date prediction inputs from two consecutive
//! days of intraday data:
//! - Heart-rate intensity and step total of the previous day
//! - Sleep duration and efficiency of the night before the date

use crate::types::{FeatureRow, IntradayPoint, IntradayReport};

/// Minimum heart-rate samples for an intensity score
pub const MIN_HR_SAMPLES: usize = 10;

/// Feature deriver for building prediction rows
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Build the row for `date`.
    ///
    /// `previous_day` supplies activity, `same_day` supplies the sleep summary
    /// of the night ending on `date`. Missing data becomes zero.
    pub fn derive(
        date: &str,
        previous_day: Option<&IntradayReport>,
        same_day: Option<&IntradayReport>,
    ) -> FeatureRow {
        let sleep = same_day.and_then(|day| day.sleep_summary.as_ref());

        FeatureRow {
            date: date.to_string(),
            avg_hr_intensity_prev_day: previous_day
                .map(|day| hr_intensity_z(&day.heart_rate))
                .unwrap_or(0.0),
            steps_prev_day: previous_day.map(|day| sum_steps(&day.steps)).unwrap_or(0.0),
            sleep_minutes_prev_night: sleep.map(|s| s.minutes_asleep as f64).unwrap_or(0.0),
            sleep_eff_prev_night: sleep.map(|s| s.efficiency as f64 / 100.0).unwrap_or(0.0),
        }
    }
}

/// Mean z-score of a day's heart rate against its own mean and spread
pub fn hr_intensity_z(points: &[IntradayPoint]) -> f64 {
    let values: Vec<f64> = points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .collect();
    if values.len() < MIN_HR_SAMPLES {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = match variance.sqrt() {
        s if s > 0.0 => s,
        _ => 1.0,
    };

    values.iter().map(|v| (v - mean) / std).sum::<f64>() / n
}

/// Total steps over a day's points
pub fn sum_steps(points: &[IntradayPoint]) -> f64 {
    points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntradayDebug, SleepDay};
    use pretty_assertions::assert_eq;

    fn report(heart_rate: Vec<f64>, steps: Vec<f64>, sleep: Option<SleepDay>) -> IntradayReport {
        let points = |values: Vec<f64>| -> Vec<IntradayPoint> {
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| IntradayPoint::new(format!("{:02}:{:02}", i / 60, i % 60), v))
                .collect()
        };
        IntradayReport {
            date: "2025-08-13".to_string(),
            heart_rate: points(heart_rate),
            steps: points(steps),
            sleep_summary: sleep,
            debug: IntradayDebug::default(),
        }
    }

    #[test]
    fn test_intensity_needs_ten_samples() {
        let few: Vec<IntradayPoint> = (0..9).map(|i| IntradayPoint::new("00:00", i as f64)).collect();
        assert_eq!(hr_intensity_z(&few), 0.0);
    }

    #[test]
    fn test_intensity_is_centered() {
        let points: Vec<IntradayPoint> = (0..30)
            .map(|i| IntradayPoint::new("00:00", 60.0 + i as f64))
            .collect();
        assert!(hr_intensity_z(&points).abs() < 1e-9);

        let flat: Vec<IntradayPoint> = (0..12).map(|_| IntradayPoint::new("00:00", 70.0)).collect();
        assert_eq!(hr_intensity_z(&flat), 0.0);
    }

    #[test]
    fn test_sum_steps() {
        let points = vec![
            IntradayPoint::new("08:00", 12.0),
            IntradayPoint::new("08:01", 30.0),
            IntradayPoint::new("08:02", 0.0),
        ];
        assert_eq!(sum_steps(&points), 42.0);
        assert_eq!(sum_steps(&[]), 0.0);
    }

    #[test]
    fn test_derive_uses_previous_day_activity_and_same_day_sleep() {
        let previous = report(vec![], vec![100.0, 250.0], None);
        let today = report(
            vec![],
            vec![5000.0],
            Some(SleepDay {
                date: "2025-08-13".to_string(),
                minutes_asleep: 420,
                efficiency: 88,
            }),
        );

        let row = FeatureDeriver::derive("2025-08-13", Some(&previous), Some(&today));
        assert_eq!(
            row,
            FeatureRow {
                date: "2025-08-13".to_string(),
                avg_hr_intensity_prev_day: 0.0,
                steps_prev_day: 350.0,
                sleep_minutes_prev_night: 420.0,
                sleep_eff_prev_night: 0.88,
            }
        );
    }

    #[test]
    fn test_derive_without_data() {
        let row = FeatureDeriver::derive("2025-08-13", None, None);
        assert_eq!(row.steps_prev_day, 0.0);
        assert_eq!(row.sleep_minutes_prev_night, 0.0);
        assert_eq!(row.sleep_eff_prev_night, 0.0);
    }
}
