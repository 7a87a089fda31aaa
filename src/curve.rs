//! Diurnal curve projection
//!
//! A fixed decay-plus-bump shape, normalized to 1 at wake, scales a single
//! wake level to any later hour of the day. From it the projector derives the
//! charting curve and the point-in-time dashboard metrics.

use crate::error::ComputeError;
use crate::types::{CurveComparisonPoint, DailyCurvePoint, Projection};
use chrono::{NaiveDateTime, NaiveTime};

/// Longest curve served (hours since wake)
pub const MAX_CURVE_HOURS: u32 = 48;

/// Parameters of the reference shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveShape {
    /// Asymptotic fraction of the wake level late in the day
    pub floor: f64,
    /// Time constant of the exponential decay (hours)
    pub decay_hours: f64,
    /// Height of the awakening response bump
    pub bump_amplitude: f64,
    /// Hour since wake at which the bump peaks
    pub bump_peak_hour: f64,
    /// Gaussian width of the bump (hours)
    pub bump_width: f64,
}

impl Default for CurveShape {
    fn default() -> Self {
        Self {
            floor: 0.15,
            decay_hours: 8.0,
            bump_amplitude: 0.35,
            bump_peak_hour: 0.5,
            bump_width: 0.6,
        }
    }
}

impl CurveShape {
    fn raw(&self, h: f64) -> f64 {
        let decay = (-h / self.decay_hours).exp();
        let bump =
            self.bump_amplitude * (-((h - self.bump_peak_hour) / self.bump_width).powi(2)).exp();
        self.floor + (1.0 - self.floor) * decay + bump
    }

    /// Shape value at `h` hours since wake, normalized so `ref_multiplier(0) == 1`.
    pub fn ref_multiplier(&self, h: f64) -> f64 {
        self.raw(h) / self.raw(0.0)
    }

    /// Multiplier clamped at 1: no later hour exceeds the wake level.
    pub fn capped_multiplier(&self, h: f64) -> f64 {
        self.ref_multiplier(h).min(1.0)
    }
}

/// Population assumptions used by the projector
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorConfig {
    /// Assumed population-average wake level (ug/dL)
    pub population_wake_level: f64,
    /// Half-width of the normal band as a fraction of the average
    pub band_pct: f64,
    /// Local wake hour assumed when none is known
    pub assumed_wake_hour: u32,
    /// Samples per hour for the running mean and peak
    pub samples_per_hour: u32,
    /// Length of the charting curve (hours)
    pub curve_hours: u32,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            population_wake_level: 10.0,
            band_pct: 0.2,
            assumed_wake_hour: 7,
            samples_per_hour: 4,
            curve_hours: 16,
        }
    }
}

impl ProjectorConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.population_wake_level.is_finite() && self.population_wake_level > 0.0) {
            return Err(ComputeError::Config(format!(
                "population wake level must be positive, got {}",
                self.population_wake_level
            )));
        }
        if !(0.0..1.0).contains(&self.band_pct) {
            return Err(ComputeError::Config(format!(
                "band percentage must be in [0, 1), got {}",
                self.band_pct
            )));
        }
        if self.assumed_wake_hour > 23 {
            return Err(ComputeError::Config(format!(
                "wake hour must be 0-23, got {}",
                self.assumed_wake_hour
            )));
        }
        if self.samples_per_hour == 0 {
            return Err(ComputeError::Config(
                "samples per hour must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hours elapsed since `wake_hour:00` on the same local day, never negative
pub fn hours_since_wake(now: NaiveDateTime, wake_hour: u32) -> f64 {
    let wake = NaiveTime::from_hms_opt(wake_hour.min(23), 0, 0).unwrap_or_default();
    let elapsed = now.time().signed_duration_since(wake);
    (elapsed.num_milliseconds() as f64 / 3_600_000.0).max(0.0)
}

/// Reject curve requests the projector should not render
pub fn check_curve_request(wake: f64, hours: u32) -> Result<(), ComputeError> {
    if !wake.is_finite() || wake < 0.0 {
        return Err(ComputeError::InvalidQuery(format!(
            "wake must be a non-negative number, got {wake}"
        )));
    }
    if hours > MAX_CURVE_HOURS {
        return Err(ComputeError::InvalidQuery(format!(
            "hours must be at most {MAX_CURVE_HOURS}, got {hours}"
        )));
    }
    Ok(())
}

/// Round to two decimals
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Projector for wake-anchored curves and dashboard metrics
#[derive(Debug, Clone)]
pub struct CurveProjector {
    shape: CurveShape,
    config: ProjectorConfig,
}

impl Default for CurveProjector {
    fn default() -> Self {
        Self {
            shape: CurveShape::default(),
            config: ProjectorConfig::default(),
        }
    }
}

impl CurveProjector {
    pub fn new(config: ProjectorConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            shape: CurveShape::default(),
            config,
        })
    }

    pub fn with_shape(mut self, shape: CurveShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn shape(&self) -> &CurveShape {
        &self.shape
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Value at `h` hours since wake for a given wake level
    pub fn value_at(&self, wake: f64, h: f64) -> f64 {
        wake * self.shape.capped_multiplier(h)
    }

    /// Curve at integer hours `0..=hours`
    pub fn reference_curve(&self, wake: f64, hours: u32) -> Vec<DailyCurvePoint> {
        (0..=hours)
            .map(|hour| DailyCurvePoint {
                hour,
                value: round2(wake * self.shape.ref_multiplier(hour as f64)),
            })
            .collect()
    }

    /// User curve next to the population curve at integer hours `0..=hours`
    pub fn compare_curve(&self, wake: f64, hours: u32) -> Vec<CurveComparisonPoint> {
        let avg_wake = self.config.population_wake_level;
        (0..=hours)
            .map(|hour| {
                let m = self.shape.ref_multiplier(hour as f64);
                CurveComparisonPoint {
                    hour,
                    you: round2(wake * m),
                    avg: round2(avg_wake * m),
                }
            })
            .collect()
    }

    /// Point-in-time metrics for a wake level at `hours_since_wake`
    pub fn project(&self, wake: f64, hours_since_wake: f64) -> Projection {
        let h = hours_since_wake.max(0.0);
        let current = round2(self.value_at(wake, h));
        let avg_now = round2(self.value_at(self.config.population_wake_level, h));
        let percent_vs_avg_now = round2((current - avg_now) / avg_now * 100.0);

        let band_low = avg_now * (1.0 - self.config.band_pct);
        let band_high = avg_now * (1.0 + self.config.band_pct);
        let in_range = current >= band_low && current <= band_high;

        let (average, peak) = self.running_stats(wake, h);

        Projection {
            wake_ugdl: round2(wake),
            current_ugdl: current,
            average_ugdl_today: round2(average),
            peak_ugdl_today: round2(peak),
            avg_national_now: avg_now,
            percent_vs_avg_now,
            in_national_range_now: in_range,
            band_low: round2(band_low),
            band_high: round2(band_high),
        }
    }

    /// Mean and peak of the curve sampled from wake to `h`
    fn running_stats(&self, wake: f64, h: f64) -> (f64, f64) {
        let samples = ((h * self.config.samples_per_hour as f64).floor() as usize).max(1);
        let mut sum = 0.0;
        let mut peak = 0.0_f64;
        for i in 0..=samples {
            let v = self.value_at(wake, (i as f64 / samples as f64) * h);
            sum += v;
            peak = peak.max(v);
        }
        (sum / (samples + 1) as f64, peak)
    }
}
