use nalgebra as na;
use serde_derive::Serialize;
use std::fmt;
use tracing::debug;

use crate::circular_queue::CircularQueue;
use crate::config::SpeedConfig;
use crate::geometry::DistanceUnit;
use crate::math;
use crate::track::Sample;

/// Ground speed in calibration units per second.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Speed {
    pub per_second: f64,
    pub unit: DistanceUnit,
}

impl Speed {
    #[inline]
    pub fn new(per_second: f64, unit: DistanceUnit) -> Self {
        Self { per_second, unit }
    }

    #[inline]
    pub fn meters_per_second(&self) -> f64 {
        self.unit.to_meters(self.per_second)
    }

    #[inline]
    pub fn kmh(&self) -> f64 {
        self.meters_per_second() * 3.6
    }

    #[inline]
    pub fn mph(&self) -> f64 {
        self.meters_per_second() / 0.44704
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} km/h", self.kmh())
    }
}

/// Windowed displacement speed with exponential smoothing.
///
/// `estimate` stays `None` until a window of at least two samples spanning
/// `min_elapsed` seconds produced an accepted raw speed.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    window: usize,
    alpha: f64,
    min_elapsed: f64,
    max_plausible: Option<f64>,
    smoothed: Option<f64>,
    accepted: CircularQueue<f64>,
}

impl SpeedEstimator {
    pub fn new(config: &SpeedConfig) -> Self {
        Self {
            window: config.window.max(2),
            alpha: config.alpha,
            min_elapsed: config.min_elapsed,
            max_plausible: config.max_plausible_speed,
            smoothed: None,
            accepted: CircularQueue::with_capacity(config.average_window),
        }
    }

    /// Drops the smoothing state. Accepted raw speeds stay for the average.
    pub fn reset(&mut self) {
        self.smoothed = None;
    }

    /// Raw speed over the most recent `window` samples of `history`.
    pub fn raw_speed(&self, history: &CircularQueue<Sample>) -> Option<f64> {
        let span = self.window.min(history.len());
        if span < 2 {
            return None;
        }

        let newest = history.newest()?;
        let oldest = history.back_from_newest(span - 1)?;

        let elapsed = newest.timestamp - oldest.timestamp;
        if !elapsed.is_finite() || elapsed < self.min_elapsed {
            return None;
        }

        let speed = na::distance(&newest.position, &oldest.position) / elapsed;

        speed.is_finite().then_some(speed)
    }

    /// Folds the latest window into the estimate. Returns the raw speed when
    /// it was accepted.
    pub fn update(&mut self, history: &CircularQueue<Sample>) -> Option<f64> {
        let raw = self.raw_speed(history)?;

        if let Some(max) = self.max_plausible {
            if raw > max {
                debug!(raw, max, "discarding implausible speed");
                return None;
            }
        }

        self.smoothed = Some(match self.smoothed {
            Some(prev) => self.alpha * raw + (1.0 - self.alpha) * prev,
            None => raw,
        });
        self.accepted.push(raw);

        Some(raw)
    }

    #[inline]
    pub fn estimate(&self) -> Option<f64> {
        self.smoothed
    }

    /// Median-centred mean of recently accepted raw speeds.
    pub fn average(&self) -> Option<f64> {
        let values: Vec<f64> = self.accepted.iter().copied().collect();
        math::trimmed_mean(&values)
    }
}
