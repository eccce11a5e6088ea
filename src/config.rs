use serde_derive::Deserialize;

use crate::error::Error;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssociationMethod {
    /// Lowest-cost pairs first, ties broken by IoU then track id.
    #[default]
    Greedy,
    /// Minimum total cost (Hungarian), then gated.
    Optimal,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AssociationConfig {
    /// Weight of `1 - IoU` in the pair cost
    pub iou_weight: f64,
    /// Weight of the normalized predicted-position distance in the pair cost
    pub distance_weight: f64,
    /// Ground distance at which the distance term saturates at 1
    pub max_distance: f64,
    /// Pairs costing more than this stay unmatched
    pub max_cost: f64,
    /// A track missed for more consecutive frames than this is evicted
    pub max_age: u32,
    pub method: AssociationMethod,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            iou_weight: 0.5,
            distance_weight: 0.5,
            max_distance: 5.0,
            max_cost: 0.7,
            max_age: 30,
            method: AssociationMethod::Greedy,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeedConfig {
    /// Position samples kept per track
    pub history: usize,
    /// Most recent samples used for one raw speed measurement
    pub window: usize,
    /// Exponential smoothing factor applied to each raw measurement
    pub alpha: f64,
    /// Seconds the window must span before a raw speed is computed
    pub min_elapsed: f64,
    /// Reacquiring a track after more missed frames than this restarts its estimate
    pub max_frame_gap: u64,
    /// Raw speeds above this (ground units per second) are discarded
    pub max_plausible_speed: Option<f64>,
    /// Accepted raw speeds kept for the robust average
    pub average_window: usize,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            history: 32,
            window: 8,
            alpha: 0.3,
            min_elapsed: 1e-3,
            max_frame_gap: 15,
            max_plausible_speed: Some(80.0),
            average_window: 25,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlateConfig {
    /// OCR samples at or below this confidence are ignored
    pub min_confidence: f32,
    /// Minimum plate length after cleanup
    pub min_len: usize,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            min_len: 1,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub association: AssociationConfig,
    pub speed: SpeedConfig,
    pub plate: PlateConfig,
    /// Successful associations needed before a track shows up in snapshots
    pub min_hits: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            association: AssociationConfig::default(),
            speed: SpeedConfig::default(),
            plate: PlateConfig::default(),
            min_hits: 1,
        }
    }
}

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(Error::Config(format!($($arg)+)));
        }
    };
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let a = &self.association;
        ensure!(
            a.iou_weight >= 0.0 && a.distance_weight >= 0.0,
            "association weights must be non-negative"
        );
        ensure!(
            a.iou_weight + a.distance_weight > 0.0,
            "at least one association weight must be positive"
        );
        ensure!(
            a.max_distance.is_finite() && a.max_distance > 0.0,
            "association.max_distance must be positive, got {}",
            a.max_distance
        );
        ensure!(
            a.max_cost.is_finite() && a.max_cost >= 0.0,
            "association.max_cost must be non-negative, got {}",
            a.max_cost
        );

        let s = &self.speed;
        ensure!(s.window >= 2, "speed.window must be at least 2, got {}", s.window);
        ensure!(
            s.history >= s.window,
            "speed.history ({}) must hold a full window ({})",
            s.history,
            s.window
        );
        ensure!(
            s.alpha > 0.0 && s.alpha <= 1.0,
            "speed.alpha must be in (0, 1], got {}",
            s.alpha
        );
        ensure!(
            s.min_elapsed.is_finite() && s.min_elapsed > 0.0,
            "speed.min_elapsed must be positive, got {}",
            s.min_elapsed
        );
        ensure!(s.average_window >= 1, "speed.average_window must be at least 1");
        if let Some(max) = s.max_plausible_speed {
            ensure!(max > 0.0, "speed.max_plausible_speed must be positive, got {}", max);
        }

        ensure!(
            (0.0..=1.0).contains(&self.plate.min_confidence),
            "plate.min_confidence must be in [0, 1], got {}",
            self.plate.min_confidence
        );
        ensure!(self.min_hits >= 1, "min_hits must be at least 1");

        Ok(())
    }
}
