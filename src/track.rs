use nalgebra as na;
use tracing::debug;

use crate::bbox::{BBox, Ltwh};
use crate::circular_queue::CircularQueue;
use crate::config::SpeedConfig;
use crate::detection::{Detection, PlateSample, VehicleClass};
use crate::geometry::GroundMapper;
use crate::math;
use crate::plate::{PlateCandidates, PlateResolver};
use crate::speed::SpeedEstimator;

pub type TrackId = u64;

/// One ground-plane position of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub frame: u64,
    pub timestamp: f64,
    pub position: na::Point2<f64>,
}

/// A detection together with the ground position of its reference point.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub detection: Detection,
    pub ground: na::Point2<f64>,
}

impl Observation {
    /// `None` for degenerate boxes and for boxes whose reference point has no
    /// ground position.
    pub fn locate(detection: &Detection, mapper: &GroundMapper) -> Option<Self> {
        if detection.is_degenerate() {
            return None;
        }

        let foot = detection.bbox.bottom_center();
        let ground = mapper.map_to_ground(&na::Point2::new(foot.x as f64, foot.y as f64))?;

        Some(Self {
            detection: *detection,
            ground,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    class: VehicleClass,
    bbox: BBox<Ltwh>,
    confidence: f32,
    history: CircularQueue<Sample>,
    last_seen_frame: u64,
    age_missed: u32,
    hits: u32,
    max_frame_gap: u64,
    speed: SpeedEstimator,
    plates: PlateCandidates,
}

impl Track {
    pub fn new(
        id: TrackId,
        frame: u64,
        timestamp: f64,
        obs: &Observation,
        config: &SpeedConfig,
    ) -> Self {
        let mut history = CircularQueue::with_capacity(config.history);
        history.push(Sample {
            frame,
            timestamp,
            position: obs.ground,
        });

        Self {
            id,
            class: obs.detection.class,
            bbox: obs.detection.bbox,
            confidence: obs.detection.confidence,
            history,
            last_seen_frame: frame,
            age_missed: 0,
            hits: 1,
            max_frame_gap: config.max_frame_gap,
            speed: SpeedEstimator::new(config),
            plates: PlateCandidates::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn class(&self) -> VehicleClass {
        self.class
    }

    /// Last associated box.
    #[inline]
    pub fn bbox(&self) -> &BBox<Ltwh> {
        &self.bbox
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Position samples, newest first.
    #[inline]
    pub fn history(&self) -> &CircularQueue<Sample> {
        &self.history
    }

    #[inline]
    pub fn last_seen_frame(&self) -> u64 {
        self.last_seen_frame
    }

    #[inline]
    pub fn age_missed(&self) -> u32 {
        self.age_missed
    }

    #[inline]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    #[inline]
    pub fn speed_estimate(&self) -> Option<f64> {
        self.speed.estimate()
    }

    #[inline]
    pub fn average_speed(&self) -> Option<f64> {
        self.speed.average()
    }

    #[inline]
    pub fn plates(&self) -> &PlateCandidates {
        &self.plates
    }

    #[inline]
    pub fn best_plate(&self) -> Option<&str> {
        self.plates.best()
    }

    /// Ground position expected at `frame`, extrapolated from the two newest
    /// samples (or the newest one alone).
    pub fn predict(&self, frame: u64) -> Option<na::Point2<f64>> {
        let newest = self.history.newest()?;

        match self.history.back_from_newest(1) {
            Some(prev) => Some(math::extrapolate(
                prev.frame as f64,
                &prev.position,
                newest.frame as f64,
                &newest.position,
                frame as f64,
            )),
            None => Some(newest.position),
        }
    }

    /// Applies a successful association at `frame`.
    pub fn update(&mut self, frame: u64, timestamp: f64, obs: &Observation) {
        debug_assert!(frame > self.last_seen_frame, "track updated out of frame order");

        let missed = frame.saturating_sub(self.last_seen_frame).saturating_sub(1);

        if missed > self.max_frame_gap {
            debug!(
                id = self.id,
                missed,
                "reacquired after long gap, restarting speed estimate"
            );
            self.history.clear();
            self.speed.reset();
        }

        self.history.push(Sample {
            frame,
            timestamp,
            position: obs.ground,
        });
        self.bbox = obs.detection.bbox;
        self.confidence = obs.detection.confidence;
        self.last_seen_frame = frame;
        self.age_missed = 0;
        self.hits = self.hits.saturating_add(1);

        self.speed.update(&self.history);
    }

    /// Records a frame without a matching detection; returns the new miss count.
    pub fn mark_missed(&mut self) -> u32 {
        self.age_missed = self.age_missed.saturating_add(1);
        self.age_missed
    }

    pub fn add_plate_sample(&mut self, resolver: &PlateResolver, sample: &PlateSample) -> bool {
        resolver.add_sample(&mut self.plates, sample)
    }
}
