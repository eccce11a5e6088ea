use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::bbox::{BBox, Ltwh};
use crate::detection::{Detection, PlateSample, VehicleClass};
use crate::error::Error;
use crate::geometry::DistanceUnit;
use crate::plate::PlateResolver;
use crate::speed::Speed;
use crate::track::{Track, TrackId};

/// Everything the collaborators produced for one frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub timestamp: f64, // in seconds
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub plates: Vec<PlateSample>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            index,
            timestamp,
            detections,
            plates: Vec::new(),
        }
    }

    pub fn with_plates(mut self, plates: Vec<PlateSample>) -> Self {
        self.plates = plates;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Timestamps for a fixed-rate source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    pub fn new(fps: f64) -> Result<Self, Error> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::Config(format!("frame rate must be positive, got {}", fps)));
        }

        Ok(Self { fps })
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    pub fn timestamp(&self, frame: u64) -> f64 {
        frame as f64 / self.fps
    }
}

/// Rendering/export view of one live track.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub id: TrackId,
    pub bbox: BBox<Ltwh>,
    pub class: VehicleClass,
    pub confidence: f32,
    /// `None` while there is not enough data for a measurement.
    pub speed: Option<Speed>,
    pub average_speed: Option<Speed>,
    /// `None` until an OCR sample was accepted.
    pub plate: Option<String>,
    /// Consecutive frames without a matching detection.
    pub missed: u32,
}

impl TrackRecord {
    pub fn new(track: &Track, unit: DistanceUnit, plates: &PlateResolver) -> Self {
        Self {
            id: track.id(),
            bbox: *track.bbox(),
            class: track.class(),
            confidence: track.confidence(),
            speed: track.speed_estimate().map(|v| Speed::new(v, unit)),
            average_speed: track.average_speed().map(|v| Speed::new(v, unit)),
            plate: plates.resolve(track.plates()).map(str::to_owned),
            missed: track.age_missed(),
        }
    }
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}", self.id)?;

        if let Some(plate) = &self.plate {
            write!(f, " | {}", plate)?;
        }

        match &self.speed {
            Some(speed) => write!(f, " | {}", speed),
            None => f.write_str(" | -- km/h"),
        }
    }
}

/// Immutable per-frame output, records ordered by ascending track id.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub timestamp: f64,
    pub tracks: Vec<TrackRecord>,
}

impl FrameSnapshot {
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &TrackRecord> {
        self.tracks.iter()
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackRecord> {
        self.tracks
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| &self.tracks[i])
    }
}
