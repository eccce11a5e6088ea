use std::rc::Rc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::detection::{Detection, PlateSample};
use crate::error::Error;
use crate::frame::{Frame, FrameSnapshot, TrackRecord};
use crate::geometry::{Correspondence, DistanceUnit, GroundMapper};
use crate::plate::PlateResolver;
use crate::scene::Scene;

/// Single-camera tracking and speed engine. One `tick` per frame, frame
/// indices strictly increasing.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    mapper: GroundMapper,
    scene: Scene,
    plates: PlateResolver,
    last_frame: Option<u64>,
    last_timestamp: f64,
}

impl Engine {
    pub fn new(mapper: GroundMapper, config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;

        info!(
            unit = mapper.unit().as_str(),
            method = ?config.association.method,
            max_age = config.association.max_age,
            window = config.speed.window,
            "tracking engine ready"
        );

        Ok(Self {
            scene: Scene::new(&config),
            plates: PlateResolver::new(&config.plate),
            mapper,
            config,
            last_frame: None,
            last_timestamp: f64::NEG_INFINITY,
        })
    }

    pub fn with_calibration(
        points: &[Correspondence],
        unit: DistanceUnit,
        config: EngineConfig,
    ) -> Result<Self, Error> {
        let mapper = GroundMapper::new(points, unit)?;
        Self::new(mapper, config)
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn mapper(&self) -> &GroundMapper {
        &self.mapper
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    pub fn tick(
        &mut self,
        frame: u64,
        timestamp: f64,
        detections: &[Detection],
        plates: &[PlateSample],
    ) -> Result<FrameSnapshot, Error> {
        self.check_sequence(frame, timestamp)?;

        let mapping = self
            .scene
            .map_detections(frame, timestamp, &self.mapper, detections);
        let owners = self.scene.update(mapping);

        for sample in plates {
            let owner = owners.get(sample.detection).copied().flatten();

            match owner.and_then(|id| self.scene.get_mut(id)) {
                Some(track) => {
                    track.add_plate_sample(&self.plates, sample);
                }
                None => debug!(
                    frame,
                    detection = sample.detection,
                    "plate sample has no tracked detection"
                ),
            }
        }

        self.last_frame = Some(frame);
        self.last_timestamp = timestamp;

        Ok(self.snapshot(frame, timestamp))
    }

    #[inline]
    pub fn process(&mut self, frame: &Frame) -> Result<FrameSnapshot, Error> {
        self.tick(frame.index, frame.timestamp, &frame.detections, &frame.plates)
    }

    /// Records of the tracks that passed `min_hits`, ascending by id.
    pub fn records(&self) -> Vec<TrackRecord> {
        let unit = self.mapper.unit();

        self.scene
            .tracks()
            .filter(|t| t.hits() >= self.config.min_hits)
            .map(|t| TrackRecord::new(t, unit, &self.plates))
            .collect()
    }

    fn snapshot(&self, frame: u64, timestamp: f64) -> FrameSnapshot {
        FrameSnapshot {
            frame,
            timestamp,
            tracks: self.records(),
        }
    }

    fn check_sequence(&self, frame: u64, timestamp: f64) -> Result<(), Error> {
        if let Some(last) = self.last_frame {
            if frame <= last {
                return Err(Error::Sequence { last, got: frame });
            }
        }

        if !timestamp.is_finite() {
            return Err(Error::InvalidTimestamp {
                frame,
                got: timestamp,
            });
        }

        if timestamp < self.last_timestamp {
            return Err(Error::TimestampRegression {
                frame,
                last: self.last_timestamp,
                got: timestamp,
            });
        }

        Ok(())
    }
}

impl crate::Tracking for Engine {
    #[inline]
    fn update(&mut self, frame: &Frame) -> Result<FrameSnapshot, Error> {
        self.process(frame)
    }

    #[inline]
    fn tracks(&self) -> Rc<[TrackRecord]> {
        self.records().into()
    }
}
