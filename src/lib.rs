pub mod association;
pub mod bbox;
pub mod circular_queue;
pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod math;
pub mod plate;
pub mod scene;
pub mod speed;
pub mod track;

pub use config::EngineConfig;
pub use detection::{Detection, PlateSample, VehicleClass};
pub use engine::Engine;
pub use error::{CalibrationError, Error};
pub use frame::{Frame, FrameClock, FrameSnapshot, TrackRecord};
pub use geometry::{Correspondence, DistanceUnit, GroundMapper};
pub use speed::Speed;
pub use track::{Track, TrackId};

use std::rc::Rc;

pub trait Tracking {
    fn update(&mut self, frame: &Frame) -> Result<FrameSnapshot, Error>;
    fn tracks(&self) -> Rc<[TrackRecord]>;
}
