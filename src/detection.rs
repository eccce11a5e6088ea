use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::bbox::{BBox, Ltwh};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Truck,
    Motorcycle,
    Bus,
}

impl VehicleClass {
    /// Maps a COCO class id to a vehicle class. Non-vehicle ids yield `None`.
    pub fn from_coco_id(id: u32) -> Option<Self> {
        match id {
            2 => Some(Self::Car),
            3 => Some(Self::Motorcycle),
            5 => Some(Self::Bus),
            7 => Some(Self::Truck),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Motorcycle => "motorcycle",
            Self::Bus => "bus",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector output for one frame. Box is left-top-width-height in image pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltwh>,
    #[serde(rename = "c")]
    pub class: VehicleClass,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BBox<Ltwh>, class: VehicleClass, confidence: f32) -> Self {
        Self {
            bbox,
            class,
            confidence,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.bbox.is_degenerate() || !self.confidence.is_finite()
    }
}

/// OCR reading of a plate crop, keyed to the index of the detection it was cut from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlateSample {
    pub detection: usize,
    pub text: String,
    pub confidence: f32,
}

impl PlateSample {
    pub fn new<S: Into<String>>(detection: usize, text: S, confidence: f32) -> Self {
        Self {
            detection,
            text: text.into(),
            confidence,
        }
    }
}
