use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("at least 4 correspondences are required, got {0}")]
    TooFewPoints(usize),

    #[error("correspondence {0} has a non-finite coordinate")]
    NonFinitePoint(usize),

    #[error("{0} points are collinear")]
    Collinear(&'static str),

    #[error("correspondences do not determine a unique homography")]
    Degenerate,

    #[error("homography is singular (det = {0:e})")]
    Singular(f64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Calibration Error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Sequence Error: frame {got} submitted after frame {last}")]
    Sequence { last: u64, got: u64 },

    #[error("Sequence Error: frame {frame} timestamp {got} precedes {last}")]
    TimestampRegression { frame: u64, last: f64, got: f64 },

    #[error("Sequence Error: frame {frame} has non-finite timestamp {got}")]
    InvalidTimestamp { frame: u64, got: f64 },

    #[error("Config Error: {0}")]
    Config(String),
}
