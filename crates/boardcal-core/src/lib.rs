//! Core types for camera-to-board calibration.
//!
//! This crate is purely geometric. It knows nothing about video capture,
//! windows or a concrete circle detector; it turns detected circles into
//! classified coins and board-frame millimetre coordinates, and it models
//! the operator-driven calibration procedure as an explicit session.

mod camera;
mod classify;
mod error;
mod image;
mod logger;
mod mapper;
mod session;
mod types;

pub use camera::{CameraModel, ExtrinsicParameters, IntrinsicParameters};
pub use classify::{Classification, ClassifierParams, CoinClassifier};
pub use error::{ConfigError, SessionError};
pub use self::image::{median_blur, window_mean, GrayImage, GrayImageView};
pub use mapper::{rotate, CalibrationState, CoordinateMapper};
pub use session::{
    suggest, CalibrationMode, CalibrationSession, Observation, ReferencePoint, Suggestion,
};
pub use types::{BoardCoordinate, ClassifiedCoin, CoinColor, DetectedCircle, PixelOffset};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
