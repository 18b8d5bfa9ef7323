//! Live camera-to-board calibration for a coin-tracking vision pipeline.
//!
//! This crate provides:
//! - re-exports of the geometric core (`boardcal-core`) and the circle
//!   detector (`boardcal-circles`)
//! - the JSON configuration holding every calibration constant
//! - frame sources, display sinks and the blocking calibration loop that
//!   prints per-coin readings for the operator
//! - (feature `opencv`) live camera capture, a HighGUI window and OpenCV's
//!   `HoughCircles` as an alternative detector
//!
//! ## Quickstart
//!
//! ```no_run
//! use boardcal::{
//!     BoardCalConfig, CalibrationLoop, FrameProcessor, HeadlessDisplay, ImageSequenceSource,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = BoardCalConfig::default();
//! let setup = cfg.validate()?;
//! let processor = FrameProcessor::from_setup(&setup, setup.detector.clone());
//! let source = ImageSequenceSource::open(&[std::path::PathBuf::from("frames")])?;
//!
//! let mut run = CalibrationLoop::new(source, HeadlessDisplay::new(None), processor);
//! let summary = run.run(&mut std::io::stdout())?;
//! println!("{} readings over {} frames", summary.readings, summary.frames);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `boardcal::core`: camera model, classifier, mapper and calibration session.
//! - `boardcal::circles`: Hough-gradient circle detection.
//! - `boardcal::config`: `BoardCalConfig` and the exported constants.
//! - `boardcal::capture` / `boardcal::display`: frame sources and sinks.
//! - `boardcal::pipeline`: per-frame processing and annotation.
//! - `boardcal::calibration_loop`: the run loop and its exit reasons.

pub use boardcal_circles as circles;
pub use boardcal_core as core;

pub mod annotate;
pub mod calibration_loop;
pub mod capture;
pub mod config;
pub mod display;
pub mod pipeline;
pub mod report;

#[cfg(feature = "opencv")]
pub mod opencv_backend;

pub use calibration_loop::{CalibrationLoop, ExitReason, LoopError, LoopSummary};
pub use capture::{CaptureError, FrameSource, ImageSequenceSource, MemorySource};
pub use config::{BoardCalConfig, CalibrationConstants, CalibrationSetup, ConfigLoadError};
pub use display::{DisplayError, DisplaySink, HeadlessDisplay};
pub use pipeline::{CoinReading, FrameProcessor, FrameReport, FrameSizeMismatch};

pub use boardcal_core::{CalibrationMode, CalibrationSession, CalibrationState, Suggestion};

#[cfg(feature = "opencv")]
pub use opencv_backend::{HighguiDisplay, OpenCvCapture, OpenCvHoughDetector};
