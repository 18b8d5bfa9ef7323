//! Editable calibration configuration.
//!
//! Every table is optional in the JSON file; missing values fall back to the
//! constants of the reference board setup (640x480 camera about 1.2 m above a
//! board with a 254 mm reference point).

use std::fs;
use std::path::{Path, PathBuf};

use boardcal_circles::{HoughCircleDetector, HoughCircleParams, HoughParamsError};
use boardcal_core::{
    CalibrationMode, CalibrationState, CameraModel, ClassifierParams, CoinClassifier, ConfigError,
    CoordinateMapper, ExtrinsicParameters, IntrinsicParameters, ReferencePoint,
};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hough(#[from] HoughParamsError),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub intrinsics: IntrinsicParameters,
    pub extrinsics: ExtrinsicParameters,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            intrinsics: IntrinsicParameters {
                focal_x: 986.1724,
                focal_y: 994.4793,
                principal_point: [635.8148, 370.9430],
                radial_distortion: [-0.0383, 0.2577],
            },
            extrinsics: ExtrinsicParameters::looking_down(1000.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
    /// Pixel treated as the optical center by the mapper; defaults to the
    /// middle of the frame.
    pub image_center: Option<[f64; 2]>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            image_center: None,
        }
    }
}

impl FrameConfig {
    pub fn image_center(&self) -> [f64; 2] {
        self.image_center
            .unwrap_or([self.width as f64 / 2.0, self.height as f64 / 2.0])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let [x, y] = self.image_center();
        let inside = (0.0..=self.width as f64).contains(&x) && (0.0..=self.height as f64).contains(&y);
        if !inside {
            return Err(ConfigError::InvalidImageCenter {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Median filter kernel applied to the grayscale frame before detection.
    pub median_kernel: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { median_kernel: 9 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index for the OpenCV backend.
    pub device: i32,
    /// Delay after opening the camera before the first frame is read.
    pub warmup_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: 0,
            warmup_ms: 2000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub enabled: bool,
    /// Readings averaged before a suggestion is printed.
    pub window: usize,
    /// Max spread of the window around its mean (px or mm).
    pub stable_tolerance: f64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 10,
            stable_tolerance: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardCalConfig {
    pub camera: CameraConfig,
    pub frame: FrameConfig,
    pub classifier: ClassifierParams,
    pub calibration: CalibrationState,
    pub reference: ReferencePoint,
    pub circles: HoughCircleParams,
    pub preprocess: PreprocessConfig,
    pub capture: CaptureConfig,
    pub assist: AssistConfig,
}

/// Validated building blocks for one calibration run.
#[derive(Clone, Debug)]
pub struct CalibrationSetup {
    pub camera: CameraModel,
    pub mapper: CoordinateMapper,
    pub classifier: CoinClassifier,
    pub detector: HoughCircleDetector,
    pub median_kernel: u32,
    pub reference: ReferencePoint,
    /// Width and height every processed frame must have.
    pub frame_size: (u32, u32),
}

impl BoardCalConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn mode(&self) -> CalibrationMode {
        CalibrationMode::of_state(&self.calibration)
    }

    /// Override the two mode flags; the constants stay as configured.
    pub fn apply_mode(&mut self, mode: CalibrationMode) {
        self.calibration = mode.apply_to(self.calibration);
    }

    /// Check every constant and build the run components. Nothing in the
    /// calibration loop re-validates these.
    pub fn validate(&self) -> Result<CalibrationSetup, ConfigLoadError> {
        let camera = CameraModel::new(self.camera.intrinsics, self.camera.extrinsics)?;
        self.frame.validate()?;
        let mapper =
            CoordinateMapper::from_camera(&camera, self.frame.image_center(), self.calibration)?;
        if self.preprocess.median_kernel == 0 || self.preprocess.median_kernel % 2 == 0 {
            return Err(ConfigError::InvalidKernel(self.preprocess.median_kernel).into());
        }
        let detector = HoughCircleDetector::new(self.circles)?;
        Ok(CalibrationSetup {
            camera,
            mapper,
            classifier: CoinClassifier::new(self.classifier),
            detector,
            median_kernel: self.preprocess.median_kernel,
            reference: self.reference,
            frame_size: (self.frame.width, self.frame.height),
        })
    }

    pub fn constants(&self) -> CalibrationConstants {
        CalibrationConstants {
            white_threshold: self.classifier.white_threshold,
            black_threshold: self.classifier.black_threshold,
            sample_half_width: self.classifier.sample_half_width,
            offset_pixel: self.calibration.offset_pixel,
            depth_mm: self.calibration.depth_mm,
            theta_rad: self.calibration.theta_rad,
        }
    }
}

/// The values the downstream coin tracker has to share with this tool.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConstants {
    pub white_threshold: f64,
    pub black_threshold: f64,
    pub sample_half_width: u32,
    pub offset_pixel: [f64; 2],
    pub depth_mm: f64,
    pub theta_rad: f64,
}
