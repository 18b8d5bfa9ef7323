use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::error::ConfigError;
use crate::types::{BoardCoordinate, PixelOffset};

/// Operator-tuned calibration constants. Read-only while the loop runs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationState {
    /// Pixel offset of the board center from the image center (y up).
    pub offset_pixel: [f64; 2],
    /// Camera-to-board distance used as the projective scale, mm.
    pub depth_mm: f64,
    /// Residual yaw correction, radians.
    pub theta_rad: f64,
    pub calibrating_depth: bool,
    pub calibrating_angle: bool,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            offset_pixel: [-62.5, -8.0],
            depth_mm: 1220.0 * 254.0 / (251.4_f64 * 251.4 + 2.4 * 2.4).sqrt(),
            theta_rad: -0.001,
            calibrating_depth: true,
            calibrating_angle: true,
        }
    }
}

impl CalibrationState {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.depth_mm.is_finite() || self.depth_mm <= 0.0 {
            return Err(ConfigError::NonPositiveDepth {
                depth_mm: self.depth_mm,
            });
        }
        if !self.theta_rad.is_finite() {
            return Err(ConfigError::NonFinite { field: "theta_rad" });
        }
        if !self.offset_pixel.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "offset_pixel",
            });
        }
        Ok(())
    }
}

/// Pixel to board-plane conversion under a fixed calibration state.
///
/// Assumes the board plane is parallel to the image plane at `depth_mm`.
/// Steps, in order: recenter and flip y, scale by depth over focal length,
/// then rotate by `theta_rad` when angle correction is on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    focal_x: f64,
    focal_y: f64,
    image_center: [f64; 2],
    state: CalibrationState,
}

impl CoordinateMapper {
    pub fn new(
        focal_x: f64,
        focal_y: f64,
        image_center: [f64; 2],
        state: CalibrationState,
    ) -> Result<Self, ConfigError> {
        let ok = |f: f64| f.is_finite() && f > 0.0;
        if !ok(focal_x) || !ok(focal_y) {
            return Err(ConfigError::NonPositiveFocal { focal_x, focal_y });
        }
        if !image_center.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "image_center",
            });
        }
        state.validate()?;
        Ok(Self {
            focal_x,
            focal_y,
            image_center,
            state,
        })
    }

    pub fn from_camera(
        camera: &CameraModel,
        image_center: [f64; 2],
        state: CalibrationState,
    ) -> Result<Self, ConfigError> {
        let intr = camera.intrinsics();
        Self::new(intr.focal_x, intr.focal_y, image_center, state)
    }

    /// Same optics, different calibration constants.
    pub fn with_state(&self, state: CalibrationState) -> Result<Self, ConfigError> {
        Self::new(self.focal_x, self.focal_y, self.image_center, state)
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn image_center(&self) -> [f64; 2] {
        self.image_center
    }

    /// Displacement from the image center, ignoring the configured offset.
    pub fn pixel_offset(&self, pixel: Point2<f32>) -> PixelOffset {
        PixelOffset {
            dx: pixel.x as f64 - self.image_center[0],
            dy: self.image_center[1] - pixel.y as f64,
        }
    }

    /// Offset-corrected, y-up pixel coordinates relative to the board center.
    pub fn to_camera_plane(&self, pixel: Point2<f32>) -> [f64; 2] {
        let d = self.pixel_offset(pixel);
        [
            d.dx - self.state.offset_pixel[0],
            d.dy - self.state.offset_pixel[1],
        ]
    }

    pub fn map_unrotated(&self, pixel: Point2<f32>) -> BoardCoordinate {
        let [px, py] = self.to_camera_plane(pixel);
        BoardCoordinate {
            x_mm: px / self.focal_x * self.state.depth_mm,
            y_mm: py / self.focal_y * self.state.depth_mm,
        }
    }

    pub fn map(&self, pixel: Point2<f32>) -> BoardCoordinate {
        let raw = self.map_unrotated(pixel);
        if self.state.calibrating_angle {
            rotate(raw, self.state.theta_rad)
        } else {
            raw
        }
    }
}

/// Counter-clockwise rotation of a board coordinate by `theta` radians.
pub fn rotate(p: BoardCoordinate, theta: f64) -> BoardCoordinate {
    let (s, c) = theta.sin_cos();
    BoardCoordinate {
        x_mm: c * p.x_mm - s * p.y_mm,
        y_mm: s * p.x_mm + c * p.y_mm,
    }
}
