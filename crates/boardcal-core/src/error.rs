use crate::session::CalibrationMode;

/// Invalid calibration constants, rejected before the calibration loop starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("focal lengths must be positive and finite (focal_x={focal_x}, focal_y={focal_y})")]
    NonPositiveFocal { focal_x: f64, focal_y: f64 },

    #[error("depth must be positive and finite (depth_mm={depth_mm})")]
    NonPositiveDepth { depth_mm: f64 },

    #[error("`{field}` must be finite")]
    NonFinite { field: &'static str },

    #[error(
        "extrinsic rotation is not orthonormal (max |RᵀR - I| = {max_error:.3e}, det = {determinant:.6})"
    )]
    RotationNotOrthonormal { max_error: f64, determinant: f64 },

    #[error("image center ({x}, {y}) lies outside a {width}x{height} frame")]
    InvalidImageCenter {
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },

    #[error("median kernel must be odd and at least 1 (got {0})")]
    InvalidKernel(u32),
}

/// A calibration reading that cannot produce a suggestion.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum SessionError {
    #[error("{mode} mode cannot use a {got} reading")]
    ObservationMismatch {
        mode: CalibrationMode,
        got: &'static str,
    },

    #[error("board reading at the origin carries no depth or angle information")]
    DegenerateReading,
}
