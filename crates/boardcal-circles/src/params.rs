use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HoughParamsError {
    #[error("accumulator ratio dp must be >= 1 (got {0})")]
    InvalidDp(f32),
    #[error("radius range is empty (min_radius={min}, max_radius={max})")]
    EmptyRadiusRange { min: u32, max: u32 },
    #[error("thresholds must be finite and non-negative (param1={param1}, param2={param2})")]
    InvalidThreshold { param1: f32, param2: f32 },
    #[error("min_dist must be finite and non-negative (got {0})")]
    InvalidMinDist(f32),
}

/// Hough-gradient circle detector settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughCircleParams {
    /// Inverse accumulator resolution: image size / accumulator size.
    pub dp: f32,
    /// Minimum distance between accepted centers, px.
    pub min_dist: f32,
    /// Gradient magnitude (L1 Sobel) an edge pixel must exceed.
    pub param1: f32,
    /// Accumulator votes a center needs.
    pub param2: f32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl Default for HoughCircleParams {
    fn default() -> Self {
        Self {
            dp: 1.9,
            min_dist: 10.0,
            param1: 60.0,
            param2: 40.0,
            min_radius: 8,
            max_radius: 14,
        }
    }
}

impl HoughCircleParams {
    pub fn validate(&self) -> Result<(), HoughParamsError> {
        if !self.dp.is_finite() || self.dp < 1.0 {
            return Err(HoughParamsError::InvalidDp(self.dp));
        }
        if self.max_radius == 0 || self.min_radius > self.max_radius {
            return Err(HoughParamsError::EmptyRadiusRange {
                min: self.min_radius,
                max: self.max_radius,
            });
        }
        let ok = |v: f32| v.is_finite() && v >= 0.0;
        if !ok(self.param1) || !ok(self.param2) {
            return Err(HoughParamsError::InvalidThreshold {
                param1: self.param1,
                param2: self.param2,
            });
        }
        if !ok(self.min_dist) {
            return Err(HoughParamsError::InvalidMinDist(self.min_dist));
        }
        Ok(())
    }

    /// Smallest radius that still votes; a zero radius would vote for the edge itself.
    pub(crate) fn first_radius(&self) -> u32 {
        self.min_radius.max(1)
    }
}
