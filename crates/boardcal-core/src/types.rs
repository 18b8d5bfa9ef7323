use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Circle candidate reported by a detector, in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedCircle {
    pub center: Point2<f32>,
    pub radius: f32,
}

impl DetectedCircle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: Point2::new(x, y),
            radius,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinColor {
    White,
    Black,
    Unclassified,
}

/// A detected circle together with its brightness classification.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCoin {
    pub circle: DetectedCircle,
    pub color: CoinColor,
    /// Mean intensity of the sampling window, `None` if the window fell
    /// entirely outside the image.
    pub mean_intensity: Option<f64>,
}

/// Coin position relative to the board center, in millimetres (y up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardCoordinate {
    pub x_mm: f64,
    pub y_mm: f64,
}

impl BoardCoordinate {
    pub fn new(x_mm: f64, y_mm: f64) -> Self {
        Self { x_mm, y_mm }
    }

    /// Distance from the board center.
    pub fn radius_mm(&self) -> f64 {
        self.x_mm.hypot(self.y_mm)
    }

    /// Counter-clockwise angle from the board +x axis.
    pub fn bearing_rad(&self) -> f64 {
        self.y_mm.atan2(self.x_mm)
    }

    pub fn distance_to(&self, other: &BoardCoordinate) -> f64 {
        (self.x_mm - other.x_mm).hypot(self.y_mm - other.y_mm)
    }
}

/// Pixel displacement of a circle from the image center, y up.
///
/// This is the raw reading of offset calibration: with a coin on the
/// board center it is exactly the offset to configure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelOffset {
    pub dx: f64,
    pub dy: f64,
}
