use serde::{Deserialize, Serialize};

use crate::image::{window_mean, GrayImageView};
use crate::types::{ClassifiedCoin, CoinColor, DetectedCircle};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Window mean at or above this is a white coin (0..255 scale).
    pub white_threshold: f64,
    /// Window mean at or below this is a black coin.
    pub black_threshold: f64,
    /// Half side of the square sampling window, in pixels.
    pub sample_half_width: u32,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            white_threshold: 175.0,
            black_threshold: 175.0,
            sample_half_width: 7,
        }
    }
}

impl ClassifierParams {
    /// Thresholds where a single mean can satisfy both colors.
    pub fn is_overlapping(&self) -> bool {
        self.white_threshold < self.black_threshold
    }

    /// Warn about overlapping thresholds; such spots classify as `Unclassified`.
    pub fn validate(&self) {
        if self.is_overlapping() {
            log::warn!(
                "white threshold {} is below black threshold {}; spots between them stay unclassified",
                self.white_threshold,
                self.black_threshold
            );
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub color: CoinColor,
    pub mean: Option<f64>,
}

/// Brightness classifier over a fixed square window at the circle center.
#[derive(Clone, Debug)]
pub struct CoinClassifier {
    params: ClassifierParams,
}

impl CoinClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        params.validate();
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn classify(&self, img: &GrayImageView<'_>, x: f32, y: f32) -> Classification {
        let mean = window_mean(img, x, y, self.params.sample_half_width);
        let color = mean.map_or(CoinColor::Unclassified, |m| self.color_for_mean(m));
        Classification { color, mean }
    }

    pub fn classify_circle(&self, img: &GrayImageView<'_>, circle: &DetectedCircle) -> ClassifiedCoin {
        let c = self.classify(img, circle.center.x, circle.center.y);
        ClassifiedCoin {
            circle: *circle,
            color: c.color,
            mean_intensity: c.mean,
        }
    }

    pub fn color_for_mean(&self, mean: f64) -> CoinColor {
        let p = &self.params;
        let is_white = mean >= p.white_threshold;
        let is_black = mean <= p.black_threshold;
        match (is_white, is_black) {
            (true, false) => CoinColor::White,
            (false, true) => CoinColor::Black,
            // Only reachable when white <= black. Equal thresholds keep the >= rule.
            (true, true) if !p.is_overlapping() => CoinColor::White,
            _ => CoinColor::Unclassified,
        }
    }
}
