use boardcal_circles::CircleDetector;
use boardcal_core::{
    median_blur, BoardCoordinate, CalibrationMode, ClassifiedCoin, CoinClassifier, CoinColor,
    CoordinateMapper, DetectedCircle, GrayImageView, Observation, PixelOffset, ReferencePoint,
};
use image::RgbImage;
use serde::Serialize;

use crate::annotate::{draw_crosshair, draw_dot, BLUE, GREEN, RED};
use crate::config::CalibrationSetup;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// What a white coin tells the operator in the current mode.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoinReading {
    /// Offset calibration: raw displacement from the image center.
    Offset {
        coin: ClassifiedCoin,
        offset: PixelOffset,
    },
    /// Depth or angle calibration: mapped board position.
    Board {
        coin: ClassifiedCoin,
        coordinate: BoardCoordinate,
    },
}

impl CoinReading {
    pub fn coin(&self) -> &ClassifiedCoin {
        match self {
            Self::Offset { coin, .. } | Self::Board { coin, .. } => coin,
        }
    }

    pub fn observation(&self) -> Observation {
        match *self {
            Self::Offset { offset, .. } => Observation::Offset(offset),
            Self::Board { coordinate, .. } => Observation::Board(coordinate),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub circles: Vec<DetectedCircle>,
    pub coins: Vec<ClassifiedCoin>,
    /// One per white coin, in detection order.
    pub readings: Vec<CoinReading>,
}

/// A frame whose size differs from the one the image center was set for.
#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
#[error("frame size {actual:?} does not match the configured {expected:?}")]
pub struct FrameSizeMismatch {
    pub expected: (u32, u32),
    pub actual: (u32, u32),
}

/// Per-frame work: grayscale, blur, detect, classify, map.
pub struct FrameProcessor<D> {
    detector: D,
    classifier: CoinClassifier,
    mapper: CoordinateMapper,
    median_kernel: u32,
    reference: ReferencePoint,
    frame_size: Option<(u32, u32)>,
}

impl<D: CircleDetector> FrameProcessor<D> {
    pub fn new(
        detector: D,
        classifier: CoinClassifier,
        mapper: CoordinateMapper,
        median_kernel: u32,
        reference: ReferencePoint,
    ) -> Self {
        Self {
            detector,
            classifier,
            mapper,
            median_kernel,
            reference,
            frame_size: None,
        }
    }

    /// Reject frames that are not `width x height` in [`process`](Self::process).
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = Some((width, height));
        self
    }

    /// Build from a validated setup, with a detector of the caller's choice.
    pub fn from_setup(setup: &CalibrationSetup, detector: D) -> Self {
        let (width, height) = setup.frame_size;
        Self::new(
            detector,
            setup.classifier.clone(),
            setup.mapper,
            setup.median_kernel,
            setup.reference,
        )
        .with_frame_size(width, height)
    }

    pub fn mode(&self) -> CalibrationMode {
        CalibrationMode::of_state(self.mapper.state())
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn reference(&self) -> &ReferencePoint {
        &self.reference
    }

    /// Detection, classification and mapping on a grayscale frame.
    pub fn analyze(&self, gray: &GrayImageView<'_>) -> FrameReport {
        let blurred = median_blur(gray, self.median_kernel);
        let view = blurred.view();
        let circles = self.detector.detect(&view);
        let coins: Vec<ClassifiedCoin> = circles
            .iter()
            .map(|c| self.classifier.classify_circle(&view, c))
            .collect();

        let offset_mode = self.mode() == CalibrationMode::RecenterOffset;
        let readings = coins
            .iter()
            .filter(|c| c.color == CoinColor::White)
            .map(|&coin| {
                let center = coin.circle.center;
                if offset_mode {
                    CoinReading::Offset {
                        coin,
                        offset: self.mapper.pixel_offset(center),
                    }
                } else {
                    CoinReading::Board {
                        coin,
                        coordinate: self.mapper.map(center),
                    }
                }
            })
            .collect();

        FrameReport {
            circles,
            coins,
            readings,
        }
    }

    /// Analyze a color frame and draw the coin markers onto it.
    ///
    /// Fails without touching the frame when a frame size is set and the
    /// frame does not match it.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn process(&self, frame: &mut RgbImage) -> Result<FrameReport, FrameSizeMismatch> {
        if let Some(expected) = self.frame_size {
            let actual = frame.dimensions();
            if actual != expected {
                return Err(FrameSizeMismatch { expected, actual });
            }
        }
        let gray = image::imageops::grayscale(&*frame);
        let report = self.analyze(&GrayImageView::from_luma(&gray));
        self.annotate(frame, &report);
        Ok(report)
    }

    pub fn annotate(&self, frame: &mut RgbImage, report: &FrameReport) {
        for coin in &report.coins {
            let c = coin.circle.center;
            match coin.color {
                CoinColor::Black => draw_dot(frame, c.x, c.y, GREEN),
                CoinColor::White => draw_dot(frame, c.x, c.y, BLUE),
                CoinColor::Unclassified => {}
            }
        }
        if self.mode() != CalibrationMode::RecenterOffset {
            return;
        }
        for reading in &report.readings {
            let c = reading.coin().circle.center;
            draw_crosshair(frame, c.x, c.y, RED);
        }
        if !report.readings.is_empty() {
            let [x, y] = self.mapper.image_center();
            draw_dot(frame, x as f32, y as f32, BLUE);
        }
    }
}
