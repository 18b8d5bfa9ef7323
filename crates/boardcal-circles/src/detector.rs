use boardcal_core::{DetectedCircle, GrayImageView};

use crate::hough::hough_circles;
use crate::params::{HoughCircleParams, HoughParamsError};

/// Source of circle candidates for one grayscale frame.
///
/// An empty result is a normal outcome (no coins in view).
pub trait CircleDetector {
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<DetectedCircle>;
}

/// Native Hough-gradient detector.
#[derive(Clone, Debug)]
pub struct HoughCircleDetector {
    params: HoughCircleParams,
}

impl HoughCircleDetector {
    pub fn new(params: HoughCircleParams) -> Result<Self, HoughParamsError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &HoughCircleParams {
        &self.params
    }
}

impl CircleDetector for HoughCircleDetector {
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<DetectedCircle> {
        hough_circles(img, &self.params)
    }
}

impl<D: CircleDetector + ?Sized> CircleDetector for Box<D> {
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<DetectedCircle> {
        (**self).detect(img)
    }
}

impl<D: CircleDetector + ?Sized> CircleDetector for &D {
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<DetectedCircle> {
        (**self).detect(img)
    }
}

/// Fixed candidate list, independent of the image. Useful for replaying
/// transcribed detections.
#[derive(Clone, Debug, Default)]
pub struct FixedCircles(pub Vec<DetectedCircle>);

impl CircleDetector for FixedCircles {
    fn detect(&self, _img: &GrayImageView<'_>) -> Vec<DetectedCircle> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_validates_params() {
        let p = HoughCircleParams {
            max_radius: 0,
            ..HoughCircleParams::default()
        };
        assert!(HoughCircleDetector::new(p).is_err());
        assert!(HoughCircleDetector::new(HoughCircleParams::default()).is_ok());
    }

    #[test]
    fn boxed_detector_delegates() {
        let fixed = FixedCircles(vec![DetectedCircle::new(1.0, 2.0, 3.0)]);
        let boxed: Box<dyn CircleDetector> = Box::new(fixed);
        let img = GrayImageView {
            width: 1,
            height: 1,
            data: &[0u8],
        };
        assert_eq!(boxed.detect(&img).len(), 1);
    }
}
