//! Live camera, HighGUI window and OpenCV's `HoughCircles`.

use std::time::Duration;

use boardcal_circles::{CircleDetector, HoughCircleParams};
use boardcal_core::{DetectedCircle, GrayImageView};
use image::RgbImage;
use opencv::{
    core::{self, Mat, Scalar, Vec3f, Vector},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::capture::{CaptureError, FrameSource};
use crate::display::{DisplayError, DisplaySink};

/// Camera opened through `VideoCapture`, released on drop.
pub struct OpenCvCapture {
    cap: VideoCapture,
}

impl OpenCvCapture {
    pub fn open(device: i32, width: u32, height: u32, warmup: Duration) -> Result<Self, CaptureError> {
        let mut cap = VideoCapture::new(device, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(CaptureError::DeviceUnavailable(format!("camera index {device}")));
        }
        cap.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        cap.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        log::info!("camera {device} opened, warming up for {} ms", warmup.as_millis());
        std::thread::sleep(warmup);
        Ok(Self { cap })
    }
}

impl FrameSource for OpenCvCapture {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let mut bgr = Mat::default();
        if !self.cap.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let bytes = rgb.data_bytes()?;
        let layout = CaptureError::FrameLayout {
            width,
            height,
            bytes: bytes.len(),
        };
        RgbImage::from_raw(width, height, bytes.to_vec())
            .map(Some)
            .ok_or(layout)
    }
}

impl Drop for OpenCvCapture {
    fn drop(&mut self) {
        if let Err(err) = self.cap.release() {
            log::warn!("failed to release camera: {err}");
        }
    }
}

/// HighGUI window. `q` quits; the window is destroyed on drop.
pub struct HighguiDisplay {
    name: String,
}

impl HighguiDisplay {
    pub fn new(name: impl Into<String>) -> Result<Self, DisplayError> {
        let name = name.into();
        highgui::named_window(&name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { name })
    }
}

impl DisplaySink for HighguiDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        let mut rgb = Mat::new_rows_cols_with_default(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )?;
        rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());
        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        highgui::imshow(&self.name, &bgr)?;
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        let key = highgui::wait_key(1)?;
        Ok(key & 0xFF == 'q' as i32)
    }
}

impl Drop for HighguiDisplay {
    fn drop(&mut self) {
        if let Err(err) = highgui::destroy_window(&self.name) {
            log::warn!("failed to close window {}: {err}", self.name);
        }
    }
}

/// The detector the operator's original setup was tuned against.
#[derive(Clone, Debug)]
pub struct OpenCvHoughDetector {
    params: HoughCircleParams,
}

impl OpenCvHoughDetector {
    pub fn new(params: HoughCircleParams) -> Self {
        Self { params }
    }

    /// `HoughCircles` with its error surfaced. An empty frame is rejected
    /// before it reaches OpenCV.
    pub fn try_detect(&self, img: &GrayImageView<'_>) -> opencv::Result<Vec<DetectedCircle>> {
        if img.width == 0 || img.height == 0 {
            return Err(opencv::Error::new(
                core::StsBadArg,
                format!("empty {}x{} frame", img.width, img.height),
            ));
        }
        let mat = Mat::new_rows_cols_with_data(img.height as i32, img.width as i32, img.data)?
            .try_clone()?;
        let mut found: Vector<Vec3f> = Vector::new();
        let p = &self.params;
        imgproc::hough_circles(
            &mat,
            &mut found,
            imgproc::HOUGH_GRADIENT,
            p.dp as f64,
            p.min_dist as f64,
            p.param1 as f64,
            p.param2 as f64,
            p.min_radius as i32,
            p.max_radius as i32,
        )?;
        Ok(found
            .iter()
            .map(|c| DetectedCircle::new(c[0], c[1], c[2]))
            .collect())
    }
}

/// Failures are logged at `warn` and reported as no circles, so within the
/// loop they read the same as an empty board. Call
/// [`OpenCvHoughDetector::try_detect`] to tell the two apart.
impl CircleDetector for OpenCvHoughDetector {
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<DetectedCircle> {
        match self.try_detect(img) {
            Ok(circles) => circles,
            Err(err) => {
                log::warn!("HoughCircles failed: {err}");
                Vec::new()
            }
        }
    }
}
