use std::sync::atomic::Ordering;

use boardcal::annotate::{BLUE, RED};
use boardcal::circles::FixedCircles;
use boardcal::core::{
    rotate, BoardCoordinate, CalibrationMode, CalibrationSession, CalibrationState,
    ClassifierParams, CoinClassifier, CoordinateMapper, DetectedCircle, ReferencePoint,
};
use boardcal::{
    BoardCalConfig, CalibrationLoop, CaptureError, DisplayError, DisplaySink, ExitReason,
    FrameProcessor, FrameSizeMismatch, FrameSource, HeadlessDisplay, LoopError, MemorySource,
};
use image::{Rgb, RgbImage};

const FOCAL_X: f64 = 986.1724;
const FOCAL_Y: f64 = 994.4793;

fn frame_with_white_coin(cx: u32, cy: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(640, 480, Rgb([110, 110, 110]));
    for y in cy - 11..=cy + 11 {
        for x in cx - 11..=cx + 11 {
            let (dx, dy) = (x as i64 - cx as i64, y as i64 - cy as i64);
            if dx * dx + dy * dy <= 121 {
                img.put_pixel(x, y, Rgb([235, 235, 235]));
            }
        }
    }
    img
}

fn state(mode: CalibrationMode) -> CalibrationState {
    mode.apply_to(CalibrationState {
        offset_pixel: [0.0, 0.0],
        ..CalibrationState::default()
    })
}

fn processor(mode: CalibrationMode, circles: Vec<DetectedCircle>) -> FrameProcessor<FixedCircles> {
    let mapper =
        CoordinateMapper::new(FOCAL_X, FOCAL_Y, [320.0, 240.0], state(mode)).expect("mapper");
    FrameProcessor::new(
        FixedCircles(circles),
        CoinClassifier::new(ClassifierParams::default()),
        mapper,
        9,
        ReferencePoint::default(),
    )
}

fn coin_at_reference_side() -> Vec<DetectedCircle> {
    vec![DetectedCircle::new(382.5, 240.0, 11.0)]
}

#[derive(Default)]
struct RecordingDisplay {
    shown: Vec<RgbImage>,
    quit_after: Option<usize>,
    fail: bool,
}

impl DisplaySink for RecordingDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        if self.fail {
            return Err(DisplayError::Io {
                path: "window".into(),
                source: std::io::Error::other("display gone"),
            });
        }
        self.shown.push(frame.clone());
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        Ok(self.quit_after.is_some_and(|n| self.shown.len() >= n))
    }
}

/// Hands out `frames` copies of a frame, then reports a device error.
struct FlakyCamera {
    frame: RgbImage,
    frames: usize,
}

impl FrameSource for FlakyCamera {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        if self.frames == 0 {
            return Err(CaptureError::DeviceUnavailable("unplugged".into()));
        }
        self.frames -= 1;
        Ok(Some(self.frame.clone()))
    }
}

fn output(buf: Vec<u8>) -> Vec<String> {
    String::from_utf8(buf)
        .expect("utf8")
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn exhausted_source_ends_the_run() {
    let source = MemorySource::new(vec![RgbImage::new(640, 480); 2]);
    let mut run = CalibrationLoop::new(
        source,
        RecordingDisplay::default(),
        processor(CalibrationMode::TuneDepth, Vec::new()),
    );
    let mut out: Vec<u8> = Vec::new();
    let summary = run.run(&mut out).expect("run");
    assert_eq!(summary.exit, ExitReason::EndOfStream);
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.readings, 0);
    assert!(out.is_empty());
    assert_eq!(run.display().shown.len(), 2);
}

#[test]
fn acquisition_failure_is_a_normal_exit() {
    let source = FlakyCamera {
        frame: frame_with_white_coin(382, 240),
        frames: 1,
    };
    let mut run = CalibrationLoop::new(
        source,
        RecordingDisplay::default(),
        processor(CalibrationMode::TuneDepth, coin_at_reference_side()),
    );
    let mut out: Vec<u8> = Vec::new();
    let summary = run.run(&mut out).expect("run");
    assert_eq!(summary.exit, ExitReason::AcquisitionFailed);
    assert_eq!(summary.frames, 1);
    assert_eq!(output(out).len(), 1);
}

#[test]
fn depth_mode_prints_board_coordinates() {
    let source = MemorySource::new([frame_with_white_coin(382, 240)]);
    let mut run = CalibrationLoop::new(
        source,
        RecordingDisplay::default(),
        processor(CalibrationMode::TuneDepth, coin_at_reference_side()),
    );
    let mut out: Vec<u8> = Vec::new();
    let summary = run.run(&mut out).expect("run");
    assert_eq!(summary.readings, 1);

    let lines = output(out);
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert!(line.ends_with(" Need 254 at the points"), "{line}");
    let x: f64 = line
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .expect("x value");
    let expected = 62.5 / FOCAL_X * CalibrationState::default().depth_mm;
    assert!((x - expected).abs() < 1e-3, "x {x} vs {expected}");
    assert!((x - 78.1).abs() < 0.1);
    assert!(line.starts_with("78.115 0.000 "), "{line}");
}

#[test]
fn offset_mode_prints_pixels_and_draws_the_crosshair() {
    let source = MemorySource::new([frame_with_white_coin(382, 240)]);
    let mut run = CalibrationLoop::new(
        source,
        RecordingDisplay::default(),
        processor(CalibrationMode::RecenterOffset, coin_at_reference_side()),
    );
    let mut out: Vec<u8> = Vec::new();
    run.run(&mut out).expect("run");
    assert_eq!(output(out), vec!["62.500 0.000 Update offset values".to_string()]);

    let shown = &run.display().shown[0];
    // crosshair diagonals through the rounded coin center (383, 240)
    assert_eq!(*shown.get_pixel(383 - 50, 240 - 50), RED);
    assert_eq!(*shown.get_pixel(383 + 50, 240 - 50), RED);
    assert_eq!(*shown.get_pixel(320, 240), BLUE);
}

#[test]
fn quit_request_stops_after_the_current_frame() {
    let source = MemorySource::new(vec![frame_with_white_coin(382, 240); 5]);
    let display = RecordingDisplay {
        quit_after: Some(2),
        ..RecordingDisplay::default()
    };
    let mut run = CalibrationLoop::new(
        source,
        display,
        processor(CalibrationMode::VerifyAngle, coin_at_reference_side()),
    );
    let mut out: Vec<u8> = Vec::new();
    let summary = run.run(&mut out).expect("run");
    assert_eq!(summary.exit, ExitReason::Quit);
    assert_eq!(summary.frames, 2);
}

#[test]
fn headless_quit_flag_stops_the_loop() {
    let display = HeadlessDisplay::new(None);
    display.quit_flag().store(true, Ordering::SeqCst);
    let mut run = CalibrationLoop::new(
        MemorySource::new(vec![RgbImage::new(64, 48); 3]),
        display,
        processor(CalibrationMode::TuneDepth, Vec::new()),
    );
    let summary = run.run(&mut Vec::<u8>::new()).expect("run");
    assert_eq!(summary.exit, ExitReason::Quit);
    assert_eq!(summary.frames, 1);
}

#[test]
fn frame_limit_is_honored() {
    let mut run = CalibrationLoop::new(
        MemorySource::new(vec![RgbImage::new(64, 48); 5]),
        RecordingDisplay::default(),
        processor(CalibrationMode::TuneDepth, Vec::new()),
    )
    .with_max_frames(Some(2));
    let summary = run.run(&mut Vec::<u8>::new()).expect("run");
    assert_eq!(summary.exit, ExitReason::FrameLimit);
    assert_eq!(summary.frames, 2);
}

#[test]
fn display_failure_is_an_error() {
    let display = RecordingDisplay {
        fail: true,
        ..RecordingDisplay::default()
    };
    let mut run = CalibrationLoop::new(
        MemorySource::new([RgbImage::new(64, 48)]),
        display,
        processor(CalibrationMode::TuneDepth, Vec::new()),
    );
    assert!(matches!(
        run.run(&mut Vec::<u8>::new()),
        Err(LoopError::Display(DisplayError::Io { .. }))
    ));
}

#[test]
fn assist_prints_one_suggestion_per_stable_window() {
    let mode = CalibrationMode::TuneDepth;
    let source = MemorySource::new(vec![frame_with_white_coin(382, 240); 4]);
    let session = CalibrationSession::new(state(mode), ReferencePoint::default(), 3);
    let mut run = CalibrationLoop::new(
        source,
        RecordingDisplay::default(),
        processor(mode, coin_at_reference_side()),
    )
    .with_assist(session, 0.5);
    let mut out: Vec<u8> = Vec::new();
    let summary = run.run(&mut out).expect("run");
    assert_eq!(summary.suggestions, 1);
    assert_eq!(summary.readings, 4);

    let lines = output(out);
    let suggestions: Vec<&String> = lines.iter().filter(|l| l.starts_with("suggest:")).collect();
    assert_eq!(suggestions.len(), 1, "{lines:?}");
    // reading radius 78.1 mm, so depth scales up to hit 254 mm
    assert!(suggestions[0].contains("converged=false next=depth"), "{}", suggestions[0]);
    assert!(lines[3].starts_with("suggest:"), "suggestion follows the third reading: {lines:?}");
}

#[test]
fn default_config_runs_end_to_end() {
    let cfg = BoardCalConfig::default();
    let setup = cfg.validate().expect("setup");
    let processor =
        FrameProcessor::from_setup(&setup, FixedCircles(vec![DetectedCircle::new(320.0, 240.0, 11.0)]));
    let mut run = CalibrationLoop::new(
        MemorySource::new([frame_with_white_coin(320, 240)]),
        RecordingDisplay::default(),
        processor,
    );
    let mut out: Vec<u8> = Vec::new();
    run.run(&mut out).expect("run");
    let lines = output(out);
    assert_eq!(lines.len(), 1);

    // image center minus the (-62.5, -8) px offset, scaled and rotated
    let d = cfg.calibration.depth_mm;
    let raw = BoardCoordinate::new(62.5 / FOCAL_X * d, 8.0 / FOCAL_Y * d);
    let expected = rotate(raw, cfg.calibration.theta_rad);
    let values: Vec<f64> = lines[0]
        .split_whitespace()
        .take(2)
        .map(|v| v.parse().expect("number"))
        .collect();
    assert!((values[0] - expected.x_mm).abs() < 1e-3, "{} vs {expected:?}", lines[0]);
    assert!((values[1] - expected.y_mm).abs() < 1e-3, "{} vs {expected:?}", lines[0]);
    assert_eq!(lines[0], "78.125 9.837 Need 254 at the points");
}

#[test]
fn frame_of_unexpected_size_aborts_the_run() {
    let setup = BoardCalConfig::default().validate().expect("setup");
    let processor =
        FrameProcessor::from_setup(&setup, FixedCircles(vec![DetectedCircle::new(640.0, 360.0, 11.0)]));
    let mut run = CalibrationLoop::new(
        MemorySource::new([RgbImage::from_pixel(1280, 720, Rgb([110, 110, 110]))]),
        RecordingDisplay::default(),
        processor,
    );
    let mut out: Vec<u8> = Vec::new();
    let err = run.run(&mut out).expect_err("size mismatch");
    assert!(
        matches!(
            err,
            LoopError::FrameSize(FrameSizeMismatch {
                expected: (640, 480),
                actual: (1280, 720),
            })
        ),
        "{err:?}"
    );
    assert!(out.is_empty(), "no reading may be printed for a mis-sized frame");
    assert!(run.display().shown.is_empty());
}
