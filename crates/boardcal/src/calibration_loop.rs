//! The blocking acquire, process, report, show loop.
//!
//! One iteration reads a frame, runs the [`FrameProcessor`], prints one line
//! per white coin, hands the annotated frame to the display and polls for a
//! quit request. The run ends normally when the source is exhausted or
//! fails, when the operator quits, or after an optional frame limit. A frame
//! of the wrong size aborts the run. The source and display are owned by the
//! loop and released when it is dropped.

use std::io::Write;

use boardcal_circles::CircleDetector;
use boardcal_core::CalibrationSession;
use serde::Serialize;

use crate::capture::FrameSource;
use crate::display::{DisplayError, DisplaySink};
use crate::pipeline::{FrameProcessor, FrameSizeMismatch};
use crate::report::{reading_line, suggestion_line};

#[derive(thiserror::Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error("failed to write to console: {0}")]
    Console(#[from] std::io::Error),
    #[error(transparent)]
    FrameSize(#[from] FrameSizeMismatch),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    EndOfStream,
    AcquisitionFailed,
    Quit,
    FrameLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoopSummary {
    pub frames: usize,
    pub readings: usize,
    pub suggestions: usize,
    pub exit: ExitReason,
}

/// Sliding-window suggestions printed next to the raw readings.
#[derive(Clone, Debug)]
struct Assist {
    session: CalibrationSession,
    stable_tolerance: f64,
}

pub struct CalibrationLoop<S, K, D> {
    source: S,
    display: K,
    processor: FrameProcessor<D>,
    max_frames: Option<usize>,
    assist: Option<Assist>,
}

impl<S, K, D> CalibrationLoop<S, K, D>
where
    S: FrameSource,
    K: DisplaySink,
    D: CircleDetector,
{
    pub fn new(source: S, display: K, processor: FrameProcessor<D>) -> Self {
        Self {
            source,
            display,
            processor,
            max_frames: None,
            assist: None,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Print a suggestion each time `session` holds a full window whose
    /// readings stay within `stable_tolerance` of their mean. The session is
    /// never advanced; adopting the values is up to the operator.
    pub fn with_assist(mut self, session: CalibrationSession, stable_tolerance: f64) -> Self {
        self.assist = Some(Assist {
            session,
            stable_tolerance,
        });
        self
    }

    pub fn processor(&self) -> &FrameProcessor<D> {
        &self.processor
    }

    pub fn display(&self) -> &K {
        &self.display
    }

    pub fn run(&mut self, out: &mut impl Write) -> Result<LoopSummary, LoopError> {
        log::info!(
            "calibration loop started in {} mode",
            self.processor.mode()
        );
        let reference = *self.processor.reference();
        let mut frames = 0usize;
        let mut readings = 0usize;
        let mut suggestions = 0usize;

        let exit = loop {
            if self.max_frames.is_some_and(|max| frames >= max) {
                break ExitReason::FrameLimit;
            }
            let mut frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break ExitReason::EndOfStream,
                Err(err) => {
                    log::warn!("frame acquisition failed: {err}");
                    break ExitReason::AcquisitionFailed;
                }
            };
            frames += 1;

            let report = self.processor.process(&mut frame)?;
            log::debug!(
                "frame {frames}: {} circles, {} white readings",
                report.circles.len(),
                report.readings.len()
            );
            for reading in &report.readings {
                writeln!(out, "{}", reading_line(reading, &reference))?;
                readings += 1;
            }

            if let Some(assist) = &mut self.assist {
                for reading in &report.readings {
                    assist.session.observe(reading.observation());
                }
                if assist.session.is_stable(assist.stable_tolerance) {
                    match assist.session.suggestion() {
                        Some(Ok(s)) => {
                            writeln!(out, "{}", suggestion_line(&s))?;
                            suggestions += 1;
                        }
                        Some(Err(err)) => log::warn!("no suggestion: {err}"),
                        None => {}
                    }
                    assist.session.clear();
                }
            }

            self.display.show(&frame)?;
            if self.display.quit_requested()? {
                break ExitReason::Quit;
            }
        };

        out.flush()?;
        let summary = LoopSummary {
            frames,
            readings,
            suggestions,
            exit,
        };
        log::info!(
            "calibration loop stopped ({:?}) after {} frames, {} readings",
            summary.exit,
            summary.frames,
            summary.readings
        );
        Ok(summary)
    }
}
