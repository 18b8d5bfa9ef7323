//! Operator-driven calibration procedure.
//!
//! Calibration runs in three stages. First a coin on the board center is used
//! to zero the pixel offset. Then a coin at a known reference point fixes the
//! depth scale and the yaw angle. Finally angle correction is switched on to
//! verify the reference point reads back correctly. [`suggest`] computes the
//! next constants from a single reading; [`CalibrationSession`] keeps a short
//! window of readings so the suggestion is only trusted once they settle.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::mapper::CalibrationState;
use crate::types::{BoardCoordinate, PixelOffset};

/// Offsets closer than this to the configured one count as converged, px.
const OFFSET_TOL_PX: f64 = 0.5;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    RecenterOffset,
    TuneDepth,
    VerifyAngle,
}

impl CalibrationMode {
    pub fn from_flags(calibrating_depth: bool, calibrating_angle: bool) -> Self {
        match (calibrating_depth, calibrating_angle) {
            (false, _) => Self::RecenterOffset,
            (true, false) => Self::TuneDepth,
            (true, true) => Self::VerifyAngle,
        }
    }

    pub fn of_state(state: &CalibrationState) -> Self {
        Self::from_flags(state.calibrating_depth, state.calibrating_angle)
    }

    /// `(calibrating_depth, calibrating_angle)` selecting this mode.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Self::RecenterOffset => (false, false),
            Self::TuneDepth => (true, false),
            Self::VerifyAngle => (true, true),
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::RecenterOffset => Self::TuneDepth,
            Self::TuneDepth | Self::VerifyAngle => Self::VerifyAngle,
        }
    }

    /// State with this mode's flags and `state`'s constants.
    pub fn apply_to(self, state: CalibrationState) -> CalibrationState {
        let (calibrating_depth, calibrating_angle) = self.flags();
        CalibrationState {
            calibrating_depth,
            calibrating_angle,
            ..state
        }
    }
}

impl fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecenterOffset => "offset",
            Self::TuneDepth => "depth",
            Self::VerifyAngle => "angle",
        })
    }
}

/// Known board point used for depth and angle calibration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePoint {
    pub point_mm: [f64; 2],
    pub tolerance_mm: f64,
}

impl Default for ReferencePoint {
    fn default() -> Self {
        Self {
            point_mm: [254.0, 0.0],
            tolerance_mm: 1.0,
        }
    }
}

impl ReferencePoint {
    pub fn coordinate(&self) -> BoardCoordinate {
        BoardCoordinate::new(self.point_mm[0], self.point_mm[1])
    }

    pub fn radius_mm(&self) -> f64 {
        self.coordinate().radius_mm()
    }
}

/// One reading, as the calibration loop prints it for the current mode.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    Offset(PixelOffset),
    /// Unrotated in `TuneDepth`, rotation-corrected in `VerifyAngle`.
    Board(BoardCoordinate),
}

impl Observation {
    fn kind(&self) -> &'static str {
        match self {
            Self::Offset(_) => "pixel offset",
            Self::Board(_) => "board coordinate",
        }
    }

    fn components(&self) -> [f64; 2] {
        match self {
            Self::Offset(d) => [d.dx, d.dy],
            Self::Board(p) => [p.x_mm, p.y_mm],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub mode: CalibrationMode,
    /// Calibration constants to use for the next run.
    pub state: CalibrationState,
    /// Offset error in px, or board error in mm.
    pub residual: f64,
    pub converged: bool,
    pub next_mode: CalibrationMode,
}

/// Next calibration constants from one reading taken in `mode`.
pub fn suggest(
    mode: CalibrationMode,
    state: &CalibrationState,
    reference: &ReferencePoint,
    observation: Observation,
) -> Result<Suggestion, SessionError> {
    let mismatch = || SessionError::ObservationMismatch {
        mode,
        got: observation.kind(),
    };

    let (next, residual, converged) = match (mode, observation) {
        (CalibrationMode::RecenterOffset, Observation::Offset(d)) => {
            let residual = (d.dx - state.offset_pixel[0]).hypot(d.dy - state.offset_pixel[1]);
            let next = CalibrationState {
                offset_pixel: [d.dx, d.dy],
                ..*state
            };
            (next, residual, residual <= OFFSET_TOL_PX)
        }
        (CalibrationMode::TuneDepth, Observation::Board(p)) => {
            let r = p.radius_mm();
            if r <= f64::EPSILON {
                return Err(SessionError::DegenerateReading);
            }
            let next = CalibrationState {
                depth_mm: state.depth_mm * reference.radius_mm() / r,
                theta_rad: reference.coordinate().bearing_rad() - p.bearing_rad(),
                ..*state
            };
            let residual = (r - reference.radius_mm()).abs();
            (next, residual, residual <= reference.tolerance_mm)
        }
        (CalibrationMode::VerifyAngle, Observation::Board(p)) => {
            let r = p.radius_mm();
            if r <= f64::EPSILON {
                return Err(SessionError::DegenerateReading);
            }
            let target = reference.coordinate();
            let next = CalibrationState {
                depth_mm: state.depth_mm * reference.radius_mm() / r,
                theta_rad: wrap_angle(state.theta_rad + target.bearing_rad() - p.bearing_rad()),
                ..*state
            };
            let residual = p.distance_to(&target);
            (next, residual, residual <= reference.tolerance_mm)
        }
        _ => return Err(mismatch()),
    };

    let next_mode = if converged { mode.next() } else { mode };
    Ok(Suggestion {
        mode,
        state: next_mode.apply_to(next),
        residual,
        converged,
        next_mode,
    })
}

fn wrap_angle(a: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let w = (a + std::f64::consts::PI).rem_euclid(tau) - std::f64::consts::PI;
    if w <= -std::f64::consts::PI {
        w + tau
    } else {
        w
    }
}

/// Calibration state plus a sliding window of recent readings.
#[derive(Clone, Debug)]
pub struct CalibrationSession {
    state: CalibrationState,
    mode: CalibrationMode,
    reference: ReferencePoint,
    window: usize,
    readings: VecDeque<Observation>,
}

impl CalibrationSession {
    pub fn new(state: CalibrationState, reference: ReferencePoint, window: usize) -> Self {
        let window = window.max(1);
        Self {
            mode: CalibrationMode::of_state(&state),
            state,
            reference,
            window,
            readings: VecDeque::with_capacity(window),
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn mode(&self) -> CalibrationMode {
        self.mode
    }

    pub fn reference(&self) -> &ReferencePoint {
        &self.reference
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Record a reading; the oldest one drops out of a full window.
    pub fn observe(&mut self, observation: Observation) {
        if self.readings.len() == self.window {
            self.readings.pop_front();
        }
        self.readings.push_back(observation);
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn mean_observation(&self) -> Option<Observation> {
        let first = *self.readings.front()?;
        let n = self.readings.len() as f64;
        let mut sum = [0.0; 2];
        for r in &self.readings {
            let c = r.components();
            sum[0] += c[0];
            sum[1] += c[1];
        }
        let (a, b) = (sum[0] / n, sum[1] / n);
        Some(match first {
            Observation::Offset(_) => Observation::Offset(PixelOffset { dx: a, dy: b }),
            Observation::Board(_) => Observation::Board(BoardCoordinate::new(a, b)),
        })
    }

    /// Full window, one reading kind, every reading within `tol` of the mean.
    pub fn is_stable(&self, tol: f64) -> bool {
        if self.readings.len() < self.window {
            return false;
        }
        let Some(mean) = self.mean_observation() else {
            return false;
        };
        let m = mean.components();
        self.readings.iter().all(|r| {
            let c = r.components();
            std::mem::discriminant(r) == std::mem::discriminant(&mean)
                && (c[0] - m[0]).hypot(c[1] - m[1]) <= tol
        })
    }

    /// Suggestion from the mean of the current window.
    pub fn suggestion(&self) -> Option<Result<Suggestion, SessionError>> {
        let mean = self.mean_observation()?;
        Some(suggest(self.mode, &self.state, &self.reference, mean))
    }

    /// Adopt a suggestion and move on to its next mode.
    pub fn advance(&mut self, suggestion: &Suggestion) {
        self.state = suggestion.state;
        self.mode = suggestion.next_mode;
        self.readings.clear();
    }
}
