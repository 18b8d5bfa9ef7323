//! Console lines read by the operator.

use boardcal_core::{ReferencePoint, Suggestion};

use crate::pipeline::CoinReading;

/// Steps of a full calibration, printed by `boardcal procedure`.
pub const PROCEDURE: &str = "\
Calibration procedure
 1. Mount the camera above the board and align its axes with the board axes.
 2. Offset: run with `--mode offset` and a single white coin on the board center.
    Copy the printed pixel values into `calibration.offset_pixel`.
 3. Depth: run with `--mode depth`, coin on the reference point (254, 0 by default).
    Adjust `calibration.depth_mm` until the printed radius matches the reference.
 4. Angle: the reading is then close to the reference but slightly rotated.
    Set `calibration.theta_rad` to the bearing error (reference minus reading).
 5. Verify: run with `--mode angle`; the coin on the reference point should now
    read as the reference coordinate. Repeat 3-5 if it does not.
 6. Export the constants with `boardcal export` for the coin tracker.
";

/// `"{x:.3} {y:.3} Need {r} at the points"` or
/// `"{dx:.3} {dy:.3} Update offset values"`.
pub fn reading_line(reading: &CoinReading, reference: &ReferencePoint) -> String {
    match reading {
        CoinReading::Offset { offset, .. } => {
            format!("{:.3} {:.3} Update offset values", offset.dx, offset.dy)
        }
        CoinReading::Board { coordinate, .. } => format!(
            "{:.3} {:.3} Need {} at the points",
            coordinate.x_mm,
            coordinate.y_mm,
            reference.radius_mm()
        ),
    }
}

pub fn suggestion_line(s: &Suggestion) -> String {
    format!(
        "suggest: offset_pixel=[{:.3}, {:.3}] depth_mm={:.3} theta_rad={:.5} residual={:.3} converged={} next={}",
        s.state.offset_pixel[0],
        s.state.offset_pixel[1],
        s.state.depth_mm,
        s.state.theta_rad,
        s.residual,
        s.converged,
        s.next_mode
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcal_core::{
        suggest, BoardCoordinate, CalibrationMode, CalibrationState, ClassifiedCoin, CoinColor,
        DetectedCircle, Observation, PixelOffset,
    };

    fn coin() -> ClassifiedCoin {
        ClassifiedCoin {
            circle: DetectedCircle::new(382.5, 240.0, 11.0),
            color: CoinColor::White,
            mean_intensity: Some(230.0),
        }
    }

    #[test]
    fn board_line_names_the_reference_radius() {
        let r = CoinReading::Board {
            coin: coin(),
            coordinate: BoardCoordinate::new(78.08, -0.5),
        };
        assert_eq!(
            reading_line(&r, &ReferencePoint::default()),
            "78.080 -0.500 Need 254 at the points"
        );
    }

    #[test]
    fn offset_line() {
        let r = CoinReading::Offset {
            coin: coin(),
            offset: PixelOffset { dx: -62.5, dy: -8.0 },
        };
        assert_eq!(
            reading_line(&r, &ReferencePoint::default()),
            "-62.500 -8.000 Update offset values"
        );
    }

    #[test]
    fn suggestion_line_lists_the_next_constants() {
        let state = CalibrationState {
            offset_pixel: [0.0, 0.0],
            depth_mm: 1220.0,
            theta_rad: 0.0,
            calibrating_depth: true,
            calibrating_angle: false,
        };
        let s = suggest(
            CalibrationMode::RecenterOffset,
            &state,
            &ReferencePoint::default(),
            Observation::Offset(PixelOffset { dx: 3.0, dy: 4.0 }),
        )
        .expect("suggestion");
        let line = suggestion_line(&s);
        assert!(line.starts_with("suggest: offset_pixel=[3.000, 4.000] depth_mm=1220.000"), "{line}");
        assert!(line.contains("residual=5.000 converged=false next=offset"), "{line}");
    }
}
