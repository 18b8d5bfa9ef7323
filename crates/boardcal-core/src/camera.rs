//! Pinhole camera model.
//!
//! The per-coin mapping in [`crate::CoordinateMapper`] uses a decoupled
//! focal/depth formula. That formula is the full projection below restricted
//! to a board plane parallel to the image plane at a known depth; the
//! projection is kept so the approximation can be checked against it.

use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const ORTHONORMAL_TOL: f64 = 1e-6;

/// Camera-internal parameters from a prior lab calibration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicParameters {
    pub focal_x: f64,
    pub focal_y: f64,
    pub principal_point: [f64; 2],
    /// Radial distortion coefficients (k1, k2). Carried, not applied.
    #[serde(default)]
    pub radial_distortion: [f64; 2],
}

impl IntrinsicParameters {
    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        let [cx, cy] = self.principal_point;
        Matrix3::new(
            self.focal_x, 0.0, cx, //
            0.0, self.focal_y, cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = |f: f64| f.is_finite() && f > 0.0;
        if !ok(self.focal_x) || !ok(self.focal_y) {
            return Err(ConfigError::NonPositiveFocal {
                focal_x: self.focal_x,
                focal_y: self.focal_y,
            });
        }
        if !self.principal_point.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "principal_point",
            });
        }
        Ok(())
    }
}

/// World-to-camera transform. Rotation rows are stored row-major when serialized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicParameters {
    #[serde(with = "row_major")]
    pub rotation: Matrix3<f64>,
    /// Translation in millimetres.
    pub translation: Vector3<f64>,
}

impl ExtrinsicParameters {
    /// Camera looking straight down at the board from `height_mm`, with the
    /// image y axis running opposite to the board y axis.
    pub fn looking_down(height_mm: f64) -> Self {
        Self {
            rotation: Matrix3::new(
                1.0, 0.0, 0.0, //
                0.0, -1.0, 0.0, //
                0.0, 0.0, -1.0,
            ),
            translation: Vector3::new(0.0, 0.0, height_mm),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "extrinsics",
            });
        }
        let gram = self.rotation.transpose() * self.rotation - Matrix3::identity();
        let max_error = gram.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let determinant = self.rotation.determinant();
        if max_error > ORTHONORMAL_TOL || (determinant.abs() - 1.0).abs() > ORTHONORMAL_TOL {
            return Err(ConfigError::RotationNotOrthonormal {
                max_error,
                determinant,
            });
        }
        Ok(())
    }
}

/// Validated intrinsics and extrinsics with the combined projection `G`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    intrinsics: IntrinsicParameters,
    extrinsics: ExtrinsicParameters,
    projection: Matrix3x4<f64>,
}

impl CameraModel {
    pub fn new(
        intrinsics: IntrinsicParameters,
        extrinsics: ExtrinsicParameters,
    ) -> Result<Self, ConfigError> {
        intrinsics.validate()?;
        extrinsics.validate()?;

        // G = [A | 0] * [[R, t], [0, 0, 0, 1]] == A * [R | t]
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&extrinsics.rotation);
        rt.fixed_view_mut::<3, 1>(0, 3).copy_from(&extrinsics.translation);
        let projection = intrinsics.intrinsic_matrix() * rt;

        Ok(Self {
            intrinsics,
            extrinsics,
            projection,
        })
    }

    pub fn intrinsics(&self) -> &IntrinsicParameters {
        &self.intrinsics
    }

    pub fn extrinsics(&self) -> &ExtrinsicParameters {
        &self.extrinsics
    }

    pub fn projection(&self) -> &Matrix3x4<f64> {
        &self.projection
    }

    /// Project a world point (mm) to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the camera plane.
    pub fn project(&self, world: Point3<f64>) -> Option<Point2<f64>> {
        let v = self.projection * world.to_homogeneous();
        if v[2] <= 1e-12 {
            return None;
        }
        Some(Point2::new(v[0] / v[2], v[1] / v[2]))
    }
}

mod row_major {
    use nalgebra::Matrix3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Matrix3<f64>, s: S) -> Result<S::Ok, S::Error> {
        let rows: [[f64; 3]; 3] = [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ];
        rows.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Matrix3<f64>, D::Error> {
        let r = <[[f64; 3]; 3]>::deserialize(d)?;
        Ok(Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        ))
    }
}
