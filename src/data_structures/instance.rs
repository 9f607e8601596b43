//! Node transforms and the per-instance records written to the GPU.
//!
//! Local transforms are kept as translation, rotation and scale. World
//! matrices are derived from them and packed as [`InstanceRaw`] into a
//! scene's instance buffer, one record per geometry node.

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

/// Relative off-diagonal magnitude above which a matrix counts as skewed.
const SKEW_TOLERANCE: f32 = 1e-3;
const POLAR_ITERATIONS: usize = 32;

/// Local translation, rotation and scale of a scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// The identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Builds a transform from glTF-ordered components; `rotation` is XYZW.
    pub fn from_trs(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let [x, y, z, w] = rotation;
        Self {
            translation: translation.into(),
            rotation: Quaternion::new(w, x, y, z),
            scale: scale.into(),
        }
    }

    /// Rotation in XYZW order, as stored on disk.
    pub fn rotation_xyzw(&self) -> [f32; 4] {
        let q = self.rotation;
        [q.v.x, q.v.y, q.v.z, q.s]
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.translation)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Splits a column-major affine matrix into translation, rotation and scale.
    ///
    /// The upper 3×3 block is factored with a polar decomposition `M = R·S`.
    /// Only the diagonal of `S` is kept; the returned flag reports whether the
    /// discarded off-diagonal part (skew) was significant.
    pub fn from_matrix(matrix: &Matrix4<f32>) -> (Self, bool) {
        let translation = matrix.w.truncate();
        let upper = Matrix3::from_cols(
            matrix.x.truncate(),
            matrix.y.truncate(),
            matrix.z.truncate(),
        );

        let Some(mut rotation) = polar_rotation(&upper) else {
            log::warn!("Node matrix is singular, falling back to a translation-only transform.");
            return (
                Self {
                    translation,
                    ..Self::new()
                },
                true,
            );
        };
        let mut stretch = rotation.transpose() * upper;
        if rotation.determinant() < 0.0 {
            // mirror: fold the reflection into a negative scale
            rotation = -rotation;
            stretch = -stretch;
        }

        let scale = Vector3::new(stretch.x.x, stretch.y.y, stretch.z.z);
        let off_diagonal = [
            stretch.y.x,
            stretch.z.x,
            stretch.x.y,
            stretch.z.y,
            stretch.x.z,
            stretch.y.z,
        ]
        .iter()
        .fold(0.0f32, |acc, v| acc.max(v.abs()));
        let magnitude = scale.x.abs().max(scale.y.abs()).max(scale.z.abs()).max(1e-12);
        let skewed = off_diagonal / magnitude > SKEW_TOLERANCE;

        let transform = Self {
            translation,
            rotation: Quaternion::from(rotation).normalize(),
            scale,
        };
        (transform, skewed)
    }
}

/// Orthonormal factor of a polar decomposition, via the averaged Newton
/// iteration `Q ← (Q + Q⁻ᵀ) / 2`.
fn polar_rotation(m: &Matrix3<f32>) -> Option<Matrix3<f32>> {
    let mut q = *m;
    for _ in 0..POLAR_ITERATIONS {
        let inverse_transpose = q.invert()?.transpose();
        let next = (q + inverse_transpose) * 0.5;
        let diff = next - q;
        let delta = diff.x.magnitude2() + diff.y.magnitude2() + diff.z.magnitude2();
        q = next;
        if delta < 1e-14 {
            break;
        }
    }
    Some(q)
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-instance record in a scene's instance buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 3]; 3],
    pub handedness: f32,
}

impl InstanceRaw {
    pub fn from_world(world: &Matrix4<f32>) -> Self {
        let upper = Matrix3::from_cols(
            world.x.truncate(),
            world.y.truncate(),
            world.z.truncate(),
        );
        let normal = upper
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix3::identity);
        Self {
            model: (*world).into(),
            normal: normal.into(),
            handedness: upper.determinant().signum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3};

    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn decomposes_trs_matrix() {
        let original = Transform {
            translation: Vector3::new(1.0, -2.0, 3.0),
            rotation: Quaternion::from_angle_y(Deg(30.0)),
            scale: Vector3::new(2.0, 1.0, 0.5),
        };
        let (back, skewed) = Transform::from_matrix(&original.to_matrix());
        assert!(!skewed);
        assert!(close(back.translation.x, 1.0) && close(back.translation.z, 3.0));
        assert!(close(back.scale.x, 2.0) && close(back.scale.y, 1.0) && close(back.scale.z, 0.5));
        // q and -q encode the same rotation
        assert!(close(back.rotation.dot(original.rotation).abs(), 1.0));
    }

    #[test]
    fn flags_skew() {
        let mut skew = Matrix4::identity();
        skew.y.x = 0.5;
        let (_, skewed) = Transform::from_matrix(&skew);
        assert!(skewed);
    }

    #[test]
    fn rotation_keeps_xyzw_order() {
        let t = Transform::from_trs([0.0; 3], [0.0, 0.0, 0.7071068, 0.7071068], [1.0; 3]);
        assert_eq!(t.rotation_xyzw(), [0.0, 0.0, 0.7071068, 0.7071068]);
    }
}
