//! Math utilities and types
//!
//! Provides fundamental math types for 3D collision and physics work.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid transform representing position, rotation, and uniform scale
///
/// Scale is a single factor rather than a per-axis vector: collision
/// queries round-trip spheres between world and object space, and only a
/// uniform scale keeps a sphere a sphere and a distance a distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Uniform scale factor
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Apply this transform to a point
    pub fn apply_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (point * self.scale)
    }

    /// Apply this transform to a direction vector (rotation only)
    pub fn apply_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_scaling(self.scale)
    }

    /// Get the inverse transform
    ///
    /// `t.inverse().apply_point(t.apply_point(p)) == p` up to float error.
    pub fn inverse(&self) -> Transform {
        let inv_scale = 1.0 / self.scale;
        let inv_rotation = self.rotation.inverse();
        let inv_position = inv_rotation * (-self.position * inv_scale);

        Transform {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    /// Combine this transform with another (self applied after other)
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.apply_point(other.position),
            rotation: self.rotation * other.rotation,
            scale: self.scale * other.scale,
        }
    }
}
