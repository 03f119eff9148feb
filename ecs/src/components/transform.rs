//! Local transform component.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::Component;

/// Position, rotation and scale of an entity.
///
/// # Example
///
/// ```
/// use worlds_ecs::components::Transform;
/// use glam::{Quat, Vec3};
///
/// let transform = Transform::from_xyz(1.0, 2.0, 3.0)
///     .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
///     .with_scale(Vec3::splat(2.0));
/// assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Component for Transform {
    const NAME: &'static str = "Transform";
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Identity transform with no translation, no rotation, and uniform scale of 1.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub const fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    #[inline]
    pub const fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_translation(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Computes the transformation matrix for this transform.
    #[inline]
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Composes `self` (parent) with `local` (child-relative) into a
    /// world-space transform.
    #[inline]
    pub fn mul_transform(&self, local: &Transform) -> Transform {
        Transform {
            position: self.transform_point(local.position),
            rotation: self.rotation * local.rotation,
            scale: self.scale * local.scale,
        }
    }

    /// Transforms a point from local space to the space this transform maps into.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_matrix() {
        assert_eq!(Transform::IDENTITY.compute_matrix(), Mat4::IDENTITY);
        assert_eq!(Transform::default(), Transform::IDENTITY);
    }

    #[test]
    fn mul_transform_offsets_child() {
        let parent = Transform::from_xyz(10.0, 0.0, 0.0).with_scale(Vec3::splat(2.0));
        let child = Transform::from_xyz(1.0, 0.0, 0.0);
        let world = parent.mul_transform(&child);
        assert!((world.position - Vec3::new(12.0, 0.0, 0.0)).length() < 1e-6);
        assert_eq!(world.scale, Vec3::splat(2.0));
    }
}
