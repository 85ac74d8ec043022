//! Game objects: transform, color, optional mesh and point light

use nalgebra::{Matrix3, Matrix4, Vector3};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::vulkan::model::Model;

/// Objects keyed by their unique id
pub type GameObjectMap = HashMap<u32, GameObject>;

/// Translation, Y-X-Z Tait-Bryan rotation and per-axis scale
#[derive(Debug, Clone)]
pub struct TransformComponent {
    pub translation: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub rotation: Vector3<f32>,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: Vector3::zeros(),
        }
    }
}

impl TransformComponent {
    /// World matrix: translate * Ry * Rx * Rz * scale
    pub fn mat4(&self) -> Matrix4<f32> {
        let c3 = self.rotation.z.cos();
        let s3 = self.rotation.z.sin();
        let c2 = self.rotation.x.cos();
        let s2 = self.rotation.x.sin();
        let c1 = self.rotation.y.cos();
        let s1 = self.rotation.y.sin();

        Matrix4::new(
            self.scale.x * (c1 * c3 + s1 * s2 * s3),
            self.scale.y * (c3 * s1 * s2 - c1 * s3),
            self.scale.z * (c2 * s1),
            self.translation.x,
            self.scale.x * (c2 * s3),
            self.scale.y * (c2 * c3),
            self.scale.z * (-s2),
            self.translation.y,
            self.scale.x * (c1 * s2 * s3 - c3 * s1),
            self.scale.y * (c1 * c3 * s2 + s1 * s3),
            self.scale.z * (c1 * c2),
            self.translation.z,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Inverse-transpose of the rotation-scale block, for transforming
    /// normals under non-uniform scale
    pub fn normal_matrix(&self) -> Matrix3<f32> {
        let c3 = self.rotation.z.cos();
        let s3 = self.rotation.z.sin();
        let c2 = self.rotation.x.cos();
        let s2 = self.rotation.x.sin();
        let c1 = self.rotation.y.cos();
        let s1 = self.rotation.y.sin();

        let inv_scale = Vector3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);

        Matrix3::new(
            inv_scale.x * (c1 * c3 + s1 * s2 * s3),
            inv_scale.y * (c3 * s1 * s2 - c1 * s3),
            inv_scale.z * (c2 * s1),
            inv_scale.x * (c2 * s3),
            inv_scale.y * (c2 * c3),
            inv_scale.z * (-s2),
            inv_scale.x * (c1 * s2 * s3 - c3 * s1),
            inv_scale.y * (c1 * c3 * s2 + s1 * s3),
            inv_scale.z * (c1 * c2),
        )
    }
}

/// Point light attached to a game object; its world position comes from the
/// transform and its radius from `transform.scale.x`
#[derive(Debug, Clone, Copy)]
pub struct PointLightComponent {
    pub light_intensity: f32,
}

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// A renderable or light-emitting entity in the scene
pub struct GameObject {
    id: u32,
    pub color: Vector3<f32>,
    pub transform: TransformComponent,
    pub model: Option<Arc<Model>>,
    pub point_light: Option<PointLightComponent>,
}

impl GameObject {
    /// Create an empty object with a fresh unique id
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            color: Vector3::new(1.0, 1.0, 1.0),
            transform: TransformComponent::default(),
            model: None,
            point_light: None,
        }
    }

    /// Light-only object with the given intensity, radius and color
    pub fn make_point_light(intensity: f32, radius: f32, color: Vector3<f32>) -> Self {
        let mut object = Self::new();
        object.color = color;
        object.transform.scale.x = radius;
        object.point_light = Some(PointLightComponent { light_intensity: intensity });
        object
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Default for GameObject {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = GameObject::new();
        let b = GameObject::new();
        let c = GameObject::new();
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
    }

    #[test]
    fn default_transform_is_identity() {
        let transform = TransformComponent::default();
        assert_relative_eq!(transform.mat4(), Matrix4::identity(), epsilon = 1e-6);
        assert_relative_eq!(transform.normal_matrix(), Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn translation_lands_in_last_column() {
        let transform = TransformComponent {
            translation: Vector3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        let m = transform.mat4();
        let origin = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin, Vector4::new(1.0, 2.0, 3.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn rotation_order_is_y_then_x_then_z() {
        let transform = TransformComponent {
            rotation: Vector3::new(0.4, 1.1, -0.7),
            ..Default::default()
        };
        let rot_y = nalgebra::Rotation3::from_euler_angles(0.0, transform.rotation.y, 0.0);
        let rot_x = nalgebra::Rotation3::from_euler_angles(transform.rotation.x, 0.0, 0.0);
        let rot_z = nalgebra::Rotation3::from_euler_angles(0.0, 0.0, transform.rotation.z);
        let expected = rot_y.to_homogeneous() * rot_x.to_homogeneous() * rot_z.to_homogeneous();
        assert_relative_eq!(transform.mat4(), expected, epsilon = 1e-5);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose_of_linear_part() {
        let transform = TransformComponent {
            scale: Vector3::new(2.0, 0.5, 3.0),
            rotation: Vector3::new(0.3, -0.9, 0.2),
            ..Default::default()
        };
        let linear = transform.mat4().fixed_view::<3, 3>(0, 0).into_owned();
        let expected = linear.try_inverse().unwrap().transpose();
        assert_relative_eq!(transform.normal_matrix(), expected, epsilon = 1e-5);
    }

    #[test]
    fn point_light_stores_radius_in_scale() {
        let light = GameObject::make_point_light(1.5, 0.2, Vector3::new(1.0, 0.0, 0.0));
        assert!(light.point_light.is_some());
        assert_relative_eq!(light.transform.scale.x, 0.2);
        assert!(light.model.is_none());
    }
}
