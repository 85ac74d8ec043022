//! Camera projection and view matrices
//!
//! Depth range is 0..1 and Y points down in clip space, matching the
//! Vulkan conventions the render pass and shaders assume.

use nalgebra::{Matrix4, Vector3};

/// Plain value type; systems read the matrices each frame
pub struct Camera {
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
    inverse_view: Matrix4<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Matrix4::identity(),
            view: Matrix4::identity(),
            inverse_view: Matrix4::identity(),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        let mut m = Matrix4::identity();
        m[(0, 0)] = 2.0 / (right - left);
        m[(1, 1)] = 2.0 / (bottom - top);
        m[(2, 2)] = 1.0 / (far - near);
        m[(0, 3)] = -(right + left) / (right - left);
        m[(1, 3)] = -(bottom + top) / (bottom - top);
        m[(2, 3)] = -near / (far - near);
        self.projection = m;
    }

    /// `fovy` is the vertical field of view in radians
    pub fn set_perspective_projection(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        assert!(aspect.abs() > f32::EPSILON, "aspect ratio must be nonzero");

        let tan_half_fovy = (fovy / 2.0).tan();
        let mut m = Matrix4::zeros();
        m[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        m[(1, 1)] = 1.0 / tan_half_fovy;
        m[(2, 2)] = far / (far - near);
        m[(3, 2)] = 1.0;
        m[(2, 3)] = -(far * near) / (far - near);
        self.projection = m;
    }

    /// Look along `direction` from `position`
    pub fn set_view_direction(
        &mut self,
        position: Vector3<f32>,
        direction: Vector3<f32>,
        up: Vector3<f32>,
    ) {
        assert!(direction.norm_squared() > f32::EPSILON, "view direction must be nonzero");

        let w = direction.normalize();
        let u = w.cross(&up).normalize();
        let v = w.cross(&u);

        self.set_view_basis(position, u, v, w);
    }

    /// Look at `target` from `position`
    pub fn set_view_target(
        &mut self,
        position: Vector3<f32>,
        target: Vector3<f32>,
        up: Vector3<f32>,
    ) {
        self.set_view_direction(position, target - position, up);
    }

    /// Orient by Tait-Bryan angles applied in Y, X, Z order
    pub fn set_view_yxz(&mut self, position: Vector3<f32>, rotation: Vector3<f32>) {
        let c3 = rotation.z.cos();
        let s3 = rotation.z.sin();
        let c2 = rotation.x.cos();
        let s2 = rotation.x.sin();
        let c1 = rotation.y.cos();
        let s1 = rotation.y.sin();

        let u = Vector3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vector3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vector3::new(c2 * s1, -s2, c1 * c2);

        self.set_view_basis(position, u, v, w);
    }

    fn set_view_basis(
        &mut self,
        position: Vector3<f32>,
        u: Vector3<f32>,
        v: Vector3<f32>,
        w: Vector3<f32>,
    ) {
        let mut view = Matrix4::identity();
        for (row, axis) in [u, v, w].iter().enumerate() {
            view[(row, 0)] = axis.x;
            view[(row, 1)] = axis.y;
            view[(row, 2)] = axis.z;
            view[(row, 3)] = -axis.dot(&position);
        }
        self.view = view;

        let mut inverse = Matrix4::identity();
        for (col, axis) in [u, v, w].iter().enumerate() {
            inverse[(0, col)] = axis.x;
            inverse[(1, col)] = axis.y;
            inverse[(2, col)] = axis.z;
        }
        inverse[(0, 3)] = position.x;
        inverse[(1, 3)] = position.y;
        inverse[(2, 3)] = position.z;
        self.inverse_view = inverse;
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn view(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn inverse_view(&self) -> &Matrix4<f32> {
        &self.inverse_view
    }

    /// Camera position in world space, from the inverse view
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(
            self.inverse_view[(0, 3)],
            self.inverse_view[(1, 3)],
            self.inverse_view[(2, 3)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    #[test]
    fn perspective_maps_near_and_far_to_depth_range() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let p = camera.projection();

        let near = p * Vector4::new(0.0, 0.0, 0.1, 1.0);
        let far = p * Vector4::new(0.0, 0.0, 100.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn orthographic_maps_corners_to_clip_bounds() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let p = camera.projection();

        let corner = p * Vector4::new(2.0, 1.0, 10.0, 1.0);
        assert_relative_eq!(corner.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(corner.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(corner.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_rotation_view_is_identity() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vector3::zeros(), Vector3::zeros());
        assert_relative_eq!(*camera.view(), Matrix4::identity(), epsilon = 1e-6);
        assert_relative_eq!(*camera.inverse_view(), Matrix4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn inverse_view_inverts_view() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vector3::new(1.0, -2.0, 3.0), Vector3::new(0.3, 0.8, -0.2));
        let product = camera.view() * camera.inverse_view();
        assert_relative_eq!(product, Matrix4::identity(), epsilon = 1e-5);
    }

    #[test]
    fn view_target_recovers_camera_position() {
        let mut camera = Camera::new();
        let position = Vector3::new(4.0, -1.0, 2.0);
        camera.set_view_target(position, Vector3::zeros(), Vector3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(camera.position(), position, epsilon = 1e-6);
    }
}
