//! Per-frame context and the global uniform block
//!
//! `GlobalUbo` mirrors the std140 uniform block declared by the shaders;
//! all fields are explicitly padded so the Rust layout matches GLSL.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use super::camera::Camera;
use super::game_object::GameObjectMap;

/// Capacity of the light array in the global uniform block
pub const MAX_LIGHTS: usize = 10;

/// One light as the shaders see it. `position.w` is unused, `color.w` is
/// the intensity.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: [0.0; 4],
            color: [0.0; 4],
        }
    }
}

/// Global uniform block, written once per frame slot
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub inverse_view: [[f32; 4]; 4],
    /// RGB ambient color, `w` is the intensity
    pub ambient_light_color: [f32; 4],
    pub point_lights: [PointLight; MAX_LIGHTS],
    pub num_lights: u32,
    pub _padding: [u32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = nalgebra::Matrix4::identity().into();
        Self {
            projection: identity,
            view: identity,
            inverse_view: identity,
            ambient_light_color: [1.0, 1.0, 1.0, 0.02],
            point_lights: [PointLight::default(); MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

/// Everything a render system needs for one frame, passed explicitly
pub struct FrameInfo<'a> {
    pub frame_index: usize,
    pub frame_time: f32,
    pub command_buffer: vk::CommandBuffer,
    pub camera: &'a Camera,
    pub global_descriptor_set: vk::DescriptorSet,
    pub game_objects: &'a mut GameObjectMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn ubo_layout_matches_std140() {
        // 3 mat4 + 1 vec4 + 10 lights of 2 vec4 + uint with explicit tail pad
        assert_eq!(size_of::<PointLight>(), 32);
        assert_eq!(size_of::<GlobalUbo>(), 192 + 16 + 320 + 16);
        assert_eq!(align_of::<GlobalUbo>(), 4);
    }

    #[test]
    fn light_array_offset_follows_ambient_color() {
        let ubo = GlobalUbo::default();
        let base = &ubo as *const _ as usize;
        let lights = ubo.point_lights.as_ptr() as usize;
        assert_eq!(lights - base, 192 + 16);
    }

    #[test]
    fn default_ubo_has_no_lights_and_dim_ambient() {
        let ubo = GlobalUbo::default();
        assert_eq!(ubo.num_lights, 0);
        assert_eq!(ubo.ambient_light_color, [1.0, 1.0, 1.0, 0.02]);
        assert_eq!(ubo.projection[0][0], 1.0);
        assert_eq!(ubo.projection[3][3], 1.0);
    }

    #[test]
    fn ubo_casts_to_bytes() {
        let ubo = GlobalUbo::default();
        let bytes: &[u8] = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), size_of::<GlobalUbo>());
    }
}
