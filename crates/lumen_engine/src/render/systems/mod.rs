//! Render systems: each owns a pipeline and draws its slice of the scene
//!
//! Systems receive an explicit [`FrameInfo`](crate::render::FrameInfo) per
//! call and keep no per-frame state of their own.

use bytemuck::{Pod, Zeroable};

mod point_light;
mod simple;
mod texture;

pub use point_light::PointLightSystem;
pub use simple::SimpleRenderSystem;
pub use texture::TextureRenderSystem;

/// Push constants for mesh-drawing pipelines. The normal matrix is padded
/// to a mat4 to satisfy std430 alignment; together the two matrices fill
/// the 128 bytes Vulkan guarantees for push constants.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectPushConstants {
    pub model_matrix: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

/// Push constants for the light billboard pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointLightPushConstants {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn object_push_constants_fit_the_guaranteed_budget() {
        assert_eq!(size_of::<ObjectPushConstants>(), 128);
    }

    #[test]
    fn light_push_constants_layout() {
        assert_eq!(size_of::<PointLightPushConstants>(), 36);
    }
}
