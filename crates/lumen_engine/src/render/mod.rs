//! Rendering: camera, scene objects, per-frame context, systems and the
//! Vulkan backend

pub mod camera;
pub mod frame_info;
pub mod game_object;
pub mod systems;
pub mod vulkan;

pub use camera::Camera;
pub use frame_info::{FrameInfo, GlobalUbo, PointLight, MAX_LIGHTS};
pub use game_object::{GameObject, GameObjectMap, PointLightComponent, TransformComponent};
pub use vulkan::{
    DeviceContext, MeshData, Model, RenderKind, Renderer, Texture, VulkanError, Window,
    MAX_FRAMES_IN_FLIGHT,
};

use thiserror::Error;

/// Umbrella error for engine-level operations that touch more than one
/// subsystem
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Vulkan(#[from] vulkan::VulkanError),

    #[error(transparent)]
    Window(#[from] vulkan::WindowError),

    #[error(transparent)]
    Mesh(#[from] vulkan::ObjError),

    #[error("Asset error: {0}")]
    Asset(String),
}
