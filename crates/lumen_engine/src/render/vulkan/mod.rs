//! Vulkan backend: device context, resources, swapchain and renderer

pub mod buffer;
pub mod descriptors;
pub mod device;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod window;

pub use buffer::Buffer;
pub use descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorWriter, LayoutBinding, PoolSize};
pub use device::{DeviceContext, VulkanError, VulkanResult};
pub use image::Texture;
pub use model::{MeshData, Model, ObjError, RenderKind, Vertex};
pub use pipeline::{GraphicsPipeline, PipelineConfig, ShaderModule};
pub use renderer::Renderer;
pub use swapchain::{ImageAcquire, Swapchain, SwapchainStatus, MAX_FRAMES_IN_FLIGHT};
pub use window::{Window, WindowError};
