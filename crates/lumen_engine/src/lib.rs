//! Lumen Engine: a small real-time 3D rendering engine built on Vulkan
//!
//! The engine is organized around one [`render::DeviceContext`] shared by
//! every GPU resource, a [`render::Renderer`] driving the per-frame
//! lifecycle, and render systems that draw slices of a
//! [`render::GameObjectMap`] scene.

pub mod config;
pub mod render;

pub use config::{ConfigError, EngineConfig, ShaderConfig};
pub use render::RenderError;
