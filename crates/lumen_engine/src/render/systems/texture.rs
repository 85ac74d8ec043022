//! Draws textured meshes, sampling from the texture bound at set 1

use ash::vk;
use std::path::Path;
use std::sync::Arc;

use super::simple::create_object_pipeline_layout;
use super::ObjectPushConstants;
use crate::render::frame_info::FrameInfo;
use crate::render::vulkan::descriptors::{
    DescriptorPool, DescriptorSetLayout, DescriptorWriter, LayoutBinding, PoolSize,
};
use crate::render::vulkan::device::{DeviceContext, VulkanError, VulkanResult};
use crate::render::vulkan::image::Texture;
use crate::render::vulkan::model::{RenderKind, Vertex};
use crate::render::vulkan::pipeline::{GraphicsPipeline, PipelineConfig};
use crate::render::vulkan::swapchain::MAX_FRAMES_IN_FLIGHT;

pub struct TextureRenderSystem {
    device: Arc<DeviceContext>,
    pipeline: GraphicsPipeline,
    pipeline_layout: vk::PipelineLayout,
    // One set per frame slot, all pointing at the same texture; kept
    // per-slot so a future per-frame texture swap stays a one-line change.
    texture_sets: Vec<vk::DescriptorSet>,
    _texture: Texture,
    _layout: DescriptorSetLayout,
    _pool: DescriptorPool,
}

impl TextureRenderSystem {
    pub fn new(
        device: Arc<DeviceContext>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        texture: Texture,
        vert_path: &Path,
        frag_path: &Path,
    ) -> VulkanResult<Self> {
        let layout = DescriptorSetLayout::new(
            device.clone(),
            vec![LayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                count: 1,
            }],
        )?;

        let pool = DescriptorPool::new(
            device.clone(),
            MAX_FRAMES_IN_FLIGHT as u32,
            vk::DescriptorPoolCreateFlags::empty(),
            vec![PoolSize {
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                count: MAX_FRAMES_IN_FLIGHT as u32,
            }],
        )?;

        let image_info = texture.descriptor_info();
        let mut texture_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let set = DescriptorWriter::new(&layout, &pool)
                .write_image(0, image_info)
                .build()
                .ok_or_else(|| VulkanError::InvalidOperation {
                    reason: "texture descriptor pool undersized".to_string(),
                })?;
            texture_sets.push(set);
        }

        let pipeline_layout = create_object_pipeline_layout(
            &device,
            &[global_set_layout, layout.handle()],
        )?;

        let config = PipelineConfig::opaque(
            Vertex::binding_descriptions(),
            Vertex::attribute_descriptions(),
        );
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            vert_path,
            frag_path,
            pipeline_layout,
            render_pass,
            &config,
        )?;

        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
            texture_sets,
            _texture: texture,
            _layout: layout,
            _pool: pool,
        })
    }

    /// Record draw calls for every `RenderKind::Textured` object
    pub fn render(&self, frame_info: &mut FrameInfo) {
        self.pipeline.bind(frame_info.command_buffer);

        unsafe {
            self.device.device().cmd_bind_descriptor_sets(
                frame_info.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[
                    frame_info.global_descriptor_set,
                    self.texture_sets[frame_info.frame_index],
                ],
                &[],
            );
        }

        for object in frame_info.game_objects.values() {
            let model = match &object.model {
                Some(model) if model.render_kind() == RenderKind::Textured => model,
                _ => continue,
            };

            let push = ObjectPushConstants {
                model_matrix: object.transform.mat4().into(),
                normal_matrix: object.transform.normal_matrix().to_homogeneous().into(),
            };

            unsafe {
                self.device.device().cmd_push_constants(
                    frame_info.command_buffer,
                    self.pipeline_layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }

            model.bind(&self.device, frame_info.command_buffer);
            model.draw(&self.device, frame_info.command_buffer);
        }
    }
}

impl Drop for TextureRenderSystem {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}
