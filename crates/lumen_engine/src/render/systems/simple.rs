//! Draws untextured meshes lit by vertex color

use ash::vk;
use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;

use super::ObjectPushConstants;
use crate::render::frame_info::FrameInfo;
use crate::render::vulkan::device::{DeviceContext, VulkanError, VulkanResult};
use crate::render::vulkan::model::{RenderKind, Vertex};
use crate::render::vulkan::pipeline::{GraphicsPipeline, PipelineConfig};

pub struct SimpleRenderSystem {
    device: Arc<DeviceContext>,
    pipeline: GraphicsPipeline,
    pipeline_layout: vk::PipelineLayout,
}

impl SimpleRenderSystem {
    pub fn new(
        device: Arc<DeviceContext>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        vert_path: &Path,
        frag_path: &Path,
    ) -> VulkanResult<Self> {
        let pipeline_layout = create_object_pipeline_layout(&device, &[global_set_layout])?;

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
        })
    }

    /// Record draw calls for every `RenderKind::Simple` object
    pub fn render(&self, frame_info: &mut FrameInfo) {
        self.pipeline.bind(frame_info.command_buffer);

        unsafe {
            self.device.device().cmd_bind_descriptor_sets(
                frame_info.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[frame_info.global_descriptor_set],
                &[],
            );
        }

        for object in frame_info.game_objects.values() {
            let model = match &object.model {
                Some(model) if model.render_kind() == RenderKind::Simple => model,
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

impl Drop for SimpleRenderSystem {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

/// Layout shared by the mesh-drawing systems: the given descriptor sets
/// plus the 128-byte object push constant block
pub(crate) fn create_object_pipeline_layout(
    device: &DeviceContext,
    set_layouts: &[vk::DescriptorSetLayout],
) -> VulkanResult<vk::PipelineLayout> {
    let push_constant_range = vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: size_of::<ObjectPushConstants>() as u32,
    };

    let ranges = [push_constant_range];
    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(set_layouts)
        .push_constant_ranges(&ranges);

    unsafe {
        device.device()
            .create_pipeline_layout(&layout_info, None)
            .map_err(VulkanError::Api)
    }
}
