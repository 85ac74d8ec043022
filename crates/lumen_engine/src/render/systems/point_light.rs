//! Animates point lights and draws them as alpha-blended billboards
//!
//! The billboard quad is generated in the vertex shader, so the pipeline
//! binds no vertex input at all.

use ash::vk;
use nalgebra::{Rotation3, Vector3};
use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;

use super::PointLightPushConstants;
use crate::render::frame_info::{FrameInfo, GlobalUbo, MAX_LIGHTS};
use crate::render::vulkan::device::{DeviceContext, VulkanError, VulkanResult};
use crate::render::vulkan::pipeline::{GraphicsPipeline, PipelineConfig};

pub struct PointLightSystem {
    device: Arc<DeviceContext>,
    pipeline: GraphicsPipeline,
    pipeline_layout: vk::PipelineLayout,
}

impl PointLightSystem {
    pub fn new(
        device: Arc<DeviceContext>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        vert_path: &Path,
        frag_path: &Path,
    ) -> VulkanResult<Self> {
        let push_constant_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: size_of::<PointLightPushConstants>() as u32,
        };

        let set_layouts = [global_set_layout];
        let ranges = [push_constant_range];
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&ranges);

        let pipeline_layout = unsafe {
            device.device()
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let config = PipelineConfig::blended_no_vertex_input();
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

    /// Orbit the lights around the scene center and fill the uniform
    /// block's light array. Panics past [`MAX_LIGHTS`] lights.
    pub fn update(&self, frame_info: &mut FrameInfo, ubo: &mut GlobalUbo) {
        let orbit = Rotation3::from_axis_angle(
            &-Vector3::y_axis(),
            frame_info.frame_time,
        );

        let mut light_index = 0usize;
        for object in frame_info.game_objects.values_mut() {
            let Some(point_light) = object.point_light else { continue };

            assert!(
                light_index < MAX_LIGHTS,
                "scene exceeds the {} point light limit",
                MAX_LIGHTS
            );

            object.transform.translation = orbit * object.transform.translation;

            let t = object.transform.translation;
            ubo.point_lights[light_index] = crate::render::frame_info::PointLight {
                position: [t.x, t.y, t.z, 1.0],
                color: [
                    object.color.x,
                    object.color.y,
                    object.color.z,
                    point_light.light_intensity,
                ],
            };
            light_index += 1;
        }

        ubo.num_lights = light_index as u32;
    }

    /// Draw one billboard per light
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
            let Some(point_light) = object.point_light else { continue };

            let t = object.transform.translation;
            let push = PointLightPushConstants {
                position: [t.x, t.y, t.z, 1.0],
                color: [
                    object.color.x,
                    object.color.y,
                    object.color.z,
                    point_light.light_intensity,
                ],
                radius: object.transform.scale.x,
            };

            unsafe {
                self.device.device().cmd_push_constants(
                    frame_info.command_buffer,
                    self.pipeline_layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );

                // Two triangles generated from gl_VertexIndex
                self.device.device().cmd_draw(frame_info.command_buffer, 6, 1, 0, 0);
            }
        }
    }
}

impl Drop for PointLightSystem {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}
