//! SPIR-V shader modules and graphics pipeline construction

use ash::vk;
use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use super::device::{DeviceContext, VulkanError, VulkanResult};

/// Compiled shader stage with RAII cleanup
pub struct ShaderModule {
    device: Arc<DeviceContext>,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Load a SPIR-V binary from disk
    pub fn from_spirv_file<P: AsRef<Path>>(device: Arc<DeviceContext>, path: P) -> VulkanResult<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            VulkanError::InitializationFailed(format!(
                "Failed to read shader {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_spirv_bytes(device, &bytes)
    }

    /// Create a module from raw SPIR-V bytes. The byte length must be a
    /// multiple of four and the data aligned as u32 words.
    pub fn from_spirv_bytes(device: Arc<DeviceContext>, bytes: &[u8]) -> VulkanResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "SPIR-V byte length is not a multiple of four".to_string(),
            });
        }

        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "SPIR-V data is not word-aligned".to_string(),
            });
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe {
            device.device()
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, module })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_shader_module(self.module, None);
        }
    }
}

/// Fixed-function state for building a graphics pipeline.
/// Viewport and scissor are always dynamic.
pub struct PipelineConfig {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    pub enable_alpha_blending: bool,
}

impl PipelineConfig {
    /// Opaque geometry with the given vertex input
    pub fn opaque(
        binding_descriptions: Vec<vk::VertexInputBindingDescription>,
        attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    ) -> Self {
        Self {
            binding_descriptions,
            attribute_descriptions,
            enable_alpha_blending: false,
        }
    }

    /// Alpha-blended geometry generated entirely in the vertex shader
    pub fn blended_no_vertex_input() -> Self {
        Self {
            binding_descriptions: Vec::new(),
            attribute_descriptions: Vec::new(),
            enable_alpha_blending: true,
        }
    }
}

/// Graphics pipeline with RAII cleanup. The pipeline layout is owned by the
/// render system that created it.
pub struct GraphicsPipeline {
    device: Arc<DeviceContext>,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    pub fn new(
        device: Arc<DeviceContext>,
        vert_path: &Path,
        frag_path: &Path,
        pipeline_layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        config: &PipelineConfig,
    ) -> VulkanResult<Self> {
        assert!(
            pipeline_layout != vk::PipelineLayout::null(),
            "pipeline layout must be created before the pipeline"
        );
        assert!(
            render_pass != vk::RenderPass::null(),
            "render pass must be created before the pipeline"
        );

        let vert_module = ShaderModule::from_spirv_file(device.clone(), vert_path)?;
        let frag_module = ShaderModule::from_spirv_file(device.clone(), frag_path)?;

        let entry_point: &CStr = CStr::from_bytes_with_nul(b"main\0").unwrap();

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module.handle())
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module.handle())
                .name(entry_point)
                .build(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&config.binding_descriptions)
            .vertex_attribute_descriptions(&config.attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Set per frame via dynamic state
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = if config.enable_alpha_blending {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build()
        } else {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build()
        };

        let attachments = [color_blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&attachments);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = unsafe {
            device.device()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, e)| VulkanError::Api(e))?[0]
        };

        Ok(Self { device, pipeline })
    }

    /// Bind for subsequent draw calls
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.device().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_pipeline(self.pipeline, None);
        }
    }
}
