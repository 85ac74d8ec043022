//! Swapchain with render pass, depth resources, framebuffers and frame sync
//!
//! Owns everything whose lifetime is tied to the presentable surface. The
//! number of swap images is surface-driven and independent of the number of
//! frames the CPU may record ahead ([`MAX_FRAMES_IN_FLIGHT`]).

use ash::vk;
use std::sync::Arc;

use super::device::{DeviceContext, VulkanError, VulkanResult};

/// How many frames the CPU may record before waiting on the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of acquiring a swap image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAcquire {
    /// An image is ready for rendering
    Ready {
        image_index: u32,
        /// The chain still works but no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The chain is stale and must be recreated before rendering
    OutOfDate,
}

/// Outcome of submitting and presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl SwapchainStatus {
    /// Translate an acquire/present result code, treating genuine device
    /// failures as errors
    pub fn from_present_result(result: vk::Result) -> VulkanResult<Self> {
        match result {
            vk::Result::SUCCESS => Ok(Self::Optimal),
            vk::Result::SUBOPTIMAL_KHR => Ok(Self::Suboptimal),
            vk::Result::ERROR_OUT_OF_DATE_KHR => Ok(Self::OutOfDate),
            other => Err(VulkanError::Api(other)),
        }
    }
}

/// Presentable swapchain and the attachments and sync objects built on it
pub struct Swapchain {
    device: Arc<DeviceContext>,

    swapchain: vk::SwapchainKHR,
    image_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_images: Vec<vk::Image>,
    depth_memories: Vec<vk::DeviceMemory>,
    depth_views: Vec<vk::ImageView>,

    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    image_available: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
    in_flight_fences: Vec<vk::Fence>,
    images_in_flight: Vec<vk::Fence>,

    current_frame: usize,
}

impl Swapchain {
    /// Build a swapchain for the given extent. Pass the previous chain when
    /// recreating so the driver can recycle its images.
    pub fn new(
        device: Arc<DeviceContext>,
        window_extent: vk::Extent2D,
        old: Option<&Swapchain>,
    ) -> VulkanResult<Self> {
        assert!(
            window_extent.width > 0 && window_extent.height > 0,
            "swapchain extent must be nonzero"
        );

        let support = device.swapchain_support()?;

        let surface_format = Self::choose_surface_format(&support.formats);
        let present_mode = Self::choose_present_mode(&support.present_modes);
        let extent = Self::choose_extent(&support.capabilities, window_extent);

        let mut image_count = support.capabilities.min_image_count + 1;
        if support.capabilities.max_image_count > 0 {
            image_count = image_count.min(support.capabilities.max_image_count);
        }

        let queue_families = [device.graphics_family(), device.present_family()];
        let distinct_families = queue_families[0] != queue_families[1];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |o| o.swapchain));

        create_info = if distinct_families {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe {
            device.swapchain_loader()
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            device.swapchain_loader()
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}",
            extent.width, extent.height, images.len(), present_mode
        );

        let image_views = Self::create_image_views(&device, &images, surface_format.format)?;

        let depth_format = device.find_supported_format(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let render_pass = Self::create_render_pass(&device, surface_format.format, depth_format)?;

        let (depth_images, depth_memories, depth_views) =
            Self::create_depth_resources(&device, depth_format, extent, images.len())?;

        let framebuffers = Self::create_framebuffers(
            &device, render_pass, &image_views, &depth_views, extent,
        )?;

        let (image_available, render_finished, in_flight_fences) =
            Self::create_sync_objects(&device)?;
        let images_in_flight = vec![vk::Fence::null(); images.len()];

        let chain = Self {
            device,
            swapchain,
            image_format: surface_format.format,
            depth_format,
            extent,
            images,
            image_views,
            depth_images,
            depth_memories,
            depth_views,
            render_pass,
            framebuffers,
            image_available,
            render_finished,
            in_flight_fences,
            images_in_flight,
            current_frame: 0,
        };

        if let Some(old) = old {
            if !chain.compare_formats(old) {
                return Err(VulkanError::SwapchainFormatChanged);
            }
        }

        Ok(chain)
    }

    /// Whether this chain renders with the same image and depth formats as
    /// another. Pipelines and render passes are only valid across recreation
    /// when this holds.
    pub fn compare_formats(&self, other: &Swapchain) -> bool {
        self.image_format == other.image_format && self.depth_format == other.depth_format
    }

    fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
        formats
            .iter()
            .copied()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .unwrap_or(formats[0])
    }

    fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
        if modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            // FIFO is the only mode every driver must support
            vk::PresentModeKHR::FIFO
        }
    }

    fn choose_extent(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        window_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: window_extent.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: window_extent.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        }
    }

    fn create_image_views(
        device: &DeviceContext,
        images: &[vk::Image],
        format: vk::Format,
    ) -> VulkanResult<Vec<vk::ImageView>> {
        images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe {
                    device.device()
                        .create_image_view(&view_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    fn create_render_pass(
        device: &DeviceContext,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> VulkanResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build();

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build();

        let attachments = [color_attachment, depth_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            device.device()
                .create_render_pass(&render_pass_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn create_depth_resources(
        device: &DeviceContext,
        depth_format: vk::Format,
        extent: vk::Extent2D,
        count: usize,
    ) -> VulkanResult<(Vec<vk::Image>, Vec<vk::DeviceMemory>, Vec<vk::ImageView>)> {
        let mut images = Vec::with_capacity(count);
        let mut memories = Vec::with_capacity(count);
        let mut views = Vec::with_capacity(count);

        for _ in 0..count {
            let image_info = vk::ImageCreateInfo::builder()
                .image_type(vk::ImageType::TYPE_2D)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .format(depth_format)
                .tiling(vk::ImageTiling::OPTIMAL)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let (image, memory) = device.create_image_with_info(
                &image_info,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;

            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(depth_format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe {
                device.device()
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)?
            };

            images.push(image);
            memories.push(memory);
            views.push(view);
        }

        Ok((images, memories, views))
    }

    fn create_framebuffers(
        device: &DeviceContext,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        depth_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        image_views
            .iter()
            .zip(depth_views.iter())
            .map(|(&color, &depth)| {
                let attachments = [color, depth];
                let framebuffer_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                unsafe {
                    device.device()
                        .create_framebuffer(&framebuffer_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    fn create_sync_objects(
        device: &DeviceContext,
    ) -> VulkanResult<(Vec<vk::Semaphore>, Vec<vk::Semaphore>, Vec<vk::Fence>)> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Signaled so the first wait on each frame slot passes immediately
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED);

        let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut render_finished = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut in_flight = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            unsafe {
                image_available.push(
                    device.device().create_semaphore(&semaphore_info, None)
                        .map_err(VulkanError::Api)?,
                );
                render_finished.push(
                    device.device().create_semaphore(&semaphore_info, None)
                        .map_err(VulkanError::Api)?,
                );
                in_flight.push(
                    device.device().create_fence(&fence_info, None)
                        .map_err(VulkanError::Api)?,
                );
            }
        }

        Ok((image_available, render_finished, in_flight))
    }

    /// Wait for the current frame slot, then acquire the next swap image
    pub fn acquire_next_image(&mut self) -> VulkanResult<ImageAcquire> {
        unsafe {
            self.device.device()
                .wait_for_fences(&[self.in_flight_fences[self.current_frame]], true, u64::MAX)
                .map_err(VulkanError::Api)?;

            match self.device.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available[self.current_frame],
                vk::Fence::null(),
            ) {
                Ok((image_index, suboptimal)) => Ok(ImageAcquire::Ready { image_index, suboptimal }),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(ImageAcquire::OutOfDate),
                Err(e) => Err(VulkanError::Api(e)),
            }
        }
    }

    /// Submit a recorded command buffer for `image_index` and present it.
    /// Advances the internal frame slot.
    pub fn submit_command_buffers(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VulkanResult<SwapchainStatus> {
        let device = self.device.device();
        let image_index = image_index as usize;

        unsafe {
            // If a previous frame is still rendering to this image, wait
            if self.images_in_flight[image_index] != vk::Fence::null() {
                device
                    .wait_for_fences(&[self.images_in_flight[image_index]], true, u64::MAX)
                    .map_err(VulkanError::Api)?;
            }
            self.images_in_flight[image_index] = self.in_flight_fences[self.current_frame];

            let wait_semaphores = [self.image_available[self.current_frame]];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let signal_semaphores = [self.render_finished[self.current_frame]];
            let command_buffers = [command_buffer];

            let submit_info = vk::SubmitInfo::builder()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            device
                .reset_fences(&[self.in_flight_fences[self.current_frame]])
                .map_err(VulkanError::Api)?;

            device
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info.build()],
                    self.in_flight_fences[self.current_frame],
                )
                .map_err(VulkanError::Api)?;

            let swapchains = [self.swapchain];
            let image_indices = [image_index as u32];
            let present_info = vk::PresentInfoKHR::builder()
                .wait_semaphores(&signal_semaphores)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            let present_result = match self.device.swapchain_loader()
                .queue_present(self.device.present_queue(), &present_info)
            {
                Ok(false) => vk::Result::SUCCESS,
                Ok(true) => vk::Result::SUBOPTIMAL_KHR,
                Err(e) => e,
            };

            self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

            SwapchainStatus::from_present_result(present_result)
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = self.device.device();
        unsafe {
            for i in 0..MAX_FRAMES_IN_FLIGHT {
                device.destroy_semaphore(self.image_available[i], None);
                device.destroy_semaphore(self.render_finished[i], None);
                device.destroy_fence(self.in_flight_fences[i], None);
            }

            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }

            device.destroy_render_pass(self.render_pass, None);

            for i in 0..self.depth_images.len() {
                device.destroy_image_view(self.depth_views[i], None);
                device.destroy_image(self.depth_images[i], None);
                device.free_memory(self.depth_memories[i], None);
            }

            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }

            // Swap images themselves belong to the swapchain
            self.device.swapchain_loader().destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageAcquire, SwapchainStatus, MAX_FRAMES_IN_FLIGHT};
    use ash::vk;

    #[test]
    fn two_frames_in_flight() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn present_result_maps_to_status() {
        assert_eq!(
            SwapchainStatus::from_present_result(vk::Result::SUCCESS).unwrap(),
            SwapchainStatus::Optimal
        );
        assert_eq!(
            SwapchainStatus::from_present_result(vk::Result::SUBOPTIMAL_KHR).unwrap(),
            SwapchainStatus::Suboptimal
        );
        assert_eq!(
            SwapchainStatus::from_present_result(vk::Result::ERROR_OUT_OF_DATE_KHR).unwrap(),
            SwapchainStatus::OutOfDate
        );
    }

    #[test]
    fn device_loss_is_an_error_not_a_status() {
        assert!(SwapchainStatus::from_present_result(vk::Result::ERROR_DEVICE_LOST).is_err());
    }

    #[test]
    fn acquire_outcomes_compare_by_value() {
        let ready = ImageAcquire::Ready { image_index: 1, suboptimal: false };
        assert_ne!(ready, ImageAcquire::OutOfDate);
        assert_eq!(ready, ImageAcquire::Ready { image_index: 1, suboptimal: false });
    }

    #[test]
    fn frame_slot_wraps_around() {
        let mut slot = 0usize;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(slot);
            slot = (slot + 1) % MAX_FRAMES_IN_FLIGHT;
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }
}
