//! Frame lifecycle: acquire, record, submit, present, recreate
//!
//! The renderer owns one primary command buffer per frame slot and enforces
//! the begin/end ordering with asserts. Swapchain staleness is handled
//! internally by recreating the chain; callers only see a skipped frame.

use ash::vk;
use std::sync::Arc;

use super::device::{DeviceContext, VulkanError, VulkanResult};
use super::swapchain::{ImageAcquire, Swapchain, SwapchainStatus, MAX_FRAMES_IN_FLIGHT};
use super::window::Window;

/// Background clear color for the main render pass
pub const CLEAR_COLOR: [f32; 4] = [0.01, 0.01, 0.01, 1.0];

pub struct Renderer {
    device: Arc<DeviceContext>,
    swapchain: Swapchain,
    command_buffers: Vec<vk::CommandBuffer>,
    current_image_index: u32,
    current_frame_index: usize,
    frame_started: bool,
}

impl Renderer {
    /// Blocks while the window has a zero-size framebuffer, so a window
    /// that starts minimized does not abort chain creation.
    pub fn new(device: Arc<DeviceContext>, window: &mut Window) -> VulkanResult<Self> {
        let extent = Self::wait_for_nonzero_extent(window);
        let swapchain = Swapchain::new(device.clone(), extent, None)?;
        let command_buffers = Self::allocate_command_buffers(&device)?;

        Ok(Self {
            device,
            swapchain,
            command_buffers,
            current_image_index: 0,
            current_frame_index: 0,
            frame_started: false,
        })
    }

    fn allocate_command_buffers(device: &DeviceContext) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(device.command_pool())
            .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32);

        unsafe {
            device.device()
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Acquire the next image and begin recording. Returns `Ok(None)` when
    /// the swapchain was stale and has been recreated; skip the frame and
    /// try again next iteration. The frame slot does not advance for a
    /// skipped frame.
    ///
    /// Panics if a frame is already in progress.
    pub fn begin_frame(&mut self, window: &mut Window) -> VulkanResult<Option<vk::CommandBuffer>> {
        assert!(!self.frame_started, "begin_frame called while a frame is in progress");

        match self.swapchain.acquire_next_image()? {
            ImageAcquire::OutOfDate => {
                self.recreate_swapchain(window)?;
                Ok(None)
            }
            ImageAcquire::Ready { image_index, .. } => {
                // Suboptimal still presents correctly; recreation happens
                // after this frame is submitted.
                self.current_image_index = image_index;
                self.frame_started = true;

                let command_buffer = self.current_command_buffer();
                let begin_info = vk::CommandBufferBeginInfo::builder();

                unsafe {
                    self.device.device()
                        .begin_command_buffer(command_buffer, &begin_info)
                        .map_err(VulkanError::Api)?;
                }

                Ok(Some(command_buffer))
            }
        }
    }

    /// Finish recording, submit and present. Recreates the swapchain when
    /// presentation reports it stale or the window was resized. Advances
    /// the frame slot.
    ///
    /// Panics if no frame is in progress.
    pub fn end_frame(&mut self, window: &mut Window) -> VulkanResult<()> {
        assert!(self.frame_started, "end_frame called with no frame in progress");

        let command_buffer = self.current_command_buffer();

        unsafe {
            self.device.device()
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let status = self.swapchain
            .submit_command_buffers(command_buffer, self.current_image_index)?;

        if status != SwapchainStatus::Optimal || window.was_resized() {
            window.reset_resized_flag();
            self.recreate_swapchain(window)?;
        }

        self.frame_started = false;
        self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// Begin the swapchain render pass on the current command buffer,
    /// clearing color and depth and setting full-window viewport/scissor.
    ///
    /// Panics if no frame is in progress or the buffer is not the current one.
    pub fn begin_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.frame_started, "render pass begun with no frame in progress");
        assert_eq!(
            command_buffer,
            self.current_command_buffer(),
            "render pass begun on a command buffer from a different frame"
        );

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];

        let extent = self.swapchain.extent();
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(self.swapchain.framebuffer(self.current_image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            let device = self.device.device();
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    /// End the swapchain render pass.
    ///
    /// Panics if no frame is in progress or the buffer is not the current one.
    pub fn end_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.frame_started, "render pass ended with no frame in progress");
        assert_eq!(
            command_buffer,
            self.current_command_buffer(),
            "render pass ended on a command buffer from a different frame"
        );

        unsafe {
            self.device.device().cmd_end_render_pass(command_buffer);
        }
    }

    /// Rebuild the swapchain for the current framebuffer size, blocking
    /// while the window is minimized (zero extent).
    fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        let extent = Self::wait_for_nonzero_extent(window);

        self.device.wait_idle()?;

        let new_chain = Swapchain::new(self.device.clone(), extent, Some(&self.swapchain))?;
        self.swapchain = new_chain;

        log::debug!("Swapchain recreated: {}x{}", extent.width, extent.height);
        Ok(())
    }

    fn wait_for_nonzero_extent(window: &mut Window) -> vk::Extent2D {
        let mut extent = window.extent();
        while extent.width == 0 || extent.height == 0 {
            window.wait_events();
            extent = window.extent();
        }
        extent
    }

    pub fn swapchain_render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_started
    }

    /// Current frame slot, in `0..MAX_FRAMES_IN_FLIGHT`
    pub fn frame_index(&self) -> usize {
        self.current_frame_index
    }

    /// Command buffer for the current frame slot.
    /// Panics when called with no frame in progress.
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(self.frame_started, "no frame in progress");
        self.command_buffers[self.current_frame_index]
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            self.device.device()
                .free_command_buffers(self.device.command_pool(), &self.command_buffers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CLEAR_COLOR;

    #[test]
    fn clear_color_is_near_black_opaque() {
        assert_eq!(CLEAR_COLOR, [0.01, 0.01, 0.01, 1.0]);
    }
}
