//! Demo application: scene setup and the frame loop

use ash::vk;
use nalgebra::Vector3;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use lumen_engine::render::vulkan::{
    Buffer, DescriptorPool, DescriptorSetLayout, DescriptorWriter, LayoutBinding, PoolSize,
    Texture, Window,
};
use lumen_engine::render::{
    Camera, DeviceContext, FrameInfo, GameObject, GameObjectMap, GlobalUbo, MeshData, Model,
    RenderKind, Renderer, VulkanError, MAX_FRAMES_IN_FLIGHT,
};
use lumen_engine::render::systems::{PointLightSystem, SimpleRenderSystem, TextureRenderSystem};
use lumen_engine::{EngineConfig, RenderError};

use crate::keyboard_controller::KeyboardMovementController;

pub struct App {
    config: EngineConfig,
    global_pool: DescriptorPool,
    game_objects: GameObjectMap,
    renderer: Renderer,
    device: Arc<DeviceContext>,
    window: Window,
}

impl App {
    pub fn new(config: EngineConfig) -> Result<Self, RenderError> {
        let mut window = Window::new(
            &config.application_name,
            config.window_width,
            config.window_height,
        )?;

        let device = Arc::new(DeviceContext::new(&mut window, &config.application_name)?);
        let renderer = Renderer::new(device.clone(), &mut window)?;

        // One global uniform buffer descriptor per frame slot
        let global_pool = DescriptorPool::new(
            device.clone(),
            MAX_FRAMES_IN_FLIGHT as u32,
            vk::DescriptorPoolCreateFlags::empty(),
            vec![PoolSize {
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                count: MAX_FRAMES_IN_FLIGHT as u32,
            }],
        )?;

        let game_objects = Self::load_game_objects(&device)?;

        Ok(Self {
            config,
            global_pool,
            game_objects,
            renderer,
            device,
            window,
        })
    }

    pub fn run(&mut self) -> Result<(), RenderError> {
        let mut ubo_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut buffer = Buffer::new(
                self.device.clone(),
                std::mem::size_of::<GlobalUbo>() as vk::DeviceSize,
                1,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE,
                self.device.properties().limits.min_uniform_buffer_offset_alignment,
            )?;
            buffer.map()?;
            ubo_buffers.push(buffer);
        }

        let global_set_layout = DescriptorSetLayout::new(
            self.device.clone(),
            vec![LayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                stage_flags: vk::ShaderStageFlags::ALL_GRAPHICS,
                count: 1,
            }],
        )?;

        let mut global_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for buffer in &ubo_buffers {
            let set = DescriptorWriter::new(&global_set_layout, &self.global_pool)
                .write_buffer(0, buffer.descriptor_info_whole())
                .build()
                .ok_or_else(|| VulkanError::InvalidOperation {
                    reason: "global descriptor pool undersized".to_string(),
                })?;
            global_sets.push(set);
        }

        let shaders = self.config.shaders
            .resolved_against(Path::new(env!("CARGO_MANIFEST_DIR")));
        let render_pass = self.renderer.swapchain_render_pass();

        let simple_system = SimpleRenderSystem::new(
            self.device.clone(),
            render_pass,
            global_set_layout.handle(),
            &shaders.simple_vert,
            &shaders.simple_frag,
        )?;
        let texture_system = TextureRenderSystem::new(
            self.device.clone(),
            render_pass,
            global_set_layout.handle(),
            checkerboard_texture(&self.device)?,
            &shaders.texture_vert,
            &shaders.texture_frag,
        )?;
        let point_light_system = PointLightSystem::new(
            self.device.clone(),
            render_pass,
            global_set_layout.handle(),
            &shaders.point_light_vert,
            &shaders.point_light_frag,
        )?;

        let mut camera = Camera::new();
        let mut viewer = GameObject::new();
        viewer.transform.translation.z = -2.5;
        let controller = KeyboardMovementController::default();

        let mut last_frame = Instant::now();

        log::info!("Entering frame loop");

        while !self.window.should_close() {
            self.window.poll_events();

            let now = Instant::now();
            let frame_time = now.duration_since(last_frame).as_secs_f32();
            last_frame = now;

            controller.move_in_plane_xz(&self.window, frame_time, &mut viewer);
            camera.set_view_yxz(viewer.transform.translation, viewer.transform.rotation);

            let aspect = self.renderer.aspect_ratio();
            camera.set_perspective_projection(50f32.to_radians(), aspect, 0.1, 100.0);

            let Some(command_buffer) = self.renderer.begin_frame(&mut self.window)? else {
                // Swapchain was recreated; skip this frame
                continue;
            };

            let frame_index = self.renderer.frame_index();
            let mut frame_info = FrameInfo {
                frame_index,
                frame_time,
                command_buffer,
                camera: &camera,
                global_descriptor_set: global_sets[frame_index],
                game_objects: &mut self.game_objects,
            };

            // Update the global uniform block for this frame slot
            let mut ubo = GlobalUbo {
                projection: (*camera.projection()).into(),
                view: (*camera.view()).into(),
                inverse_view: (*camera.inverse_view()).into(),
                ..Default::default()
            };
            point_light_system.update(&mut frame_info, &mut ubo);
            ubo_buffers[frame_index].write_to_buffer(bytemuck::bytes_of(&ubo), 0);
            ubo_buffers[frame_index].flush(vk::WHOLE_SIZE, 0)?;

            self.renderer.begin_swapchain_render_pass(command_buffer);
            simple_system.render(&mut frame_info);
            texture_system.render(&mut frame_info);
            point_light_system.render(&mut frame_info);
            self.renderer.end_swapchain_render_pass(command_buffer);

            self.renderer.end_frame(&mut self.window)?;
        }

        self.device.wait_idle()?;
        Ok(())
    }

    fn load_game_objects(device: &Arc<DeviceContext>) -> Result<GameObjectMap, RenderError> {
        let mut game_objects = GameObjectMap::new();

        let mut insert = |object: GameObject| {
            game_objects.insert(object.id(), object);
        };

        // Meshes are optional; the frame loop runs fine on an empty scene
        for (path, translation, scale) in [
            ("models/bunny.obj", Vector3::new(-1.0, 0.5, 0.0), 0.35),
            ("models/dragon.obj", Vector3::new(1.0, 0.5, 0.0), 0.35),
        ] {
            let full_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
            match Model::from_obj(device.clone(), &full_path, RenderKind::Simple) {
                Ok(model) => {
                    let mut object = GameObject::new();
                    object.model = Some(Arc::new(model));
                    object.transform.translation = translation;
                    object.transform.scale = Vector3::new(scale, scale, scale);
                    insert(object);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", path, e);
                }
            }
        }

        let floor = Model::new(device.clone(), &floor_quad(), RenderKind::Textured)?;
        let mut floor_object = GameObject::new();
        floor_object.model = Some(Arc::new(floor));
        floor_object.transform.translation = Vector3::new(0.0, 0.5, 0.0);
        floor_object.transform.scale = Vector3::new(3.0, 1.0, 3.0);
        insert(floor_object);

        let light_colors = [
            Vector3::new(1.0, 0.1, 0.1),
            Vector3::new(0.1, 0.1, 1.0),
            Vector3::new(0.1, 1.0, 0.1),
            Vector3::new(1.0, 1.0, 0.1),
            Vector3::new(0.1, 1.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];

        for (i, color) in light_colors.iter().enumerate() {
            let mut light = GameObject::make_point_light(0.6, 0.1, *color);
            let angle = i as f32 * 2.0 * std::f32::consts::PI / light_colors.len() as f32;
            let orbit = nalgebra::Rotation3::from_axis_angle(&-nalgebra::Vector3::y_axis(), angle);
            light.transform.translation = orbit * Vector3::new(-1.0, -1.0, -1.0);
            insert(light);
        }

        Ok(game_objects)
    }
}

/// Unit floor quad in the XZ plane with the normal facing the camera side
fn floor_quad() -> MeshData {
    use lumen_engine::render::vulkan::Vertex;

    let normal = [0.0, -1.0, 0.0];
    let color = [1.0, 1.0, 1.0];
    MeshData {
        vertices: vec![
            Vertex { position: [-1.0, 0.0, -1.0], color, normal, uv: [0.0, 0.0] },
            Vertex { position: [1.0, 0.0, -1.0], color, normal, uv: [1.0, 0.0] },
            Vertex { position: [1.0, 0.0, 1.0], color, normal, uv: [1.0, 1.0] },
            Vertex { position: [-1.0, 0.0, 1.0], color, normal, uv: [0.0, 1.0] },
        ],
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

/// Procedural checkerboard so the textured pipeline works without assets
fn checkerboard_texture(device: &Arc<DeviceContext>) -> Result<Texture, VulkanError> {
    const SIZE: u32 = 256;
    const SQUARE: u32 = 32;

    let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let dark = ((x / SQUARE) + (y / SQUARE)) % 2 == 0;
            let value = if dark { 90 } else { 200 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }

    Texture::from_pixels(device.clone(), &pixels, SIZE, SIZE)
}
