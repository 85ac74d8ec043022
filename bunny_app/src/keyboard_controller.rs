//! Fly-style camera controls over GLFW key polling

use glfw::{Action, Key};
use lumen_engine::render::vulkan::Window;
use lumen_engine::render::GameObject;
use nalgebra::Vector3;

pub struct KeyMappings {
    pub move_left: Key,
    pub move_right: Key,
    pub move_forward: Key,
    pub move_backward: Key,
    pub move_up: Key,
    pub move_down: Key,
    pub look_left: Key,
    pub look_right: Key,
    pub look_up: Key,
    pub look_down: Key,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: Key::A,
            move_right: Key::D,
            move_forward: Key::W,
            move_backward: Key::S,
            move_up: Key::E,
            move_down: Key::Q,
            look_left: Key::Left,
            look_right: Key::Right,
            look_up: Key::Up,
            look_down: Key::Down,
        }
    }
}

pub struct KeyboardMovementController {
    pub keys: KeyMappings,
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for KeyboardMovementController {
    fn default() -> Self {
        Self {
            keys: KeyMappings::default(),
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl KeyboardMovementController {
    /// Move and rotate `object` on the XZ plane from the current key state
    pub fn move_in_plane_xz(&self, window: &Window, dt: f32, object: &mut GameObject) {
        let pressed = |key| window.key_action(key) == Action::Press
            || window.key_action(key) == Action::Repeat;

        let mut rotate = Vector3::zeros();
        if pressed(self.keys.look_right) {
            rotate.y += 1.0;
        }
        if pressed(self.keys.look_left) {
            rotate.y -= 1.0;
        }
        if pressed(self.keys.look_up) {
            rotate.x += 1.0;
        }
        if pressed(self.keys.look_down) {
            rotate.x -= 1.0;
        }

        if rotate.norm_squared() > f32::EPSILON {
            object.transform.rotation += self.look_speed * dt * rotate.normalize();
        }

        // Keep pitch shy of straight up/down and yaw within one turn
        object.transform.rotation.x = object.transform.rotation.x.clamp(-1.5, 1.5);
        object.transform.rotation.y %= 2.0 * std::f32::consts::PI;

        let yaw = object.transform.rotation.y;
        let forward = Vector3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vector3::new(forward.z, 0.0, -forward.x);
        let up = Vector3::new(0.0, -1.0, 0.0);

        let mut move_dir = Vector3::zeros();
        if pressed(self.keys.move_forward) {
            move_dir += forward;
        }
        if pressed(self.keys.move_backward) {
            move_dir -= forward;
        }
        if pressed(self.keys.move_right) {
            move_dir += right;
        }
        if pressed(self.keys.move_left) {
            move_dir -= right;
        }
        if pressed(self.keys.move_up) {
            move_dir += up;
        }
        if pressed(self.keys.move_down) {
            move_dir -= up;
        }

        if move_dir.norm_squared() > f32::EPSILON {
            object.transform.translation += self.move_speed * dt * move_dir.normalize();
        }
    }
}
