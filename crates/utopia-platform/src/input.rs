// SPDX-License-Identifier: CEPL-1.0
use glam::Vec2;
use std::collections::HashSet;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

/// Keyboard and mouse state as of the last event poll.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
    mouse: Vec2,
}

impl InputState {
    /// Pressed or auto-repeating.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse
    }

    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        if down {
            self.keys.insert(key);
        } else {
            self.keys.remove(&key);
        }
    }

    pub fn set_mouse_button(&mut self, button: MouseButton, down: bool) {
        if down {
            self.buttons.insert(button);
        } else {
            self.buttons.remove(&button);
        }
    }

    pub fn set_mouse_position(&mut self, pos: Vec2) {
        self.mouse = pos;
    }

    /// Forget held keys and buttons, e.g. on focus loss when releases will
    /// never arrive.
    pub fn release_all(&mut self) {
        self.keys.clear();
        self.buttons.clear();
    }
}
