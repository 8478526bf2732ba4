// SPDX-License-Identifier: CEPL-1.0
use std::thread;
use std::time::Duration;
use winit::dpi::PhysicalSize;

use crate::{CursorMode, InputState, WindowProvider};

/// A window that never opens. Size and close state are set by the owner;
/// `poll_events` only sleeps, standing in for a render loop's pacing.
#[derive(Debug)]
pub struct HeadlessWindow {
    size: PhysicalSize<u32>,
    close_requested: bool,
    sleep: Duration,
    input: InputState,
    cursor: CursorMode,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: PhysicalSize::new(width, height),
            close_requested: false,
            sleep: Duration::ZERO,
            input: InputState::default(),
            cursor: CursorMode::Normal,
        }
    }

    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Simulate a resize; zero in either dimension is a minimize.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = PhysicalSize::new(width, height);
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn cursor_mode(&self) -> CursorMode {
        self.cursor
    }
}

impl WindowProvider for HeadlessWindow {
    fn poll_events(&mut self) {
        if !self.sleep.is_zero() {
            thread::sleep(self.sleep);
        }
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn framebuffer_size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn input(&self) -> &InputState {
        &self.input
    }

    fn set_cursor_mode(&mut self, mode: CursorMode) {
        self.cursor = mode;
    }
}
