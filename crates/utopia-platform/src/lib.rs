// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub use winit;

mod headless;
mod input;
mod window;

pub use headless::HeadlessWindow;
pub use input::InputState;
pub use window::PlatformWindow;

use winit::dpi::PhysicalSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorMode {
    #[default]
    Normal,
    Hidden,
    Locked,
}

/// What the frame loop needs from the OS window.
pub trait WindowProvider {
    /// Drain pending OS events without blocking.
    fn poll_events(&mut self);
    fn should_close(&self) -> bool;
    /// Drawable size in pixels. Zero in either dimension while minimized.
    fn framebuffer_size(&self) -> PhysicalSize<u32>;
    fn input(&self) -> &InputState;
    fn set_cursor_mode(&mut self, mode: CursorMode);
}
