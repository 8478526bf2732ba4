// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;

use utopia_core::Timer;
use utopia_platform::{CursorMode, InputState, WindowProvider};
use utopia_render::{DrawList, FrameResources, GpuBackend, SwapchainDesc};

/// Hooks the frame driver calls on every pushed layer. All default to no-ops.
///
/// `on_update` and `on_ui_render` run in push order once per tick;
/// `on_detach` runs at shutdown in reverse push order.
pub trait Layer<B: GpuBackend> {
    fn on_attach(&mut self, _ctx: &mut FrameContext<'_, B>) {}
    fn on_detach(&mut self, _ctx: &mut FrameContext<'_, B>) {}
    fn on_update(&mut self, _ctx: &mut FrameContext<'_, B>, _ts: f32) {}
    fn on_ui_render(&mut self, _ctx: &mut FrameContext<'_, B>, _ui: &mut DrawList) {}
}

/// What a layer may touch while one of its hooks runs. Borrowed from the
/// application for the duration of the call.
pub struct FrameContext<'a, B: GpuBackend> {
    pub(crate) backend: &'a mut B,
    pub(crate) window: &'a mut dyn WindowProvider,
    pub(crate) frames: &'a mut FrameResources<B::CommandBuffer>,
    pub(crate) close_requested: &'a mut bool,
    pub(crate) image: u32,
    pub(crate) started: Timer,
}

impl<B: GpuBackend> FrameContext<'_, B> {
    /// Stop after the current tick. Nothing is interrupted mid-tick.
    pub fn close(&mut self) {
        *self.close_requested = true;
    }

    /// Run `f` once the GPU can no longer be using whatever it releases:
    /// after every frame now in flight has completed.
    pub fn submit_resource_free(&mut self, f: impl FnOnce() + 'static) {
        self.frames.enqueue_free(f);
    }

    /// A begun, one-time-submit command buffer from the current image's pool.
    /// Freed automatically when that image is next reused.
    pub fn command_buffer(&mut self) -> Result<B::CommandBuffer> {
        let cmd = self.backend.allocate_command_buffer(self.image)?;
        if let Err(e) = self.frames.record_allocated(self.image, cmd) {
            self.backend.free_command_buffers(self.image, &[cmd]);
            return Err(e);
        }
        Ok(cmd)
    }

    /// End, submit and wait for `cmd`.
    pub fn flush_command_buffer(&mut self, cmd: B::CommandBuffer) -> Result<()> {
        self.backend.flush_command_buffer(cmd)
    }

    pub fn input(&self) -> &InputState {
        self.window.input()
    }

    pub fn set_cursor_mode(&mut self, mode: CursorMode) {
        self.window.set_cursor_mode(mode);
    }

    /// Seconds since the application was created.
    pub fn time(&self) -> f32 {
        self.started.elapsed()
    }

    /// Read-only: the swapchain only changes inside the frame driver.
    pub fn backend(&self) -> &B {
        self.backend
    }

    pub fn swapchain(&self) -> SwapchainDesc<B::Format> {
        self.backend.desc()
    }
}
