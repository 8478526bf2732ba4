// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::info;

use utopia_render::{
    AcquireOutcome, ClearColor, DrawData, GpuBackend, PresentOutcome, RebuildOutcome, RenderSize,
    SurfaceConfig, SwapchainDesc,
};

mod cache;
mod debug;
mod device;
mod record;
mod swapchain;

pub use device::DeviceContext;
pub use swapchain::PresentationSurface;

/// Vulkan implementation of `GpuBackend` for one window.
pub struct VkBackend {
    // Declared before `ctx`: the surface must go first.
    surface: PresentationSurface,
    ctx: DeviceContext,
}

impl VkBackend {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        app_name: &str,
        size: RenderSize,
        cfg: SurfaceConfig,
    ) -> Result<Self> {
        let dh: RawDisplayHandle = display.display_handle().context("display_handle")?.as_raw();
        let wh: RawWindowHandle = window.window_handle().context("window_handle")?.as_raw();

        let extensions =
            ash_window::enumerate_required_extensions(dh).context("enumerate_required_extensions")?;
        let ctx = DeviceContext::new(app_name, extensions)?;

        unsafe {
            let surface =
                ash_window::create_surface(ctx.entry(), ctx.instance(), dh, wh, ctx.allocator())
                    .context("create_surface")?;
            let surface = PresentationSurface::new(&ctx, surface, size, cfg)?;
            let desc = surface.desc();
            info!(
                "vulkan backend ready ({}x{}, {} images, fmt 0x{:x})",
                desc.extent.width,
                desc.extent.height,
                desc.image_count,
                desc.format.as_raw()
            );
            Ok(Self { surface, ctx })
        }
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }
}

impl GpuBackend for VkBackend {
    type CommandBuffer = vk::CommandBuffer;
    type Format = vk::Format;

    fn desc(&self) -> SwapchainDesc<vk::Format> {
        self.surface.desc()
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<RebuildOutcome> {
        unsafe { self.surface.rebuild(&self.ctx, size) }
    }

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
        unsafe { self.surface.acquire(&self.ctx) }
    }

    fn wait_for_image(&mut self, image: u32) -> Result<()> {
        unsafe { self.surface.wait_for_image(&self.ctx, image) }
    }

    fn free_command_buffers(&mut self, image: u32, buffers: &[vk::CommandBuffer]) {
        unsafe { self.surface.free_command_buffers(&self.ctx, image, buffers) }
    }

    fn reset_command_pool(&mut self, image: u32) -> Result<()> {
        unsafe { self.surface.reset_command_pool(&self.ctx, image) }
    }

    fn submit_frame(&mut self, image: u32, draw: &DrawData, clear: ClearColor) -> Result<()> {
        unsafe { self.surface.submit(&self.ctx, image, draw, clear) }
    }

    fn present(&mut self, image: u32) -> Result<PresentOutcome> {
        unsafe { self.surface.present(&self.ctx, image) }
    }

    fn allocate_command_buffer(&mut self, image: u32) -> Result<vk::CommandBuffer> {
        unsafe { self.surface.allocate_command_buffer(&self.ctx, image) }
    }

    fn flush_command_buffer(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.surface.flush_command_buffer(&self.ctx, cmd) }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

impl Drop for VkBackend {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().device_wait_idle().ok();
            self.surface.destroy(&self.ctx);
        }
    }
}
