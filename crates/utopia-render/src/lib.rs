// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use std::fmt::Debug;

mod draw;
mod frame;
mod null;

pub use draw::{DrawCmd, DrawData, DrawList, PixelRect, Rect};
pub use frame::{FrameResources, FreeAction};
pub use null::NullBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero dimension means the window is minimized: nothing may be
    /// rebuilt or rendered until it grows again.
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearColor(pub [f32; 4]);

impl Default for ClearColor {
    fn default() -> Self {
        ClearColor([0.45, 0.55, 0.60, 1.0])
    }
}

impl ClearColor {
    /// RGB scaled by alpha, as written into the render pass clear value.
    pub fn premultiplied(&self) -> [f32; 4] {
        let [r, g, b, a] = self.0;
        [r * a, g * a, b * a, a]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PresentPolicy {
    /// FIFO only: never tears.
    #[default]
    Fifo,
    /// Mailbox, then immediate, then FIFO.
    LowLatency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub present_policy: PresentPolicy,
    pub min_image_count: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            present_policy: PresentPolicy::Fifo,
            min_image_count: 2,
        }
    }
}

/// Snapshot of the live swapchain. `generation` bumps on every rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc<F> {
    pub image_count: usize,
    pub extent: RenderSize,
    pub format: F,
    pub generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(u32),
    /// Out of date or suboptimal. Do not render; rebuild first.
    Stale,
}

/// `Skipped` leaves the old swapchain in place; the caller keeps it stale
/// and retries on a later tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    Rebuilt,
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Stale,
}

/// The presentation half of a GPU device: a swapchain with per-image
/// command pools and fences, driven one step at a time by the frame loop.
///
/// Every `Err` is fatal. The only recoverable conditions are the `Stale`
/// outcomes of `acquire_next_image` and `present`.
pub trait GpuBackend {
    type CommandBuffer: Copy + Eq + Debug;
    type Format: Copy + Eq + Debug;

    fn desc(&self) -> SwapchainDesc<Self::Format>;

    /// Recreate the swapchain for `size`, reusing the old one as a hint.
    /// Returns `Skipped`, with the swapchain intact, when either `size` or
    /// the surface's own extent is zero.
    fn rebuild(&mut self, size: RenderSize) -> Result<RebuildOutcome>;

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome>;

    /// Block until the last submission that rendered `image` has finished.
    fn wait_for_image(&mut self, image: u32) -> Result<()>;

    fn free_command_buffers(&mut self, image: u32, buffers: &[Self::CommandBuffer]);

    fn reset_command_pool(&mut self, image: u32) -> Result<()>;

    /// Record the render pass for `image` (clear, then `draw`), reset the
    /// image fence and submit, waiting on image-acquired and signalling
    /// render-complete.
    fn submit_frame(&mut self, image: u32, draw: &DrawData, clear: ClearColor) -> Result<()>;

    fn present(&mut self, image: u32) -> Result<PresentOutcome>;

    /// A primary command buffer from `image`'s pool, already begun for
    /// one-time submission.
    fn allocate_command_buffer(&mut self, image: u32) -> Result<Self::CommandBuffer>;

    /// End, submit and wait for a buffer from `allocate_command_buffer`.
    fn flush_command_buffer(&mut self, cmd: Self::CommandBuffer) -> Result<()>;

    fn wait_idle(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimension_is_minimized() {
        assert!(RenderSize::new(0, 900).is_zero());
        assert!(RenderSize::new(1600, 0).is_zero());
        assert!(!RenderSize::new(1, 1).is_zero());
    }

    #[test]
    fn clear_color_premultiplies_alpha() {
        let c = ClearColor([0.5, 1.0, 0.25, 0.5]);
        assert_eq!(c.premultiplied(), [0.25, 0.5, 0.125, 0.5]);
        assert_eq!(ClearColor::default().premultiplied(), [0.45, 0.55, 0.60, 1.0]);
    }
}
