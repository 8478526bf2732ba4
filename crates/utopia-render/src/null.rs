// SPDX-License-Identifier: CEPL-1.0
//! A backend without a GPU. It walks the same acquire/submit/present protocol
//! as a real swapchain, but every fence is signalled by the time `submit_frame`
//! returns. Headless runs use it.

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::{
    AcquireOutcome, ClearColor, DrawData, GpuBackend, PresentOutcome, RebuildOutcome, RenderSize,
    SurfaceConfig, SwapchainDesc,
};

pub struct NullBackend {
    cfg: SurfaceConfig,
    extent: RenderSize,
    image_count: usize,
    generation: u64,
    next_image: u32,
    next_cmd: u64,
    // Buffers handed out and not yet freed, per image.
    live_cmds: Vec<Vec<u64>>,
    frames_presented: u64,
}

impl NullBackend {
    pub fn new(size: RenderSize, cfg: SurfaceConfig) -> Self {
        let mut backend = Self {
            cfg,
            extent: size,
            image_count: 0,
            generation: 0,
            next_image: 0,
            next_cmd: 1,
            live_cmds: Vec::new(),
            frames_presented: 0,
        };
        backend.build(size);
        backend
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    fn build(&mut self, size: RenderSize) {
        self.extent = size;
        self.image_count = self.cfg.min_image_count.max(2) as usize;
        self.live_cmds = vec![Vec::new(); self.image_count];
        self.next_image = 0;
        self.generation += 1;
        info!(
            "null swapchain ready ({}x{}, images {}, gen {})",
            size.width, size.height, self.image_count, self.generation
        );
    }

    fn check_image(&self, image: u32) -> Result<usize> {
        let i = image as usize;
        if i >= self.image_count {
            bail!("image index {image} out of range ({} images)", self.image_count);
        }
        Ok(i)
    }
}

impl GpuBackend for NullBackend {
    type CommandBuffer = u64;
    type Format = ();

    fn desc(&self) -> SwapchainDesc<()> {
        SwapchainDesc {
            image_count: self.image_count,
            extent: self.extent,
            format: (),
            generation: self.generation,
        }
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<RebuildOutcome> {
        if size.is_zero() {
            debug!("null: rebuild to {}x{} skipped", size.width, size.height);
            return Ok(RebuildOutcome::Skipped);
        }
        self.build(size);
        Ok(RebuildOutcome::Rebuilt)
    }

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(AcquireOutcome::Acquired(image))
    }

    fn wait_for_image(&mut self, image: u32) -> Result<()> {
        self.check_image(image).map(|_| ())
    }

    fn free_command_buffers(&mut self, image: u32, buffers: &[u64]) {
        if let Some(live) = self.live_cmds.get_mut(image as usize) {
            live.retain(|c| !buffers.contains(c));
        }
    }

    fn reset_command_pool(&mut self, image: u32) -> Result<()> {
        let i = self.check_image(image)?;
        if !self.live_cmds[i].is_empty() {
            bail!(
                "command pool {image} reset with {} buffers outstanding",
                self.live_cmds[i].len()
            );
        }
        Ok(())
    }

    fn submit_frame(&mut self, image: u32, _draw: &DrawData, _clear: ClearColor) -> Result<()> {
        self.check_image(image).map(|_| ())
    }

    fn present(&mut self, image: u32) -> Result<PresentOutcome> {
        self.check_image(image)?;
        self.frames_presented += 1;
        Ok(PresentOutcome::Presented)
    }

    fn allocate_command_buffer(&mut self, image: u32) -> Result<u64> {
        let i = self.check_image(image)?;
        let cmd = self.next_cmd;
        self.next_cmd += 1;
        self.live_cmds[i].push(cmd);
        Ok(cmd)
    }

    fn flush_command_buffer(&mut self, _cmd: u64) -> Result<()> {
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> NullBackend {
        NullBackend::new(RenderSize::new(1600, 900), SurfaceConfig::default())
    }

    #[test]
    fn rebuild_with_same_size_is_idempotent() {
        let mut b = backend();
        assert_eq!(b.rebuild(RenderSize::new(800, 600)).unwrap(), RebuildOutcome::Rebuilt);
        let first = b.desc();
        b.rebuild(RenderSize::new(800, 600)).unwrap();
        let second = b.desc();
        assert_eq!(first.image_count, second.image_count);
        assert_eq!(first.format, second.format);
        assert_eq!(first.extent, second.extent);
        assert_eq!(second.generation, first.generation + 1);
    }

    #[test]
    fn zero_size_rebuild_keeps_swapchain() {
        let mut b = backend();
        let before = b.desc();
        assert_eq!(b.rebuild(RenderSize::new(0, 600)).unwrap(), RebuildOutcome::Skipped);
        assert_eq!(b.desc(), before);
    }

    #[test]
    fn image_count_never_drops_below_two() {
        let b = NullBackend::new(
            RenderSize::new(10, 10),
            SurfaceConfig {
                min_image_count: 1,
                ..SurfaceConfig::default()
            },
        );
        assert_eq!(b.desc().image_count, 2);
    }

    #[test]
    fn pool_reset_with_outstanding_buffers_fails() {
        let mut b = backend();
        let cmd = b.allocate_command_buffer(1).unwrap();
        assert!(b.reset_command_pool(1).is_err());
        b.free_command_buffers(1, &[cmd]);
        assert!(b.reset_command_pool(1).is_ok());
    }

    #[test]
    fn acquire_cycles_images() {
        let mut b = backend();
        let got: Vec<_> = (0..3).map(|_| b.acquire_next_image().unwrap()).collect();
        assert_eq!(
            got,
            vec![
                AcquireOutcome::Acquired(0),
                AcquireOutcome::Acquired(1),
                AcquireOutcome::Acquired(0)
            ]
        );
    }
}
