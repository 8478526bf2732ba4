// SPDX-License-Identifier: CEPL-1.0
use anyhow::{bail, Result};
use std::cell::Cell;
use std::time::Instant;
use tracing::{debug, error, info};

use utopia_core::{Error, Timer};
use utopia_platform::WindowProvider;
use utopia_render::{
    AcquireOutcome, ClearColor, DrawData, DrawList, FrameResources, GpuBackend, PresentOutcome,
    RebuildOutcome, RenderSize,
};

use crate::layer::{FrameContext, Layer};

/// Longest step handed to `on_update`, whatever the wall clock says.
pub const MAX_TIMESTEP: f32 = 1.0 / 30.0;

pub fn clamp_timestep(delta: f32) -> f32 {
    delta.min(MAX_TIMESTEP)
}

thread_local! {
    static APPLICATION_ALIVE: Cell<bool> = const { Cell::new(false) };
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: ClearColor,
}

impl Default for ApplicationSpec {
    fn default() -> Self {
        Self {
            name: "Utopia App".into(),
            width: 1600,
            height: 900,
            clear_color: ClearColor::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

/// Where the current (or last) tick is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickPhase {
    Between,
    Polling,
    Updating,
    Recording,
    Submitting,
    Presenting,
}

type MenubarFn<B> = Box<dyn FnMut(&mut FrameContext<'_, B>, &mut DrawList)>;

// Everything a layer hook may borrow, split from the layer stack so both can
// be borrowed at once.
struct Core<B: GpuBackend, W> {
    backend: B,
    window: W,
    frames: FrameResources<B::CommandBuffer>,
    close_requested: bool,
    // Image whose pool serves `command_buffer()`: the last one acquired.
    current_image: Option<u32>,
    started: Timer,
}

impl<B: GpuBackend, W: WindowProvider> Core<B, W> {
    fn ctx(&mut self) -> FrameContext<'_, B> {
        FrameContext {
            backend: &mut self.backend,
            window: &mut self.window,
            frames: &mut self.frames,
            close_requested: &mut self.close_requested,
            image: self.current_image.unwrap_or(0),
            started: self.started,
        }
    }

    fn free_all_allocated(&mut self) {
        for (image, cmds) in self.frames.take_all_allocated() {
            self.backend.free_command_buffers(image, &cmds);
        }
    }
}

/// The frame driver. Owns the window, the GPU backend, the frame rings and
/// the layer stack, and turns one `tick` into one presented frame.
pub struct Application<B: GpuBackend, W: WindowProvider> {
    spec: ApplicationSpec,
    core: Core<B, W>,
    layers: Vec<Box<dyn Layer<B>>>,
    menubar: Option<MenubarFn<B>>,
    state: DriverState,
    phase: TickPhase,
    stale: bool,
    // Size the swapchain was last built for.
    built_size: RenderSize,
    timestep: f32,
    last_frame: Instant,
}

impl<B: GpuBackend, W: WindowProvider> Application<B, W> {
    pub fn new(spec: ApplicationSpec, window: W, backend: B) -> Result<Self> {
        if APPLICATION_ALIVE.with(Cell::get) {
            return Err(Error::ApplicationAlreadyRunning.into());
        }
        APPLICATION_ALIVE.with(|a| a.set(true));

        let desc = backend.desc();
        let now = Instant::now();
        info!(
            "application '{}' ({}x{}, {} images)",
            spec.name, desc.extent.width, desc.extent.height, desc.image_count
        );
        Ok(Self {
            spec,
            core: Core {
                backend,
                window,
                frames: FrameResources::new(desc.image_count),
                close_requested: false,
                current_image: None,
                started: Timer::new(),
            },
            layers: Vec::new(),
            menubar: None,
            state: DriverState::Idle,
            phase: TickPhase::Between,
            stale: false,
            built_size: desc.extent,
            timestep: 0.0,
            last_frame: now,
        })
    }

    /// Attach `layer` now and keep it until shutdown.
    pub fn push_layer(&mut self, layer: impl Layer<B> + 'static) {
        let mut layer: Box<dyn Layer<B>> = Box::new(layer);
        layer.on_attach(&mut self.core.ctx());
        self.layers.push(layer);
    }

    /// Called once per rendered tick, before any layer's `on_ui_render`.
    pub fn set_menubar_callback(
        &mut self,
        f: impl FnMut(&mut FrameContext<'_, B>, &mut DrawList) + 'static,
    ) {
        self.menubar = Some(Box::new(f));
    }

    /// Stop at the next tick boundary.
    pub fn close(&mut self) {
        self.core.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.core.close_requested || self.core.window.should_close()
    }

    pub fn spec(&self) -> &ApplicationSpec {
        &self.spec
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    /// The step the next `on_update` will receive.
    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    pub fn window(&self) -> &W {
        &self.core.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.core.window
    }

    pub fn backend(&self) -> &B {
        &self.core.backend
    }

    pub fn pending_frees(&self) -> usize {
        self.core.frames.pending_frees()
    }

    /// Tick until closed, then shut down. An `Err` is fatal: the device may
    /// be unusable and the caller should not try to tear it down.
    pub fn run(&mut self) -> Result<()> {
        while !self.close_requested() {
            self.tick()?;
        }
        self.shutdown()
    }

    /// One pass of poll, update, rebuild, UI, acquire, render and present.
    /// Does nothing once a close has been requested.
    pub fn tick(&mut self) -> Result<()> {
        if self.state == DriverState::Stopped || self.close_requested() {
            return Ok(());
        }
        self.state = DriverState::Running;

        self.phase = TickPhase::Polling;
        self.core.window.poll_events();

        self.phase = TickPhase::Updating;
        let ts = self.timestep;
        for layer in &mut self.layers {
            layer.on_update(&mut self.core.ctx(), ts);
        }

        let fb = self.core.window.framebuffer_size();
        let size = RenderSize::new(fb.width, fb.height);
        if size.is_zero() {
            debug!("minimized ({}x{}); render skipped", size.width, size.height);
        } else {
            if size != self.built_size {
                self.stale = true;
            }
            if self.stale && !self.rebuild(size)? {
                self.finish_tick();
                return Ok(());
            }

            let mut ui = DrawList::new();
            if let Some(menubar) = &mut self.menubar {
                menubar(&mut self.core.ctx(), &mut ui);
            }
            for layer in &mut self.layers {
                layer.on_ui_render(&mut self.core.ctx(), &mut ui);
            }
            let draw = ui.finish(size);

            self.render(&draw)?;
        }

        self.finish_tick();
        Ok(())
    }

    fn finish_tick(&mut self) {
        let now = Instant::now();
        self.timestep = clamp_timestep(now.duration_since(self.last_frame).as_secs_f32());
        self.last_frame = now;
        self.phase = TickPhase::Between;
    }

    // False when the surface could not be rebuilt yet; it stays stale and
    // this tick renders nothing.
    fn rebuild(&mut self, size: RenderSize) -> Result<bool> {
        let core = &mut self.core;
        core.backend.wait_idle()?;
        core.free_all_allocated();
        if core.backend.rebuild(size)? == RebuildOutcome::Skipped {
            debug!(
                "surface not drawable at {}x{}; rebuild retried next tick",
                size.width, size.height
            );
            return Ok(false);
        }

        let desc = core.backend.desc();
        core.frames.reshape(desc.image_count);
        core.current_image = None;
        self.stale = false;
        self.built_size = size;
        debug!(
            "swapchain rebuilt: {}x{}, {} images, gen {}",
            desc.extent.width, desc.extent.height, desc.image_count, desc.generation
        );
        Ok(true)
    }

    // Acquire, then for that image: wait fences, drain frees, free one-shot
    // buffers, reset the pool, record and submit, present.
    fn render(&mut self, draw: &DrawData) -> Result<()> {
        let core = &mut self.core;

        self.phase = TickPhase::Recording;
        let image = match core.backend.acquire_next_image()? {
            AcquireOutcome::Acquired(image) => image,
            AcquireOutcome::Stale => {
                debug!("acquire stale; frame skipped");
                self.stale = true;
                return Ok(());
            }
        };
        if image as usize >= core.frames.image_count() {
            bail!(
                "acquired image {image}, but the frame rings hold {} images",
                core.frames.image_count()
            );
        }
        core.frames.advance();

        // The slot's last submission may have used a different image.
        if let Some(prev) = core.frames.last_image_for_current_slot() {
            if prev != image {
                core.backend.wait_for_image(prev)?;
            }
        }
        core.backend.wait_for_image(image)?;
        core.frames.drain_current_slot();

        let cmds = core.frames.take_allocated(image)?;
        core.backend.free_command_buffers(image, &cmds);
        core.backend.reset_command_pool(image)?;

        self.phase = TickPhase::Submitting;
        core.backend.submit_frame(image, draw, self.spec.clear_color)?;
        core.frames.mark_submitted(image);
        core.current_image = Some(image);

        self.phase = TickPhase::Presenting;
        if core.backend.present(image)? == PresentOutcome::Stale {
            debug!("present stale; rebuilding next tick");
            self.stale = true;
        }
        Ok(())
    }

    /// Detach every layer (last pushed first), wait for the GPU, then run
    /// every pending free and release every one-shot buffer. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == DriverState::Stopped {
            return Ok(());
        }
        self.state = DriverState::Stopped;
        self.phase = TickPhase::Between;

        while let Some(mut layer) = self.layers.pop() {
            layer.on_detach(&mut self.core.ctx());
        }
        self.menubar = None;

        self.core.backend.wait_idle()?;
        let freed = self.core.frames.drain_all();
        self.core.free_all_allocated();
        info!("application '{}' shut down ({freed} deferred frees run)", self.spec.name);
        Ok(())
    }
}

impl<B: GpuBackend, W: WindowProvider> Drop for Application<B, W> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("shutdown failed: {e:#}");
        }
        APPLICATION_ALIVE.with(|a| a.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_frames_are_clamped() {
        assert_eq!(clamp_timestep(0.5), MAX_TIMESTEP);
        assert!((MAX_TIMESTEP - 0.0333).abs() < 1e-3);
    }

    #[test]
    fn fast_frames_pass_through() {
        assert_eq!(clamp_timestep(0.016), 0.016);
        assert_eq!(clamp_timestep(0.0), 0.0);
    }

    #[test]
    fn default_spec_matches_documented_defaults() {
        let spec = ApplicationSpec::default();
        assert_eq!(spec.name, "Utopia App");
        assert_eq!((spec.width, spec.height), (1600, 900));
    }
}
