// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

use utopia_app::{Application, Config, FrameContext, Layer};
use utopia_core::{init_tracing, ScopedTimer};
use utopia_platform::winit::keyboard::KeyCode;
use utopia_platform::{HeadlessWindow, PlatformWindow, WindowProvider};
use utopia_render::{DrawList, GpuBackend, NullBackend, Rect, RenderSize};
use utopia_render_vk::VkBackend;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(long, default_value = "utopia.toml")]
    config: PathBuf,
    /// Window title (overrides the config)
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// No window and no GPU
    #[arg(long)]
    headless: bool,
    /// Close after this many ticks
    #[arg(long)]
    max_frames: Option<u64>,
}

/// Bars sweeping across the window. Escape closes.
struct DemoLayer {
    max_frames: Option<u64>,
    frames: u64,
    phase: f32,
    // Stand-in for a GPU resource replaced once a second.
    scratch: Option<Vec<u8>>,
    last_swap: f32,
}

impl DemoLayer {
    fn new(max_frames: Option<u64>) -> Self {
        Self {
            max_frames,
            frames: 0,
            phase: 0.0,
            scratch: None,
            last_swap: 0.0,
        }
    }
}

impl<B: GpuBackend> Layer<B> for DemoLayer {
    fn on_attach(&mut self, ctx: &mut FrameContext<'_, B>) {
        let sc = ctx.swapchain();
        info!(
            "demo layer attached ({}x{}, {} images)",
            sc.extent.width, sc.extent.height, sc.image_count
        );
        self.scratch = Some(vec![0; 64 * 1024]);
    }

    fn on_detach(&mut self, ctx: &mut FrameContext<'_, B>) {
        if let Some(old) = self.scratch.take() {
            ctx.submit_resource_free(move || drop(old));
        }
        info!("demo layer detached after {} frames", self.frames);
    }

    fn on_update(&mut self, ctx: &mut FrameContext<'_, B>, ts: f32) {
        self.frames += 1;
        self.phase = (self.phase + ts * 0.25).fract();

        if ctx.time() - self.last_swap >= 1.0 {
            self.last_swap = ctx.time();
            if let Some(old) = self.scratch.replace(vec![0; 64 * 1024]) {
                ctx.submit_resource_free(move || {
                    debug!("released {} byte scratch buffer", old.len());
                });
            }
        }

        if ctx.input().is_key_down(KeyCode::Escape) {
            ctx.close();
        }
        if self.max_frames.is_some_and(|max| self.frames >= max) {
            info!("reached {} frames", self.frames);
            ctx.close();
        }
    }

    fn on_ui_render(&mut self, ctx: &mut FrameContext<'_, B>, ui: &mut DrawList) {
        let extent = ctx.swapchain().extent;
        let (w, h) = (extent.width as f32, extent.height as f32);
        for i in 0..4 {
            let t = (self.phase + i as f32 * 0.25).fract();
            ui.fill_rect(
                Rect::new(t * w - w * 0.1, h * (0.2 + 0.15 * i as f32), w * 0.2, h * 0.1),
                [t, 0.4, 1.0 - t, 1.0],
            );
        }
    }
}

fn fatal(e: anyhow::Error) -> ! {
    error!("fatal: {e:#}");
    std::process::exit(1);
}

// Fatal errors exit here, before `app` drops, so a broken device is never
// torn down.
fn run_app<B: GpuBackend, W: WindowProvider>(cfg: &Config, window: W, backend: B, args: &Args) {
    let mut app = Application::new(cfg.spec(), window, backend).unwrap_or_else(|e| fatal(e));
    app.set_menubar_callback(|ctx, ui| {
        let w = ctx.swapchain().extent.width as f32;
        ui.fill_rect(Rect::new(0.0, 0.0, w, 24.0), [0.12, 0.12, 0.14, 1.0]);
    });
    app.push_layer(DemoLayer::new(args.max_frames));

    let _timer = ScopedTimer::new("run");
    if let Err(e) = app.run() {
        fatal(e);
    }
}

fn build_config(args: &Args) -> Config {
    let mut cfg = Config::load(&args.config);
    if let Some(name) = &args.name {
        cfg.app.name = name.clone();
    }
    if let Some(width) = args.width {
        cfg.app.width = width;
    }
    if let Some(height) = args.height {
        cfg.app.height = height;
    }
    cfg
}

fn windowed(cfg: &Config, args: &Args) -> Result<()> {
    let window = PlatformWindow::new(&cfg.app.name, cfg.app.width, cfg.app.height)?;
    let fb = window.framebuffer_size();
    let backend = VkBackend::new(
        &window,
        &window,
        &cfg.app.name,
        RenderSize::new(fb.width, fb.height),
        cfg.surface(),
    )?;
    run_app(cfg, window, backend, args);
    Ok(())
}

fn headless(cfg: &Config, args: &Args) {
    let window = HeadlessWindow::new(cfg.app.width, cfg.app.height)
        .with_sleep(Duration::from_millis(cfg.headless.sleep_ms));
    let backend = NullBackend::new(
        RenderSize::new(cfg.app.width, cfg.app.height),
        cfg.surface(),
    );
    run_app(cfg, window, backend, args);
}

fn main() {
    init_tracing();
    let args = Args::parse();
    let cfg = build_config(&args);
    info!("starting '{}' (headless={})", cfg.app.name, args.headless);

    if args.headless {
        headless(&cfg, &args);
    } else if let Err(e) = windowed(&cfg, &args) {
        fatal(e);
    }
    info!("clean exit");
}
