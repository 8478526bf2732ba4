// SPDX-License-Identifier: CEPL-1.0
mod common;

use common::{count, log, RecordingLayer};
use utopia_app::{Application, ApplicationSpec, Config, FrameContext, Layer};
use utopia_platform::{CursorMode, HeadlessWindow};
use utopia_render::{DrawList, GpuBackend, NullBackend, Rect, RenderSize};

struct CloseAfter {
    frames: u64,
    max: u64,
}

impl<B: GpuBackend> Layer<B> for CloseAfter {
    fn on_attach(&mut self, ctx: &mut FrameContext<'_, B>) {
        ctx.set_cursor_mode(CursorMode::Hidden);
    }

    fn on_update(&mut self, ctx: &mut FrameContext<'_, B>, _ts: f32) {
        self.frames += 1;
        if self.frames >= self.max {
            ctx.close();
        }
    }

    fn on_ui_render(&mut self, _ctx: &mut FrameContext<'_, B>, ui: &mut DrawList) {
        ui.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), [1.0, 0.0, 0.0, 1.0]);
    }
}

#[test]
fn headless_run_presents_every_tick_until_closed() {
    let cfg = Config::default();
    let size = RenderSize::new(cfg.app.width, cfg.app.height);
    let mut app = Application::new(
        cfg.spec(),
        HeadlessWindow::new(size.width, size.height),
        NullBackend::new(size, cfg.surface()),
    )
    .unwrap();
    let l = log();
    app.push_layer(RecordingLayer::new("watcher", &l));
    app.push_layer(CloseAfter { frames: 0, max: 5 });

    app.run().unwrap();

    assert_eq!(app.backend().frames_presented(), 5);
    assert_eq!(count(&l, "watcher:update"), 5);
    assert_eq!(count(&l, "watcher:detach"), 1);
    assert_eq!(app.window().cursor_mode(), CursorMode::Hidden);
}

#[test]
fn headless_minimize_and_restore() {
    let size = RenderSize::new(320, 240);
    let mut app = Application::new(
        ApplicationSpec::default(),
        HeadlessWindow::new(size.width, size.height),
        NullBackend::new(size, Default::default()),
    )
    .unwrap();

    app.tick().unwrap();
    app.window_mut().set_size(320, 0);
    app.tick().unwrap();
    assert_eq!(app.backend().frames_presented(), 1);
    assert_eq!(app.backend().desc().generation, 1);

    app.window_mut().set_size(640, 480);
    app.tick().unwrap();
    let desc = app.backend().desc();
    assert_eq!(desc.extent, RenderSize::new(640, 480));
    assert_eq!(desc.generation, 2);
    assert_eq!(app.backend().frames_presented(), 2);
}
