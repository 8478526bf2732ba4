// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use glam::Vec2;
use std::time::Duration;
use tracing::{debug, info, warn};
use utopia_core::Error;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{CursorGrabMode, Window, WindowAttributes, WindowId},
};

use crate::{CursorMode, InputState, WindowProvider};

// Desktop backends deliver `resumed` on the first pump; allow a few more.
const STARTUP_PUMPS: usize = 16;

struct WindowState {
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<String>,
    close_requested: bool,
    size: PhysicalSize<u32>,
    input: InputState,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => {
                self.size = window.inner_size();
                info!(
                    "window created ({}x{} px)",
                    self.size.width, self.size.height
                );
                self.window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.size = size;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.input
                        .set_key(code, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input
                    .set_mouse_button(button, state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            _ => {}
        }
    }
}

/// An OS window whose event loop is pumped once per frame by the caller
/// instead of owning the thread.
pub struct PlatformWindow {
    // Declared first so the window drops before its event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("EventLoop::new")?;
        let attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height));

        let mut state = WindowState {
            attributes: Some(attributes),
            window: None,
            create_error: None,
            close_requested: false,
            size: PhysicalSize::new(0, 0),
            input: InputState::default(),
        };

        for _ in 0..STARTUP_PUMPS {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if state.window.is_some() || state.create_error.is_some() {
                break;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::WindowCreation(format!("event loop exited with {code}")).into());
            }
        }

        if let Some(e) = state.create_error.take() {
            return Err(Error::WindowCreation(e).into());
        }
        if state.window.is_none() {
            return Err(Error::WindowCreation("event loop never resumed".into()).into());
        }

        Ok(Self { state, event_loop })
    }
}

impl WindowProvider for PlatformWindow {
    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            debug!("event loop exited ({code})");
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn framebuffer_size(&self) -> PhysicalSize<u32> {
        self.state.size
    }

    fn input(&self) -> &InputState {
        &self.state.input
    }

    fn set_cursor_mode(&mut self, mode: CursorMode) {
        let Some(window) = &self.state.window else {
            return;
        };
        let (visible, grab) = match mode {
            CursorMode::Normal => (true, CursorGrabMode::None),
            CursorMode::Hidden => (false, CursorGrabMode::None),
            CursorMode::Locked => (false, CursorGrabMode::Locked),
        };
        window.set_cursor_visible(visible);
        if let Err(e) = window.set_cursor_grab(grab) {
            // Not every platform can lock; confining is the closest fallback.
            if grab == CursorGrabMode::Locked {
                if let Err(e) = window.set_cursor_grab(CursorGrabMode::Confined) {
                    warn!("cursor grab unavailable: {e}");
                }
            } else {
                warn!("cursor grab {grab:?} failed: {e}");
            }
        }
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.state
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.event_loop.display_handle()
    }
}
