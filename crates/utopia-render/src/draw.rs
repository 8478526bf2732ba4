// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;

/// Rectangle in framebuffer pixels, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clip against a `bounds` sized framebuffer and snap to whole pixels.
    /// `None` when nothing of the rectangle is left.
    pub fn clip(&self, bounds: RenderSize) -> Option<PixelRect> {
        let x0 = self.x.max(0.0).floor();
        let y0 = self.y.max(0.0).floor();
        let x1 = (self.x + self.width).min(bounds.width as f32).ceil();
        let y1 = (self.y + self.height).min(bounds.height as f32).ceil();
        if !(x1 > x0 && y1 > y0) {
            return None;
        }
        Some(PixelRect {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCmd {
    FillRect { rect: Rect, color: [f32; 4] },
}

/// Draw commands collected while layers build their UI for one tick.
#[derive(Debug, Default)]
pub struct DrawList {
    cmds: Vec<DrawCmd>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_rect(&mut self, rect: Rect, color: [f32; 4]) {
        self.cmds.push(DrawCmd::FillRect { rect, color });
    }

    /// Freeze the list. The result is read-only for the rest of the tick.
    pub fn finish(self, display_size: RenderSize) -> DrawData {
        DrawData {
            cmds: self.cmds,
            display_size,
        }
    }
}

/// Finalized draw commands for one frame.
#[derive(Debug)]
pub struct DrawData {
    cmds: Vec<DrawCmd>,
    display_size: RenderSize,
}

impl DrawData {
    pub fn commands(&self) -> &[DrawCmd] {
        &self.cmds
    }

    pub fn is_minimized(&self) -> bool {
        self.display_size.is_zero()
    }
}
