// SPDX-License-Identifier: CEPL-1.0
//! UI draw data into an open render pass. Filled rectangles are attachment
//! clears, so no pipeline is bound.

use ash::vk;
use utopia_render::{DrawCmd, DrawData, RenderSize};

pub(crate) fn to_clear(
    cmd: &DrawCmd,
    extent: vk::Extent2D,
) -> Option<(vk::ClearAttachment, vk::ClearRect)> {
    match *cmd {
        DrawCmd::FillRect { rect, color } => {
            let px = rect.clip(RenderSize::new(extent.width, extent.height))?;
            let attachment = vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: 0,
                clear_value: vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
            };
            let clear_rect = vk::ClearRect {
                rect: vk::Rect2D {
                    offset: vk::Offset2D { x: px.x, y: px.y },
                    extent: vk::Extent2D {
                        width: px.width,
                        height: px.height,
                    },
                },
                base_array_layer: 0,
                layer_count: 1,
            };
            Some((attachment, clear_rect))
        }
    }
}

/// Caller has `cmd` inside a render pass whose framebuffer is `extent`.
pub(crate) unsafe fn record_draw_data(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    draw: &DrawData,
    extent: vk::Extent2D,
) {
    if draw.is_minimized() {
        return;
    }
    for c in draw.commands() {
        if let Some((attachment, rect)) = to_clear(c, extent) {
            device.cmd_clear_attachments(cmd, &[attachment], &[rect]);
        }
    }
}
