// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error as ThisError;

/// Conditions that leave no way to render. Nothing retries these; the entry
/// point logs them and exits.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("no Vulkan-capable GPU found")]
    NoPhysicalDevice,
    #[error("no queue family with graphics support")]
    NoGraphicsQueue,
    #[error("queue family {0} cannot present to this surface (no WSI support)")]
    PresentUnsupported(u32),
    #[error("swapchain returned {0} images, at least 2 are required")]
    TooFewImages(usize),
    #[error("a device context is already alive in this process")]
    DeviceAlreadyInitialized,
    #[error("an application is already running on this thread")]
    ApplicationAlreadyRunning,
    #[error("window creation failed: {0}")]
    WindowCreation(String),
}
