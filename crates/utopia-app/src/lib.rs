// SPDX-License-Identifier: CEPL-1.0
//! Frame driver and layer stack on top of a `GpuBackend` and a
//! `WindowProvider`.

mod application;
pub mod config;
mod layer;

pub use application::{
    clamp_timestep, Application, ApplicationSpec, DriverState, TickPhase, MAX_TIMESTEP,
};
pub use config::Config;
pub use layer::{FrameContext, Layer};
