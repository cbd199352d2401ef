//! # Fluxel
//!
//! Interactive real-time fluid visualization: Stable-Fluids solvers on
//! CPU and GPU with a post-processed, bloom-lit display path.
//!
//! Two engines share one physical model:
//!
//! - [`FluidEngine`] runs the simulation as a multi-pass GPU pipeline
//!   over double-buffered textures (vorticity confinement, pressure
//!   projection, semi-Lagrangian advection, bloom).
//! - [`CpuFluid`] runs the same operator splitting as a scalar grid
//!   solver, one grid per dye color, with no device dependency.
//!
//! ## Quick Start
//!
//! Open an interactive window (drag to stir dye into the fluid):
//!
//! ```ignore
//! fn main() -> Result<(), fluxel::SimulationError> {
//!     fluxel::window::run()
//! }
//! ```
//!
//! Or drive the engine yourself:
//!
//! ```ignore
//! use fluxel::prelude::*;
//!
//! let mut engine = pollster::block_on(FluidEngine::new(window))?;
//! engine.add_force(0.5, 0.5, 0.02, 0.0, [80, 200, 255])?;
//! engine.render(0.016, &[FilterKind::Blur])?;
//! ```
//!
//! ## Core Concepts
//!
//! ### Forces
//!
//! All outside input reaches the simulation through one operation:
//! [`FluidEngine::add_force`] enqueues a dye/velocity injection at a
//! normalized position. Pending forces are drained exactly once at the
//! start of the next frame; producers may append from any thread.
//!
//! ### Double-buffered surfaces
//!
//! Every multi-pass stage reads the `read` half of a [`DoubleSurface`]
//! and renders into the `write` half, then swaps the pair in O(1). No
//! pass ever samples the texture it is writing.
//!
//! ### Configuration
//!
//! [`FluidConfig`] is an explicit value type. The engine holds the
//! authoritative copy, [`FluidEngine::update_config`] merges changes, and
//! [`FluidEngine::config`] returns a snapshot. Changing the resolution is
//! the one structural update: it rebuilds every surface, migrating old
//! contents top-left aligned.

pub mod config;
pub mod cpu;
pub mod error;
pub mod forces;
mod gpu;
pub mod kernels;
pub mod solver;
pub mod surface;
pub mod window;

pub use config::FluidConfig;
pub use cpu::CpuFluid;
pub use error::{GpuError, InputError, SimulationError};
pub use forces::{ForceQueue, PointForce};
pub use glam::Vec2;
pub use gpu::post_process::{Filter, FilterKind};
pub use gpu::FluidEngine;
pub use surface::{DoubleSurface, PingPong, Surface, SurfaceSpec};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use fluxel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::FluidConfig;
    pub use crate::cpu::CpuFluid;
    pub use crate::error::{GpuError, InputError, SimulationError};
    pub use crate::forces::PointForce;
    pub use crate::gpu::post_process::FilterKind;
    pub use crate::gpu::FluidEngine;
    pub use crate::surface::{DoubleSurface, Surface, SurfaceSpec};
    pub use crate::Vec2;
}
