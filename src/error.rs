//! Error types for fluxel.
//!
//! This module provides error types for GPU initialization, input
//! validation, and running the interactive window.

use std::fmt;

/// Errors that can occur while acquiring GPU resources.
///
/// All of these are fatal at engine construction: the caller must not
/// proceed with a half-initialized engine.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a presentation surface for the window.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    Adapter(wgpu::RequestAdapterError),
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::Adapter(e) => write!(
                f,
                "No compatible GPU adapter found ({}). Ensure your system has a GPU with Vulkan/Metal/DX12 support.",
                e
            ),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::Adapter(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestAdapterError> for GpuError {
    fn from(e: wgpu::RequestAdapterError) -> Self {
        GpuError::Adapter(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors from rejected API calls.
///
/// Rejected calls leave the engine untouched: an out-of-range force is not
/// enqueued, and an invalid configuration is not merged.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// A normalized coordinate was non-finite or outside `[0, 1]`.
    Coordinate { axis: &'static str, value: f32 },
    /// A velocity component was non-finite.
    Velocity { axis: &'static str, value: f32 },
    /// A requested simulation resolution was zero.
    ZeroResolution,
    /// A requested resolution would exceed the device's texture limits.
    ResolutionTooLarge { requested: u32, max: u32 },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Coordinate { axis, value } => {
                write!(f, "Normalized {} coordinate {} is outside [0, 1]", axis, value)
            }
            InputError::Velocity { axis, value } => {
                write!(f, "Velocity component {} = {} is not finite", axis, value)
            }
            InputError::ZeroResolution => write!(f, "Simulation resolution must be greater than zero"),
            InputError::ResolutionTooLarge { requested, max } => write!(
                f,
                "Resolution {} exceeds the device texture limit of {}",
                requested, max
            ),
        }
    }
}

impl std::error::Error for InputError {}

/// Errors that can occur when running the interactive window.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}
