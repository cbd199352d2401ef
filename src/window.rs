//! Interactive window runner.
//!
//! Thin collaborator layer over [`FluidEngine`]: it owns the winit event
//! loop, converts pointer drags into normalized forces, and drives the
//! simulation with a fixed timestep from the redraw callback. Everything
//! it does goes through the engine's public API (`add_force`, `render`,
//! `reset`), so the core stays independent of any windowing runtime.
//!
//! Controls: drag to stir dye into the fluid, `1`/`2`/`3` toggle the
//! blur/edge-detect/sharpen filters, `R` resets the simulation.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::error::SimulationError;
use crate::gpu::post_process::FilterKind;
use crate::gpu::FluidEngine;

/// Fixed simulation timestep in seconds, matching a 60 Hz display.
const FIXED_DT: f32 = 0.016;

/// Injected velocities are clamped to this magnitude before they reach
/// the engine.
const MAX_POINTER_VELOCITY: f32 = 0.05;

/// How long one generated dye color stays active.
const COLOR_PERIOD: Duration = Duration::from_secs(3);

/// Convert a pointer position in pixels to normalized simulation space:
/// x from the left edge, y from the bottom.
fn normalize_pointer(position: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new(position.x / width, 1.0 - position.y / height)
}

/// Tiny xorshift generator for dye colors; keeps the runner free of any
/// RNG dependency.
struct ColorGen {
    state: u32,
}

impl ColorGen {
    fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x9e3779b9);
        Self {
            state: nanos | 1,
        }
    }

    fn next_unit(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x >> 8) as f32 / (1u32 << 24) as f32
    }

    /// A bright dye color biased toward the green/blue end.
    fn color(&mut self) -> [u8; 3] {
        [
            (235.0 * self.next_unit()) as u8,
            (100.0 + 155.0 * self.next_unit()) as u8,
            (20.0 + 235.0 * self.next_unit()) as u8,
        ]
    }
}

struct FluidApp {
    window: Option<Arc<Window>>,
    engine: Option<FluidEngine>,
    filters: Vec<FilterKind>,
    pointer_pressed: bool,
    last_pointer: Option<Vec2>,
    colors: ColorGen,
    current_color: [u8; 3],
    color_changed: Instant,
}

impl FluidApp {
    fn new() -> Self {
        let mut colors = ColorGen::new();
        let current_color = colors.color();
        Self {
            window: None,
            engine: None,
            filters: vec![FilterKind::Blur],
            pointer_pressed: false,
            last_pointer: None,
            colors,
            current_color,
            color_changed: Instant::now(),
        }
    }

    fn toggle_filter(&mut self, kind: FilterKind) {
        if let Some(index) = self.filters.iter().position(|&f| f == kind) {
            self.filters.remove(index);
        } else {
            self.filters.push(kind);
        }
    }

    fn stir(&mut self, position: Vec2) {
        let (Some(engine), Some(window)) = (self.engine.as_ref(), self.window.as_ref()) else {
            return;
        };
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(last) = self.last_pointer {
            let normalized = normalize_pointer(position, size.width as f32, size.height as f32);
            let delta = position - last;
            // Drags that leave the window produce out-of-range
            // coordinates; those injections are simply dropped.
            let _ = engine.add_force(
                normalized.x,
                normalized.y,
                delta.x.clamp(-MAX_POINTER_VELOCITY, MAX_POINTER_VELOCITY),
                (-delta.y).clamp(-MAX_POINTER_VELOCITY, MAX_POINTER_VELOCITY),
                self.current_color,
            );
        }
        self.last_pointer = Some(position);
    }
}

impl ApplicationHandler for FluidApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title("Fluxel")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

            let window = match event_loop.create_window(window_attrs) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    eprintln!("Failed to create window: {}", e);
                    event_loop.exit();
                    return;
                }
            };
            self.window = Some(window.clone());

            match pollster::block_on(FluidEngine::new(window)) {
                Ok(engine) => self.engine = Some(engine),
                Err(e) => {
                    eprintln!("Failed to initialize GPU: {}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = &mut self.engine {
                    engine.resize_window(size.width, size.height);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.pointer_pressed = state == ElementState::Pressed;
                    if !self.pointer_pressed {
                        self.last_pointer = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.pointer_pressed {
                    self.stir(Vec2::new(position.x as f32, position.y as f32));
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Digit1) => self.toggle_filter(FilterKind::Blur),
                        PhysicalKey::Code(KeyCode::Digit2) => {
                            self.toggle_filter(FilterKind::EdgeDetect)
                        }
                        PhysicalKey::Code(KeyCode::Digit3) => {
                            self.toggle_filter(FilterKind::Sharpen)
                        }
                        PhysicalKey::Code(KeyCode::KeyR) => {
                            if let Some(engine) = &mut self.engine {
                                engine.reset();
                            }
                        }
                        PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                        _ => {}
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if self.color_changed.elapsed() >= COLOR_PERIOD {
                    self.current_color = self.colors.color();
                    self.color_changed = Instant::now();
                }
                if let Some(engine) = &mut self.engine {
                    match engine.render(FIXED_DT, &self.filters) {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                            if let Some(window) = &self.window {
                                let size = window.inner_size();
                                engine.resize_window(size.width, size.height);
                            }
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => eprintln!("Render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Open a window and run the interactive simulation until it is closed.
pub fn run() -> Result<(), SimulationError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = FluidApp::new();
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pointer_flips_y() {
        let top_left = normalize_pointer(Vec2::new(0.0, 0.0), 800.0, 600.0);
        assert_eq!(top_left, Vec2::new(0.0, 1.0));
        let bottom_right = normalize_pointer(Vec2::new(800.0, 600.0), 800.0, 600.0);
        assert_eq!(bottom_right, Vec2::new(1.0, 0.0));
        let center = normalize_pointer(Vec2::new(400.0, 300.0), 800.0, 600.0);
        assert!((center - Vec2::splat(0.5)).length() < 1e-6);
    }

    #[test]
    fn test_color_gen_stays_in_byte_range() {
        let mut colors = ColorGen { state: 12345 };
        for _ in 0..100 {
            let [r, g, b] = colors.color();
            assert!(r <= 235);
            assert!((100..=255).contains(&g));
            assert!((20..=255).contains(&b));
        }
    }

    #[test]
    fn test_unit_samples_are_normalized() {
        let mut colors = ColorGen { state: 0xdeadbeef };
        for _ in 0..1000 {
            let sample = colors.next_unit();
            assert!((0.0..1.0).contains(&sample));
        }
    }
}
