//! GPU fluid engine.
//!
//! Runs the velocity and density steps as a fixed sequence of fragment
//! passes over double-buffered surfaces: drain pending forces, apply
//! vorticity confinement, project the velocity field to approximate
//! incompressibility, advect velocity then density, post-process, and
//! draw to the visible surface. Each pass reads the `read` half of a
//! surface pair and renders into the `write` half, then the pair swaps.
//!
//! Velocity and pressure run at a quarter of the density resolution; all
//! per-pass pixel sizes are recomputed from the live surface dimensions so
//! a resolution change mid-session stays consistent.

mod pipeline;
pub mod post_process;

use std::sync::Arc;

use bytemuck::bytes_of;
use winit::window::Window;

use crate::config::FluidConfig;
use crate::error::{GpuError, InputError};
use crate::forces::{ForceQueue, PointForce};
use crate::kernels::{self, AddDataParams, AdvectParams, ClearParams, PixelParams, VorticityParams};
use crate::surface::{DoubleSurface, Surface, SurfaceSpec};
use pipeline::PassProgram;
use post_process::{apply_bloom, Filter, FilterKind, PostPrograms};

/// Jacobi iterations for the pressure solve. Fixed; tuned for visual
/// plausibility, not convergence.
const PRESSURE_ITERATIONS: u32 = 50;

/// Number of surfaces in the bloom downsample chain.
const BLOOM_LEVELS: usize = 5;

/// Dimensions and formats of the full surface set at one resolution.
///
/// Pure data so resize decisions can be made (and tested) without touching
/// the device.
#[derive(Clone, Debug)]
struct SurfacePlan {
    density: SurfaceSpec,
    velocity: SurfaceSpec,
    pressure: SurfaceSpec,
    divergence: SurfaceSpec,
    curl: SurfaceSpec,
    bloom: Vec<SurfaceSpec>,
    scratch: SurfaceSpec,
}

impl SurfacePlan {
    fn new(resolution: u32, aspect: f32) -> Self {
        let scale = |base: u32| (base, (base as f32 * aspect).round() as u32);
        let (high_w, high_h) = scale(resolution);
        let (low_w, low_h) = scale(resolution >> 2);
        let bloom = (1..=BLOOM_LEVELS as u32)
            .map(|i| {
                SurfaceSpec::new("Bloom Level", high_w >> i, high_h >> i, wgpu::TextureFormat::Rgba8Unorm)
            })
            .collect();
        Self {
            density: SurfaceSpec::new("Density", high_w, high_h, wgpu::TextureFormat::Rgba8Unorm),
            velocity: SurfaceSpec::new("Velocity", low_w, low_h, wgpu::TextureFormat::Rg16Float),
            pressure: SurfaceSpec::new("Pressure", low_w, low_h, wgpu::TextureFormat::R16Float)
                .with_filter(wgpu::FilterMode::Nearest),
            divergence: SurfaceSpec::new("Divergence", low_w, low_h, wgpu::TextureFormat::R16Float)
                .with_filter(wgpu::FilterMode::Nearest),
            curl: SurfaceSpec::new("Curl", low_w, low_h, wgpu::TextureFormat::R16Float)
                .with_filter(wgpu::FilterMode::Nearest),
            bloom,
            scratch: SurfaceSpec::new("Scratch", high_w, high_h, wgpu::TextureFormat::Rgba16Float),
        }
    }
}

/// The engine's GPU-resident state for one resolution.
struct SurfaceSet {
    density: DoubleSurface,
    velocity: DoubleSurface,
    pressure: DoubleSurface,
    divergence: Surface,
    curl: Surface,
    bloom: Vec<Surface>,
    scratch: DoubleSurface,
}

impl SurfaceSet {
    fn allocate(device: &wgpu::Device, queue: &wgpu::Queue, plan: &SurfacePlan) -> Self {
        Self {
            density: DoubleSurface::allocate(device, queue, &plan.density, None),
            velocity: DoubleSurface::allocate(device, queue, &plan.velocity, None),
            pressure: DoubleSurface::allocate(device, queue, &plan.pressure, None),
            divergence: Surface::new(device, queue, &plan.divergence, None),
            curl: Surface::new(device, queue, &plan.curl, None),
            bloom: plan
                .bloom
                .iter()
                .map(|spec| Surface::new(device, queue, spec, None))
                .collect(),
            scratch: DoubleSurface::allocate(device, queue, &plan.scratch, None),
        }
    }

    /// Best-effort migration of another set's contents into this one:
    /// texel copies into each surface's top-left region, no scaling.
    fn copy_from(&self, old: &SurfaceSet, encoder: &mut wgpu::CommandEncoder) {
        for (old_pair, new_pair) in [
            (&old.density, &self.density),
            (&old.velocity, &self.velocity),
            (&old.pressure, &self.pressure),
            (&old.scratch, &self.scratch),
        ] {
            old_pair.read().blit_into(encoder, new_pair.read());
            old_pair.write().blit_into(encoder, new_pair.write());
        }
        old.divergence.blit_into(encoder, &self.divergence);
        old.curl.blit_into(encoder, &self.curl);
        for (old_level, new_level) in old.bloom.iter().zip(&self.bloom) {
            old_level.blit_into(encoder, new_level);
        }
    }
}

/// All compiled pass programs.
struct Programs {
    advect: PassProgram,
    divergence: PassProgram,
    pressure: PassProgram,
    gradient_subtract: PassProgram,
    curl: PassProgram,
    vorticity: PassProgram,
    add_data: PassProgram,
    clear: PassProgram,
    display: PassProgram,
    post: PostPrograms,
}

impl Programs {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            advect: PassProgram::new(device, "Advect Pass", kernels::ADVECT, 2, true),
            divergence: PassProgram::new(device, "Divergence Pass", kernels::DIVERGENCE, 1, true),
            pressure: PassProgram::new(device, "Pressure Pass", kernels::PRESSURE, 2, true),
            gradient_subtract: PassProgram::new(
                device,
                "Gradient Subtract Pass",
                kernels::GRADIENT_SUBTRACT,
                2,
                true,
            ),
            curl: PassProgram::new(device, "Curl Pass", kernels::CURL, 1, true),
            vorticity: PassProgram::new(device, "Vorticity Pass", kernels::VORTICITY, 2, true),
            add_data: PassProgram::new(device, "Add Data Pass", kernels::ADD_DATA, 1, true),
            clear: PassProgram::new(device, "Clear Pass", kernels::CLEAR, 1, true),
            display: PassProgram::new(device, "Display Pass", kernels::DISPLAY, 1, false),
            post: PostPrograms::new(device),
        }
    }
}

fn pixel_params(surface: &Surface) -> PixelParams {
    PixelParams {
        pixel_size: [1.0 / surface.width as f32, 1.0 / surface.height as f32],
        _pad: [0.0; 2],
    }
}

/// The GPU fluid engine. Owns the device, the presentation surface, and
/// every simulation surface; advances only when [`render`](Self::render)
/// is called by an external scheduler.
pub struct FluidEngine {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    programs: Programs,
    surfaces: SurfaceSet,
    filters: Vec<(FilterKind, Filter)>,
    forces: ForceQueue,
    config: FluidConfig,
}

impl FluidEngine {
    /// Initialize the device and allocate the full surface set.
    ///
    /// Any failure here is fatal; no partially-initialized engine is ever
    /// returned.
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let config = FluidConfig::default();
        let aspect = surface_config.height as f32 / surface_config.width as f32;
        let plan = SurfacePlan::new(config.current_resolution, aspect);
        let surfaces = SurfaceSet::allocate(&device, &queue, &plan);
        let programs = Programs::new(&device);
        let filters = [FilterKind::Blur, FilterKind::EdgeDetect, FilterKind::Sharpen]
            .into_iter()
            .map(|kind| (kind, Filter::new(kind)))
            .collect();

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            programs,
            surfaces,
            filters,
            forces: ForceQueue::new(),
            config,
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> FluidConfig {
        self.config
    }

    /// Queue a force/color injection at a normalized position.
    ///
    /// `x` and `y` must be finite and inside `[0, 1]`; velocities must be
    /// finite (callers clamp them to `[-0.05, 0.05]`). Rejected calls
    /// enqueue nothing.
    pub fn add_force(
        &self,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        color: [u8; 3],
    ) -> Result<(), InputError> {
        for (axis, value) in [("x", x), ("y", y)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(InputError::Coordinate { axis, value });
            }
        }
        for (axis, value) in [("vx", vx), ("vy", vy)] {
            if !value.is_finite() {
                return Err(InputError::Velocity { axis, value });
            }
        }
        self.forces.push(PointForce { x, y, vx, vy, color });
        Ok(())
    }

    /// Merge a new configuration. The only structural change is
    /// `current_resolution`: when it differs, the whole surface set is
    /// rebuilt at the new size with old contents copied top-left aligned.
    /// Validation happens before anything is touched, so a rejected update
    /// leaves the running simulation intact.
    pub fn update_config(&mut self, new_config: FluidConfig) -> Result<(), InputError> {
        new_config.validate(self.device.limits().max_texture_dimension_2d)?;
        if new_config.current_resolution != self.config.current_resolution {
            self.rebuild_surfaces(new_config.current_resolution, true);
        }
        self.config = new_config;
        Ok(())
    }

    /// Discard all simulation state and reallocate blank surfaces.
    pub fn reset(&mut self) {
        self.rebuild_surfaces(self.config.current_resolution, false);
    }

    /// Seed the density surface from an RGBA8 image, top-left aligned and
    /// cropped to the overlapping extent.
    pub fn set_density_image(&mut self, img: &image::RgbaImage) {
        let target = self.surfaces.density.read();
        let width = img.width().min(target.width);
        let height = img.height().min(target.height);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            img.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(img.width() * 4),
                rows_per_image: Some(img.height()),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Reconfigure the presentation surface after a window resize. The
    /// simulation surfaces are untouched; their aspect is fixed until the
    /// next resolution change or reset.
    pub fn resize_window(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    /// Advance the simulation by `dt` seconds and draw one frame.
    pub fn render(
        &mut self,
        dt: f32,
        active_filters: &[FilterKind],
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.apply_forces(&mut encoder);
        self.velocity_step(&mut encoder, dt);
        self.density_step(&mut encoder, dt);
        self.draw(&mut encoder, &frame_view, active_filters);

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }

    fn aspect(&self) -> f32 {
        self.surface_config.height as f32 / self.surface_config.width as f32
    }

    fn rebuild_surfaces(&mut self, resolution: u32, copy_old: bool) {
        let plan = SurfacePlan::new(resolution, self.aspect());
        let new_set = SurfaceSet::allocate(&self.device, &self.queue, &plan);
        if copy_old {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Resize Encoder"),
                });
            new_set.copy_from(&self.surfaces, &mut encoder);
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        // The old set is unreachable from here on and freed with this drop.
        self.surfaces = new_set;
    }

    /// Drain the force queue and blend each entry into the density and
    /// velocity surfaces inside a hard-cutoff circle. Density uses a
    /// 1/21-weight moving average, velocity adds directly at half the
    /// radius.
    fn apply_forces(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let forces = self.forces.drain();
        if forces.is_empty() {
            return;
        }
        let radius = self.config.radius * self.config.base_resolution as f32;
        let speed = self.config.speed;
        for force in forces {
            let dye = AddDataParams {
                amount: [
                    force.color[0] as f32 / 255.0,
                    force.color[1] as f32 / 255.0,
                    force.color[2] as f32 / 255.0,
                    1.0,
                ],
                point: [force.x, force.y],
                radius,
                blend: 1,
            };
            let target = self.surfaces.density.write();
            self.programs.add_data.encode(
                &self.device,
                encoder,
                &target.view,
                target.format,
                &[self.surfaces.density.read()],
                Some(bytes_of(&dye)),
            );
            self.surfaces.density.swap();

            let kick = AddDataParams {
                amount: [force.vx * speed, force.vy * speed, 0.0, 1.0],
                point: [force.x, force.y],
                radius: 0.5 * radius,
                blend: 0,
            };
            let target = self.surfaces.velocity.write();
            self.programs.add_data.encode(
                &self.device,
                encoder,
                &target.view,
                target.format,
                &[self.surfaces.velocity.read()],
                Some(bytes_of(&kick)),
            );
            self.surfaces.velocity.swap();
        }
    }

    /// Vorticity confinement: measure curl, then feed it back into the
    /// velocity field as a rotational force.
    fn swirl(&mut self, encoder: &mut wgpu::CommandEncoder, dt: f32) {
        let px = pixel_params(self.surfaces.velocity.read());
        self.programs.curl.encode(
            &self.device,
            encoder,
            &self.surfaces.curl.view,
            self.surfaces.curl.format,
            &[self.surfaces.velocity.read()],
            Some(bytes_of(&px)),
        );

        let params = VorticityParams {
            pixel_size: px.pixel_size,
            curl_strength: self.config.swirl_factor,
            dt,
        };
        let target = self.surfaces.velocity.write();
        self.programs.vorticity.encode(
            &self.device,
            encoder,
            &target.view,
            target.format,
            &[self.surfaces.velocity.read(), &self.surfaces.curl],
            Some(bytes_of(&params)),
        );
        self.surfaces.velocity.swap();
    }

    /// Pressure projection: divergence, damped pressure seed, fixed-count
    /// Jacobi relaxation, gradient subtraction.
    fn project(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let px = pixel_params(self.surfaces.velocity.read());
        self.programs.divergence.encode(
            &self.device,
            encoder,
            &self.surfaces.divergence.view,
            self.surfaces.divergence.format,
            &[self.surfaces.velocity.read()],
            Some(bytes_of(&px)),
        );

        // Seed the solve with a decayed fraction of last frame's pressure.
        // A damping trick, not a physical reset.
        let seed = ClearParams {
            value: [self.config.pressure_factor, 1.0, 1.0, 1.0],
            constant: [0.0; 4],
        };
        let target = self.surfaces.pressure.write();
        self.programs.clear.encode(
            &self.device,
            encoder,
            &target.view,
            target.format,
            &[self.surfaces.pressure.read()],
            Some(bytes_of(&seed)),
        );
        self.surfaces.pressure.swap();

        for _ in 0..PRESSURE_ITERATIONS {
            let target = self.surfaces.pressure.write();
            self.programs.pressure.encode(
                &self.device,
                encoder,
                &target.view,
                target.format,
                &[self.surfaces.pressure.read(), &self.surfaces.divergence],
                Some(bytes_of(&px)),
            );
            self.surfaces.pressure.swap();
        }

        let target = self.surfaces.velocity.write();
        self.programs.gradient_subtract.encode(
            &self.device,
            encoder,
            &target.view,
            target.format,
            &[self.surfaces.pressure.read(), self.surfaces.velocity.read()],
            Some(bytes_of(&px)),
        );
        self.surfaces.velocity.swap();
    }

    /// Advect a double-buffered field along the velocity field.
    fn advect(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        field: FieldId,
        dt: f32,
        decay: f32,
    ) {
        let params = AdvectParams {
            dt,
            decay,
            _pad: [0.0; 2],
        };
        let pair = match field {
            FieldId::Velocity => &self.surfaces.velocity,
            FieldId::Density => &self.surfaces.density,
        };
        let target = pair.write();
        self.programs.advect.encode(
            &self.device,
            encoder,
            &target.view,
            target.format,
            &[self.surfaces.velocity.read(), pair.read()],
            Some(bytes_of(&params)),
        );
        match field {
            FieldId::Velocity => self.surfaces.velocity.swap(),
            FieldId::Density => self.surfaces.density.swap(),
        }
    }

    fn velocity_step(&mut self, encoder: &mut wgpu::CommandEncoder, dt: f32) {
        self.swirl(encoder, dt);
        self.project(encoder);
        self.advect(encoder, FieldId::Velocity, dt, self.config.decay_factor * 0.1);
    }

    fn density_step(&mut self, encoder: &mut wgpu::CommandEncoder, dt: f32) {
        self.advect(encoder, FieldId::Density, dt, self.config.decay_factor);
    }

    fn filter(&self, kind: FilterKind) -> &Filter {
        self.filters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| f)
            .expect("all filter kinds are registered at construction")
    }

    /// Post-process the density field into the scratch surface and draw
    /// it to the visible frame.
    fn draw(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        frame_view: &wgpu::TextureView,
        active_filters: &[FilterKind],
    ) {
        let target = self.surfaces.scratch.write();
        self.programs.post.copy.encode(
            &self.device,
            encoder,
            &target.view,
            target.format,
            &[self.surfaces.density.read()],
            None,
        );
        self.surfaces.scratch.swap();

        for kind in active_filters {
            let (src, dst) = self.surfaces.scratch.split();
            self.filter(*kind)
                .apply(&self.device, encoder, &self.programs.post, src, dst, 1);
            self.surfaces.scratch.swap();
        }
        if active_filters.contains(&FilterKind::Blur) {
            let (src, dst) = self.surfaces.scratch.split();
            self.filter(FilterKind::Blur)
                .apply(&self.device, encoder, &self.programs.post, src, dst, 2);
            self.surfaces.scratch.swap();
        }

        if self.config.bloom_intensity > 0.0 {
            apply_bloom(
                &self.device,
                encoder,
                &self.programs.post,
                self.filters
                    .iter()
                    .find(|(k, _)| *k == FilterKind::Blur)
                    .map(|(_, f)| f)
                    .expect("blur filter registered"),
                &self.surfaces.bloom,
                &mut self.surfaces.scratch,
                self.config.bloom_intensity,
            );
        }

        self.programs.display.encode(
            &self.device,
            encoder,
            frame_view,
            self.surface_config.format,
            &[self.surfaces.scratch.read()],
            None,
        );
    }
}

#[derive(Clone, Copy)]
enum FieldId {
    Velocity,
    Density,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_scales_velocity_to_quarter_resolution() {
        let plan = SurfacePlan::new(1024, 1.0);
        assert_eq!((plan.density.width, plan.density.height), (1024, 1024));
        assert_eq!((plan.velocity.width, plan.velocity.height), (256, 256));
        assert_eq!(plan.pressure.width, plan.velocity.width);
        assert_eq!(plan.divergence.width, plan.velocity.width);
        assert_eq!(plan.curl.width, plan.velocity.width);
        assert_eq!(plan.scratch.width, plan.density.width);
    }

    #[test]
    fn test_plan_bloom_chain_halves_each_level() {
        let plan = SurfacePlan::new(1024, 1.0);
        let widths: Vec<u32> = plan.bloom.iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![512, 256, 128, 64, 32]);
        for level in &plan.bloom {
            assert_eq!(level.format, wgpu::TextureFormat::Rgba8Unorm);
        }
    }

    #[test]
    fn test_plan_follows_aspect_ratio() {
        let plan = SurfacePlan::new(512, 0.5);
        assert_eq!((plan.density.width, plan.density.height), (512, 256));
        assert_eq!((plan.velocity.width, plan.velocity.height), (128, 64));
    }

    #[test]
    fn test_plan_after_resize_derives_from_new_resolution() {
        // The surface-set plan is a pure function of the target
        // resolution: after an update from 1024 to 512 every dimension
        // must report sizes derived from 512 alone.
        let before = SurfacePlan::new(1024, 1.0);
        let after = SurfacePlan::new(512, 1.0);
        assert_eq!(after.density.width, 512);
        assert_eq!(after.velocity.width, 128);
        assert_eq!(
            after.bloom.iter().map(|s| s.width).collect::<Vec<_>>(),
            vec![256, 128, 64, 32, 16]
        );
        assert_ne!(before.density.width, after.density.width);
    }

    #[test]
    fn test_plan_never_produces_zero_extents() {
        let plan = SurfacePlan::new(8, 1.0);
        assert!(plan.velocity.width >= 1);
        for level in &plan.bloom {
            assert!(level.width >= 1 && level.height >= 1);
        }
    }
}
