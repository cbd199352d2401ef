//! Simulation configuration.
//!
//! `FluidConfig` is a plain value type: the engine keeps its own
//! authoritative copy and only merges explicit updates passed to
//! [`update_config`](crate::FluidEngine::update_config). Reading the
//! configuration always yields a snapshot copy, never a live reference,
//! so external code cannot mutate engine state behind its back.

use crate::error::InputError;

/// Tunable parameters shared by the GPU engine and its callers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluidConfig {
    /// Reference resolution used to scale the force-injection radius.
    pub base_resolution: u32,

    /// Resolution of the density/color surfaces. Velocity and pressure run
    /// at a quarter of this. Changing it rebuilds every surface.
    pub current_resolution: u32,

    /// Force-injection radius in normalized units, scaled by
    /// `base_resolution` at injection time.
    pub radius: f32,

    /// Multiplier applied to injected velocities.
    pub speed: f32,

    /// Dissipation rate for density advection. Velocity advection uses a
    /// tenth of this value.
    pub decay_factor: f32,

    /// Vorticity-confinement strength. Higher values preserve and amplify
    /// small rotational features.
    pub swirl_factor: f32,

    /// Fraction of the previous frame's pressure kept as the relaxation
    /// seed. A damping trick, not a physical quantity.
    pub pressure_factor: f32,

    /// Bloom contribution in the final composite. Zero disables the bloom
    /// chain entirely.
    pub bloom_intensity: f32,
}

impl FluidConfig {
    /// Set the density-surface resolution.
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.current_resolution = resolution;
        self
    }

    /// Set the force-injection radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Set the injected-velocity multiplier.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the density dissipation rate.
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay_factor = decay;
        self
    }

    /// Set the vorticity-confinement strength.
    pub fn with_swirl(mut self, swirl: f32) -> Self {
        self.swirl_factor = swirl;
        self
    }

    /// Set the pressure-seed damping factor.
    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure_factor = pressure;
        self
    }

    /// Set the bloom intensity.
    pub fn with_bloom(mut self, intensity: f32) -> Self {
        self.bloom_intensity = intensity;
        self
    }

    /// Check that the resolutions can back a real surface set.
    ///
    /// `max_dimension` is the device's 2D texture limit. On error nothing
    /// has been merged and the previous configuration stays in effect.
    pub fn validate(&self, max_dimension: u32) -> Result<(), InputError> {
        if self.current_resolution == 0 || self.base_resolution == 0 {
            return Err(InputError::ZeroResolution);
        }
        if self.current_resolution > max_dimension {
            return Err(InputError::ResolutionTooLarge {
                requested: self.current_resolution,
                max: max_dimension,
            });
        }
        Ok(())
    }
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            base_resolution: 1024,
            current_resolution: 1024,
            radius: 0.00001,
            speed: 1.0,
            decay_factor: 0.2,
            swirl_factor: 10.0,
            pressure_factor: 0.1,
            bloom_intensity: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = FluidConfig::default();
        assert!(config.validate(8192).is_ok());
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let config = FluidConfig::default().with_resolution(0);
        assert_eq!(config.validate(8192), Err(InputError::ZeroResolution));
    }

    #[test]
    fn test_oversized_resolution_rejected() {
        let config = FluidConfig::default().with_resolution(16384);
        assert_eq!(
            config.validate(8192),
            Err(InputError::ResolutionTooLarge {
                requested: 16384,
                max: 8192
            })
        );
    }

    #[test]
    fn test_builder_setters() {
        let config = FluidConfig::default()
            .with_resolution(512)
            .with_swirl(5.0)
            .with_bloom(0.0);
        assert_eq!(config.current_resolution, 512);
        assert_eq!(config.swirl_factor, 5.0);
        assert_eq!(config.bloom_intensity, 0.0);
        // Untouched fields keep their defaults.
        assert_eq!(config.pressure_factor, 0.1);
    }
}
