//! CPU fluid engine.
//!
//! Drives one [`solver`](crate::solver) grid per dye color. Each channel
//! owns its velocity and density fields plus a pending-update array that
//! external drivers write into; updates are consumed exactly once at the
//! start of the next step, and a later write to the same cell within a
//! frame overwrites the earlier one rather than accumulating.
//!
//! Output is rasterized into an RGBA8 image sized `(n + 2) x (n + 2)`,
//! compositing every channel's density as coverage over black.

use crate::solver::{self, idx};

/// Reference grid size the tuning constants were calibrated at. All step
/// parameters scale linearly with `n / BASE_N`.
const BASE_N: usize = 100;

#[derive(Clone, Copy, Debug)]
struct StepParams {
    visc: f32,
    diff: f32,
    dt: f32,
    vx: f32,
    vy: f32,
}

impl StepParams {
    fn for_size(n: usize) -> Self {
        let scale = n as f32 / BASE_N as f32;
        Self {
            visc: 0.0000001 * scale,
            diff: 0.0000001 * scale,
            dt: 0.3 * scale,
            vx: 5.0 * scale,
            vy: 5.0 * scale,
        }
    }
}

/// Per-color simulation state.
struct Channel {
    color: [u8; 3],
    u: Vec<f32>,
    v: Vec<f32>,
    u_prev: Vec<f32>,
    v_prev: Vec<f32>,
    dens: Vec<f32>,
    dens_prev: Vec<f32>,
    /// Pending (density, vx, vy) perturbations, one slot per cell.
    updates: Vec<[f32; 3]>,
}

impl Channel {
    fn new(n: usize, color: [u8; 3]) -> Self {
        let size = (n + 2) * (n + 2);
        Self {
            color,
            u: vec![0.0; size],
            v: vec![0.0; size],
            u_prev: vec![0.0; size],
            v_prev: vec![0.0; size],
            dens: vec![0.0; size],
            dens_prev: vec![0.0; size],
            updates: vec![[0.0; 3]; size],
        }
    }

    /// Move pending perturbations into the source arrays and clear them.
    fn consume_updates(&mut self, n: usize) {
        for i in 0..n + 2 {
            for j in 0..n + 2 {
                let cell = idx(i, j, n);
                let [d, u, v] = self.updates[cell];
                self.dens_prev[cell] = d;
                self.u_prev[cell] = u;
                self.v_prev[cell] = v;
                self.updates[cell] = [0.0; 3];
            }
        }
    }
}

/// CPU engine: one padded grid per dye color.
pub struct CpuFluid {
    n: usize,
    channels: Vec<Channel>,
}

impl CpuFluid {
    /// Create an engine with one simulation channel per color.
    pub fn new(n: usize, colors: &[[u8; 3]]) -> Self {
        Self {
            n,
            channels: colors.iter().map(|&c| Channel::new(n, c)).collect(),
        }
    }

    /// Simulation size, excluding the boundary padding.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Output image side length, including the boundary cells.
    pub fn image_size(&self) -> usize {
        self.n + 2
    }

    /// Queue a dye-and-velocity perturbation at cell `(i, j)`.
    ///
    /// Dye lands only in `channel`; the velocity kick goes to every
    /// channel so the fluids move together. Out-of-range cells and
    /// channels are ignored. Writing the same cell twice within a frame
    /// overwrites the earlier entry.
    pub fn inject(&mut self, i: usize, j: usize, channel: usize) {
        if i >= self.n + 2 || j >= self.n + 2 || channel >= self.channels.len() {
            return;
        }
        let params = StepParams::for_size(self.n);
        let cell = idx(i, j, self.n);
        let dens = params.vx * params.vy * 2.0;
        self.channels[channel].updates[cell] = [dens, 0.0, 0.0];
        for ch in &mut self.channels {
            ch.updates[cell][1] = params.vx;
            ch.updates[cell][2] = params.vy;
        }
    }

    /// Advance every channel by one frame: consume pending updates, run
    /// the velocity step, then the density step.
    pub fn step(&mut self) {
        let n = self.n;
        let params = StepParams::for_size(n);
        for ch in &mut self.channels {
            ch.consume_updates(n);
            solver::velocity_step(
                n,
                &mut ch.u,
                &mut ch.v,
                &mut ch.u_prev,
                &mut ch.v_prev,
                params.visc,
                params.dt,
            );
            solver::density_step(
                n,
                &mut ch.dens,
                &mut ch.dens_prev,
                &ch.u,
                &ch.v,
                params.diff,
                params.dt,
            );
        }
    }

    /// Composite all channels into an RGBA8 image of side
    /// [`image_size`](Self::image_size). Density is clamped to `[0, 1]`
    /// and used as source-over coverage, brightest dye last on top.
    pub fn rasterize(&self, out: &mut [u8]) {
        let side = self.n + 2;
        assert_eq!(out.len(), side * side * 4, "output buffer size mismatch");
        out.fill(0);
        for i in 0..side {
            for j in 0..side {
                let cell = idx(i, j, self.n);
                let pixel = (j * side + i) * 4;
                let mut rgb = [0.0f32; 3];
                for ch in &self.channels {
                    let a = ch.dens[cell].clamp(0.0, 1.0);
                    for c in 0..3 {
                        rgb[c] = ch.color[c] as f32 * a + rgb[c] * (1.0 - a);
                    }
                }
                out[pixel] = rgb[0].round() as u8;
                out[pixel + 1] = rgb[1].round() as u8;
                out[pixel + 2] = rgb[2].round() as u8;
                out[pixel + 3] = 255;
            }
        }
    }

    /// Rebuild every channel at a new grid size, discarding all state.
    pub fn resize(&mut self, n: usize) {
        let colors: Vec<[u8; 3]> = self.channels.iter().map(|c| c.color).collect();
        self.n = n;
        self.channels = colors.into_iter().map(|c| Channel::new(n, c)).collect();
    }

    /// Clear all fields back to rest, keeping size and colors.
    pub fn reset(&mut self) {
        let n = self.n;
        for ch in &mut self.channels {
            *ch = Channel::new(n, ch.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_then_step_deposits_dye() {
        let mut fluid = CpuFluid::new(32, &[[255, 255, 255]]);
        let center = 16;
        fluid.inject(center, center, 0);
        fluid.step();
        assert!(fluid.channels[0].dens[idx(center, center, 32)] > 0.0);
    }

    #[test]
    fn test_updates_consumed_exactly_once() {
        let mut fluid = CpuFluid::new(16, &[[200, 10, 10]]);
        fluid.inject(8, 8, 0);
        fluid.step();
        let after_first = fluid.channels[0].dens[idx(8, 8, 16)];
        assert!(after_first > 0.0);
        // With the update consumed, the second step only decays.
        fluid.step();
        let after_second = fluid.channels[0].dens[idx(8, 8, 16)];
        assert!(after_second < after_first + 1e-6);
        assert_eq!(fluid.channels[0].updates[idx(8, 8, 16)], [0.0; 3]);
    }

    #[test]
    fn test_reinjection_overwrites_pending_cell() {
        let mut fluid = CpuFluid::new(16, &[[200, 10, 10]]);
        fluid.inject(8, 8, 0);
        let once = fluid.channels[0].updates[idx(8, 8, 16)];
        fluid.inject(8, 8, 0);
        let twice = fluid.channels[0].updates[idx(8, 8, 16)];
        assert_eq!(once, twice);
    }

    #[test]
    fn test_velocity_kick_reaches_all_channels() {
        let mut fluid = CpuFluid::new(16, &[[255, 0, 0], [0, 0, 255]]);
        fluid.inject(4, 4, 0);
        let cell = idx(4, 4, 16);
        assert!(fluid.channels[0].updates[cell][0] > 0.0);
        assert_eq!(fluid.channels[1].updates[cell][0], 0.0);
        assert!(fluid.channels[1].updates[cell][1] > 0.0);
        assert!(fluid.channels[1].updates[cell][2] > 0.0);
    }

    #[test]
    fn test_out_of_range_inject_is_ignored() {
        let mut fluid = CpuFluid::new(8, &[[1, 2, 3]]);
        fluid.inject(100, 100, 0);
        fluid.inject(4, 4, 9);
        assert!(fluid.channels[0].updates.iter().all(|u| *u == [0.0; 3]));
    }

    #[test]
    fn test_rasterize_clamps_density() {
        let mut fluid = CpuFluid::new(4, &[[10, 200, 250]]);
        // Saturate one cell far past 1.0.
        let cell = idx(2, 2, 4);
        fluid.channels[0].dens[cell] = 50.0;
        let side = fluid.image_size();
        let mut out = vec![0u8; side * side * 4];
        fluid.rasterize(&mut out);
        let pixel = (2 * side + 2) * 4;
        assert_eq!(&out[pixel..pixel + 4], &[10, 200, 250, 255]);
    }

    #[test]
    fn test_resize_discards_state() {
        let mut fluid = CpuFluid::new(16, &[[255, 255, 255]]);
        fluid.inject(8, 8, 0);
        fluid.step();
        fluid.resize(24);
        assert_eq!(fluid.size(), 24);
        assert!(fluid.channels[0].dens.iter().all(|&d| d == 0.0));
    }
}
