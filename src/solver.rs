//! Scalar Stable-Fluids grid solver.
//!
//! Operates on flat arrays representing a square domain of `n` cells per
//! side, padded to `(n + 2) x (n + 2)` so every interior cell has four
//! in-bounds neighbors. Each step is the classic operator split: add
//! sources, diffuse with a fixed 20-sweep Gauss-Seidel relaxation, advect
//! semi-Lagrangian along the velocity field. The velocity step projects
//! the field twice to keep it approximately divergence-free.
//!
//! The solver is purely numeric and does not guard degenerate input:
//! `n = 0` or non-finite values propagate NaN, matching the behavior of
//! the visual tuning this solver was calibrated against. Clamping here
//! would mask upstream bugs.

/// Number of relaxation sweeps used by both diffusion and the pressure
/// solve. Fixed; more sweeps trade cost for accuracy.
const RELAX_SWEEPS: usize = 20;

/// Boundary treatment for [`set_boundary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reflect {
    /// Copy interior values outward unchanged (free-slip). Used for
    /// density, pressure, and divergence.
    None,
    /// Negate across the two walls perpendicular to the x axis. Used for
    /// horizontal velocity.
    X,
    /// Negate across the two walls perpendicular to the y axis. Used for
    /// vertical velocity.
    Y,
}

/// Linear index into a padded `(n + 2) x (n + 2)` grid.
#[inline]
pub fn idx(i: usize, j: usize, n: usize) -> usize {
    i * (n + 2) + j
}

/// Reflect interior neighbor values onto the border.
///
/// The normal component of a velocity field is negated so flow cannot
/// leave the box; everything else is copied. Corners take the average of
/// their two adjacent edge cells. Must be re-applied after every
/// relaxation sweep, not just once per step.
pub fn set_boundary(n: usize, reflect: Reflect, x: &mut [f32]) {
    for k in 1..=n {
        x[idx(0, k, n)] = if reflect == Reflect::X { -x[idx(1, k, n)] } else { x[idx(1, k, n)] };
        x[idx(n + 1, k, n)] =
            if reflect == Reflect::X { -x[idx(n, k, n)] } else { x[idx(n, k, n)] };
        x[idx(k, 0, n)] = if reflect == Reflect::Y { -x[idx(k, 1, n)] } else { x[idx(k, 1, n)] };
        x[idx(k, n + 1, n)] =
            if reflect == Reflect::Y { -x[idx(k, n, n)] } else { x[idx(k, n, n)] };
    }
    x[idx(0, 0, n)] = 0.5 * (x[idx(1, 0, n)] + x[idx(0, 1, n)]);
    x[idx(0, n + 1, n)] = 0.5 * (x[idx(1, n + 1, n)] + x[idx(0, n, n)]);
    x[idx(n + 1, 0, n)] = 0.5 * (x[idx(n, 0, n)] + x[idx(n + 1, 1, n)]);
    x[idx(n + 1, n + 1, n)] = 0.5 * (x[idx(n, n + 1, n)] + x[idx(n + 1, n, n)]);
}

/// `x += dt * source` over the whole padded grid.
pub fn add_source(n: usize, x: &mut [f32], source: &[f32], dt: f32) {
    let size = (n + 2) * (n + 2);
    for i in 0..size {
        x[i] += dt * source[i];
    }
}

/// Implicit diffusion, solved by Gauss-Seidel relaxation of
/// `x = (x0 + a * sum(neighbors)) / (1 + 4a)` with `a = diff * dt * n^2`.
pub fn diffuse(n: usize, reflect: Reflect, x: &mut [f32], x0: &[f32], diff: f32, dt: f32) {
    let a = diff * dt * (n * n) as f32;
    for _ in 0..RELAX_SWEEPS {
        for i in 1..=n {
            for j in 1..=n {
                x[idx(i, j, n)] = (x0[idx(i, j, n)]
                    + a * (x[idx(i + 1, j, n)]
                        + x[idx(i - 1, j, n)]
                        + x[idx(i, j + 1, n)]
                        + x[idx(i, j - 1, n)]))
                    / (1.0 + 4.0 * a);
            }
        }
        set_boundary(n, reflect, x);
    }
}

/// Semi-Lagrangian advection: trace each interior cell backward along the
/// velocity field by `dt * n`, clamp the source point into
/// `[0.5, n + 0.5]`, and bilinearly interpolate the previous field there.
/// Unconditionally stable for any velocity magnitude.
pub fn advect(
    n: usize,
    reflect: Reflect,
    d: &mut [f32],
    d0: &[f32],
    u: &[f32],
    v: &[f32],
    dt: f32,
) {
    let dt0 = dt * n as f32;
    for i in 1..=n {
        for j in 1..=n {
            let mut x = i as f32 - dt0 * u[idx(i, j, n)];
            let mut y = j as f32 - dt0 * v[idx(i, j, n)];
            x = x.clamp(0.5, n as f32 + 0.5);
            y = y.clamp(0.5, n as f32 + 0.5);
            debug_assert!((0.5..=n as f32 + 0.5).contains(&x));
            debug_assert!((0.5..=n as f32 + 0.5).contains(&y));
            let i0 = x.floor() as usize;
            let i1 = i0 + 1;
            let j0 = y.floor() as usize;
            let j1 = j0 + 1;
            let s1 = x - i0 as f32;
            let s0 = 1.0 - s1;
            let t1 = y - j0 as f32;
            let t0 = 1.0 - t1;
            d[idx(i, j, n)] = s0 * (t0 * d0[idx(i0, j0, n)] + t1 * d0[idx(i0, j1, n)])
                + s1 * (t0 * d0[idx(i1, j0, n)] + t1 * d0[idx(i1, j1, n)]);
        }
    }
    set_boundary(n, reflect, d);
}

/// Pressure projection: compute divergence by central differences, relax a
/// pressure field against it from a zero initial guess, then subtract the
/// pressure gradient from the velocity.
pub fn project(n: usize, u: &mut [f32], v: &mut [f32], p: &mut [f32], div: &mut [f32]) {
    let h = 1.0 / n as f32;
    for i in 1..=n {
        for j in 1..=n {
            div[idx(i, j, n)] = -0.5
                * h
                * (u[idx(i + 1, j, n)] - u[idx(i - 1, j, n)] + v[idx(i, j + 1, n)]
                    - v[idx(i, j - 1, n)]);
            p[idx(i, j, n)] = 0.0;
        }
    }
    set_boundary(n, Reflect::None, div);
    set_boundary(n, Reflect::None, p);
    for _ in 0..RELAX_SWEEPS {
        for i in 1..=n {
            for j in 1..=n {
                p[idx(i, j, n)] = (div[idx(i, j, n)]
                    + p[idx(i - 1, j, n)]
                    + p[idx(i + 1, j, n)]
                    + p[idx(i, j - 1, n)]
                    + p[idx(i, j + 1, n)])
                    / 4.0;
            }
        }
        set_boundary(n, Reflect::None, p);
    }
    for i in 1..=n {
        for j in 1..=n {
            u[idx(i, j, n)] -= 0.5 * (p[idx(i + 1, j, n)] - p[idx(i - 1, j, n)]) / h;
            v[idx(i, j, n)] -= 0.5 * (p[idx(i, j + 1, n)] - p[idx(i, j - 1, n)]) / h;
        }
    }
    set_boundary(n, Reflect::X, u);
    set_boundary(n, Reflect::Y, v);
}

/// One density step: add sources from `x0`, diffuse into `x0`, advect back
/// into `x`. The source array doubles as the scratch buffer, so both
/// arrays are mutated.
pub fn density_step(
    n: usize,
    x: &mut [f32],
    x0: &mut [f32],
    u: &[f32],
    v: &[f32],
    diff: f32,
    dt: f32,
) {
    add_source(n, x, x0, dt);
    diffuse(n, Reflect::None, x0, x, diff, dt);
    advect(n, Reflect::None, x, x0, u, v, dt);
}

/// One velocity step: add sources, diffuse both components, project,
/// self-advect, project again. `u0`/`v0` double as scratch buffers.
pub fn velocity_step(
    n: usize,
    u: &mut [f32],
    v: &mut [f32],
    u0: &mut [f32],
    v0: &mut [f32],
    visc: f32,
    dt: f32,
) {
    add_source(n, u, u0, dt);
    add_source(n, v, v0, dt);
    diffuse(n, Reflect::X, u0, u, visc, dt);
    diffuse(n, Reflect::Y, v0, v, visc, dt);
    project(n, u0, v0, u, v);
    advect(n, Reflect::X, u, u0, u0, v0, dt);
    advect(n, Reflect::Y, v, v0, u0, v0, dt);
    project(n, u, v, u0, v0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn grid(n: usize) -> Vec<f32> {
        vec![0.0; (n + 2) * (n + 2)]
    }

    /// Mean absolute central-difference divergence over the interior.
    fn mean_divergence(n: usize, u: &[f32], v: &[f32]) -> f32 {
        let h = 1.0 / n as f32;
        let mut total = 0.0;
        for i in 1..=n {
            for j in 1..=n {
                let div = -0.5
                    * h
                    * (u[idx(i + 1, j, n)] - u[idx(i - 1, j, n)] + v[idx(i, j + 1, n)]
                        - v[idx(i, j - 1, n)]);
                total += div.abs();
            }
        }
        total / (n * n) as f32
    }

    #[test]
    fn test_corner_is_average_of_adjacent_edges() {
        for n in [3usize, 8, 33] {
            for reflect in [Reflect::None, Reflect::X, Reflect::Y] {
                let mut x = grid(n);
                for i in 1..=n {
                    for j in 1..=n {
                        x[idx(i, j, n)] = (i * 31 + j * 7) as f32 * 0.01;
                    }
                }
                set_boundary(n, reflect, &mut x);
                let corners = [
                    (idx(0, 0, n), idx(1, 0, n), idx(0, 1, n)),
                    (idx(0, n + 1, n), idx(1, n + 1, n), idx(0, n, n)),
                    (idx(n + 1, 0, n), idx(n, 0, n), idx(n + 1, 1, n)),
                    (idx(n + 1, n + 1, n), idx(n, n + 1, n), idx(n + 1, n, n)),
                ];
                for (corner, a, b) in corners {
                    assert_eq!(x[corner], 0.5 * (x[a] + x[b]));
                }
            }
        }
    }

    #[test]
    fn test_boundary_negates_normal_component() {
        let n = 6;
        let mut u = grid(n);
        for j in 1..=n {
            u[idx(1, j, n)] = 2.5;
            u[idx(n, j, n)] = -1.5;
        }
        set_boundary(n, Reflect::X, &mut u);
        for j in 1..=n {
            assert_eq!(u[idx(0, j, n)], -2.5);
            assert_eq!(u[idx(n + 1, j, n)], 1.5);
        }
        // Tangential walls copy unchanged.
        assert_eq!(u[idx(3, 0, n)], u[idx(3, 1, n)]);
    }

    #[test]
    fn test_density_step_is_identity_without_sources_or_flow() {
        let n = 16;
        let mut dens = grid(n);
        let mut source = grid(n);
        let u = grid(n);
        let v = grid(n);
        for i in 1..=n {
            for j in 1..=n {
                dens[idx(i, j, n)] = ((i + j) % 5) as f32 * 0.2;
            }
        }
        set_boundary(n, Reflect::None, &mut dens);
        let before = dens.clone();
        density_step(n, &mut dens, &mut source, &u, &v, 0.0, 0.3);
        for (a, b) in dens.iter().zip(before.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_projection_reduces_divergence() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for n in [8usize, 24] {
            let mut u = grid(n);
            let mut v = grid(n);
            let mut p = grid(n);
            let mut div = grid(n);
            for i in 1..=n {
                for j in 1..=n {
                    u[idx(i, j, n)] = rng.gen_range(-1.0..1.0);
                    v[idx(i, j, n)] = rng.gen_range(-1.0..1.0);
                }
            }
            set_boundary(n, Reflect::X, &mut u);
            set_boundary(n, Reflect::Y, &mut v);
            let before = mean_divergence(n, &u, &v);
            project(n, &mut u, &mut v, &mut p, &mut div);
            let after = mean_divergence(n, &u, &v);
            assert!(
                after < before,
                "divergence did not decrease for n={}: {} -> {}",
                n,
                before,
                after
            );
        }
    }

    #[test]
    fn test_advection_backtrace_is_clamped() {
        let n = 10;
        let mut d = grid(n);
        let mut d0 = grid(n);
        for i in 1..=n {
            for j in 1..=n {
                d0[idx(i, j, n)] = 1.0;
            }
        }
        set_boundary(n, Reflect::None, &mut d0);
        // A velocity six orders of magnitude past anything reasonable must
        // not read outside the padded grid or produce non-finite output.
        let u = vec![1.0e6; (n + 2) * (n + 2)];
        let v = vec![-1.0e6; (n + 2) * (n + 2)];
        advect(n, Reflect::None, &mut d, &d0, &u, &v, 0.1);
        for value in &d {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_add_source_scales_by_dt() {
        let n = 4;
        let mut x = grid(n);
        let mut s = grid(n);
        s[idx(2, 2, n)] = 10.0;
        add_source(n, &mut x, &s, 0.5);
        assert_eq!(x[idx(2, 2, n)], 5.0);
    }
}
