//! Benchmarks for the CPU grid solver.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use fluxel::solver::{self, idx};

const N: usize = 100;

fn seeded_field(scale: f32) -> Vec<f32> {
    let mut field = vec![0.0f32; (N + 2) * (N + 2)];
    for i in 1..=N {
        for j in 1..=N {
            field[idx(i, j, N)] = scale * ((i * 13 + j * 7) % 17) as f32 / 17.0;
        }
    }
    field
}

fn bench_velocity_step(c: &mut Criterion) {
    c.bench_function("velocity_step_100", |b| {
        let mut u = seeded_field(1.0);
        let mut v = seeded_field(-1.0);
        let mut u0 = seeded_field(0.1);
        let mut v0 = seeded_field(0.1);
        b.iter(|| {
            solver::velocity_step(
                N,
                black_box(&mut u),
                black_box(&mut v),
                &mut u0,
                &mut v0,
                0.0000001,
                0.3,
            );
        });
    });
}

fn bench_density_step(c: &mut Criterion) {
    c.bench_function("density_step_100", |b| {
        let mut dens = seeded_field(0.5);
        let mut source = seeded_field(0.2);
        let u = seeded_field(1.0);
        let v = seeded_field(-1.0);
        b.iter(|| {
            solver::density_step(
                N,
                black_box(&mut dens),
                &mut source,
                &u,
                &v,
                0.0000001,
                0.3,
            );
        });
    });
}

criterion_group!(benches, bench_velocity_step, bench_density_step);
criterion_main!(benches);
