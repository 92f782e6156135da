#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use cellpairs::{CellGrid, GridParameters, OverflowPolicy, Shear, Vector3D};
use cellpairs::potentials::LennardJones;

pub fn orthorhombic_grid() -> CellGrid {
    CellGrid::new(GridParameters {
        cutoff: 2.5,
        lengths: [8.0, 9.0, 10.0],
        shear: Shear::default(),
        grid: [3, 4, 4],
        capacity: 32,
        overflow: OverflowPolicy::Drop,
        lennard_jones: LennardJones::default(),
    }).expect("invalid grid")
}

pub fn sheared_grid() -> CellGrid {
    CellGrid::new(GridParameters {
        cutoff: 2.5,
        lengths: [8.0, 8.0, 8.0],
        shear: Shear { yx: 1.0, zx: 0.5, zy: -0.8 },
        grid: [4, 4, 4],
        capacity: 32,
        overflow: OverflowPolicy::Drop,
        lennard_jones: LennardJones { epsilon: 0.8, r_min: 1.1 },
    }).expect("invalid grid")
}

/// Particles on a jittered `n x n x n` lattice filling the box of `grid`,
/// each with its own tag
pub fn lattice(grid: &CellGrid, n: usize, jitter: f64, seed: u64) -> Vec<(u32, [f32; 3])> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut particles = Vec::new();
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let fractional = Vector3D::new(
                    (i as f64 + 0.5) / n as f64,
                    (j as f64 + 0.5) / n as f64,
                    (k as f64 + 0.5) / n as f64,
                );
                let noise = Vector3D::new(
                    rng.gen_range(-jitter..jitter),
                    rng.gen_range(-jitter..jitter),
                    rng.gen_range(-jitter..jitter),
                );
                let position = grid.geometry().cartesian(fractional) + noise;
                let tag = particles.len() as u32 + 1;
                particles.push((tag, position.to_f32()));
            }
        }
    }
    return particles;
}
