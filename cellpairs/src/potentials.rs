//! Pair operators computing Lennard-Jones energies and gradients.
//!
//! The potential is written in terms of the position of the minimum `r_min`
//! and the well depth `epsilon`:
//!
//! ```text
//! E(r) = epsilon * [(r_min / r)^12 - 2 (r_min / r)^6]
//! ```
//!
//! All kernels work on squared distances and never take square roots.
use crate::cells::{CellEnergy, CellGradient};
use crate::reduce::PairOperator;
use crate::Error;

/// Lennard-Jones energy for `epsilon = r_min = 1`, as a function of the
/// squared distance `r2`
#[inline]
pub fn lj_energy(r2: f32) -> f32 {
    let ir2 = 1.0 / r2;
    let ir6 = ir2 * ir2 * ir2;
    let ir12 = ir6 * ir6;
    return f32::mul_add(-2.0, ir6, ir12);
}

/// Twice the derivative of the Lennard-Jones energy with respect to the
/// squared distance, for `epsilon = r_min = 1`.
///
/// The gradient of [`lj_energy`] with respect to the near particle position
/// is `lj_two_de_dr2(r2) * (near - far)`.
#[inline]
pub fn lj_two_de_dr2(r2: f32) -> f32 {
    let ir2 = 1.0 / r2;
    let ir6 = ir2 * ir2 * ir2;
    let ir8 = ir6 * ir2;
    let ir14 = ir8 * ir6;
    return 12.0 * (ir8 - ir14);
}

/// Parameters of the Lennard-Jones potential
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LennardJones {
    /// depth of the potential well
    #[serde(default = "default_one")]
    pub epsilon: f64,
    /// distance of the potential minimum
    #[serde(default = "default_one")]
    pub r_min: f64,
}

fn default_one() -> f64 {
    1.0
}

impl Default for LennardJones {
    fn default() -> LennardJones {
        LennardJones {
            epsilon: 1.0,
            r_min: 1.0,
        }
    }
}

impl LennardJones {
    /// Check that these parameters define a valid potential
    pub fn validate(&self) -> Result<(), Error> {
        if !self.epsilon.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "Lennard-Jones epsilon must be a finite number, got {}", self.epsilon
            )));
        }

        if !(self.r_min.is_finite() && self.r_min > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "Lennard-Jones r_min must be a positive number, got {}", self.r_min
            )));
        }

        return Ok(());
    }
}

/// Lennard-Jones potential in the form used by the kernels, with pairs
/// further than the cutoff ignored
#[derive(Debug, Clone, Copy)]
struct Kernel {
    epsilon: f32,
    inv_r_min2: f32,
    cutoff2: f32,
}

impl Kernel {
    fn new(parameters: LennardJones, cutoff: f64) -> Result<Kernel, Error> {
        parameters.validate()?;
        if cutoff.is_nan() || cutoff <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Lennard-Jones cutoff must be positive, got {}", cutoff
            )));
        }

        return Ok(Kernel {
            epsilon: parameters.epsilon as f32,
            inv_r_min2: (1.0 / (parameters.r_min * parameters.r_min)) as f32,
            cutoff2: (cutoff * cutoff) as f32,
        });
    }

    #[inline]
    fn distance2(dx: f32, dy: f32, dz: f32) -> f32 {
        f32::mul_add(dz, dz, f32::mul_add(dy, dy, dx * dx))
    }

    #[inline]
    fn energy(&self, r2: f32) -> f32 {
        self.epsilon * lj_energy(r2 * self.inv_r_min2)
    }

    #[inline]
    fn two_de_dr2(&self, r2: f32) -> f32 {
        self.epsilon * self.inv_r_min2 * lj_two_de_dr2(r2 * self.inv_r_min2)
    }
}

/// Pair operator computing the Lennard-Jones energy of every particle.
///
/// Each pair energy is seen by both particles, so the accumulated energy is
/// halved when writing the output: the sum of all particles energies is the
/// total energy of the system.
#[derive(Debug, Clone, Copy)]
pub struct LennardJonesEnergy {
    kernel: Kernel,
}

impl Default for LennardJonesEnergy {
    fn default() -> LennardJonesEnergy {
        LennardJonesEnergy {
            kernel: Kernel {
                epsilon: 1.0,
                inv_r_min2: 1.0,
                cutoff2: f32::INFINITY,
            },
        }
    }
}

impl LennardJonesEnergy {
    /// Create a new energy operator, ignoring all pairs further than
    /// `cutoff`. The cutoff can be infinite to include all pairs.
    pub fn new(parameters: LennardJones, cutoff: f64) -> Result<LennardJonesEnergy, Error> {
        Ok(LennardJonesEnergy {
            kernel: Kernel::new(parameters, cutoff)?,
        })
    }

    /// Get the energy of a single pair separated by `(dx, dy, dz)`
    pub fn pair_energy(&self, dx: f32, dy: f32, dz: f32) -> f32 {
        let r2 = Kernel::distance2(dx, dy, dz);
        if r2 > self.kernel.cutoff2 {
            return 0.0;
        }
        return self.kernel.energy(r2);
    }
}

impl PairOperator for LennardJonesEnergy {
    type Output = CellEnergy;
    type Accumulator = f64;

    #[inline]
    fn pair(&self, energy: &mut f64, dx: f32, dy: f32, dz: f32) {
        *energy += f64::from(self.pair_energy(dx, dy, dz));
    }

    fn finalize(&self, output: &mut CellEnergy, energy: f64, tag: u32, lane: usize) {
        output.tags[lane] = tag;
        output.energy[lane] = if tag == 0 { 0.0 } else { 0.5 * energy };
    }
}

/// Pair operator computing the gradient of the Lennard-Jones energy with
/// respect to the position of every particle. The forces acting on the
/// particles are the opposite of this gradient.
#[derive(Debug, Clone, Copy)]
pub struct LennardJonesGradient {
    kernel: Kernel,
}

impl Default for LennardJonesGradient {
    fn default() -> LennardJonesGradient {
        LennardJonesGradient {
            kernel: LennardJonesEnergy::default().kernel,
        }
    }
}

impl LennardJonesGradient {
    /// Create a new gradient operator, ignoring all pairs further than
    /// `cutoff`. The cutoff can be infinite to include all pairs.
    pub fn new(parameters: LennardJones, cutoff: f64) -> Result<LennardJonesGradient, Error> {
        Ok(LennardJonesGradient {
            kernel: Kernel::new(parameters, cutoff)?,
        })
    }
}

impl PairOperator for LennardJonesGradient {
    type Output = CellGradient;
    type Accumulator = [f32; 3];

    #[inline]
    fn pair(&self, gradient: &mut [f32; 3], dx: f32, dy: f32, dz: f32) {
        let r2 = Kernel::distance2(dx, dy, dz);
        if r2 > self.kernel.cutoff2 {
            return;
        }

        let factor = self.kernel.two_de_dr2(r2);
        gradient[0] = f32::mul_add(factor, dx, gradient[0]);
        gradient[1] = f32::mul_add(factor, dy, gradient[1]);
        gradient[2] = f32::mul_add(factor, dz, gradient[2]);
    }

    fn finalize(&self, output: &mut CellGradient, gradient: [f32; 3], tag: u32, lane: usize) {
        output.tags[lane] = tag;
        output.gradient[lane] = if tag == 0 { [0.0; 3] } else { gradient };
    }
}
