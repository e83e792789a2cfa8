//! Initial conditions: where particles start and with what velocity.
//!
//! Two kinds of sources are supported. A sweep source walks a regular
//! grid over energy, position and launch angles, which reproduces the
//! classic parameter scans. A volume source draws uniform random
//! starting points inside a named solid with isotropic directions.

use serde::{Deserialize, Serialize};
use ucn_geometry::GeometryModel;

use crate::fields::FieldSource;
use crate::motion::Equations;
use crate::sampling::RandomSource;
use crate::species::Species;
use crate::state::{from_cartesian, StateVector};

/// One starting configuration before it is turned into a state vector.
#[derive(Debug, Clone, Copy)]
pub struct InitialConditions {
    /// Total mechanical energy (eV).
    pub total_energy: f64,
    /// Starting point in cylindrical coordinates (m, rad, m).
    pub r: f64,
    pub phi: f64,
    pub z: f64,
    /// Azimuth of the launch direction (rad).
    pub alpha: f64,
    /// Polar launch angle from +z (rad).
    pub gamma: f64,
}

impl InitialConditions {
    /// Convert to a state vector, paying the potential energy at the
    /// starting point out of the total energy. Returns `None` when the
    /// point is energetically unreachable.
    pub fn state_vector(
        &self,
        equations: &Equations,
        field: &dyn FieldSource,
    ) -> Option<StateVector> {
        let fv = field.evaluate(self.r, self.phi, self.z, 0.0);
        let resting = [self.r, 0.0, self.z, 0.0, self.phi, 0.0];
        let e_kin = self.total_energy - equations.potential_energy(&resting, &fv);
        if e_kin <= 0.0 {
            return None;
        }
        let v = equations.species.speed_from_energy(e_kin);
        let (sin_g, cos_g) = self.gamma.sin_cos();
        let vz = v * cos_g;
        let vr = v * sin_g * (self.alpha - self.phi).cos();
        let v_phi = v * sin_g * (self.alpha - self.phi).sin();
        let omega = if self.r > 0.0 { v_phi / self.r } else { 0.0 };
        Some([self.r, vr, self.z, vz, self.phi, omega])
    }
}

/// An inclusive linear range walked in `steps` points. A single step
/// pins the value at `start`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepRange {
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default = "one")]
    pub steps: usize,
}

fn one() -> usize {
    1
}

impl SweepRange {
    pub fn fixed(value: f64) -> Self {
        Self {
            start: value,
            end: value,
            steps: 1,
        }
    }

    pub fn count(&self) -> usize {
        self.steps.max(1)
    }

    pub fn value(&self, i: usize) -> f64 {
        if self.steps <= 1 {
            self.start
        } else {
            self.start + (self.end - self.start) * i as f64 / (self.steps - 1) as f64
        }
    }
}

/// Regular grid over energy, position and launch angles.
///
/// Energies are in neV, angles in radians. The iterator is restartable
/// through [`SweepSource::reset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSource {
    /// Total energy sweep (neV).
    pub energy: SweepRange,
    pub r: SweepRange,
    pub phi: SweepRange,
    pub z: SweepRange,
    pub alpha: SweepRange,
    pub gamma: SweepRange,
    #[serde(skip)]
    cursor: usize,
}

impl SweepSource {
    pub fn total(&self) -> usize {
        self.energy.count()
            * self.r.count()
            * self.phi.count()
            * self.z.count()
            * self.alpha.count()
            * self.gamma.count()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

impl Iterator for SweepSource {
    type Item = InitialConditions;

    fn next(&mut self) -> Option<InitialConditions> {
        if self.cursor >= self.total() {
            return None;
        }
        let mut idx = self.cursor;
        self.cursor += 1;
        let mut take = |range: &SweepRange| {
            let i = idx % range.count();
            idx /= range.count();
            range.value(i)
        };
        // Innermost sweep first, energy outermost.
        let gamma = take(&self.gamma);
        let alpha = take(&self.alpha);
        let z = take(&self.z);
        let phi = take(&self.phi);
        let r = take(&self.r);
        let energy_nev = take(&self.energy);
        Some(InitialConditions {
            total_energy: energy_nev * 1e-9,
            r,
            phi,
            z,
            alpha,
            gamma,
        })
    }
}

/// Uniform random starts inside a named solid with isotropic launch
/// directions and uniform total energy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSource {
    /// Name of the solid to fill.
    pub solid: String,
    /// Total energy range (neV).
    pub energy_min: f64,
    pub energy_max: f64,
    /// Rejection attempts before giving up on a particle.
    #[serde(default = "default_retries")]
    pub max_retries: usize,
}

fn default_retries() -> usize {
    1_000_000
}

impl VolumeSource {
    /// Draw one starting configuration, or `None` when no point inside
    /// the solid was found within the retry budget.
    pub fn draw(
        &self,
        model: &GeometryModel,
        solid_idx: usize,
        random: &mut RandomSource,
    ) -> Option<InitialConditions> {
        let bounds = *model.bounds();
        for _ in 0..self.max_retries {
            let p = [
                random.uniform(bounds.min[0], bounds.max[0]),
                random.uniform(bounds.min[1], bounds.max[1]),
                random.uniform(bounds.min[2], bounds.max[2]),
            ];
            let inside = model.containing(&p, 0.0).ok()?;
            if inside.first() != Some(&solid_idx) {
                continue;
            }
            let dir = random.isotropic_direction();
            let y = from_cartesian(&p, &dir);
            return Some(InitialConditions {
                total_energy: random.uniform(self.energy_min, self.energy_max) * 1e-9,
                r: y[0],
                phi: y[4],
                z: y[2],
                alpha: dir[1].atan2(dir[0]),
                gamma: dir[2].clamp(-1.0, 1.0).acos(),
            });
        }
        None
    }
}

/// Pre-drawn decay time for a particle of the given species.
pub fn draw_decay_time(species: Species, random: &mut RandomSource) -> f64 {
    random.exponential(species.lifetime())
}
