//! Equations of motion in cylindrical coordinates.
//!
//! Neutrons feel gravity and the Stern-Gerlach force from the gradient
//! of |B|; protons and electrons feel gravity and the Lorentz force.
//! The electron gets a velocity-dependent mass correction, which is
//! enough at beta-decay energies.

use thiserror::Error;

use crate::constants::{ELEMENTARY_CHARGE, GRAVITY, LIGHT_SPEED, MU_NEUTRON_SI};
use crate::fields::FieldValue;
use crate::species::Species;
use crate::state::{speed, StateVector};

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Non-finite derivative at t = {t} (r = {r})")]
    NonFinite { t: f64, r: f64 },
}

/// Right-hand side of the equations of motion for one particle.
#[derive(Debug, Clone, Copy)]
pub struct Equations {
    pub species: Species,
    /// Spin projection on the field, +1 for low-field seekers. Only
    /// meaningful for neutrons.
    pub polarization: f64,
}

impl Equations {
    pub fn new(species: Species) -> Self {
        Self {
            species,
            polarization: 1.0,
        }
    }

    /// Evaluate dy/dt at `(t, y)` under the given field.
    pub fn derivs(
        &self,
        t: f64,
        y: &StateVector,
        field: &FieldValue,
    ) -> Result<StateVector, MotionError> {
        let r = y[0];
        let vr = y[1];
        let vz = y[3];
        let omega = y[5];

        let mut dy = [0.0; 6];
        dy[0] = vr;
        dy[2] = vz;
        dy[4] = omega;

        match self.species {
            Species::Neutron => {
                // Low-field seekers are pushed down the |B| gradient.
                let mu_ev = MU_NEUTRON_SI / ELEMENTARY_CHARGE;
                let mumb = -self.polarization * mu_ev / self.species.mass_ev();
                dy[1] = r * omega * omega + mumb * field.grad_babs[0];
                dy[3] = mumb * field.grad_babs[2] - GRAVITY;
                dy[5] = (-2.0 * vr * omega + mumb * field.grad_babs[1] / r) / r;
            }
            Species::Proton | Species::Electron => {
                let mut qm = self.species.charge_sign() / self.species.mass_ev();
                if self.species == Species::Electron {
                    // Crude relativistic correction: scale q/m by 1/gamma.
                    let beta2 = (speed(y) / LIGHT_SPEED).powi(2);
                    qm *= (1.0 - beta2).max(0.0).sqrt();
                }
                let v_phi = r * omega;
                let [br, bphi, bz] = field.b;
                let [er, ephi, ez] = field.e;
                dy[1] = r * omega * omega + qm * (er + v_phi * bz - vz * bphi);
                dy[3] = -GRAVITY + qm * (ez + vr * bphi - v_phi * br);
                dy[5] = (qm * (ephi + vz * br - vr * bz) - 2.0 * vr * omega) / r;
            }
        }

        if dy.iter().all(|v| v.is_finite()) {
            Ok(dy)
        } else {
            Err(MotionError::NonFinite { t, r })
        }
    }

    /// Kinetic energy (eV), relativistic for the electron.
    pub fn kinetic_energy(&self, y: &StateVector) -> f64 {
        let v = speed(y);
        match self.species {
            Species::Electron => {
                let rest = self.species.mass_ev() * LIGHT_SPEED * LIGHT_SPEED;
                let beta2 = (v / LIGHT_SPEED).powi(2);
                rest * (1.0 / (1.0 - beta2).sqrt() - 1.0)
            }
            _ => 0.5 * self.species.mass_ev() * v * v,
        }
    }

    /// Potential energy (eV) in gravity and, for neutrons, the magnetic
    /// potential of a low-field seeker.
    pub fn potential_energy(&self, y: &StateVector, field: &FieldValue) -> f64 {
        let mut pot = self.species.mass_ev() * GRAVITY * y[2];
        if self.species == Species::Neutron {
            let mu_ev = MU_NEUTRON_SI / ELEMENTARY_CHARGE;
            pot += self.polarization * mu_ev * field.babs;
        }
        pot
    }

    /// Total mechanical energy (eV).
    pub fn total_energy(&self, y: &StateVector, field: &FieldValue) -> f64 {
        self.kinetic_energy(y) + self.potential_energy(y, field)
    }
}
