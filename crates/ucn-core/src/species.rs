//! Particle species tracked by the engine.

use serde::{Deserialize, Serialize};

use crate::constants::{
    LIGHT_SPEED, MU_NEUTRON_SI, M_ELECTRON, M_NEUTRON, M_PROTON, NEUTRON_LIFETIME,
};

/// The three species the engine knows how to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Neutron,
    Proton,
    Electron,
}

impl Species {
    pub fn name(&self) -> &'static str {
        match self {
            Species::Neutron => "neutron",
            Species::Proton => "proton",
            Species::Electron => "electron",
        }
    }

    /// Rest mass over e (eV s^2/m^2).
    pub fn mass_ev(&self) -> f64 {
        match self {
            Species::Neutron => M_NEUTRON,
            Species::Proton => M_PROTON,
            Species::Electron => M_ELECTRON,
        }
    }

    /// Charge in units of e.
    pub fn charge_sign(&self) -> f64 {
        match self {
            Species::Neutron => 0.0,
            Species::Proton => 1.0,
            Species::Electron => -1.0,
        }
    }

    /// Mean lifetime (s), infinite for stable species.
    pub fn lifetime(&self) -> f64 {
        match self {
            Species::Neutron => NEUTRON_LIFETIME,
            Species::Proton | Species::Electron => f64::INFINITY,
        }
    }

    /// Magnetic moment magnitude (J/T). Only the neutron couples to the
    /// field gradient through its moment here; the charged decay
    /// products are dominated by the Lorentz force.
    pub fn magnetic_moment(&self) -> f64 {
        match self {
            Species::Neutron => MU_NEUTRON_SI,
            Species::Proton | Species::Electron => 0.0,
        }
    }

    /// True if the species interacts with walls through a Fermi
    /// potential. Charged particles stop at the first wall instead.
    pub fn has_fermi_interaction(&self) -> bool {
        matches!(self, Species::Neutron)
    }

    /// Speed (m/s) for a kinetic energy in eV. Relativistic for the
    /// electron, classical for the heavy species.
    pub fn speed_from_energy(&self, energy_ev: f64) -> f64 {
        match self {
            Species::Electron => {
                let rest = M_ELECTRON * LIGHT_SPEED * LIGHT_SPEED;
                let gamma = 1.0 + energy_ev / rest;
                LIGHT_SPEED * (1.0 - 1.0 / (gamma * gamma)).sqrt()
            }
            _ => (2.0 * energy_ev / self.mass_ev()).sqrt(),
        }
    }
}
