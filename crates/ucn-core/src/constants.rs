//! Physical constants in SI and eV-based units.
//!
//! Masses are kept as `m / e` in units of eV s^2 / m^2 so kinetic
//! energies come out in eV without per-step conversions.

/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602176487e-19;

/// Standard gravitational acceleration (m/s^2).
pub const GRAVITY: f64 = 9.80665;

/// Speed of light in vacuum (m/s).
pub const LIGHT_SPEED: f64 = 299_792_458.0;

/// Reduced Planck constant (J s).
pub const HBAR: f64 = 1.05457266e-34;

/// Neutron mass over e (eV s^2/m^2).
pub const M_NEUTRON: f64 = 1.674927211e-27 / ELEMENTARY_CHARGE;

/// Proton mass over e (eV s^2/m^2).
pub const M_PROTON: f64 = 1.672621637e-27 / ELEMENTARY_CHARGE;

/// Electron mass over e (eV s^2/m^2).
pub const M_ELECTRON: f64 = 9.10938215e-31 / ELEMENTARY_CHARGE;

/// Neutron magnetic moment (J/T), magnitude.
pub const MU_NEUTRON_SI: f64 = 0.96623641e-26;

/// Free neutron mean lifetime (s).
pub const NEUTRON_LIFETIME: f64 = 885.7;

/// Beta decay endpoint energy of the electron spectrum (eV).
pub const DECAY_Q_VALUE: f64 = 782_343.0;

/// Maximum proton recoil energy in neutron beta decay (eV).
pub const PROTON_RECOIL_MAX: f64 = 751.0;

/// Conversion from neV to eV.
pub const NEV: f64 = 1e-9;
