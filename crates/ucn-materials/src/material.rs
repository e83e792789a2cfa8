//! The material seen by a particle at a wall.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from material construction and lookup.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Material '{name}': imaginary Fermi potential must be >= 0, got {value} neV")]
    NegativeImaginaryPotential { name: String, value: f64 },

    #[error("Material '{name}': probability '{which}' must lie in [0, 1], got {value}")]
    ProbabilityOutOfRange {
        name: String,
        which: &'static str,
        value: f64,
    },

    #[error("Material not found: {0}")]
    NotFound(String),
}

/// Neutron-optical description of a wall material.
///
/// The real part of the Fermi potential acts as a step potential at the
/// surface; the imaginary part describes absorption inside the bulk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Human-readable name.
    pub name: String,
    /// Real part of the Fermi potential (neV).
    pub fermi_real: f64,
    /// Imaginary part of the Fermi potential (neV). Dissipative only, >= 0.
    #[serde(default)]
    pub fermi_imag: f64,
    /// Probability of diffuse (Lambert) reflection per bounce, used when the
    /// microroughness model is disabled.
    #[serde(default)]
    pub diffuse_prob: f64,
    /// Extra loss probability per wall bounce, independent of the
    /// bulk absorption from `fermi_imag`.
    #[serde(default)]
    pub loss_per_bounce: f64,
    /// RMS roughness height b (nm) of the microroughness model.
    #[serde(default)]
    pub rms_roughness: f64,
    /// Roughness correlation length w (nm) of the microroughness model.
    #[serde(default)]
    pub correlation_length: f64,
    /// Sample diffuse reflections from the microroughness distribution
    /// instead of the Lambert law.
    #[serde(default)]
    pub use_mr_model: bool,
    /// This material absorbs at its surface even when it is not the
    /// authoritative volume (layered-material semantics).
    #[serde(default)]
    pub absorber: bool,
}

impl Material {
    /// The vacuum default: no potential step, no losses.
    pub fn vacuum() -> Self {
        Self {
            name: "vacuum".into(),
            fermi_real: 0.0,
            fermi_imag: 0.0,
            diffuse_prob: 0.0,
            loss_per_bounce: 0.0,
            rms_roughness: 0.0,
            correlation_length: 0.0,
            use_mr_model: false,
            absorber: false,
        }
    }

    /// A purely reflecting/transmitting material with only a real potential.
    pub fn ideal(name: impl Into<String>, fermi_real: f64) -> Self {
        Self {
            name: name.into(),
            fermi_real,
            ..Self::vacuum()
        }
    }

    /// Complex Fermi potential V - iW (neV). The sign convention makes the
    /// imaginary part attenuating for a time dependence exp(-iEt/hbar).
    pub fn fermi_potential(&self) -> Complex64 {
        Complex64::new(self.fermi_real, -self.fermi_imag)
    }

    /// True if the bulk attenuates neutrons.
    pub fn is_lossy(&self) -> bool {
        self.fermi_imag > 0.0
    }

    /// Check the material invariants.
    pub fn validate(&self) -> Result<(), MaterialError> {
        if self.fermi_imag < 0.0 {
            return Err(MaterialError::NegativeImaginaryPotential {
                name: self.name.clone(),
                value: self.fermi_imag,
            });
        }
        for (which, value) in [
            ("diffuse_prob", self.diffuse_prob),
            ("loss_per_bounce", self.loss_per_bounce),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MaterialError::ProbabilityOutOfRange {
                    name: self.name.clone(),
                    which,
                    value,
                });
            }
        }
        Ok(())
    }
}
