//! Microroughness (MR) scattering from rough surfaces.
//!
//! Implements the diffuse reflection distribution of the
//! Steyerl/Atchison microroughness model for surfaces whose roughness is
//! small against the neutron wavelength. The surface is characterised by
//! the RMS roughness amplitude `b` and the lateral correlation length
//! `w` of a Gaussian roughness spectrum.

use rand::Rng;

use crate::constants::{ELEMENTARY_CHARGE, HBAR, M_NEUTRON};

/// Grid used for normalisation and for locating the distribution peak.
const THETA_CELLS: usize = 90;
const PHI_CELLS: usize = 90;
/// Rejection sampling attempts before falling back to specular.
const MAX_REJECTION_TRIES: usize = 10_000;

/// Surface parameters of the MR model, in SI units.
#[derive(Debug, Clone, Copy)]
pub struct MrParams {
    /// RMS roughness amplitude (m).
    pub b: f64,
    /// Roughness correlation length (m).
    pub w: f64,
    /// Real part of the Fermi potential (eV).
    pub fermi_real: f64,
}

impl MrParams {
    /// Neutron wave number (1/m) for a kinetic energy in eV.
    fn wave_number(energy_ev: f64) -> f64 {
        (2.0 * M_NEUTRON * energy_ev).sqrt() / (HBAR / ELEMENTARY_CHARGE)
    }

    /// Critical wave number squared (1/m^2) of the potential step.
    fn kc2(&self) -> f64 {
        2.0 * M_NEUTRON * self.fermi_real / (HBAR / ELEMENTARY_CHARGE).powi(2)
    }

    /// |S(theta)|^2 transmission factor of the step potential.
    fn s2(&self, k: f64, theta: f64) -> f64 {
        let kc2 = self.kc2();
        let kz = k * theta.cos();
        let kz2 = kz * kz;
        if kz2 > kc2 {
            let t = 2.0 * kz / (kz + (kz2 - kc2).sqrt());
            t * t
        } else {
            4.0 * kz2 / kc2
        }
    }

    /// Probability density per solid angle of a diffuse reflection into
    /// `(theta_o, phi_o)`, for incidence angle `theta_i` (measured from
    /// the normal) and kinetic energy `energy_ev`. `phi_o` is measured
    /// from the in-plane projection of the incident direction.
    pub fn distribution(
        &self,
        energy_ev: f64,
        theta_i: f64,
        theta_o: f64,
        phi_o: f64,
    ) -> f64 {
        if self.fermi_real <= 0.0 || energy_ev <= 0.0 {
            return 0.0;
        }
        let k = Self::wave_number(energy_ev);
        let kc2 = self.kc2();
        let (si, so) = (theta_i.sin(), theta_o.sin());
        let gauss = (-0.5
            * self.w
            * self.w
            * k
            * k
            * (si * si + so * so - 2.0 * si * so * phi_o.cos()))
        .exp();
        kc2 * kc2 * self.b * self.b * self.w * self.w / (8.0 * std::f64::consts::PI)
            / theta_i.cos()
            * self.s2(k, theta_i)
            * self.s2(k, theta_o)
            * gauss
    }

    /// Total probability of diffuse MR reflection, integrated over the
    /// outgoing hemisphere with a midpoint rule.
    pub fn total_probability(&self, energy_ev: f64, theta_i: f64) -> f64 {
        let dtheta = std::f64::consts::FRAC_PI_2 / THETA_CELLS as f64;
        let dphi = 2.0 * std::f64::consts::PI / PHI_CELLS as f64;
        let mut sum = 0.0;
        for it in 0..THETA_CELLS {
            let theta_o = (it as f64 + 0.5) * dtheta;
            let sin_w = theta_o.sin();
            for ip in 0..PHI_CELLS {
                let phi_o = -std::f64::consts::PI + (ip as f64 + 0.5) * dphi;
                sum += self.distribution(energy_ev, theta_i, theta_o, phi_o) * sin_w;
            }
        }
        sum * dtheta * dphi
    }

    /// Upper bound of the distribution over the outgoing hemisphere,
    /// padded for use as a rejection-sampling envelope.
    fn distribution_max(&self, energy_ev: f64, theta_i: f64) -> f64 {
        let dtheta = std::f64::consts::FRAC_PI_2 / THETA_CELLS as f64;
        let dphi = 2.0 * std::f64::consts::PI / PHI_CELLS as f64;
        let mut max: f64 = 0.0;
        for it in 0..=THETA_CELLS {
            let theta_o = it as f64 * dtheta;
            for ip in 0..=PHI_CELLS {
                let phi_o = -std::f64::consts::PI + ip as f64 * dphi;
                max = max.max(self.distribution(energy_ev, theta_i, theta_o, phi_o));
            }
        }
        max * 1.5
    }

    /// Draw an outgoing direction `(theta_o, phi_o)` from the MR
    /// distribution by rejection sampling. Returns `None` when the
    /// distribution is degenerate and the caller should reflect
    /// specularly instead.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        energy_ev: f64,
        theta_i: f64,
        rng: &mut R,
    ) -> Option<(f64, f64)> {
        let envelope = self.distribution_max(energy_ev, theta_i);
        if !(envelope > 0.0) || !envelope.is_finite() {
            return None;
        }
        for _ in 0..MAX_REJECTION_TRIES {
            // Uniform over the hemisphere in solid angle.
            let theta_o = rng.random::<f64>().acos();
            let phi_o = std::f64::consts::PI * (2.0 * rng.random::<f64>() - 1.0);
            let p = self.distribution(energy_ev, theta_i, theta_o, phi_o);
            if rng.random::<f64>() * envelope < p {
                return Some((theta_o, phi_o));
            }
        }
        None
    }
}
