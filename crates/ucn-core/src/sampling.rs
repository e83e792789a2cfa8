//! Seeded random draws for initial conditions and decay spectra.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{DECAY_Q_VALUE, LIGHT_SPEED, M_ELECTRON, PROTON_RECOIL_MAX};

/// All randomness of a run flows through one seeded generator, so a run
/// is reproducible from its seed.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Direct access for callers that sample their own distributions.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi > lo {
            self.rng.random_range(lo..hi)
        } else {
            lo
        }
    }

    /// Exponentially distributed value with the given mean. Infinite
    /// mean gives an infinite draw, for stable species.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        if !mean.is_finite() {
            return f64::INFINITY;
        }
        -mean * (1.0 - self.rng.random::<f64>()).ln()
    }

    /// Unit vector uniform on the sphere.
    pub fn isotropic_direction(&mut self) -> [f64; 3] {
        let cos_theta = 2.0 * self.rng.random::<f64>() - 1.0;
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let phi = 2.0 * std::f64::consts::PI * self.rng.random::<f64>();
        [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta]
    }

    /// Electron kinetic energy (eV) from the beta decay spectrum,
    /// f(E) ~ sqrt(E^2 + 2 E m_e c^2) (E + m_e c^2) (Q - E)^2,
    /// drawn by rejection sampling.
    pub fn electron_beta_energy(&mut self) -> f64 {
        let rest = M_ELECTRON * LIGHT_SPEED * LIGHT_SPEED;
        let density = |e: f64| -> f64 {
            (e * e + 2.0 * e * rest).sqrt() * (e + rest) * (DECAY_Q_VALUE - e).powi(2)
        };
        // Scan for the envelope once per draw; the grid is tiny.
        let mut max = 0.0f64;
        for i in 1..200 {
            max = max.max(density(DECAY_Q_VALUE * i as f64 / 200.0));
        }
        loop {
            let e = self.rng.random::<f64>() * DECAY_Q_VALUE;
            if self.rng.random::<f64>() * max * 1.05 < density(e) {
                return e;
            }
        }
    }

    /// Proton recoil kinetic energy (eV) from neutron beta decay,
    /// f(T) ~ sqrt(T) (T_max - T)^2.
    pub fn proton_recoil_energy(&mut self) -> f64 {
        let density = |t: f64| -> f64 { t.sqrt() * (PROTON_RECOIL_MAX - t).powi(2) };
        // Peak of sqrt(t) (tmax - t)^2 is at tmax / 5.
        let max = density(PROTON_RECOIL_MAX / 5.0);
        loop {
            let t = self.rng.random::<f64>() * PROTON_RECOIL_MAX;
            if self.rng.random::<f64>() * max < density(t) {
                return t;
            }
        }
    }
}
