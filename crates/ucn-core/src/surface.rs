//! Wall interaction of a particle at a material boundary.
//!
//! Neutrons see the wall as a step in the Fermi potential: they
//! transmit quantum-mechanically, reflect specularly, reflect
//! diffusely (Lambert or microroughness), or are lost in a per-bounce
//! loss draw. Charged particles are simply absorbed at the first wall
//! they hit.

use rand::Rng;

use crate::constants::NEV;
use crate::microroughness::MrParams;
use crate::species::Species;
use ucn_materials::Material;

/// What happened at the wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceOutcome {
    /// Entered the new material; velocity refracted at the step.
    Transmitted { velocity: [f64; 3] },
    ReflectedSpecular { velocity: [f64; 3] },
    ReflectedDiffuse { velocity: [f64; 3] },
    /// Lost at the surface.
    Absorbed,
}

impl SurfaceOutcome {
    pub fn is_reflection(&self) -> bool {
        matches!(
            self,
            SurfaceOutcome::ReflectedSpecular { .. } | SurfaceOutcome::ReflectedDiffuse { .. }
        )
    }
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Orthonormal basis (t1, t2) in the surface plane, with t1 along the
/// in-plane projection of `v` when possible.
fn surface_basis(n: &[f64; 3], v: &[f64; 3]) -> ([f64; 3], [f64; 3]) {
    let vn = dot(v, n);
    let mut t1 = [v[0] - vn * n[0], v[1] - vn * n[1], v[2] - vn * n[2]];
    let norm = dot(&t1, &t1).sqrt();
    if norm > 1e-12 {
        for c in &mut t1 {
            *c /= norm;
        }
    } else {
        // Normal incidence, any in-plane direction will do.
        let t = if n[0].abs() < 0.9 {
            [0.0, -n[2], n[1]]
        } else {
            [-n[2], 0.0, n[0]]
        };
        let l = dot(&t, &t).sqrt();
        t1 = [t[0] / l, t[1] / l, t[2] / l];
    }
    let t2 = [
        n[1] * t1[2] - n[2] * t1[1],
        n[2] * t1[0] - n[0] * t1[2],
        n[0] * t1[1] - n[1] * t1[0],
    ];
    (t1, t2)
}

/// Resolves wall encounters for one particle species.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceModel {
    pub species: Species,
}

impl SurfaceModel {
    pub fn new(species: Species) -> Self {
        Self { species }
    }

    /// Decide the fate of a particle hitting a boundary.
    ///
    /// `normal` is the unit normal of the crossed surface (either
    /// orientation), `from` is the material the particle leaves and
    /// `to` the material behind the boundary. The potential step is the
    /// difference of their real Fermi potentials.
    pub fn interact<R: Rng + ?Sized>(
        &self,
        velocity: &[f64; 3],
        normal: &[f64; 3],
        from: &Material,
        to: &Material,
        rng: &mut R,
    ) -> SurfaceOutcome {
        if !self.species.has_fermi_interaction() {
            return SurfaceOutcome::Absorbed;
        }

        let mass = self.species.mass_ev();
        let vn = dot(velocity, normal);
        // Unit normal pointing back into the incoming half space.
        let back = if vn > 0.0 {
            [-normal[0], -normal[1], -normal[2]]
        } else {
            *normal
        };
        let v_normal = vn.abs();
        let speed2 = dot(velocity, velocity);
        let e_perp = 0.5 * mass * v_normal * v_normal;
        let e_kin = 0.5 * mass * speed2;
        let step = (to.fermi_real - from.fermi_real) * NEV;

        // Transmission through the potential step. Below the barrier the
        // particle is always reflected.
        if e_perp > step {
            let k1 = e_perp.sqrt();
            let k2 = (e_perp - step).sqrt();
            let transmission = 4.0 * k1 * k2 / ((k1 + k2) * (k1 + k2));
            if rng.random::<f64>() < transmission {
                // Tangential velocity unchanged, normal part rescaled to
                // the energy inside the new material.
                let v_new = (2.0 * (e_perp - step) / mass).sqrt();
                let forward = [-back[0], -back[1], -back[2]];
                let velocity = [
                    velocity[0] + (v_new - v_normal) * forward[0],
                    velocity[1] + (v_new - v_normal) * forward[1],
                    velocity[2] + (v_new - v_normal) * forward[2],
                ];
                return SurfaceOutcome::Transmitted { velocity };
            }
        }

        // Reflected. Per-bounce loss draw against the wall material.
        if to.loss_per_bounce > 0.0 && rng.random::<f64>() < to.loss_per_bounce {
            return SurfaceOutcome::Absorbed;
        }

        // Diffuse or specular.
        if to.use_mr_model {
            let params = MrParams {
                b: to.rms_roughness * 1e-9,
                w: to.correlation_length * 1e-9,
                fermi_real: to.fermi_real * NEV,
            };
            let theta_i = (v_normal / speed2.sqrt()).clamp(-1.0, 1.0).acos();
            let p_diffuse = params.total_probability(e_kin, theta_i).min(1.0);
            if rng.random::<f64>() < p_diffuse {
                if let Some((theta_o, phi_o)) = params.sample(e_kin, theta_i, rng) {
                    return SurfaceOutcome::ReflectedDiffuse {
                        velocity: self.outgoing(velocity, &back, theta_o, phi_o),
                    };
                }
            }
        } else if to.diffuse_prob > 0.0 && rng.random::<f64>() < to.diffuse_prob {
            // Lambert cosine law.
            let theta_o = rng.random::<f64>().sqrt().acos();
            let phi_o = std::f64::consts::PI * (2.0 * rng.random::<f64>() - 1.0);
            return SurfaceOutcome::ReflectedDiffuse {
                velocity: self.outgoing(velocity, &back, theta_o, phi_o),
            };
        }

        let reflected = [
            velocity[0] + 2.0 * v_normal * back[0],
            velocity[1] + 2.0 * v_normal * back[1],
            velocity[2] + 2.0 * v_normal * back[2],
        ];
        SurfaceOutcome::ReflectedSpecular {
            velocity: reflected,
        }
    }

    /// Outgoing velocity at `(theta_o, phi_o)` in the local frame of the
    /// reflecting surface, preserving speed. `phi_o = 0` is the forward
    /// in-plane direction of the incident velocity.
    fn outgoing(
        &self,
        velocity: &[f64; 3],
        back: &[f64; 3],
        theta_o: f64,
        phi_o: f64,
    ) -> [f64; 3] {
        let speed = dot(velocity, velocity).sqrt();
        let (t1, t2) = surface_basis(back, velocity);
        let (st, ct) = theta_o.sin_cos();
        let (sp, cp) = phi_o.sin_cos();
        [
            speed * (st * (cp * t1[0] + sp * t2[0]) + ct * back[0]),
            speed * (st * (cp * t1[1] + sp * t2[1]) + ct * back[1]),
            speed * (st * (cp * t1[2] + sp * t2[2]) + ct * back[2]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wall(fermi_real: f64) -> Material {
        Material::ideal("wall", fermi_real)
    }

    fn vacuum() -> Material {
        Material::vacuum()
    }

    #[test]
    fn test_below_barrier_always_reflects() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(1);
        // 100 neV neutron at normal incidence against a 183 neV wall.
        let v = Species::Neutron.speed_from_energy(100e-9);
        for _ in 0..200 {
            let out = model.interact(
                &[v, 0.0, 0.0],
                &[1.0, 0.0, 0.0],
                &vacuum(),
                &wall(183.04),
                &mut rng,
            );
            assert!(out.is_reflection(), "unexpected outcome {out:?}");
        }
    }

    #[test]
    fn test_specular_reflection_flips_normal_component() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(2);
        let out = model.interact(
            &[3.0, 1.0, 0.5],
            &[1.0, 0.0, 0.0],
            &vacuum(),
            &wall(500.0),
            &mut rng,
        );
        match out {
            SurfaceOutcome::ReflectedSpecular { velocity } => {
                assert_relative_eq!(velocity[0], -3.0, epsilon = 1e-12);
                assert_relative_eq!(velocity[1], 1.0, epsilon = 1e-12);
                assert_relative_eq!(velocity[2], 0.5, epsilon = 1e-12);
            }
            other => panic!("expected specular reflection, got {other:?}"),
        }
    }

    #[test]
    fn test_transmission_rescales_normal_velocity() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(3);
        // 300 neV against a 183 neV barrier: transmission happens often.
        let v = Species::Neutron.speed_from_energy(300e-9);
        let mut seen_transmission = false;
        for _ in 0..500 {
            let out = model.interact(
                &[v, 0.0, 0.0],
                &[1.0, 0.0, 0.0],
                &vacuum(),
                &wall(183.04),
                &mut rng,
            );
            if let SurfaceOutcome::Transmitted { velocity } = out {
                seen_transmission = true;
                let e_inside = 0.5 * Species::Neutron.mass_ev() * velocity[0] * velocity[0];
                assert_relative_eq!(e_inside, (300.0 - 183.04) * 1e-9, max_relative = 1e-9);
                assert!(velocity[0] > 0.0);
            }
        }
        assert!(seen_transmission);
    }

    #[test]
    fn test_transmission_approaches_unity_far_above_barrier() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(11);
        // 1 meV against 183 neV: T = 0.9995, reflections are rare.
        let v = Species::Neutron.speed_from_energy(1e-3);
        let mut transmitted = 0;
        let n = 1000;
        for _ in 0..n {
            if let SurfaceOutcome::Transmitted { .. } = model.interact(
                &[v, 0.0, 0.0],
                &[1.0, 0.0, 0.0],
                &vacuum(),
                &wall(183.04),
                &mut rng,
            ) {
                transmitted += 1;
            }
        }
        assert!(transmitted > 990, "transmitted {transmitted} of {n}");
    }

    #[test]
    fn test_transmission_into_lower_potential_speeds_up() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(4);
        let v = Species::Neutron.speed_from_energy(50e-9);
        let mut seen = false;
        for _ in 0..200 {
            let out = model.interact(
                &[v, 0.0, 0.0],
                &[1.0, 0.0, 0.0],
                &wall(100.0),
                &vacuum(),
                &mut rng,
            );
            if let SurfaceOutcome::Transmitted { velocity } = out {
                assert!(velocity[0] > v);
                seen = true;
            }
        }
        assert!(seen);
    }

    #[test]
    fn test_lossy_wall_absorbs_sometimes() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(5);
        let mut m = wall(500.0);
        m.loss_per_bounce = 0.5;
        let v = Species::Neutron.speed_from_energy(100e-9);
        let mut absorbed = 0;
        let n = 1000;
        for _ in 0..n {
            if model.interact(&[v, 0.0, 0.0], &[1.0, 0.0, 0.0], &vacuum(), &m, &mut rng)
                == SurfaceOutcome::Absorbed
            {
                absorbed += 1;
            }
        }
        // Binomial(1000, 0.5), 5 sigma ~ 79.
        assert!((absorbed as i64 - 500).abs() < 80, "absorbed {absorbed}");
    }

    #[test]
    fn test_diffuse_reflection_stays_on_incident_side() {
        let model = SurfaceModel::new(Species::Neutron);
        let mut rng = StdRng::seed_from_u64(6);
        let mut m = wall(500.0);
        m.diffuse_prob = 1.0;
        let v = Species::Neutron.speed_from_energy(100e-9);
        for _ in 0..200 {
            let out = model.interact(
                &[v * 0.8, v * 0.6, 0.0],
                &[1.0, 0.0, 0.0],
                &vacuum(),
                &m,
                &mut rng,
            );
            match out {
                SurfaceOutcome::ReflectedDiffuse { velocity } => {
                    assert!(velocity[0] < 0.0, "into the wall: {velocity:?}");
                    let s = dot(&velocity, &velocity).sqrt();
                    assert_relative_eq!(s, v, max_relative = 1e-12);
                }
                other => panic!("expected diffuse reflection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_charged_particles_absorbed() {
        let mut rng = StdRng::seed_from_u64(7);
        for species in [Species::Proton, Species::Electron] {
            let model = SurfaceModel::new(species);
            let out = model.interact(
                &[1e4, 0.0, 0.0],
                &[1.0, 0.0, 0.0],
                &vacuum(),
                &wall(183.04),
                &mut rng,
            );
            assert_eq!(out, SurfaceOutcome::Absorbed);
        }
    }
}
