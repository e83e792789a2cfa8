//! End-to-end storage scenarios: a lossless bottle keeps its neutrons,
//! an absorbing foil removes them at the Fresnel transmission rate, and
//! diffuse reflections follow the Lambert cosine law.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ucn_core::fields::{FieldValue, NoField};
use ucn_core::motion::Equations;
use ucn_core::sampling::RandomSource;
use ucn_core::source::VolumeSource;
use ucn_core::surface::{SurfaceModel, SurfaceOutcome};
use ucn_core::trajectory::{OutcomeTally, TrackConfig, TrajectoryEngine};
use ucn_core::{Generation, Particle, Species, StopCode};
use ucn_geometry::primitives::cuboid_mesh;
use ucn_geometry::{GeometryModel, Solid};
use ucn_materials::{Material, MaterialLibrary};

fn solid(id: u32, name: &str, material: &str, priority: i32) -> Solid {
    Solid {
        id,
        name: name.into(),
        material: material.into(),
        priority,
        ignore_intervals: Vec::new(),
    }
}

fn neutron(id: u64, y: ucn_core::StateVector) -> Particle {
    Particle {
        id,
        species: Species::Neutron,
        generation: Generation::Primary,
        y,
        t: 0.0,
        t_start: 0.0,
        decay_time: f64::INFINITY,
        material_stack: Vec::new(),
        stop: None,
        path_length: 0.0,
        bounces: 0,
        diffuse_bounces: 0,
        steps: 0,
        e_start: 0.0,
        e_max: 0.0,
    }
}

#[test]
fn lossless_bottle_stores_every_neutron() {
    let model = GeometryModel::new(vec![
        (
            solid(1, "wall", "ideal", 1),
            cuboid_mesh([0.0, 0.0, 0.25], [0.3, 0.3, 0.3]),
        ),
        (
            solid(2, "bottle", "vacuum", 2),
            cuboid_mesh([0.0, 0.0, 0.25], [0.25, 0.25, 0.25]),
        ),
    ])
    .unwrap();
    let mut library = MaterialLibrary::new();
    library.insert(Material::ideal("ideal", 500.0));

    let field = NoField;
    let config = TrackConfig {
        sim_time: 1.0,
        spawn_secondaries: false,
        ..TrackConfig::default()
    };
    let engine = TrajectoryEngine::new(&model, &library, &field, config).unwrap();

    let source = VolumeSource {
        solid: "bottle".into(),
        energy_min: 20.0,
        energy_max: 100.0,
        max_retries: 100_000,
    };
    let equations = Equations::new(Species::Neutron);
    let mut random = RandomSource::seeded(20);
    let mut secondaries = Vec::new();
    let mut next_id = 0;
    let mut tally = OutcomeTally::default();

    for _ in 0..20 {
        let ic = source.draw(&model, 1, &mut random).unwrap();
        let Some(y) = ic.state_vector(&equations, &NoField) else {
            continue;
        };
        let e_start = equations.total_energy(&y, &FieldValue::default());
        let mut p = neutron(next_id, y);
        next_id += 1;
        engine.track(&mut p, &mut random, &mut secondaries, &mut next_id);
        tally.record(p.stop.unwrap());
        // Specular walls conserve energy over the whole storage time.
        let e_end = equations.total_energy(&p.y, &FieldValue::default());
        assert_relative_eq!(e_end, e_start, max_relative = 1e-5);
        assert!(p.path_length > 0.0);
    }
    assert_eq!(tally.count(StopCode::NotFinished), tally.total());
    assert!(secondaries.is_empty());
}

#[test]
fn absorbing_foil_matches_fresnel_transmission() {
    // 300 neV neutrons at normal incidence on a 290 neV foil:
    // T = 4 k1 k2 / (k1 + k2)^2 with k1 = sqrt(300), k2 = sqrt(10).
    let expected_t = {
        let k1 = 300.0f64.sqrt();
        let k2 = 10.0f64.sqrt();
        4.0 * k1 * k2 / ((k1 + k2) * (k1 + k2))
    };

    let model = GeometryModel::new(vec![
        (
            solid(1, "hall", "vacuum", 0),
            cuboid_mesh([0.02, 0.0, 0.0], [0.04, 0.55, 0.55]),
        ),
        (
            solid(2, "foil", "foil", 1),
            cuboid_mesh([0.005, 0.0, 0.0], [0.005, 0.5, 0.5]),
        ),
    ])
    .unwrap();
    let mut library = MaterialLibrary::new();
    library.insert(Material {
        name: "foil".into(),
        fermi_real: 290.0,
        // Strongly absorbing bulk: anything transmitted is absorbed
        // within tens of micrometres.
        fermi_imag: 0.05,
        ..Material::vacuum()
    });

    let field = NoField;
    let config = TrackConfig {
        sim_time: 0.05,
        spawn_secondaries: false,
        ..TrackConfig::default()
    };
    let engine = TrajectoryEngine::new(&model, &library, &field, config).unwrap();

    let v = Species::Neutron.speed_from_energy(300e-9);
    let mut random = RandomSource::seeded(77);
    let mut secondaries = Vec::new();
    let mut next_id = 0;
    let n = 600;
    let mut absorbed = 0;
    for i in 0..n {
        let y = ucn_core::state::from_cartesian(&[0.05, 0.0, 0.0], &[-v, 0.0, 0.0]);
        let mut p = neutron(i, y);
        engine.track(&mut p, &mut random, &mut secondaries, &mut next_id);
        match p.stop.unwrap() {
            StopCode::AbsorbedInMaterial => absorbed += 1,
            StopCode::HitOuterBoundary => {}
            other => panic!("unexpected stop code {other:?} for particle {i}"),
        }
    }
    let fraction = absorbed as f64 / n as f64;
    // Binomial 5 sigma at n = 600 is about 0.10.
    assert!(
        (fraction - expected_t).abs() < 0.10,
        "absorbed fraction {fraction:.3}, expected {expected_t:.3}"
    );
}

#[test]
fn diffuse_reflections_follow_cosine_law() {
    let mut wall = Material::ideal("rough", 500.0);
    wall.diffuse_prob = 1.0;
    let vacuum = Material::vacuum();
    let surface = SurfaceModel::new(Species::Neutron);
    let mut rng = StdRng::seed_from_u64(12);

    let v = Species::Neutron.speed_from_energy(100e-9);
    let normal = [0.0, 0.0, 1.0];
    let n = 20_000;
    let mut sum_cos = 0.0;
    let mut sum_cos2 = 0.0;
    for _ in 0..n {
        let out = surface.interact(&[0.3 * v, 0.0, -0.95 * v], &normal, &vacuum, &wall, &mut rng);
        let velocity = match out {
            SurfaceOutcome::ReflectedDiffuse { velocity } => velocity,
            other => panic!("expected diffuse reflection, got {other:?}"),
        };
        let speed = (velocity[0] * velocity[0] + velocity[1] * velocity[1]
            + velocity[2] * velocity[2])
            .sqrt();
        let cos_theta = velocity[2] / speed;
        assert!(cos_theta >= 0.0, "reflected into the wall");
        sum_cos += cos_theta;
        sum_cos2 += cos_theta * cos_theta;
    }
    // Lambert law: E[cos] = 2/3, E[cos^2] = 1/2.
    assert!((sum_cos / n as f64 - 2.0 / 3.0).abs() < 0.02);
    assert!((sum_cos2 / n as f64 - 0.5).abs() < 0.02);
}
