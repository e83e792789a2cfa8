//! Builds the scene from a job configuration and runs all particles.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context};
use log::{info, warn};
use serde::Serialize;

use ucn_core::fields::{FieldSource, LinearGradientField, NoField, RampedField, UniformField};
use ucn_core::integrator::StepControl;
use ucn_core::motion::Equations;
use ucn_core::sampling::RandomSource;
use ucn_core::source::{draw_decay_time, InitialConditions, VolumeSource};
use ucn_core::trajectory::{OutcomeTally, TrackConfig, TrajectoryEngine};
use ucn_core::{Generation, Particle, Species, StateVector, StopCode};
use ucn_geometry::parsers::obj::parse_obj;
use ucn_geometry::{GeometryModel, Solid, TriangleMesh};
use ucn_materials::MaterialLibrary;

use crate::config::{FieldKind, JobConfig, ShapeConfig, SourceConfig};

/// End-of-tracking record of one particle.
#[derive(Debug, Clone, Serialize)]
pub struct EndRecord {
    pub id: u64,
    pub species: &'static str,
    pub generation: &'static str,
    /// Id of the decayed parent, for secondaries.
    pub parent: Option<u64>,
    pub stop_code: i32,
    pub t_start: f64,
    pub t_end: f64,
    /// Final position (m, cartesian).
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Final kinetic energy (eV).
    pub e_kin: f64,
    /// Total energy (eV) at the start of tracking.
    pub e_start: f64,
    /// Largest total energy (eV) seen along the track.
    pub e_max: f64,
    pub path_length: f64,
    pub bounces: u64,
    pub diffuse_bounces: u64,
    /// Accepted integrator micro steps.
    pub steps: u64,
}

/// Everything a finished run produces.
pub struct RunResult {
    pub records: Vec<EndRecord>,
    pub tallies: Vec<(Species, OutcomeTally)>,
}

/// Resolve the material library: built-in plus custom entries.
pub fn build_library(job: &JobConfig) -> anyhow::Result<MaterialLibrary> {
    let mut library = MaterialLibrary::standard();
    for material in &job.materials {
        material
            .validate()
            .with_context(|| format!("material '{}'", material.name))?;
        library.insert(material.clone());
    }
    Ok(library)
}

/// Build the geometry model from the configured solids.
pub fn build_geometry(job: &JobConfig) -> anyhow::Result<GeometryModel> {
    let mut parts = Vec::with_capacity(job.geometry.solid.len());
    for (i, sc) in job.geometry.solid.iter().enumerate() {
        let mesh = match &sc.shape {
            ShapeConfig::Primitive(p) => p.to_mesh(),
            ShapeConfig::File { mesh_file, object } => {
                let content = std::fs::read_to_string(mesh_file)
                    .with_context(|| format!("reading mesh file {mesh_file}"))?;
                let solids = parse_obj(&content)?;
                let wanted = object.as_deref().unwrap_or(&sc.name);
                pick_object(solids, wanted, mesh_file)?
            }
        };
        parts.push((
            Solid {
                id: i as u32 + 1,
                name: sc.name.clone(),
                material: sc.material.clone(),
                priority: sc.priority,
                ignore_intervals: sc.ignore_intervals.iter().map(|w| (w[0], w[1])).collect(),
            },
            mesh,
        ));
    }
    Ok(GeometryModel::new(parts)?)
}

fn pick_object(
    solids: Vec<(String, TriangleMesh)>,
    wanted: &str,
    file: &str,
) -> anyhow::Result<TriangleMesh> {
    if solids.len() == 1 {
        return Ok(solids.into_iter().next().unwrap().1);
    }
    for (name, mesh) in solids {
        if name == wanted {
            return Ok(mesh);
        }
    }
    bail!("object '{wanted}' not found in {file}")
}

/// Build the field source from the configuration.
pub fn build_field(job: &JobConfig) -> Box<dyn FieldSource> {
    let ramp = job.field.ramp;
    match job.field.kind {
        FieldKind::None => Box::new(NoField),
        FieldKind::Uniform { b, e } => {
            let inner = UniformField { b, e };
            match ramp {
                Some(schedule) => Box::new(RampedField { inner, schedule }),
                None => Box::new(inner),
            }
        }
        FieldKind::LinearGradient { b0, gradient, z0 } => {
            let inner = LinearGradientField { b0, gradient, z0 };
            match ramp {
                Some(schedule) => Box::new(RampedField { inner, schedule }),
                None => Box::new(inner),
            }
        }
    }
}

fn track_config(job: &JobConfig) -> TrackConfig {
    TrackConfig {
        macro_step: job.simulation.macro_step,
        sim_time: job.simulation.sim_time,
        weak_field_threshold: job.simulation.weak_field_threshold,
        step: StepControl {
            eps: job.simulation.eps,
            h_min: job.simulation.h_min,
            h_init: job.simulation.h_init,
            max_micro_steps: 10_000,
        },
        ignore_distance: job.simulation.ignore_distance,
        ignore_distance_per_priority: job
            .simulation
            .ignore_distance_overrides
            .iter()
            .map(|o| (o.priority, o.distance))
            .collect(),
        spawn_secondaries: job.simulation.spawn_secondaries,
    }
}

/// Run every primary (and the secondaries they spawn) to termination.
pub fn run_simulation(job: &JobConfig) -> anyhow::Result<RunResult> {
    let library = build_library(job)?;
    let model = build_geometry(job)?;
    let field = build_field(job);

    let engine = TrajectoryEngine::new(&model, &library, field.as_ref(), track_config(job))?;
    let mut random = RandomSource::seeded(job.simulation.seed);
    let equations = Equations::new(Species::Neutron);

    let mut queue: VecDeque<Particle> = VecDeque::new();
    let mut next_id: u64 = 0;
    let mut skipped = 0u64;
    let mut no_position = Vec::new();

    match &job.source {
        SourceConfig::Volume {
            solid,
            energy_min,
            energy_max,
            count,
            max_retries,
        } => {
            let Some(solid_idx) = model.solids.iter().position(|s| &s.name == solid) else {
                bail!("source solid '{solid}' is not part of the geometry");
            };
            let source = VolumeSource {
                solid: solid.clone(),
                energy_min: *energy_min,
                energy_max: *energy_max,
                max_retries: *max_retries,
            };
            for _ in 0..*count {
                match source.draw(&model, solid_idx, &mut random) {
                    Some(ic) => {
                        push_primary(&mut queue, &ic, &equations, field.as_ref(), &mut random,
                            &mut next_id, &mut skipped)
                    }
                    None => no_position.push(next_primary_id(&mut next_id)),
                }
            }
        }
        SourceConfig::Sweep { sweep } => {
            for ic in sweep.clone() {
                push_primary(&mut queue, &ic, &equations, field.as_ref(), &mut random,
                    &mut next_id, &mut skipped)
            }
        }
    }
    if skipped > 0 {
        warn!("{skipped} initial conditions were energetically unreachable");
    }
    info!("launching {} primaries", queue.len());

    let mut records = Vec::new();
    let mut tallies: Vec<(Species, OutcomeTally)> = Vec::new();
    // Particles that never got a valid start still show up in the log.
    for id in no_position {
        record_tally(&mut tallies, Species::Neutron, StopCode::NoInitialPosition);
        records.push(EndRecord {
            id,
            species: Species::Neutron.name(),
            generation: Generation::Primary.name(),
            parent: None,
            stop_code: StopCode::NoInitialPosition.tag(),
            t_start: 0.0,
            t_end: 0.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            e_kin: 0.0,
            e_start: 0.0,
            e_max: 0.0,
            path_length: 0.0,
            bounces: 0,
            diffuse_bounces: 0,
            steps: 0,
        });
    }

    let mut secondaries = Vec::new();
    while let Some(mut particle) = queue.pop_front() {
        engine.track(&mut particle, &mut random, &mut secondaries, &mut next_id);
        for s in secondaries.drain(..) {
            queue.push_back(s);
        }
        let code = particle.stop.unwrap_or(StopCode::NotCategorized);
        record_tally(&mut tallies, particle.species, code);
        records.push(end_record(&particle, code));
    }

    Ok(RunResult { records, tallies })
}

fn next_primary_id(next_id: &mut u64) -> u64 {
    let id = *next_id;
    *next_id += 1;
    id
}

fn push_primary(
    queue: &mut VecDeque<Particle>,
    ic: &InitialConditions,
    equations: &Equations,
    field: &dyn FieldSource,
    random: &mut RandomSource,
    next_id: &mut u64,
    skipped: &mut u64,
) {
    let id = next_primary_id(next_id);
    let Some(y) = ic.state_vector(equations, field) else {
        *skipped += 1;
        return;
    };
    queue.push_back(Particle {
        id,
        species: Species::Neutron,
        generation: Generation::Primary,
        y,
        t: 0.0,
        t_start: 0.0,
        decay_time: draw_decay_time(Species::Neutron, random),
        material_stack: Vec::new(),
        stop: None,
        path_length: 0.0,
        bounces: 0,
        diffuse_bounces: 0,
        steps: 0,
        e_start: 0.0,
        e_max: 0.0,
    });
}

fn end_record(particle: &Particle, code: StopCode) -> EndRecord {
    let equations = Equations::new(particle.species);
    let pos = position_of(&particle.y);
    EndRecord {
        id: particle.id,
        species: particle.species.name(),
        generation: particle.generation.name(),
        parent: particle.generation.parent(),
        stop_code: code.tag(),
        t_start: particle.t_start,
        t_end: particle.t,
        x: pos[0],
        y: pos[1],
        z: pos[2],
        e_kin: equations.kinetic_energy(&particle.y),
        e_start: particle.e_start,
        e_max: particle.e_max,
        path_length: particle.path_length,
        bounces: particle.bounces,
        diffuse_bounces: particle.diffuse_bounces,
        steps: particle.steps,
    }
}

fn position_of(y: &StateVector) -> [f64; 3] {
    ucn_core::state::position(y)
}

fn record_tally(tallies: &mut Vec<(Species, OutcomeTally)>, species: Species, code: StopCode) {
    for (s, tally) in tallies.iter_mut() {
        if *s == species {
            tally.record(code);
            return;
        }
    }
    let mut tally = OutcomeTally::default();
    tally.record(code);
    tallies.push((species, tally));
}

/// Write the end log as CSV with a `#` metadata header.
pub fn write_end_csv(result: &RunResult, path: &Path, job: &JobConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "# UCN end log")?;
    writeln!(w, "# sim_time_s: {}", job.simulation.sim_time)?;
    writeln!(w, "# seed: {}", job.simulation.seed)?;
    writeln!(w, "# particles: {}", result.records.len())?;
    writeln!(
        w,
        "id,species,generation,parent,stop_code,t_start_s,t_end_s,x_m,y_m,z_m,e_kin_ev,e_start_ev,e_max_ev,path_length_m,bounces,diffuse_bounces,steps"
    )?;
    for r in &result.records {
        let parent = r.parent.map(|p| p.to_string()).unwrap_or_default();
        writeln!(
            w,
            "{},{},{},{},{},{:.6},{:.6},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{},{},{}",
            r.id,
            r.species,
            r.generation,
            parent,
            r.stop_code,
            r.t_start,
            r.t_end,
            r.x,
            r.y,
            r.z,
            r.e_kin,
            r.e_start,
            r.e_max,
            r.path_length,
            r.bounces,
            r.diffuse_bounces,
            r.steps
        )?;
    }
    info!("wrote end log to {}", path.display());
    Ok(())
}

/// Write the end log as JSON.
pub fn write_end_json(result: &RunResult, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &result.records)?;
    Ok(())
}

/// Print the per-species termination summary table.
pub fn print_summary(result: &RunResult) {
    println!();
    println!("Termination summary");
    println!("-------------------");
    for (species, tally) in &result.tallies {
        println!("{}:", species.name());
        for (code, count) in tally.entries() {
            println!("  {:>4}  {:<42} {}", code.tag(), code.describe(), count);
        }
        println!("  total: {}", tally.total());
    }
}
