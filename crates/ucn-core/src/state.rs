//! Particle state in cylindrical coordinates and termination codes.

use serde::{Deserialize, Serialize};

use crate::species::Species;

/// Dynamic state `[r, dr/dt, z, dz/dt, phi, dphi/dt]` in cylindrical
/// coordinates (m, m/s, m, m/s, rad, rad/s).
pub type StateVector = [f64; 6];

/// Cartesian position of a state vector.
pub fn position(y: &StateVector) -> [f64; 3] {
    [y[0] * y[4].cos(), y[0] * y[4].sin(), y[2]]
}

/// Cartesian velocity of a state vector.
pub fn velocity(y: &StateVector) -> [f64; 3] {
    let (sin_phi, cos_phi) = y[4].sin_cos();
    let v_phi = y[0] * y[5];
    [
        y[1] * cos_phi - v_phi * sin_phi,
        y[1] * sin_phi + v_phi * cos_phi,
        y[3],
    ]
}

/// Speed (m/s) of a state vector.
pub fn speed(y: &StateVector) -> f64 {
    let v_phi = y[0] * y[5];
    (y[1] * y[1] + v_phi * v_phi + y[3] * y[3]).sqrt()
}

/// Build a state vector from cartesian position and velocity.
pub fn from_cartesian(pos: &[f64; 3], vel: &[f64; 3]) -> StateVector {
    let r = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
    let phi = pos[1].atan2(pos[0]);
    let (sin_phi, cos_phi) = phi.sin_cos();
    let vr = vel[0] * cos_phi + vel[1] * sin_phi;
    let v_phi = -vel[0] * sin_phi + vel[1] * cos_phi;
    // Guard the coordinate singularity on the axis.
    let omega = if r > 0.0 { v_phi / r } else { 0.0 };
    [r, vr, pos[2], vel[2], phi, omega]
}

/// Replace the cartesian velocity of a state, keeping its position.
pub fn with_velocity(y: &StateVector, vel: &[f64; 3]) -> StateVector {
    let (sin_phi, cos_phi) = y[4].sin_cos();
    let vr = vel[0] * cos_phi + vel[1] * sin_phi;
    let v_phi = -vel[0] * sin_phi + vel[1] * cos_phi;
    let omega = if y[0] > 0.0 { v_phi / y[0] } else { 0.0 };
    [y[0], vr, y[2], vel[2], y[4], omega]
}

/// Why tracking of a particle ended.
///
/// The numeric tags follow the historic output convention, where
/// negative codes mean the particle was lost to the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopCode {
    NotCategorized,
    AbsorbedInMaterial,
    AbsorbedOnSurface,
    NotFinished,
    HitOuterBoundary,
    IntegrationError,
    Decayed,
    NoInitialPosition,
    SpatialQueryError,
    GeometryError,
}

impl StopCode {
    /// Numeric tag written to result files.
    pub fn tag(&self) -> i32 {
        match self {
            StopCode::NotCategorized => 0,
            StopCode::AbsorbedInMaterial => 1,
            StopCode::AbsorbedOnSurface => 2,
            StopCode::NotFinished => -1,
            StopCode::HitOuterBoundary => -2,
            StopCode::IntegrationError => -3,
            StopCode::Decayed => -4,
            StopCode::NoInitialPosition => -5,
            StopCode::SpatialQueryError => -6,
            StopCode::GeometryError => -7,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            StopCode::NotCategorized => "not categorized",
            StopCode::AbsorbedInMaterial => "absorbed in material",
            StopCode::AbsorbedOnSurface => "absorbed on surface",
            StopCode::NotFinished => "still tracking at end of simulation time",
            StopCode::HitOuterBoundary => "left the geometry bounds",
            StopCode::IntegrationError => "integration error",
            StopCode::Decayed => "decayed",
            StopCode::NoInitialPosition => "no initial position found",
            StopCode::SpatialQueryError => "spatial query error",
            StopCode::GeometryError => "geometry error",
        }
    }
}

/// Where a particle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// Started from the configured source.
    Primary,
    /// Spawned by the beta decay of a tracked neutron.
    Secondary { parent: u64 },
}

impl Generation {
    pub fn name(&self) -> &'static str {
        match self {
            Generation::Primary => "primary",
            Generation::Secondary { .. } => "secondary",
        }
    }

    /// Id of the decayed parent, for secondaries.
    pub fn parent(&self) -> Option<u64> {
        match self {
            Generation::Primary => None,
            Generation::Secondary { parent } => Some(*parent),
        }
    }
}

/// A particle in flight, together with its tracking bookkeeping.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: u64,
    pub species: Species,
    pub generation: Generation,
    /// Current dynamic state.
    pub y: StateVector,
    /// Current time (s) since the start of the simulation.
    pub t: f64,
    /// Time (s) at which this particle started tracking.
    pub t_start: f64,
    /// Pre-drawn decay time (s since start of tracking), infinite for
    /// stable species.
    pub decay_time: f64,
    /// Indices of the solids currently containing the particle, highest
    /// priority first. The front entry decides the active material.
    pub material_stack: Vec<usize>,
    /// Set exactly once when tracking ends.
    pub stop: Option<StopCode>,
    pub path_length: f64,
    pub bounces: u64,
    pub diffuse_bounces: u64,
    /// Accepted integrator micro steps over the whole track.
    pub steps: u64,
    /// Total energy (eV) at the start of tracking.
    pub e_start: f64,
    /// Largest total energy (eV) seen along the track.
    pub e_max: f64,
}

impl Particle {
    /// Mark the particle as stopped. The first stop code wins, later
    /// calls are ignored.
    pub fn terminate(&mut self, code: StopCode) {
        if self.stop.is_none() {
            self.stop = Some(code);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    /// Index of the authoritative solid, if inside any.
    pub fn current_solid(&self) -> Option<usize> {
        self.material_stack.first().copied()
    }
}
