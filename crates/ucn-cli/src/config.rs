//! TOML configuration deserialisation for simulation jobs.

use serde::Deserialize;
use ucn_core::fields::RampSchedule;
use ucn_core::source::SweepSource;
use ucn_geometry::primitives::Primitive;
use ucn_materials::Material;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub field: FieldConfig,
    pub geometry: GeometryConfig,
    /// Extra materials merged into the built-in library.
    #[serde(default)]
    pub materials: Vec<Material>,
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Simulation parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    /// Simulated storage time per particle (s).
    pub sim_time: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_macro_step")]
    pub macro_step: f64,
    /// Relative micro-step error tolerance.
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default = "default_h_min")]
    pub h_min: f64,
    #[serde(default = "default_h_init")]
    pub h_init: f64,
    /// Re-collision suppression distance (m).
    #[serde(default = "default_ignore_distance")]
    pub ignore_distance: f64,
    /// Per-priority overrides of the suppression distance.
    #[serde(default)]
    pub ignore_distance_overrides: Vec<IgnoreDistanceOverride>,
    /// Macro-step shrink threshold on |B| (T), off when absent.
    pub weak_field_threshold: Option<f64>,
    /// Track beta-decay protons and electrons (default: true).
    #[serde(default = "default_true")]
    pub spawn_secondaries: bool,
}

fn default_seed() -> u64 {
    1
}
fn default_macro_step() -> f64 {
    1e-3
}
fn default_eps() -> f64 {
    1e-13
}
fn default_h_min() -> f64 {
    1e-12
}
fn default_h_init() -> f64 {
    1e-5
}
fn default_ignore_distance() -> f64 {
    1e-8
}
fn default_true() -> bool {
    true
}

/// Suppression distance for solids of one priority level.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IgnoreDistanceOverride {
    pub priority: i32,
    pub distance: f64,
}

/// Field specification: an analytic source plus an optional ramp
/// schedule scaling its magnetic part.
#[derive(Debug, Default, Deserialize)]
pub struct FieldConfig {
    /// The tagged field variant lives at the `[field]` level, so a job
    /// writes `type = "Uniform"` next to its parameters.
    #[serde(flatten)]
    pub kind: FieldKind,
    pub ramp: Option<RampSchedule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(tag = "type")]
pub enum FieldKind {
    #[default]
    None,
    Uniform {
        b: [f64; 3],
        #[serde(default)]
        e: [f64; 3],
    },
    LinearGradient {
        b0: f64,
        gradient: f64,
        #[serde(default)]
        z0: f64,
    },
}

/// Geometry configuration from TOML.
#[derive(Debug, Deserialize)]
pub struct GeometryConfig {
    pub solid: Vec<SolidConfig>,
}

/// A single solid in the scene.
#[derive(Debug, Deserialize)]
pub struct SolidConfig {
    pub name: String,
    /// Material identifier resolved against the library.
    pub material: String,
    /// Higher priority wins where solids overlap.
    pub priority: i32,
    /// Time windows (s) during which the solid is inactive.
    #[serde(default)]
    pub ignore_intervals: Vec<[f64; 2]>,
    /// Shape: inline primitive or mesh file import.
    #[serde(flatten)]
    pub shape: ShapeConfig,
}

/// Shape specification: either a primitive or an OBJ import.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShapeConfig {
    Primitive(Primitive),
    File {
        mesh_file: String,
        /// Object group to pick from the file; defaults to the solid name.
        object: Option<String>,
    },
}

/// Particle source: random volume filling or a regular sweep grid.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SourceConfig {
    Volume {
        solid: String,
        /// Total energy range (neV).
        energy_min: f64,
        energy_max: f64,
        /// Number of primaries to launch.
        count: usize,
        #[serde(default = "default_retries")]
        max_retries: usize,
    },
    Sweep {
        #[serde(flatten)]
        sweep: SweepSource,
    },
}

fn default_retries() -> usize {
    1_000_000
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the end log as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_end_log: bool,
    /// Whether to also save the end log as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_end_log: true,
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: JobConfig = toml::from_str(&content)?;
    Ok(config)
}
