//! # UCN Core
//!
//! Trajectory simulation for ultracold neutrons and their decay
//! products. This crate provides:
//!
//! - **Equations of motion** ([`motion`]) — Gravity, Stern-Gerlach and
//!   Lorentz forces in cylindrical coordinates.
//! - **Adaptive integration** ([`integrator`]) — Embedded Cash-Karp
//!   RK45 with step-size control.
//! - **Surface physics** ([`surface`], [`microroughness`]) — Fermi
//!   potential steps, per-bounce losses, Lambert and microroughness
//!   diffuse reflection.
//! - **Lifecycle** ([`trajectory`]) — The per-particle tracking loop,
//!   material stack bookkeeping and termination codes.
//! - **Sources** ([`source`], [`sampling`]) — Sweep grids, volume
//!   sources and the seeded random draws behind them.
//! - **Fields** ([`fields`]) — Analytic field sources and the ramp
//!   schedule of the experiment phases.

pub mod constants;
pub mod fields;
pub mod integrator;
pub mod microroughness;
pub mod motion;
pub mod sampling;
pub mod source;
pub mod species;
pub mod state;
pub mod surface;
pub mod trajectory;

pub use species::Species;
pub use state::{Generation, Particle, StateVector, StopCode};
pub use trajectory::{OutcomeTally, TrackConfig, TrajectoryEngine};
