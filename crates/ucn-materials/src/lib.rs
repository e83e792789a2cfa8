//! # UCN Materials
//!
//! Wall-material properties for the UCN tracking framework. A [`Material`]
//! carries the complex Fermi potential an ultra-cold neutron sees at a
//! surface, together with the roughness parameters of the microroughness
//! diffuse-scattering model and a per-bounce loss coefficient.
//!
//! ## Available data
//!
//! | Source | Module | Status |
//! |--------|--------|--------|
//! | Measured Fermi potentials (PE, Ti, Cu, DLC, CsI, NiMo) | [`library`] | Implemented |
//! | Custom materials from job configuration | [`library`] | Implemented |

pub mod library;
pub mod material;

pub use library::MaterialLibrary;
pub use material::{Material, MaterialError};
