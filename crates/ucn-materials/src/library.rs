//! Built-in library of measured wall materials.

use std::collections::HashMap;

use crate::material::{Material, MaterialError};

/// Named collection of materials used to resolve the strings in a
/// geometry definition.
#[derive(Debug, Clone)]
pub struct MaterialLibrary {
    materials: HashMap<String, Material>,
}

impl MaterialLibrary {
    /// Empty library containing only vacuum.
    pub fn new() -> Self {
        let mut materials = HashMap::new();
        materials.insert("vacuum".to_string(), Material::vacuum());
        Self { materials }
    }

    /// Library preloaded with measured Fermi potentials.
    ///
    /// Potentials are in neV, imaginary parts describe the measured loss
    /// per bounce through the bulk absorption cross section.
    pub fn standard() -> Self {
        let mut lib = Self::new();

        lib.insert(Material {
            name: "NiMo".into(),
            fermi_real: 183.04,
            fermi_imag: 0.018985481,
            rms_roughness: 2.4,
            correlation_length: 12.0,
            use_mr_model: true,
            ..Material::vacuum()
        });
        lib.insert(Material {
            name: "PE".into(),
            fermi_real: -8.56,
            fermi_imag: 0.001912531,
            absorber: true,
            ..Material::vacuum()
        });
        lib.insert(Material {
            name: "Ti".into(),
            fermi_real: -50.76,
            fermi_imag: 0.024983971,
            absorber: true,
            ..Material::vacuum()
        });
        lib.insert(Material {
            name: "Cu".into(),
            fermi_real: 169.98,
            fermi_imag: 0.023134523,
            diffuse_prob: 0.1,
            ..Material::vacuum()
        });
        lib.insert(Material {
            name: "CsI".into(),
            fermi_real: 29.51,
            fermi_imag: 0.03,
            absorber: true,
            ..Material::vacuum()
        });
        lib.insert(Material {
            name: "DLC".into(),
            fermi_real: 256.0,
            fermi_imag: 0.00182,
            rms_roughness: 2.5,
            correlation_length: 20.0,
            use_mr_model: true,
            ..Material::vacuum()
        });

        lib
    }

    /// Add or replace a material, keyed by its name.
    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    /// Look up a material by name.
    pub fn get(&self, name: &str) -> Result<&Material, MaterialError> {
        self.materials
            .get(name)
            .ok_or_else(|| MaterialError::NotFound(name.to_string()))
    }

    /// Names of all known materials, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate every material in the library.
    pub fn validate(&self) -> Result<(), MaterialError> {
        for m in self.materials.values() {
            m.validate()?;
        }
        Ok(())
    }
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_library_contains_vacuum() {
        let lib = MaterialLibrary::standard();
        let v = lib.get("vacuum").unwrap();
        assert_eq!(v.fermi_real, 0.0);
    }

    #[test]
    fn test_standard_library_validates() {
        MaterialLibrary::standard().validate().unwrap();
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let lib = MaterialLibrary::standard();
        let dlc = lib.get("DLC").unwrap();
        assert!(dlc.use_mr_model);
        assert!(lib.get("unobtainium").is_err());
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut lib = MaterialLibrary::new();
        lib.insert(Material::ideal("Cu", 100.0));
        lib.insert(Material::ideal("Cu", 169.98));
        assert_eq!(lib.get("Cu").unwrap().fermi_real, 169.98);
    }

    #[test]
    fn test_negative_potential_material_is_valid() {
        let lib = MaterialLibrary::standard();
        let ti = lib.get("Ti").unwrap();
        assert!(ti.fermi_real < 0.0);
        ti.validate().unwrap();
    }
}
