//! Diagnostic tables: microroughness distributions and geometry
//! sampling for visual inspection.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use log::info;

use ucn_core::microroughness::MrParams;
use ucn_core::sampling::RandomSource;
use ucn_geometry::GeometryModel;
use ucn_materials::Material;

fn mr_params(material: &Material) -> MrParams {
    MrParams {
        b: material.rms_roughness * 1e-9,
        w: material.correlation_length * 1e-9,
        fermi_real: material.fermi_real * 1e-9,
    }
}

/// Write the MR diffuse distribution over the outgoing hemisphere for
/// one incidence angle and energy.
pub fn write_mr_distribution(
    material: &Material,
    energy_nev: f64,
    theta_i_deg: f64,
    path: &Path,
) -> anyhow::Result<()> {
    let params = mr_params(material);
    let energy = energy_nev * 1e-9;
    let theta_i = theta_i_deg.to_radians();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "# MR diffuse distribution for {}", material.name)?;
    writeln!(w, "# energy_nev: {energy_nev}")?;
    writeln!(w, "# theta_i_deg: {theta_i_deg}")?;
    writeln!(w, "theta_o_deg,phi_o_deg,intensity_per_sr")?;
    for it in 0..=90 {
        let theta_o = (it as f64).to_radians();
        for ip in 0..=72 {
            let phi_o = (-180.0 + 5.0 * ip as f64).to_radians();
            let value = params.distribution(energy, theta_i, theta_o, phi_o);
            writeln!(
                w,
                "{},{},{:.6e}",
                it,
                -180 + 5 * ip,
                value
            )?;
        }
    }
    info!("wrote MR distribution to {}", path.display());
    Ok(())
}

/// Write the integrated MR diffuse probability over a grid of
/// incidence angle and energy.
pub fn write_mr_probability(material: &Material, path: &Path) -> anyhow::Result<()> {
    let params = mr_params(material);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "# Integrated MR diffuse probability for {}", material.name)?;
    writeln!(w, "theta_i_deg,energy_nev,probability")?;
    for it in 0..18 {
        let theta_i_deg = 5.0 * it as f64 + 2.5;
        let theta_i = theta_i_deg.to_radians();
        for ie in 1..=20 {
            let energy_nev = 25.0 * ie as f64;
            let p = params.total_probability(energy_nev * 1e-9, theta_i);
            writeln!(w, "{},{},{:.6e}", theta_i_deg, energy_nev, p)?;
        }
    }
    info!("wrote MR probability table to {}", path.display());
    Ok(())
}

/// Fire random segments through the geometry and log every surface hit,
/// for plotting the scene as a point cloud.
pub fn sample_geometry(
    model: &GeometryModel,
    count: usize,
    seed: u64,
    path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "# Geometry surface samples ({count} segments)")?;
    writeln!(w, "x_m,y_m,z_m,solid,entering")?;

    // Segments start outside the scene as well, so solids that fill
    // their bounding box still get their faces sampled.
    let tight = *model.bounds();
    let extent = (0..3)
        .map(|i| tight.max[i] - tight.min[i])
        .fold(0.0_f64, f64::max);
    let bounds = tight.inflate(0.25 * extent.max(1e-3));
    let mut random = RandomSource::seeded(seed);
    let mut draw_point = |random: &mut RandomSource| {
        [
            random.uniform(bounds.min[0], bounds.max[0]),
            random.uniform(bounds.min[1], bounds.max[1]),
            random.uniform(bounds.min[2], bounds.max[2]),
        ]
    };
    for _ in 0..count {
        let p1 = draw_point(&mut random);
        let p2 = draw_point(&mut random);
        let crossings = model
            .collide(&p1, &p2, 0.0)
            .context("spatial query during geometry sampling")?;
        for c in crossings {
            let hit = [
                p1[0] + (p2[0] - p1[0]) * c.s,
                p1[1] + (p2[1] - p1[1]) * c.s,
                p1[2] + (p2[2] - p1[2]) * c.s,
            ];
            writeln!(
                w,
                "{:.6e},{:.6e},{:.6e},{},{}",
                hit[0],
                hit[1],
                hit[2],
                model.solid(c.solid).name,
                c.entering
            )?;
        }
    }
    info!("wrote geometry samples to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucn_geometry::primitives::cuboid_mesh;
    use ucn_geometry::Solid;
    use ucn_materials::MaterialLibrary;

    #[test]
    fn test_mr_tables_write() {
        let dir = std::env::temp_dir().join("ucn_mr_tables_test");
        let library = MaterialLibrary::standard();
        let nimo = library.get("NiMo").unwrap();
        write_mr_distribution(nimo, 100.0, 45.0, &dir.join("mr_dist.csv")).unwrap();
        write_mr_probability(nimo, &dir.join("mr_prob.csv")).unwrap();
        let dist = std::fs::read_to_string(dir.join("mr_dist.csv")).unwrap();
        assert!(dist.lines().count() > 90 * 72);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sample_geometry_hits_cube() {
        let model = GeometryModel::new(vec![(
            Solid {
                id: 1,
                name: "box".into(),
                material: "vacuum".into(),
                priority: 1,
                ignore_intervals: Vec::new(),
            },
            cuboid_mesh([0.0; 3], [0.3; 3]),
        )])
        .unwrap();
        let dir = std::env::temp_dir().join("ucn_sample_geometry_test");
        let path = dir.join("hits.csv");
        sample_geometry(&model, 500, 1, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().any(|l| l.contains("box")));
        // Chords through the cube cross it once in and once out.
        assert!(content.lines().any(|l| l.ends_with(",true")));
        assert!(content.lines().any(|l| l.ends_with(",false")));
        std::fs::remove_dir_all(&dir).ok();
    }
}
