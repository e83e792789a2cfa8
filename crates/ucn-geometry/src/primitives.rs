//! Parametric primitives discretised into closed triangle meshes.
//!
//! Primitives are fully described by their TOML parameters and are the
//! quick way to set up a storage volume without an external mesh file.
//! All triangles are wound so their normals point out of the volume.

use serde::{Deserialize, Serialize};

use crate::mesh::{Triangle, TriangleMesh};

/// A shape that can be turned into a closed triangle mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Primitive {
    Cuboid(Cuboid),
    Cylinder(Cylinder),
}

/// An axis-aligned cuboid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cuboid {
    /// Centre position (m).
    pub centre: [f64; 3],
    /// Half-extents along x, y, z (m).
    pub half_extents: [f64; 3],
}

/// A z-aligned cylinder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cylinder {
    /// Centre of the bottom end-cap (m).
    pub base_centre: [f64; 3],
    /// Radius (m).
    pub radius: f64,
    /// Height along +z (m).
    pub height: f64,
    /// Number of segments around the circumference.
    #[serde(default = "default_segments")]
    pub segments: usize,
}

fn default_segments() -> usize {
    48
}

impl Primitive {
    /// Discretise into a closed, outward-wound triangle mesh.
    pub fn to_mesh(&self) -> TriangleMesh {
        match self {
            Primitive::Cuboid(c) => cuboid_mesh(c.centre, c.half_extents),
            Primitive::Cylinder(c) => {
                cylinder_mesh(c.base_centre, c.radius, c.height, c.segments)
            }
        }
    }
}

/// A closed axis-aligned cuboid mesh of 12 triangles.
pub fn cuboid_mesh(centre: [f64; 3], half_extents: [f64; 3]) -> TriangleMesh {
    let lo = [
        centre[0] - half_extents[0],
        centre[1] - half_extents[1],
        centre[2] - half_extents[2],
    ];
    let hi = [
        centre[0] + half_extents[0],
        centre[1] + half_extents[1],
        centre[2] + half_extents[2],
    ];
    // 8 corners, bit i of the index selects lo/hi on axis i.
    let corner = |ix: usize, iy: usize, iz: usize| {
        [
            if ix == 0 { lo[0] } else { hi[0] },
            if iy == 0 { lo[1] } else { hi[1] },
            if iz == 0 { lo[2] } else { hi[2] },
        ]
    };
    // Each quad listed CCW when seen from outside.
    let quads: [[[usize; 3]; 4]; 6] = [
        // -x
        [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]],
        // +x
        [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]],
        // -y
        [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]],
        // +y
        [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]],
        // -z
        [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]],
        // +z
        [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]],
    ];
    let mut triangles = Vec::with_capacity(12);
    for quad in &quads {
        let v: Vec<[f64; 3]> = quad.iter().map(|c| corner(c[0], c[1], c[2])).collect();
        triangles.push(Triangle::new(v[0], v[1], v[2]));
        triangles.push(Triangle::new(v[0], v[2], v[3]));
    }
    TriangleMesh::new(triangles)
}

/// A closed z-aligned cylinder mesh with flat end caps.
pub fn cylinder_mesh(
    base_centre: [f64; 3],
    radius: f64,
    height: f64,
    segments: usize,
) -> TriangleMesh {
    let n = segments.max(3);
    let [cx, cy, z0] = base_centre;
    let z1 = z0 + height;
    let ring = |z: f64| -> Vec<[f64; 3]> {
        (0..n)
            .map(|i| {
                let phi = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                [cx + radius * phi.cos(), cy + radius * phi.sin(), z]
            })
            .collect()
    };
    let bottom = ring(z0);
    let top = ring(z1);
    let mut triangles = Vec::with_capacity(4 * n);
    for i in 0..n {
        let j = (i + 1) % n;
        // Lateral wall, outward normal.
        triangles.push(Triangle::new(bottom[i], bottom[j], top[j]));
        triangles.push(Triangle::new(bottom[i], top[j], top[i]));
        // Bottom cap, normal -z.
        triangles.push(Triangle::new([cx, cy, z0], bottom[j], bottom[i]));
        // Top cap, normal +z.
        triangles.push(Triangle::new([cx, cy, z1], top[i], top[j]));
    }
    TriangleMesh::new(triangles)
}
