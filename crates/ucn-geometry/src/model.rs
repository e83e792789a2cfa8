//! Scene model: prioritised solids and ordered crossing queries.
//!
//! A scene is a set of closed solids that may overlap. Each solid has a
//! material name and a priority; where solids overlap, the highest
//! priority wins. Trajectory segments are tested against all solids at
//! once through a shared spatial index, and the crossings come back
//! ordered along the segment.

use thiserror::Error;

use crate::mesh::{Triangle, TriangleMesh};
use crate::tree::TriangleTree;

/// Margin added around the scene bounds before a particle counts as lost.
const BOUNDS_MARGIN: f64 = 1e-3;

/// Errors from spatial queries.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Spatial query failed: {0}")]
    SpatialQuery(String),

    #[error("Query point outside the representable volume: {0}")]
    InvalidPoint(String),

    #[error("Scene contains no solids")]
    EmptyScene,

    #[error("Duplicate solid name: {0}")]
    DuplicateSolid(String),
}

/// One closed solid of the scene.
#[derive(Debug, Clone)]
pub struct Solid {
    /// Stable identifier, unique within the scene.
    pub id: u32,
    pub name: String,
    /// Material name, resolved against the material library.
    pub material: String,
    /// Higher priority wins where solids overlap.
    pub priority: i32,
    /// Time intervals (s) during which crossings of this solid are
    /// ignored, e.g. an open valve during filling.
    pub ignore_intervals: Vec<(f64, f64)>,
}

impl Solid {
    /// True if crossings of this solid are suppressed at time `t`.
    pub fn ignored_at(&self, t: f64) -> bool {
        self.ignore_intervals
            .iter()
            .any(|&(t0, t1)| t >= t0 && t <= t1)
    }
}

/// A surface crossing along a trajectory segment.
#[derive(Debug, Clone, Copy)]
pub struct Crossing {
    /// Fractional position along the segment, in [0, 1].
    pub s: f64,
    /// Index of the crossed solid in [`GeometryModel::solids`].
    pub solid: usize,
    /// Priority of the crossed solid.
    pub priority: i32,
    /// Outward unit normal of the crossed surface.
    pub normal: [f64; 3],
    /// True if the segment enters the solid here.
    pub entering: bool,
}

/// The full scene: solids, flattened triangle soup and spatial index.
#[derive(Debug)]
pub struct GeometryModel {
    pub solids: Vec<Solid>,
    triangles: Vec<Triangle>,
    /// Triangle index -> index into `solids`.
    tri_solid: Vec<usize>,
    tree: TriangleTree,
    /// Crossings closer than this along a segment count as simultaneous
    /// and are ordered by priority instead of position.
    tie_epsilon: f64,
}

impl GeometryModel {
    /// Assemble the scene from solids and their meshes.
    pub fn new(parts: Vec<(Solid, TriangleMesh)>) -> Result<Self, GeometryError> {
        if parts.is_empty() {
            return Err(GeometryError::EmptyScene);
        }
        let mut seen: Vec<&str> = Vec::new();
        for (solid, _) in &parts {
            if seen.contains(&solid.name.as_str()) {
                return Err(GeometryError::DuplicateSolid(solid.name.clone()));
            }
            seen.push(&solid.name);
        }
        let mut solids = Vec::with_capacity(parts.len());
        let mut triangles = Vec::new();
        let mut tri_solid = Vec::new();
        for (idx, (solid, mesh)) in parts.into_iter().enumerate() {
            for t in mesh.triangles {
                triangles.push(t);
                tri_solid.push(idx);
            }
            solids.push(solid);
        }
        let tree = TriangleTree::build(&triangles);
        Ok(Self {
            solids,
            triangles,
            tri_solid,
            tree,
            tie_epsilon: 1e-9,
        })
    }

    /// True while the point is inside the (slightly inflated) scene
    /// bounds. Leaving them terminates tracking.
    pub fn in_bounds(&self, p: &[f64; 3]) -> bool {
        self.tree.bounds().inflate(BOUNDS_MARGIN).contains(p)
    }

    /// Tight bounds of the whole scene.
    pub fn bounds(&self) -> &crate::tree::Aabb {
        self.tree.bounds()
    }

    /// All surface crossings of the segment `p1 -> p2` at time `t`,
    /// ordered along the segment. Crossings closer than the tie epsilon
    /// are reordered by priority (highest first), then by solid id.
    pub fn collide(
        &self,
        p1: &[f64; 3],
        p2: &[f64; 3],
        t: f64,
    ) -> Result<Vec<Crossing>, GeometryError> {
        if !p1.iter().chain(p2.iter()).all(|v| v.is_finite()) {
            return Err(GeometryError::InvalidPoint(format!(
                "non-finite segment endpoints {p1:?} -> {p2:?}"
            )));
        }
        let mut candidates = Vec::new();
        self.tree.segment_candidates(p1, p2, &mut candidates);

        let mut crossings = Vec::new();
        for &ti in &candidates {
            let solid_idx = self.tri_solid[ti];
            let solid = &self.solids[solid_idx];
            if solid.ignored_at(t) {
                continue;
            }
            if let Some(hit) = self.triangles[ti].intersect_segment(p1, p2) {
                crossings.push(Crossing {
                    s: hit.s,
                    solid: solid_idx,
                    priority: solid.priority,
                    normal: self.triangles[ti].normal,
                    entering: hit.entering,
                });
            }
        }

        crossings.sort_by(|a, b| a.s.total_cmp(&b.s));
        // Reorder runs of near-coincident crossings by priority. Two
        // passes keep the comparator a total order over the whole list.
        let mut i = 0;
        while i < crossings.len() {
            let mut j = i + 1;
            while j < crossings.len() && crossings[j].s - crossings[j - 1].s < self.tie_epsilon {
                j += 1;
            }
            if j - i > 1 {
                crossings[i..j]
                    .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.solid.cmp(&b.solid)));
            }
            i = j;
        }
        Ok(crossings)
    }

    /// Indices of all solids containing `p` at time `t`, highest
    /// priority first. Containment is decided by ray-cast parity along +z.
    pub fn containing(&self, p: &[f64; 3], t: f64) -> Result<Vec<usize>, GeometryError> {
        if !p.iter().all(|v| v.is_finite()) {
            return Err(GeometryError::InvalidPoint(format!(
                "non-finite query point {p:?}"
            )));
        }
        let top = self.tree.bounds().max[2] + 1.0;
        let far = [p[0], p[1], top.max(p[2] + 1.0)];
        let mut candidates = Vec::new();
        self.tree.segment_candidates(p, &far, &mut candidates);

        let mut parity = vec![0u32; self.solids.len()];
        for &ti in &candidates {
            if self.triangles[ti].intersect_segment(p, &far).is_some() {
                parity[self.tri_solid[ti]] += 1;
            }
        }
        let mut inside: Vec<usize> = parity
            .iter()
            .enumerate()
            .filter(|&(idx, &n)| n % 2 == 1 && !self.solids[idx].ignored_at(t))
            .map(|(idx, _)| idx)
            .collect();
        inside.sort_by(|&a, &b| {
            self.solids[b]
                .priority
                .cmp(&self.solids[a].priority)
                .then(self.solids[a].id.cmp(&self.solids[b].id))
        });
        Ok(inside)
    }

    pub fn solid(&self, idx: usize) -> &Solid {
        &self.solids[idx]
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Iterate over all triangles with the index of their owning solid.
    pub fn triangles(&self) -> impl Iterator<Item = (&Triangle, usize)> {
        self.triangles.iter().zip(self.tri_solid.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::cuboid_mesh;
    use approx::assert_relative_eq;

    fn solid(id: u32, name: &str, material: &str, priority: i32) -> Solid {
        Solid {
            id,
            name: name.into(),
            material: material.into(),
            priority,
            ignore_intervals: Vec::new(),
        }
    }

    /// Storage bottle: vacuum cuboid nested inside a wall cuboid.
    fn nested_scene() -> GeometryModel {
        GeometryModel::new(vec![
            (
                solid(1, "wall", "Cu", 1),
                cuboid_mesh([0.0; 3], [0.6, 0.6, 0.6]),
            ),
            (
                solid(2, "bottle", "vacuum", 2),
                cuboid_mesh([0.0; 3], [0.5, 0.5, 0.5]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_containing_orders_by_priority() {
        let model = nested_scene();
        let inside = model.containing(&[0.0, 0.0, 0.0], 0.0).unwrap();
        assert_eq!(inside.len(), 2);
        // Inner bottle (priority 2) first.
        assert_eq!(model.solid(inside[0]).name, "bottle");
        assert_eq!(model.solid(inside[1]).name, "wall");
    }

    #[test]
    fn test_containing_between_shells() {
        let model = nested_scene();
        let inside = model.containing(&[0.55, 0.0, 0.0], 0.0).unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(model.solid(inside[0]).name, "wall");
    }

    #[test]
    fn test_containing_outside_everything() {
        let model = nested_scene();
        assert!(model.containing(&[1.0, 0.0, 0.0], 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_collide_orders_along_segment() {
        let model = nested_scene();
        let crossings = model
            .collide(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0], 0.0)
            .unwrap();
        assert_eq!(crossings.len(), 2);
        assert_relative_eq!(crossings[0].s, 0.5, epsilon = 1e-12);
        assert_eq!(model.solid(crossings[0].solid).name, "bottle");
        assert!(!crossings[0].entering);
        assert_relative_eq!(crossings[1].s, 0.6, epsilon = 1e-12);
        assert!(!crossings[1].entering);
    }

    #[test]
    fn test_collide_is_deterministic() {
        let model = nested_scene();
        let a = model
            .collide(&[0.1, 0.2, 0.3], &[1.1, -0.4, 0.2], 0.0)
            .unwrap();
        let b = model
            .collide(&[0.1, 0.2, 0.3], &[1.1, -0.4, 0.2], 0.0)
            .unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.s, y.s);
            assert_eq!(x.solid, y.solid);
            assert_eq!(x.entering, y.entering);
        }
    }

    #[test]
    fn test_collide_entering_flag() {
        let model = nested_scene();
        let crossings = model
            .collide(&[1.0, 0.0, 0.0], &[0.55, 0.0, 0.0], 0.0)
            .unwrap();
        assert_eq!(crossings.len(), 1);
        assert!(crossings[0].entering);
        assert_eq!(model.solid(crossings[0].solid).name, "wall");
    }

    #[test]
    fn test_coincident_crossings_order_by_priority() {
        // Two solids sharing the face at x = 0.5.
        let model = GeometryModel::new(vec![
            (
                solid(1, "low", "Cu", 1),
                cuboid_mesh([0.0; 3], [0.5, 0.5, 0.5]),
            ),
            (
                solid(2, "high", "vacuum", 5),
                cuboid_mesh([0.25, 0.0, 0.0], [0.25, 0.4, 0.4]),
            ),
        ])
        .unwrap();
        let crossings = model
            .collide(&[0.3, 0.0, 0.0], &[0.7, 0.0, 0.0], 0.0)
            .unwrap();
        assert_eq!(crossings.len(), 2);
        assert_eq!(model.solid(crossings[0].solid).name, "high");
    }

    #[test]
    fn test_ignore_interval_suppresses_crossings() {
        let mut wall = solid(1, "valve", "Cu", 1);
        wall.ignore_intervals.push((0.0, 10.0));
        let model =
            GeometryModel::new(vec![(wall, cuboid_mesh([0.0; 3], [0.5, 0.5, 0.5]))]).unwrap();
        assert!(model
            .collide(&[-1.0, 0.0, 0.0], &[1.0, 0.0, 0.0], 5.0)
            .unwrap()
            .is_empty());
        assert_eq!(
            model
                .collide(&[-1.0, 0.0, 0.0], &[1.0, 0.0, 0.0], 20.0)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_non_finite_point_is_invalid_point_error() {
        let model = nested_scene();
        assert!(matches!(
            model.collide(&[f64::NAN, 0.0, 0.0], &[1.0, 0.0, 0.0], 0.0),
            Err(GeometryError::InvalidPoint(_))
        ));
        assert!(matches!(
            model.containing(&[f64::INFINITY, 0.0, 0.0], 0.0),
            Err(GeometryError::InvalidPoint(_))
        ));
    }

    #[test]
    fn test_bounds_check() {
        let model = nested_scene();
        assert!(model.in_bounds(&[0.0, 0.0, 0.0]));
        assert!(model.in_bounds(&[0.6, 0.6, 0.6]));
        assert!(!model.in_bounds(&[0.7, 0.0, 0.0]));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = GeometryModel::new(vec![
            (solid(1, "a", "Cu", 1), cuboid_mesh([0.0; 3], [0.5; 3])),
            (solid(2, "a", "Cu", 2), cuboid_mesh([0.0; 3], [0.4; 3])),
        ]);
        assert!(matches!(result, Err(GeometryError::DuplicateSolid(_))));
    }
}
