//! Bounding-volume hierarchy over triangle soups.
//!
//! The tree is built once over all triangles of a scene and answers
//! "which triangles might this segment cross" queries. Leaves keep a
//! handful of triangles; interior nodes split on the longest axis of
//! the centroid bounds at the median.

use crate::mesh::Triangle;

const LEAF_SIZE: usize = 4;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn grow(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    pub fn grow_point(&mut self, p: &[f64; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn contains(&self, p: &[f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Expand every face outward by `margin`.
    pub fn inflate(&self, margin: f64) -> Aabb {
        Aabb {
            min: [
                self.min[0] - margin,
                self.min[1] - margin,
                self.min[2] - margin,
            ],
            max: [
                self.max[0] + margin,
                self.max[1] + margin,
                self.max[2] + margin,
            ],
        }
    }

    /// Slab test: does the segment `p1 -> p2` intersect this box?
    pub fn intersects_segment(&self, p1: &[f64; 3], p2: &[f64; 3]) -> bool {
        let mut tmin = 0.0f64;
        let mut tmax = 1.0f64;
        for i in 0..3 {
            let d = p2[i] - p1[i];
            if d.abs() < 1e-300 {
                if p1[i] < self.min[i] || p1[i] > self.max[i] {
                    return false;
                }
            } else {
                let inv = 1.0 / d;
                let mut t0 = (self.min[i] - p1[i]) * inv;
                let mut t1 = (self.max[i] - p1[i]) * inv;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                tmin = tmin.max(t0);
                tmax = tmax.min(t1);
                if tmin > tmax {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        bounds: Aabb,
        /// Indices into the scene triangle array.
        triangles: Vec<usize>,
    },
    Interior {
        bounds: Aabb,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn bounds(&self) -> &Aabb {
        match self {
            Node::Leaf { bounds, .. } => bounds,
            Node::Interior { bounds, .. } => bounds,
        }
    }
}

/// Spatial index over the triangles of a scene.
#[derive(Debug)]
pub struct TriangleTree {
    root: Option<Node>,
    bounds: Aabb,
}

impl TriangleTree {
    /// Build the hierarchy over `triangles`. Query results are indices
    /// into this slice.
    pub fn build(triangles: &[Triangle]) -> Self {
        let mut bounds = Aabb::empty();
        let mut items: Vec<(usize, Aabb, [f64; 3])> = triangles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let (min, max) = t.bounding_box();
                let b = Aabb { min, max };
                (i, b, t.centroid())
            })
            .collect();
        for (_, b, _) in &items {
            bounds.grow(b);
        }
        let root = if items.is_empty() {
            None
        } else {
            Some(Self::build_node(&mut items))
        };
        Self { root, bounds }
    }

    fn build_node(items: &mut [(usize, Aabb, [f64; 3])]) -> Node {
        let mut bounds = Aabb::empty();
        for (_, b, _) in items.iter() {
            bounds.grow(b);
        }
        if items.len() <= LEAF_SIZE {
            return Node::Leaf {
                bounds,
                triangles: items.iter().map(|(i, _, _)| *i).collect(),
            };
        }

        // Split on the longest axis of the centroid bounds at the median.
        let mut cbounds = Aabb::empty();
        for (_, _, c) in items.iter() {
            cbounds.grow_point(c);
        }
        let extents = [
            cbounds.max[0] - cbounds.min[0],
            cbounds.max[1] - cbounds.min[1],
            cbounds.max[2] - cbounds.min[2],
        ];
        let axis = if extents[0] >= extents[1] && extents[0] >= extents[2] {
            0
        } else if extents[1] >= extents[2] {
            1
        } else {
            2
        };
        if extents[axis] <= 0.0 {
            // All centroids coincide, splitting cannot help.
            return Node::Leaf {
                bounds,
                triangles: items.iter().map(|(i, _, _)| *i).collect(),
            };
        }
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| a.2[axis].total_cmp(&b.2[axis]));
        let (left_items, right_items) = items.split_at_mut(mid);
        Node::Interior {
            bounds,
            left: Box::new(Self::build_node(left_items)),
            right: Box::new(Self::build_node(right_items)),
        }
    }

    /// Bounds of the whole scene.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Collect indices of all triangles whose leaves the segment crosses.
    pub fn segment_candidates(&self, p1: &[f64; 3], p2: &[f64; 3], out: &mut Vec<usize>) {
        out.clear();
        if let Some(root) = &self.root {
            Self::visit(root, p1, p2, out);
        }
    }

    fn visit(node: &Node, p1: &[f64; 3], p2: &[f64; 3], out: &mut Vec<usize>) {
        if !node.bounds().intersects_segment(p1, p2) {
            return;
        }
        match node {
            Node::Leaf { triangles, .. } => out.extend_from_slice(triangles),
            Node::Interior { left, right, .. } => {
                Self::visit(left, p1, p2, out);
                Self::visit(right, p1, p2, out);
            }
        }
    }
}
