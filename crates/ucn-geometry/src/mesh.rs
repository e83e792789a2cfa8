//! Triangle soup meshes and segment intersection.
//!
//! All coordinates are in metres. Triangles are wound counter-clockwise
//! when viewed from outside the solid, so the geometric normal points
//! out of the enclosed volume.

/// Dot product of two 3-vectors.
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product of two 3-vectors.
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Component-wise difference `a - b`.
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Euclidean norm.
pub fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Normalised copy of `a`. Returns `a` unchanged when its norm is zero.
pub fn normalise(a: &[f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n == 0.0 {
        *a
    } else {
        [a[0] / n, a[1] / n, a[2] / n]
    }
}

/// A single triangle with precomputed outward normal.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [[f64; 3]; 3],
    /// Unit normal pointing out of the enclosed volume.
    pub normal: [f64; 3],
}

/// Result of a segment-triangle intersection test.
#[derive(Debug, Clone, Copy)]
pub struct SegmentHit {
    /// Fractional position along the segment, in [0, 1].
    pub s: f64,
    /// True if the segment travels from outside to inside the solid,
    /// i.e. against the triangle normal.
    pub entering: bool,
}

impl Triangle {
    /// Build a triangle, deriving the normal from the winding order.
    pub fn new(v0: [f64; 3], v1: [f64; 3], v2: [f64; 3]) -> Self {
        let normal = normalise(&cross(&sub(&v1, &v0), &sub(&v2, &v0)));
        Self {
            vertices: [v0, v1, v2],
            normal,
        }
    }

    /// Moeller-Trumbore intersection of the segment `p1 -> p2` with this
    /// triangle. Returns `None` when the segment misses, is parallel to
    /// the triangle plane, or hits outside [0, 1].
    pub fn intersect_segment(&self, p1: &[f64; 3], p2: &[f64; 3]) -> Option<SegmentHit> {
        let dir = sub(p2, p1);
        let edge1 = sub(&self.vertices[1], &self.vertices[0]);
        let edge2 = sub(&self.vertices[2], &self.vertices[0]);
        let pvec = cross(&dir, &edge2);
        let det = dot(&edge1, &pvec);
        if det.abs() < 1e-300 {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = sub(p1, &self.vertices[0]);
        let u = dot(&tvec, &pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = cross(&tvec, &edge1);
        let v = dot(&dir, &qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let s = dot(&edge2, &qvec) * inv_det;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }
        // det = -dir . n, so a positive determinant means the segment
        // opposes the outward normal and goes into the volume.
        Some(SegmentHit {
            s,
            entering: det > 0.0,
        })
    }

    /// Axis-aligned bounding box as `(min_corner, max_corner)`.
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for v in &self.vertices {
            for i in 0..3 {
                if v[i] < min[i] {
                    min[i] = v[i];
                }
                if v[i] > max[i] {
                    max[i] = v[i];
                }
            }
        }
        (min, max)
    }

    /// Triangle centroid.
    pub fn centroid(&self) -> [f64; 3] {
        let [a, b, c] = &self.vertices;
        [
            (a[0] + b[0] + c[0]) / 3.0,
            (a[1] + b[1] + c[1]) / 3.0,
            (a[2] + b[2] + c[2]) / 3.0,
        ]
    }
}

/// A closed triangle mesh describing the surface of one solid.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub triangles: Vec<Triangle>,
}

impl TriangleMesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }

    /// Axis-aligned bounding box over all triangles.
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for t in &self.triangles {
            let (tmin, tmax) = t.bounding_box();
            for i in 0..3 {
                if tmin[i] < min[i] {
                    min[i] = tmin[i];
                }
                if tmax[i] > max[i] {
                    max[i] = tmax[i];
                }
            }
        }
        (min, max)
    }

    /// Total surface area (m^2).
    pub fn surface_area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let e1 = sub(&t.vertices[1], &t.vertices[0]);
                let e2 = sub(&t.vertices[2], &t.vertices[0]);
                0.5 * norm(&cross(&e1, &e2))
            })
            .sum()
    }
}
