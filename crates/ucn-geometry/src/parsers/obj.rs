//! Parser for Wavefront `.obj` mesh files.
//!
//! OBJ files define 3D meshes as collections of vertices (`v`) and faces
//! (`f`). Each `o name` group becomes one named solid; files without any
//! `o` line produce a single solid called `default`. Vertex indices are
//! global across groups, as OBJ requires.
//!
//! Coordinates are treated as metres (no unit conversion).
//! Faces are triangulated on parse (quads and n-gons use fan
//! triangulation) and must be wound counter-clockwise seen from outside
//! the solid so the derived normals point outward.

use super::ParseError;
use crate::mesh::{Triangle, TriangleMesh};

/// Parse an OBJ file into named triangle meshes.
///
/// Handles the following OBJ elements:
/// - `v x y z` — vertex position
/// - `o name` — starts a new solid
/// - `f v1 v2 v3 ...` — face (triangulated via fan from first vertex)
/// - `f v1/vt1 ...` or `f v1/vt1/vn1 ...` or `f v1//vn1 ...` — takes vertex index only
///
/// All other lines (`vt`, `vn`, `g`, `mtllib`, `usemtl`, `s`, `#`, blank) are ignored.
pub fn parse_obj(content: &str) -> Result<Vec<(String, TriangleMesh)>, ParseError> {
    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut solids: Vec<(String, Vec<[usize; 3]>)> = Vec::new();

    for (line_idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let keyword = match parts.next() {
            Some(k) => k,
            None => continue,
        };

        match keyword {
            "v" => {
                let coords: Vec<&str> = parts.collect();
                if coords.len() < 3 {
                    return Err(ParseError::FormatError {
                        line: line_idx + 1,
                        message: format!(
                            "Vertex needs at least 3 coordinates, got {}",
                            coords.len()
                        ),
                    });
                }
                let mut v = [0.0f64; 3];
                for (i, c) in coords[..3].iter().enumerate() {
                    v[i] = c.parse().map_err(|_| ParseError::FormatError {
                        line: line_idx + 1,
                        message: format!("Invalid coordinate: {c}"),
                    })?;
                }
                vertices.push(v);
            }
            "o" => {
                let name = parts.collect::<Vec<&str>>().join(" ");
                if name.is_empty() {
                    return Err(ParseError::FormatError {
                        line: line_idx + 1,
                        message: "Object group needs a name".into(),
                    });
                }
                solids.push((name, Vec::new()));
            }
            "f" => {
                let indices: Result<Vec<usize>, ParseError> = parts
                    .enumerate()
                    .map(|(i, token)| {
                        // Handle v, v/vt, v/vt/vn, v//vn formats, take first element
                        let idx_str = token.split('/').next().unwrap_or(token);
                        let idx: usize =
                            idx_str.parse().map_err(|_| ParseError::FormatError {
                                line: line_idx + 1,
                                message: format!(
                                    "Invalid face index at position {}: {}",
                                    i + 1,
                                    token
                                ),
                            })?;
                        if idx == 0 {
                            return Err(ParseError::FormatError {
                                line: line_idx + 1,
                                message: "Face index 0 is invalid (OBJ indices are 1-based)"
                                    .into(),
                            });
                        }
                        Ok(idx - 1)
                    })
                    .collect();
                let indices = indices?;

                if indices.len() < 3 {
                    return Err(ParseError::FormatError {
                        line: line_idx + 1,
                        message: format!(
                            "Face needs at least 3 vertices, got {}",
                            indices.len()
                        ),
                    });
                }

                if solids.is_empty() {
                    solids.push(("default".to_string(), Vec::new()));
                }
                let faces = &mut solids.last_mut().unwrap().1;
                // Fan-triangulate from first vertex: (v0,v1,v2), (v0,v2,v3), ...
                for i in 1..indices.len() - 1 {
                    faces.push([indices[0], indices[i], indices[i + 1]]);
                }
            }
            // Ignore everything else (vt, vn, g, s, mtllib, usemtl, etc.)
            _ => {}
        }
    }

    if solids.iter().all(|(_, f)| f.is_empty()) {
        return Err(ParseError::FormatError {
            line: 0,
            message: "No faces found in OBJ file".into(),
        });
    }

    let n = vertices.len();
    let mut out = Vec::with_capacity(solids.len());
    for (name, faces) in solids {
        if faces.is_empty() {
            continue;
        }
        let mut triangles = Vec::with_capacity(faces.len());
        for (fi, face) in faces.iter().enumerate() {
            for &idx in face {
                if idx >= n {
                    return Err(ParseError::FormatError {
                        line: 0,
                        message: format!(
                            "Face {} of '{}' references vertex index {} but only {} vertices exist",
                            fi + 1,
                            name,
                            idx + 1,
                            n
                        ),
                    });
                }
            }
            triangles.push(Triangle::new(
                vertices[face[0]],
                vertices[face[1]],
                vertices[face[2]],
            ));
        }
        out.push((name, TriangleMesh::new(triangles)));
    }
    Ok(out)
}

/// Helper: build a cube OBJ string for testing. Cube spans ±half_size on
/// each axis, faces wound outward.
#[cfg(test)]
pub(crate) fn cube_obj(name: &str, half_size: f64) -> String {
    let h = half_size;
    format!(
        "o {name}\n\
         v -{h} -{h} -{h}\n\
         v {h} -{h} -{h}\n\
         v {h} {h} -{h}\n\
         v -{h} {h} -{h}\n\
         v -{h} -{h} {h}\n\
         v {h} -{h} {h}\n\
         v {h} {h} {h}\n\
         v -{h} {h} {h}\n\
         f 1 4 3 2\n\
         f 5 6 7 8\n\
         f 1 2 6 5\n\
         f 2 3 7 6\n\
         f 3 4 8 7\n\
         f 4 1 5 8\n"
    )
}
