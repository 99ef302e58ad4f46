//! Minimal OBJ parser supporting positions, normals and texture coordinates.
//!
//! Faces keep their arity when the whole file agrees on 3 or 4 corners;
//! anything else is fan-triangulated. Files with vertices but no faces load
//! as a faceless mesh.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::mesh::{Faces, MeshData, MeshVertex};

/// Load an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<MeshData> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.as_ref().display()))?;
    load_obj_from_reader(BufReader::new(file))
}

/// Load an OBJ mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R) -> Result<MeshData> {
    parse_obj(reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<MeshData> {
    parse_obj(io::Cursor::new(contents))
}

fn parse_obj<R: BufRead>(reader: R) -> Result<MeshData> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();

    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    struct Key(usize, Option<usize>, Option<usize>);

    let mut unique: HashMap<Key, u32> = HashMap::new();
    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut polygons: Vec<Vec<u32>> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                normals.push([nx, ny, nz]);
            }
            "f" => {
                let mut face_indices: Vec<u32> = Vec::new();
                for part in parts {
                    let (vi, vti, vni) = parse_face_vertex(
                        part,
                        positions.len(),
                        texcoords.len(),
                        normals.len(),
                        line_no,
                    )?;
                    let key = Key(vi, vti, vni);
                    let index = match unique.get(&key) {
                        Some(&idx) => idx,
                        None => {
                            let position = positions.get(vi).copied().ok_or_else(|| {
                                anyhow!("Position index out of bounds on line {}", line_no + 1)
                            })?;
                            let uv = vti
                                .and_then(|i| texcoords.get(i).copied())
                                .unwrap_or([0.0, 0.0]);
                            let normal = vni
                                .and_then(|i| normals.get(i).copied())
                                .unwrap_or([0.0, 0.0, 1.0]);

                            let idx = u32::try_from(vertices.len())
                                .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
                            vertices.push(MeshVertex::new(position, normal, uv));
                            unique.insert(key, idx);
                            idx
                        }
                    };
                    face_indices.push(index);
                }

                if face_indices.len() < 3 {
                    log::debug!("Skipping degenerate face on line {}", line_no + 1);
                    continue;
                }
                polygons.push(face_indices);
            }
            _ => {
                // Ignore other directives (o/g/s/usemtl/etc.)
            }
        }
    }

    if polygons.is_empty() {
        if positions.is_empty() {
            anyhow::bail!("OBJ contained no vertices");
        }
        log::warn!(
            "OBJ has {} positions but no faces; drawing as a raw vertex list",
            positions.len()
        );
        let vertices = positions
            .into_iter()
            .map(|p| MeshVertex::new(p, [0.0, 0.0, 1.0], [0.0, 0.0]))
            .collect();
        return Ok(MeshData::new(vertices, None));
    }

    let faces = collect_faces(polygons);
    log::debug!(
        "OBJ parsed: {} vertices, {} faces ({:?})",
        vertices.len(),
        faces.face_count(),
        faces.arity
    );
    Ok(MeshData::new(vertices, Some(faces)))
}

/// Keep uniform triangle/quad faces as-is, fan-triangulate mixed polygons.
fn collect_faces(polygons: Vec<Vec<u32>>) -> Faces {
    let corners = polygons[0].len();
    let uniform = polygons.iter().all(|p| p.len() == corners);
    if uniform && (corners == 3 || corners == 4) {
        let indices = polygons.into_iter().flatten().collect();
        return if corners == 3 {
            Faces::triangles(indices)
        } else {
            Faces::quads(indices)
        };
    }

    let mut indices = Vec::new();
    for poly in polygons {
        for tri in 1..(poly.len() - 1) {
            indices.push(poly[0]);
            indices.push(poly[tri]);
            indices.push(poly[tri + 1]);
        }
    }
    Faces::triangles(indices)
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i32>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 {
        (raw - 1) as isize
    } else {
        (len as isize) + (raw as isize)
    };

    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::FaceArity;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let mesh = load_obj_from_str(src).expect("parse triangle");
        assert_eq!(mesh.vertices.len(), 3);
        let faces = mesh.faces.as_ref().expect("faces");
        assert_eq!(faces.arity, FaceArity::Triangles);
        assert_eq!(faces.indices, vec![0, 1, 2]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn uniform_quads_are_preserved() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = load_obj_from_str(src).expect("parse quad");
        let faces = mesh.faces.as_ref().expect("faces");
        assert_eq!(faces.arity, FaceArity::Quads);
        assert_eq!(faces.face_count(), 1);
    }

    #[test]
    fn mixed_polygons_are_triangulated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 2 2 0\nf 1 2 3\nf 1 2 3 4 5\n";
        let mesh = load_obj_from_str(src).expect("parse mixed");
        let faces = mesh.faces.as_ref().expect("faces");
        assert_eq!(faces.arity, FaceArity::Triangles);
        assert_eq!(faces.face_count(), 1 + 3);
    }

    #[test]
    fn negative_indices_resolve_from_the_end() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = load_obj_from_str(src).expect("parse relative");
        assert_eq!(mesh.faces.expect("faces").indices, vec![0, 1, 2]);
    }

    #[test]
    fn shared_corners_are_deduplicated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n";
        let mesh = load_obj_from_str(src).expect("parse shared");
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn faceless_obj_loads_without_faces() {
        let mesh = load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\n").expect("parse points");
        assert!(mesh.faces.is_none());
        assert_eq!(mesh.vertices.len(), 3);
    }

    #[test]
    fn zero_index_is_an_error() {
        assert!(load_obj_from_str("v 0 0 0\nf 0 1 1\n").is_err());
        assert!(load_obj_from_str("# nothing here\n").is_err());
    }
}
