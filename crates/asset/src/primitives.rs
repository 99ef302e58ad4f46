//! Built-in meshes used when no OBJ file is available.

use std::f32::consts::{PI, TAU};

use crate::mesh::{Faces, MeshData, MeshVertex};

/// UV sphere of radius 1 with triangle faces.
pub fn uv_sphere(stacks: u32, slices: u32) -> MeshData {
    let stacks = stacks.max(2);
    let slices = slices.max(3);

    let mut vertices = Vec::with_capacity(((stacks + 1) * (slices + 1)) as usize);
    for i in 0..=stacks {
        let v = i as f32 / stacks as f32;
        let phi = v * PI;
        for j in 0..=slices {
            let u = j as f32 / slices as f32;
            let theta = u * TAU;
            let n = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
            vertices.push(MeshVertex::new(n, n, [u, 1.0 - v]));
        }
    }

    let ring = slices + 1;
    let mut indices = Vec::with_capacity((stacks * slices * 6) as usize);
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * ring + j;
            let b = a + ring;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    MeshData::new(vertices, Some(Faces::triangles(indices)))
}

/// Unit cube (half-extent 1) with one quad per side and per-face normals.
pub fn quad_cube() -> MeshData {
    // (normal, tangent u, tangent v); corners are n ± u ± v, CCW from outside.
    let sides: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(24);
    for (n, u, v) in sides {
        for (su, sv) in corners {
            let p = [
                n[0] + su * u[0] + sv * v[0],
                n[1] + su * u[1] + sv * v[1],
                n[2] + su * u[2] + sv * v[2],
            ];
            let uv = [(su + 1.0) * 0.5, (sv + 1.0) * 0.5];
            indices.push(vertices.len() as u32);
            vertices.push(MeshVertex::new(p, n, uv));
        }
    }

    MeshData::new(vertices, Some(Faces::quads(indices)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::FaceArity;

    #[test]
    fn sphere_is_valid_and_unit_radius() {
        let mesh = uv_sphere(8, 12);
        assert!(mesh.validate().is_ok());
        for v in &mesh.vertices {
            let r = v.position.iter().map(|c| c * c).sum::<f32>().sqrt();
            assert!((r - 1.0).abs() < 1e-5);
        }
        assert_eq!(mesh.faces.expect("faces").face_count(), 8 * 12 * 2);
    }

    #[test]
    fn cube_has_six_outward_quads() {
        let mesh = quad_cube();
        assert!(mesh.validate().is_ok());
        let faces = mesh.faces.as_ref().expect("faces");
        assert_eq!(faces.arity, FaceArity::Quads);
        assert_eq!(faces.face_count(), 6);
        for quad in faces.indices.chunks_exact(4) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.vertices[quad[k] as usize].position);
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let cross = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            let n = mesh.vertices[quad[0] as usize].normal;
            let dot = cross[0] * n[0] + cross[1] * n[1] + cross[2] * n[2];
            assert!(dot > 0.0, "quad winds inward");
        }
    }
}
