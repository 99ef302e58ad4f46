//! CPU-side mesh representation used by loaders.

use corelib::{CoreResult, FurError};

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Number of corners per face. Uniform across a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceArity {
    Triangles,
    Quads,
}

impl FaceArity {
    pub fn corners(self) -> usize {
        match self {
            FaceArity::Triangles => 3,
            FaceArity::Quads => 4,
        }
    }
}

/// Flat face index list, `arity.corners()` indices per face.
#[derive(Clone, Debug, PartialEq)]
pub struct Faces {
    pub arity: FaceArity,
    pub indices: Vec<u32>,
}

impl Faces {
    pub fn triangles(indices: Vec<u32>) -> Self {
        Self {
            arity: FaceArity::Triangles,
            indices,
        }
    }

    pub fn quads(indices: Vec<u32>) -> Self {
        Self {
            arity: FaceArity::Quads,
            indices,
        }
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / self.arity.corners()
    }
}

/// Vertices plus optional faces. Without faces the vertex list is drawn
/// in order as a triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub faces: Option<Faces>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, faces: Option<Faces>) -> Self {
        Self { vertices, faces }
    }

    /// Returns `true` if there is vertex data to draw.
    pub fn has_vertices(&self) -> bool {
        !self.vertices.is_empty()
    }

    /// Check the face list shape and that every index is in bounds.
    ///
    /// An empty vertex list is not a shape error: such meshes are accepted
    /// and skipped at draw time.
    pub fn validate(&self) -> CoreResult<()> {
        let Some(faces) = &self.faces else {
            return Ok(());
        };
        let corners = faces.arity.corners();
        if faces.indices.len() % corners != 0 {
            return Err(FurError::InvalidGeometry(format!(
                "{} face indices is not a multiple of {corners}",
                faces.indices.len()
            )));
        }
        let len = self.vertices.len();
        if let Some(bad) = faces.indices.iter().find(|&&i| i as usize >= len) {
            return Err(FurError::InvalidGeometry(format!(
                "face index {bad} out of bounds (vertices={len})"
            )));
        }
        Ok(())
    }

    /// Face list as triangles; quads are split along their 0-2 diagonal.
    pub fn triangle_indices(&self) -> Option<Vec<u32>> {
        let faces = self.faces.as_ref()?;
        Some(match faces.arity {
            FaceArity::Triangles => faces.indices.clone(),
            FaceArity::Quads => faces
                .indices
                .chunks_exact(4)
                .flat_map(|q| [q[0], q[1], q[2], q[0], q[2], q[3]])
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> MeshData {
        MeshData::new(vec![MeshVertex::default(); 4], Some(Faces::quads(vec![0, 1, 2, 3])))
    }

    #[test]
    fn quads_split_into_two_triangles() {
        let tris = quad_mesh().triangle_indices().expect("faces");
        assert_eq!(tris, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let mesh = MeshData::new(vec![MeshVertex::default(); 3], Some(Faces::triangles(vec![0, 1, 3])));
        assert!(matches!(mesh.validate(), Err(FurError::InvalidGeometry(_))));
    }

    #[test]
    fn ragged_face_list_is_rejected() {
        let mesh = MeshData::new(vec![MeshVertex::default(); 4], Some(Faces::quads(vec![0, 1, 2])));
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn faceless_and_empty_meshes_validate() {
        assert!(MeshData::new(vec![MeshVertex::default(); 3], None).validate().is_ok());
        let empty = MeshData::default();
        assert!(empty.validate().is_ok());
        assert!(!empty.has_vertices());
        assert_eq!(empty.triangle_indices(), None);
    }
}
