//! Geometry snapshots consumed from the CAD side.

use millforge_math::{Bounds3, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::boundary::Boundary2D;
use crate::error::{CamError, Result};

/// Triangulated surface used only for collision queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangles as vertex index triples.
    pub indices: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    /// Create a mesh from vertices and triangles.
    pub fn new(vertices: Vec<Point3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Iterate over triangle corner positions. Triangles referencing a
    /// missing vertex are skipped; [`SurfaceMesh::validate`] reports them.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        self.indices.iter().filter_map(|t| {
            let corner = |i: u32| self.vertices.get(i as usize).copied();
            Some([corner(t[0])?, corner(t[1])?, corner(t[2])?])
        })
    }

    /// Bounds of the vertices.
    pub fn bounds(&self) -> Option<Bounds3> {
        Bounds3::from_points(&self.vertices)
    }

    /// Check that the mesh has triangles and every index is in range.
    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(CamError::DegenerateGeometry {
                loop_index: 0,
                reason: "mesh has no triangles".into(),
            });
        }
        let n = self.vertices.len();
        if let Some(i) = self
            .indices
            .iter()
            .position(|t| t.iter().any(|&v| v as usize >= n))
        {
            return Err(CamError::DegenerateGeometry {
                loop_index: i,
                reason: format!("triangle {i} references a missing vertex"),
            });
        }
        Ok(())
    }
}

/// A named piece of geometry an operation can reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Closed planar region with optional holes.
    Boundary(Boundary2D),
    /// Triangulated surface.
    Mesh(SurfaceMesh),
    /// Explicit hole centres.
    Points {
        /// XY positions.
        points: Vec<Point2>,
    },
}

impl Geometry {
    /// Kind name used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Boundary(_) => "boundary",
            Geometry::Mesh(_) => "mesh",
            Geometry::Points { .. } => "point set",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetra() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
                Point3::new(0.0, 0.0, 5.0),
            ],
            vec![[0, 1, 3], [1, 2, 3], [2, 0, 3]],
        )
    }

    #[test]
    fn test_mesh_bounds_and_validation() {
        let mesh = tetra();
        assert!(mesh.validate().is_ok());
        let b = mesh.bounds().unwrap();
        assert_eq!(b.max.z, 5.0);
        assert_eq!(mesh.triangles().count(), 3);

        let mut broken = tetra();
        broken.indices.push([0, 1, 9]);
        assert_eq!(broken.triangles().count(), 3);
        assert!(matches!(
            broken.validate(),
            Err(CamError::DegenerateGeometry { loop_index: 3, .. })
        ));
    }

    #[test]
    fn test_geometry_tagged_json() {
        let json = r#"{"type":"Boundary","outer":[[0,0],[10,0],[10,10],[0,10]]}"#;
        let g: Geometry = serde_json::from_str(json).unwrap();
        assert_eq!(g.kind(), "boundary");

        let json = r#"{"type":"Points","points":[[1,2],[3,4]]}"#;
        let g: Geometry = serde_json::from_str(json).unwrap();
        assert!(matches!(g, Geometry::Points { ref points } if points.len() == 2));
    }
}
