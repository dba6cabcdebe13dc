//! Drop-cutter algorithm for flat end mills.
//!
//! A flat end mill has three contact regions:
//! 1. Bottom face - contact with the facet interior
//! 2. Bottom rim - contact with triangle edges
//! 3. Bottom rim - contact with triangle vertices

use super::facet_grid::FacetGrid;
use super::{edge_contact, facet_gradient, facet_point_contact, vertex_contact};

/// Compute drop-cutter height for a flat end mill.
///
/// # Arguments
///
/// * `grid` - Facets of the surface mesh
/// * `radius` - Tool radius
/// * `x` - X coordinate of tool center
/// * `y` - Y coordinate of tool center
///
/// # Returns
///
/// The lowest tip Z at which the tool can be positioned without collision,
/// or `f64::NEG_INFINITY` if nothing lies under the tool.
pub fn drop_cutter_flat(grid: &FacetGrid, radius: f64, x: f64, y: f64) -> f64 {
    let flat = |_rho: f64| 0.0;
    let candidates = grid.query_circle(x, y, radius);
    let mut max_z = f64::NEG_INFINITY;

    for &tri_idx in &candidates {
        let tri = grid.facet(tri_idx);

        // Test 1: Bottom face contact
        // The highest point of a tilted facet under the disk lies on the rim,
        // uphill from the centre.
        if let Some((dir, slope)) = facet_gradient(tri) {
            max_z = max_z.max(facet_point_contact(tri, x, y, x, y, &flat));
            if slope > 0.0 {
                let px = x + radius * dir[0];
                let py = y + radius * dir[1];
                max_z = max_z.max(facet_point_contact(tri, x, y, px, py, &flat));
            }
        }

        // Test 2: Edge contact
        for [v0, v1] in tri.edges() {
            max_z = max_z.max(edge_contact(x, y, radius, v0, v1, &flat));
        }

        // Test 3: Vertex contact
        for v in &tri.v {
            max_z = max_z.max(vertex_contact(x, y, radius, *v, &flat));
        }
    }

    max_z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfaceMesh;
    use millforge_math::Point3;

    fn mesh_grid(tris: &[[[f64; 3]; 3]]) -> FacetGrid {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for t in tris {
            let base = vertices.len() as u32;
            vertices.extend(t.iter().map(|v| Point3::new(v[0], v[1], v[2])));
            indices.push([base, base + 1, base + 2]);
        }
        FacetGrid::new(&SurfaceMesh::new(vertices, indices), 5.0)
    }

    #[test]
    fn test_flat_on_flat_triangle() {
        let grid = mesh_grid(&[[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [5.0, 10.0, 0.0]]]);
        let z = drop_cutter_flat(&grid, 1.0, 5.0, 3.0);
        assert!((z - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_on_sloped_triangle_touches_uphill_rim() {
        // plane z = y
        let grid = mesh_grid(&[[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [5.0, 10.0, 10.0]]]);
        let z = drop_cutter_flat(&grid, 1.0, 5.0, 2.0);
        assert!((z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_rim_catches_vertex_outside_centre() {
        let grid = mesh_grid(&[[[0.0, 0.0, 2.0], [-10.0, 5.0, 0.0], [-10.0, -5.0, 0.0]]]);
        // centre is outside the triangle but the apex is under the rim
        let z = drop_cutter_flat(&grid, 1.0, 0.5, 0.0);
        assert!((z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_no_contact() {
        let grid = mesh_grid(&[[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [5.0, 10.0, 0.0]]]);
        let z = drop_cutter_flat(&grid, 1.0, 50.0, 50.0);
        assert_eq!(z, f64::NEG_INFINITY);
    }
}
