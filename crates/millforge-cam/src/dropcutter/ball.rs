//! Drop-cutter algorithm for ball end mills.
//!
//! The spherical tip touches a facet where the sphere normal matches the
//! facet normal. Edges and vertices are tested against the sphere profile.

use super::facet_grid::FacetGrid;
use super::{edge_contact, facet_point_contact, vertex_contact};

/// Compute drop-cutter height for a ball end mill of the given radius.
///
/// Returns the tip Z (bottom of the ball), or `f64::NEG_INFINITY` if
/// nothing lies under the tool.
pub fn drop_cutter_ball(grid: &FacetGrid, radius: f64, x: f64, y: f64) -> f64 {
    let r2 = radius * radius;
    let sphere = move |rho: f64| radius - (r2 - rho * rho).max(0.0).sqrt();
    let candidates = grid.query_circle(x, y, radius);
    let mut max_z = f64::NEG_INFINITY;

    for &tri_idx in &candidates {
        let tri = grid.facet(tri_idx);

        // Facet contact: offset the centre against the normal in XY.
        if tri.normal[2] > 1e-10 {
            let px = x - radius * tri.normal[0];
            let py = y - radius * tri.normal[1];
            max_z = max_z.max(facet_point_contact(tri, x, y, px, py, &sphere));
        }

        for [v0, v1] in tri.edges() {
            max_z = max_z.max(edge_contact(x, y, radius, v0, v1, &sphere));
        }

        for v in &tri.v {
            max_z = max_z.max(vertex_contact(x, y, radius, *v, &sphere));
        }
    }

    max_z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfaceMesh;
    use millforge_math::Point3;

    fn mesh_grid(v: [[f64; 3]; 3]) -> FacetGrid {
        let mesh = SurfaceMesh::new(
            v.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
            vec![[0, 1, 2]],
        );
        FacetGrid::new(&mesh, 5.0)
    }

    #[test]
    fn test_ball_on_flat_triangle() {
        let grid = mesh_grid([[0.0, 0.0, 0.0], [20.0, 0.0, 0.0], [10.0, 20.0, 0.0]]);
        let z = drop_cutter_ball(&grid, 3.0, 10.0, 10.0);
        assert!(z.abs() < 1e-9);
    }

    #[test]
    fn test_ball_on_45_degree_facet() {
        // plane z = y, tip = z(c) + r / nz - r
        let grid = mesh_grid([[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [5.0, 10.0, 10.0]]);
        let z = drop_cutter_ball(&grid, 2.0, 5.0, 3.0);
        let expected = 3.0 + 2.0 * 2f64.sqrt() - 2.0;
        assert!((z - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ball_on_vertex() {
        let grid = mesh_grid([[0.0, 0.0, 5.0], [-20.0, 10.0, 0.0], [-20.0, -10.0, 0.0]]);
        // apex 1 unit from the centre: sphere profile height r - sqrt(r^2 - 1)
        let z = drop_cutter_ball(&grid, 2.0, 1.0, 0.0);
        let expected = 5.0 - (2.0 - 3f64.sqrt());
        assert!((z - expected).abs() < 1e-9);
    }
}
