//! Drop-cutter algorithm for chamfer (V-bit) mills.

use super::facet_grid::FacetGrid;
use super::{edge_contact, facet_gradient, facet_point_contact, vertex_contact};

/// Compute drop-cutter height for a chamfer mill.
///
/// `half_angle` is half the included cone angle in radians. A non-zero
/// `tip_radius` gives the cone a flat bottom.
pub fn drop_cutter_chamfer(
    grid: &FacetGrid,
    radius: f64,
    tip_radius: f64,
    half_angle: f64,
    x: f64,
    y: f64,
) -> f64 {
    let k = 1.0 / half_angle.tan();
    let cone = move |rho: f64| ((rho - tip_radius) * k).max(0.0);
    let candidates = grid.query_circle(x, y, radius);
    let mut max_z = f64::NEG_INFINITY;

    for &tri_idx in &candidates {
        let tri = grid.facet(tri_idx);

        // A facet steeper than the cone flank is touched at the outer rim,
        // a shallower one at the edge of the flat tip.
        if let Some((dir, slope)) = facet_gradient(tri) {
            max_z = max_z.max(facet_point_contact(tri, x, y, x, y, &cone));
            if slope > 0.0 {
                let rho = if slope > k { radius } else { tip_radius };
                let px = x + rho * dir[0];
                let py = y + rho * dir[1];
                max_z = max_z.max(facet_point_contact(tri, x, y, px, py, &cone));
            }
        }

        for [v0, v1] in tri.edges() {
            max_z = max_z.max(edge_contact(x, y, radius, v0, v1, &cone));
        }

        for v in &tri.v {
            max_z = max_z.max(vertex_contact(x, y, radius, *v, &cone));
        }
    }

    max_z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfaceMesh;
    use millforge_math::Point3;
    use std::f64::consts::FRAC_PI_4;

    fn mesh_grid(v: [[f64; 3]; 3]) -> FacetGrid {
        let mesh = SurfaceMesh::new(
            v.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
            vec![[0, 1, 2]],
        );
        FacetGrid::new(&mesh, 5.0)
    }

    #[test]
    fn test_v_bit_on_flat_triangle() {
        let grid = mesh_grid([[0.0, 0.0, 0.0], [20.0, 0.0, 0.0], [10.0, 20.0, 0.0]]);
        let z = drop_cutter_chamfer(&grid, 5.0, 0.0, FRAC_PI_4, 10.0, 10.0);
        assert!(z.abs() < 1e-9);
    }

    #[test]
    fn test_v_bit_on_spike_vertex() {
        // 90 degree V-bit: profile height equals the radial distance
        let grid = mesh_grid([[2.0, 0.0, 10.0], [50.0, 50.0, -100.0], [50.0, -50.0, -100.0]]);
        let z = drop_cutter_chamfer(&grid, 5.0, 0.0, FRAC_PI_4, 0.0, 0.0);
        assert!((z - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_tip_touches_step() {
        // tip radius 1, centre 0.5 from the apex: flat bottom rests on it
        let grid = mesh_grid([[0.5, 0.0, 3.0], [-20.0, 10.0, 0.0], [-20.0, -10.0, 0.0]]);
        let z = drop_cutter_chamfer(&grid, 5.0, 1.0, FRAC_PI_4, 0.0, 0.0);
        assert!((z - 3.0).abs() < 1e-6);
    }
}
