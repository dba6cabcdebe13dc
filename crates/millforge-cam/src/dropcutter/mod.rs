//! Drop-cutter contact queries.
//!
//! Drop-cutter determines the highest tool-tip Z at which a cutter centred
//! at a given (X, Y) touches a mesh without penetrating it. Each candidate
//! triangle is tested at three contact regions: the facet interior, the
//! triangle edges and the vertices.
//!
//! # Supported Tool Types
//!
//! - **Flat end mill**: flat bottom disk
//! - **Ball end mill**: spherical tip
//! - **Chamfer mill**: cone with an optional flat tip

mod ball;
mod chamfer;
mod facet_grid;
mod flat;

pub use ball::drop_cutter_ball;
pub use chamfer::drop_cutter_chamfer;
pub use facet_grid::{Facet, FacetGrid};
pub use flat::drop_cutter_flat;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::geometry::SurfaceMesh;
use crate::tool::{Tool, ToolEntry};

/// Capability to resolve cutter/surface contact.
///
/// Implementations must be pure: the same query always returns the same
/// answer.
pub trait SurfaceContact: Send + Sync {
    /// Highest tool-tip Z at (x, y) where `tool` touches the surface without
    /// penetrating it, or `None` when nothing lies under the cutter.
    fn contact_height(&self, x: f64, y: f64, tool: &Tool) -> Option<f64>;
}

/// Drop-cutter over a triangle mesh.
#[derive(Debug)]
pub struct MeshContactSolver {
    grid: FacetGrid,
}

impl MeshContactSolver {
    /// Build the solver with an automatically sized grid.
    pub fn new(mesh: &SurfaceMesh) -> Self {
        Self {
            grid: FacetGrid::new(mesh, 0.0),
        }
    }

    /// Build the solver with an explicit grid cell size.
    pub fn with_cell_size(mesh: &SurfaceMesh, cell_size: f64) -> Self {
        Self {
            grid: FacetGrid::new(mesh, cell_size),
        }
    }
}

impl SurfaceContact for MeshContactSolver {
    fn contact_height(&self, x: f64, y: f64, tool: &Tool) -> Option<f64> {
        let z = drop_cutter(&self.grid, tool, x, y);
        z.is_finite().then_some(z)
    }
}

/// Compute the drop-cutter tip height for a single point.
///
/// Returns `f64::NEG_INFINITY` when no triangle is within reach.
pub fn drop_cutter(grid: &FacetGrid, tool: &Tool, x: f64, y: f64) -> f64 {
    match tool {
        Tool::FlatEndMill { diameter } => drop_cutter_flat(grid, diameter / 2.0, x, y),
        Tool::BallEndMill { diameter } => drop_cutter_ball(grid, diameter / 2.0, x, y),
        Tool::ChamferMill {
            diameter,
            angle,
            tip_diameter,
        } => drop_cutter_chamfer(
            grid,
            diameter / 2.0,
            tip_diameter / 2.0,
            angle.to_radians() / 2.0,
            x,
            y,
        ),
    }
}

/// Memoizing wrapper keyed by (x, y, tool number).
pub struct MemoizedContact {
    inner: Box<dyn SurfaceContact>,
    cache: Mutex<HashMap<(u64, u64, u32), Option<f64>>>,
}

impl MemoizedContact {
    /// Wrap a solver.
    pub fn new(inner: Box<dyn SurfaceContact>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Contact height for `tool` at (x, y), computed at most once.
    pub fn contact(&self, x: f64, y: f64, tool: &ToolEntry) -> Option<f64> {
        let key = (x.to_bits(), y.to_bits(), tool.number);
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return *hit;
        }
        let z = self.inner.contact_height(x, y, &tool.tool);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, z);
        z
    }

    /// Number of memoized samples.
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for MemoizedContact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoizedContact")
            .field("cached", &self.cached())
            .finish()
    }
}

/// Contact of a cutter profile `h` with a single vertex.
pub(crate) fn vertex_contact(x: f64, y: f64, radius: f64, v: [f64; 3], h: &dyn Fn(f64) -> f64) -> f64 {
    let rho = ((x - v[0]) * (x - v[0]) + (y - v[1]) * (y - v[1])).sqrt();
    if rho > radius {
        return f64::NEG_INFINITY;
    }
    v[2] - h(rho)
}

/// Contact of a cutter profile `h` with a triangle edge.
///
/// The edge is clipped to the cutter footprint. Along the clipped segment
/// `z - h(rho)` is concave, so a ternary search finds its maximum.
pub(crate) fn edge_contact(
    x: f64,
    y: f64,
    radius: f64,
    v0: [f64; 3],
    v1: [f64; 3],
    h: &dyn Fn(f64) -> f64,
) -> f64 {
    let dx = v1[0] - v0[0];
    let dy = v1[1] - v0[1];
    let dz = v1[2] - v0[2];
    let a = dx * dx + dy * dy;

    if a < 1e-18 {
        // vertical edge: only its top end can be touched
        let top = if v0[2] >= v1[2] { v0 } else { v1 };
        return vertex_contact(x, y, radius, top, h);
    }

    let ox = v0[0] - x;
    let oy = v0[1] - y;
    let b = 2.0 * (ox * dx + oy * dy);
    let c = ox * ox + oy * oy - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return f64::NEG_INFINITY;
    }
    let sq = disc.sqrt();
    let t0 = ((-b - sq) / (2.0 * a)).max(0.0);
    let t1 = ((-b + sq) / (2.0 * a)).min(1.0);
    if t0 > t1 {
        return f64::NEG_INFINITY;
    }

    let f = |t: f64| {
        let px = ox + t * dx;
        let py = oy + t * dy;
        let rho = (px * px + py * py).sqrt().min(radius);
        v0[2] + t * dz - h(rho)
    };

    let (mut lo, mut hi) = (t0, t1);
    for _ in 0..100 {
        if hi - lo < 1e-12 {
            break;
        }
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if f(m1) < f(m2) {
            lo = m1;
        } else {
            hi = m2;
        }
    }
    f(lo).max(f(t0)).max(f(t1))
}

/// Contact at a specific point of a facet, if the point lies on it.
pub(crate) fn facet_point_contact(
    tri: &Facet,
    x: f64,
    y: f64,
    px: f64,
    py: f64,
    h: &dyn Fn(f64) -> f64,
) -> f64 {
    if !tri.contains_xy(px, py) {
        return f64::NEG_INFINITY;
    }
    match tri.z_at_xy(px, py) {
        Some(z) => z - h(((px - x) * (px - x) + (py - y) * (py - y)).sqrt()),
        None => f64::NEG_INFINITY,
    }
}

/// Uphill direction and slope of a facet in XY, if it is not vertical.
pub(crate) fn facet_gradient(tri: &Facet) -> Option<([f64; 2], f64)> {
    let nz = tri.normal[2];
    if nz < 1e-10 {
        return None;
    }
    let gx = -tri.normal[0] / nz;
    let gy = -tri.normal[1] / nz;
    let slope = (gx * gx + gy * gy).sqrt();
    if slope < 1e-12 {
        Some(([0.0, 0.0], 0.0))
    } else {
        Some(([gx / slope, gy / slope], slope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millforge_math::Point3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl SurfaceContact for Counting {
        fn contact_height(&self, x: f64, _y: f64, _tool: &Tool) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (x >= 0.0).then_some(1.0)
        }
    }

    #[test]
    fn test_memoized_contact_queries_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = MemoizedContact::new(Box::new(Counting {
            calls: calls.clone(),
        }));
        let tool = ToolEntry::new(1, "flat", Tool::FlatEndMill { diameter: 6.0 });
        assert_eq!(memo.contact(1.0, 2.0, &tool), Some(1.0));
        assert_eq!(memo.contact(1.0, 2.0, &tool), Some(1.0));
        assert_eq!(memo.contact(-1.0, 2.0, &tool), None);
        assert_eq!(memo.contact(-1.0, 2.0, &tool), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.cached(), 2);
    }

    #[test]
    fn test_mesh_solver_reports_missing_contact() {
        let mesh = SurfaceMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let solver = MeshContactSolver::new(&mesh);
        let tool = Tool::FlatEndMill { diameter: 2.0 };
        assert_eq!(solver.contact_height(2.0, 2.0, &tool), Some(0.0));
        assert_eq!(solver.contact_height(50.0, 50.0, &tool), None);
    }

    #[test]
    fn test_edge_contact_clips_to_footprint() {
        // edge rising from z=0 to z=10 over x in [0, 10]; flat cutter r=1 at x=5
        let z = edge_contact(5.0, 0.0, 1.0, [0.0, 0.0, 0.0], [10.0, 0.0, 10.0], &|_| 0.0);
        assert!((z - 6.0).abs() < 1e-9);
        let none = edge_contact(5.0, 5.0, 1.0, [0.0, 0.0, 0.0], [10.0, 0.0, 10.0], &|_| 0.0);
        assert_eq!(none, f64::NEG_INFINITY);
    }
}
