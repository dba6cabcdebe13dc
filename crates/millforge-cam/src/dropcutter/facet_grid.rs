//! Uniform XY bucket grid over the facets of a surface mesh.

use std::ops::RangeInclusive;

use millforge_math::{cross2, Bounds2, Point2, Point3, Vec3};

use crate::geometry::SurfaceMesh;

/// Mesh facet with its plane and XY footprint cached.
#[derive(Debug, Clone)]
pub struct Facet {
    /// Corners as `[x, y, z]`.
    pub v: [[f64; 3]; 3],
    /// Unit normal, flipped so that `normal[2] >= 0`.
    pub normal: [f64; 3],
    /// Plane offset: `normal · p = d` for points on the facet.
    pub d: f64,
    /// XY extent of the corners.
    pub footprint: Bounds2,
}

impl Facet {
    /// Facet from three corners, in any winding.
    pub fn new(a: Point3, b: Point3, c: Point3) -> Self {
        let n = (b - a).cross(&(c - a));
        let n = if n.z < 0.0 { -n } else { n };
        let n = n.try_normalize(1e-12).unwrap_or_else(Vec3::z);
        Self {
            v: [a, b, c].map(|p| [p.x, p.y, p.z]),
            normal: [n.x, n.y, n.z],
            d: n.dot(&a.coords),
            footprint: Bounds2::from_points(&[a.xy(), b.xy(), c.xy()]),
        }
    }

    fn corner_xy(&self, i: usize) -> Point2 {
        Point2::new(self.v[i][0], self.v[i][1])
    }

    /// Height of the facet plane above (x, y); `None` for vertical facets.
    pub fn z_at_xy(&self, x: f64, y: f64) -> Option<f64> {
        let [nx, ny, nz] = self.normal;
        (nz.abs() >= 1e-10).then(|| (self.d - nx * x - ny * y) / nz)
    }

    /// True if (x, y) falls inside the projected facet. Points on a shared
    /// edge count as inside both neighbours.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        let p = Point2::new(x, y);
        let [a, b, c] = [0, 1, 2].map(|i| self.corner_xy(i));
        let area = cross2(&(b - a), &(c - a));
        if area.abs() < 1e-12 {
            return false;
        }
        let weights = [
            cross2(&(c - b), &(p - b)) / area,
            cross2(&(a - c), &(p - c)) / area,
            cross2(&(b - a), &(p - a)) / area,
        ];
        weights.iter().all(|&w| w >= -1e-9)
    }

    /// The three edges as corner pairs, in winding order.
    pub fn edges(&self) -> [[[f64; 3]; 2]; 3] {
        std::array::from_fn(|i| [self.v[i], self.v[(i + 1) % 3]])
    }
}

/// Facets bucketed by the grid cells their footprint overlaps.
#[derive(Debug)]
pub struct FacetGrid {
    facets: Vec<Facet>,
    origin: Point2,
    cell: f64,
    cols: usize,
    rows: usize,
    // row-major, `cols * rows` buckets
    buckets: Vec<Vec<usize>>,
}

impl FacetGrid {
    /// Bucket the facets of `mesh`. A non-positive `cell_size` sizes cells
    /// from the mesh extent and facet count.
    pub fn new(mesh: &SurfaceMesh, cell_size: f64) -> Self {
        let facets: Vec<Facet> = mesh
            .triangles()
            .map(|[a, b, c]| Facet::new(a, b, c))
            .collect();

        let mut extent = Bounds2::empty();
        for facet in &facets {
            extent.union(&facet.footprint);
        }
        if extent.is_empty() {
            extent = Bounds2::from_points(&[Point2::origin()]);
        }

        let cell = if cell_size > 0.0 {
            cell_size
        } else {
            let span = extent.width().max(extent.height());
            let per_side = (facets.len() as f64).sqrt().max(1.0);
            (span / per_side).max(1e-3)
        };
        let pad = 0.1 * cell;
        let cols = ((extent.width() + 2.0 * pad) / cell).ceil() as usize + 1;
        let rows = ((extent.height() + 2.0 * pad) / cell).ceil() as usize + 1;

        let mut grid = Self {
            facets: Vec::new(),
            origin: Point2::new(extent.min.x - pad, extent.min.y - pad),
            cell,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        };
        for (index, facet) in facets.iter().enumerate() {
            let fp = &facet.footprint;
            grid.for_each_cell(fp.min, fp.max, |bucket| bucket.push(index));
        }
        grid.facets = facets;
        grid
    }

    fn span(&self, lo: f64, hi: f64, axis: usize) -> Option<RangeInclusive<usize>> {
        let count = if axis == 0 { self.cols } else { self.rows };
        let first = ((lo - self.origin[axis]) / self.cell).floor();
        let last = ((hi - self.origin[axis]) / self.cell).floor();
        if last < 0.0 || first >= count as f64 {
            return None;
        }
        Some(first.max(0.0) as usize..=(last as usize).min(count - 1))
    }

    fn for_each_cell(&mut self, lo: Point2, hi: Point2, mut f: impl FnMut(&mut Vec<usize>)) {
        let (Some(cols), Some(rows)) = (self.span(lo.x, hi.x, 0), self.span(lo.y, hi.y, 1)) else {
            return;
        };
        for row in rows {
            for col in cols.clone() {
                f(&mut self.buckets[row * self.cols + col]);
            }
        }
    }

    /// Facets that may lie under a disc of `radius` centred at (x, y),
    /// ascending and deduplicated.
    pub fn query_circle(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let (Some(cols), Some(rows)) = (
            self.span(x - radius, x + radius, 0),
            self.span(y - radius, y + radius, 1),
        ) else {
            return Vec::new();
        };
        let mut hits: Vec<usize> = rows
            .flat_map(|row| {
                let start = row * self.cols;
                cols.clone().map(move |col| start + col)
            })
            .flat_map(|cell| self.buckets[cell].iter().copied())
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Facet by index, as returned from [`FacetGrid::query_circle`].
    pub fn facet(&self, index: usize) -> &Facet {
        &self.facets[index]
    }

    /// Number of facets.
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// True if the mesh had no facets.
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn test_height_on_sloped_facet() {
        let facet = Facet::new(p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0), p(5.0, 10.0, 5.0));
        assert_relative_eq!(facet.z_at_xy(5.0, 5.0).unwrap(), 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_normal_faces_up_for_clockwise_winding() {
        let facet = Facet::new(p(0.0, 0.0, 0.0), p(5.0, 10.0, 0.0), p(10.0, 0.0, 0.0));
        assert!(facet.normal[2] > 0.99);
    }

    #[test]
    fn test_vertical_facet_has_no_height() {
        let facet = Facet::new(p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0), p(10.0, 0.0, 5.0));
        assert!(facet.z_at_xy(5.0, 0.0).is_none());
        assert!(!facet.contains_xy(5.0, 0.0));
    }

    #[test]
    fn test_contains_xy() {
        let facet = Facet::new(p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0), p(5.0, 10.0, 0.0));
        assert!(facet.contains_xy(5.0, 3.0));
        assert!(facet.contains_xy(5.0, 0.0));
        assert!(!facet.contains_xy(-1.0, 0.0));
        assert!(!facet.contains_xy(5.0, 15.0));
    }

    #[test]
    fn test_query_finds_only_nearby_facets() {
        let mesh = SurfaceMesh::new(
            vec![
                p(0.0, 0.0, 0.0),
                p(10.0, 0.0, 0.0),
                p(5.0, 10.0, 0.0),
                p(40.0, 40.0, 0.0),
                p(50.0, 40.0, 0.0),
                p(45.0, 50.0, 0.0),
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        );
        let grid = FacetGrid::new(&mesh, 5.0);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.query_circle(5.0, 5.0, 1.0), vec![0]);
        assert_eq!(grid.query_circle(45.0, 45.0, 1.0), vec![1]);
        assert!(grid.query_circle(100.0, 100.0, 1.0).is_empty());
        assert!(grid.query_circle(-50.0, 5.0, 1.0).is_empty());
    }

    #[test]
    fn test_automatic_cell_size() {
        let mesh = SurfaceMesh::new(
            vec![p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0), p(5.0, 10.0, 0.0)],
            vec![[0, 1, 2]],
        );
        let grid = FacetGrid::new(&mesh, 0.0);
        assert_eq!(grid.query_circle(5.0, 5.0, 0.5), vec![0]);
    }

    #[test]
    fn test_empty_mesh() {
        let grid = FacetGrid::new(&SurfaceMesh::new(Vec::new(), Vec::new()), 0.0);
        assert!(grid.is_empty());
        assert!(grid.query_circle(0.0, 0.0, 1.0).is_empty());
    }
}
