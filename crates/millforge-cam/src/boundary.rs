//! Planar boundaries: closed polygons and regions with holes.

use millforge_math::{cross2, Bounds2, Point2, Tolerance};
use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// A closed 2D polygon. The closing edge from the last point back to the
/// first is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    /// Vertices of the polygon in order.
    pub points: Vec<Point2>,
}

impl Polygon {
    /// Create a new polygon from points.
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle, counter-clockwise.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(vec![
            Point2::new(min_x, min_y),
            Point2::new(max_x, min_y),
            Point2::new(max_x, max_y),
            Point2::new(min_x, max_y),
        ])
    }

    /// Regular polygon approximating a circle, counter-clockwise.
    pub fn circle(center: Point2, radius: f64, segments: usize) -> Self {
        let n = segments.max(3);
        let points = (0..n)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / n as f64;
                Point2::new(center.x + radius * a.cos(), center.y + radius * a.sin())
            })
            .collect();
        Self::new(points)
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the polygon is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed area of the polygon.
    /// Positive for counter-clockwise, negative for clockwise.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area / 2.0
    }

    /// Is the polygon counter-clockwise?
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Reverse the winding order.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Ensure counter-clockwise winding.
    pub fn ensure_ccw(&mut self) {
        if !self.is_ccw() {
            self.reverse();
        }
    }

    /// Ensure clockwise winding.
    pub fn ensure_cw(&mut self) {
        if self.is_ccw() {
            self.reverse();
        }
    }

    /// Area centroid, falling back to the vertex average for degenerate loops.
    pub fn centroid(&self) -> Point2 {
        let n = self.points.len();
        if n == 0 {
            return Point2::origin();
        }
        let area = self.signed_area();
        if area.abs() < 1e-12 {
            let sum = self
                .points
                .iter()
                .fold(Point2::origin(), |acc, p| Point2::new(acc.x + p.x, acc.y + p.y));
            return Point2::new(sum.x / n as f64, sum.y / n as f64);
        }
        let (mut cx, mut cy) = (0.0, 0.0);
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let f = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * f;
            cy += (a.y + b.y) * f;
        }
        Point2::new(cx / (6.0 * area), cy / (6.0 * area))
    }

    /// Iterate over the edges, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Bounding rectangle.
    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_points(&self.points)
    }

    /// Even-odd point containment.
    pub fn contains(&self, p: &Point2) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Shortest distance from `p` to the polygon outline.
    pub fn distance_to(&self, p: &Point2) -> f64 {
        self.edges()
            .map(|(a, b)| point_segment_distance(p, &a, &b))
            .fold(f64::INFINITY, f64::min)
    }

    /// X coordinates where the horizontal line at `y` crosses the outline,
    /// sorted ascending.
    pub fn crossings_at(&self, y: f64) -> Vec<f64> {
        let mut xs: Vec<f64> = self
            .edges()
            .filter(|(a, b)| (a.y > y) != (b.y > y))
            .map(|(a, b)| a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x))
            .collect();
        xs.sort_by(f64::total_cmp);
        xs
    }

    /// Remove repeated and collinear vertices.
    pub fn cleaned(&self, tol: f64) -> Polygon {
        let mut pts: Vec<Point2> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if pts.last().map_or(true, |q| (p - q).norm() > tol) {
                pts.push(*p);
            }
        }
        while pts.len() > 1 && (pts[0] - pts[pts.len() - 1]).norm() <= tol {
            pts.pop();
        }

        let mut changed = true;
        while changed && pts.len() >= 3 {
            changed = false;
            let n = pts.len();
            for i in 0..n {
                let prev = pts[(i + n - 1) % n];
                let cur = pts[i];
                let next = pts[(i + 1) % n];
                let (e1, e2) = (cur - prev, next - cur);
                let scale = e1.norm() * e2.norm();
                if cross2(&e1, &e2).abs() <= 1e-12 * scale.max(1e-300) && e1.dot(&e2) > 0.0 {
                    pts.remove(i);
                    changed = true;
                    break;
                }
            }
        }
        Polygon::new(pts)
    }

    /// Check that no two non-adjacent edges intersect.
    pub fn is_simple(&self) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        for i in 0..n {
            let (a, b) = (self.points[i], self.points[(i + 1) % n]);
            for j in (i + 1)..n {
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                let (c, d) = (self.points[j], self.points[(j + 1) % n]);
                if segments_touch(&a, &b, &c, &d) {
                    return false;
                }
            }
        }
        true
    }
}

/// Distance from `p` to the segment `a`–`b`.
pub fn point_segment_distance(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-24 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Parameters `(t, u)` where segment `a`–`b` meets segment `c`–`d`, or
/// `None` if they are parallel.
pub fn segment_params(a: &Point2, b: &Point2, c: &Point2, d: &Point2) -> Option<(f64, f64)> {
    let r = b - a;
    let s = d - c;
    let denom = cross2(&r, &s);
    if denom.abs() <= 1e-12 * r.norm() * s.norm() {
        return None;
    }
    let ac = c - a;
    Some((cross2(&ac, &s) / denom, cross2(&ac, &r) / denom))
}

/// True if the closed segments intersect or overlap.
fn segments_touch(a: &Point2, b: &Point2, c: &Point2, d: &Point2) -> bool {
    match segment_params(a, b, c, d) {
        Some((t, u)) => (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u),
        None => {
            // parallel: overlapping only if collinear and projections meet
            let r = b - a;
            let len = r.norm();
            if len < 1e-12 || cross2(&r, &(c - a)).abs() > 1e-9 * len {
                return false;
            }
            let t0 = (c - a).dot(&r) / (len * len);
            let t1 = (d - a).dot(&r) / (len * len);
            t0.min(t1) <= 1.0 && t0.max(t1) >= 0.0
        }
    }
}

#[derive(Deserialize)]
struct BoundaryDef {
    outer: Polygon,
    #[serde(default)]
    holes: Vec<Polygon>,
}

/// A planar region: one outer loop minus zero or more holes.
///
/// On construction the winding is normalized so that material lies to the
/// left of every edge: the outer loop runs counter-clockwise and holes run
/// clockwise.
///
/// Deserializing never fails on bad loops. A boundary read from a job keeps
/// its loops as given together with the defect, and [`Boundary2D::check`]
/// reports it to whichever operation uses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoundaryDef")]
pub struct Boundary2D {
    outer: Polygon,
    holes: Vec<Polygon>,
    #[serde(skip)]
    defect: Option<CamError>,
}

impl From<BoundaryDef> for Boundary2D {
    fn from(def: BoundaryDef) -> Self {
        match Boundary2D::new(def.outer.clone(), def.holes.clone()) {
            Ok(b) => b,
            Err(defect) => Self {
                outer: def.outer,
                holes: def.holes,
                defect: Some(defect),
            },
        }
    }
}

impl Boundary2D {
    /// Validate and normalize a boundary.
    pub fn new(outer: Polygon, holes: Vec<Polygon>) -> Result<Self> {
        let tol = Tolerance::DEFAULT.linear;
        let mut outer = check_loop(outer.cleaned(tol), 0)?;
        outer.ensure_ccw();
        let holes = holes
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let mut h = check_loop(h.cleaned(tol), i + 1)?;
                h.ensure_cw();
                Ok(h)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            outer,
            holes,
            defect: None,
        })
    }

    /// The boundary itself, or the validation error recorded when it was
    /// read.
    pub fn check(&self) -> Result<&Self> {
        match &self.defect {
            Some(err) => Err(err.clone()),
            None => Ok(self),
        }
    }

    /// Boundary without holes.
    pub fn simple(outer: Polygon) -> Result<Self> {
        Self::new(outer, Vec::new())
    }

    /// The outer loop (counter-clockwise).
    pub fn outer(&self) -> &Polygon {
        &self.outer
    }

    /// The hole loops (clockwise).
    pub fn holes(&self) -> &[Polygon] {
        &self.holes
    }

    /// Outer loop followed by the holes.
    pub fn loops(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    /// Inside the outer loop and outside every hole.
    pub fn contains(&self, p: &Point2) -> bool {
        self.outer.contains(p) && !self.holes.iter().any(|h| h.contains(p))
    }

    /// Bounding rectangle of the outer loop.
    pub fn bounds(&self) -> Bounds2 {
        self.outer.bounds()
    }
}

fn check_loop(poly: Polygon, loop_index: usize) -> Result<Polygon> {
    if poly.len() < 3 {
        return Err(CamError::DegenerateGeometry {
            loop_index,
            reason: format!("{} distinct points, need at least 3", poly.len()),
        });
    }
    if poly.signed_area().abs() < 1e-12 {
        return Err(CamError::DegenerateGeometry {
            loop_index,
            reason: "zero area".into(),
        });
    }
    if !poly.is_simple() {
        return Err(CamError::DegenerateGeometry {
            loop_index,
            reason: "self-intersecting".into(),
        });
    }
    Ok(poly)
}

/// Sorted, disjoint closed intervals on a line.
pub type Intervals = Vec<(f64, f64)>;

/// Union of two interval lists.
pub fn interval_union(a: &[(f64, f64)], b: &[(f64, f64)]) -> Intervals {
    let mut all: Vec<(f64, f64)> = a.iter().chain(b.iter()).copied().collect();
    all.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut out: Intervals = Vec::with_capacity(all.len());
    for (lo, hi) in all {
        match out.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => out.push((lo, hi)),
        }
    }
    out
}

/// Parts of `a` not covered by `b`.
pub fn interval_subtract(a: &[(f64, f64)], b: &[(f64, f64)]) -> Intervals {
    let mut out = Vec::new();
    for &(lo, hi) in a {
        let mut cur = lo;
        for &(blo, bhi) in b {
            if bhi <= cur || blo >= hi {
                continue;
            }
            if blo > cur {
                out.push((cur, blo));
            }
            cur = cur.max(bhi);
            if cur >= hi {
                break;
            }
        }
        if cur < hi {
            out.push((cur, hi));
        }
    }
    out
}

/// Intervals of the line at `y` enclosed by `poly` (even-odd pairs).
pub fn loop_intervals(poly: &Polygon, y: f64) -> Intervals {
    poly.crossings_at(y)
        .chunks_exact(2)
        .map(|c| (c[0], c[1]))
        .collect()
}
