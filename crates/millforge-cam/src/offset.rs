//! Polygon offsetting.
//!
//! A loop is offset by moving every edge sideways, re-intersecting
//! neighbouring edges, trimming edges that were consumed by the offset and
//! finally splitting the curve at its self-intersections. Only the pieces
//! that keep the source winding and stay at least the offset distance away
//! from the source survive.

use std::collections::HashMap;

use millforge_math::{cross2, Bounds2, Point2, Tolerance, Vec2};

use crate::boundary::{
    interval_subtract, interval_union, loop_intervals, segment_params, Boundary2D, Intervals,
    Polygon,
};
use crate::error::{CamError, Result};

const EPS: f64 = Tolerance::DEFAULT.linear;

#[derive(Debug, Clone, Copy)]
struct OffsetEdge {
    /// Index of the source edge (and of its start vertex).
    src: usize,
    a: Point2,
    u: Vec2,
    len: f64,
}

#[derive(Debug, Clone, Copy)]
enum Join {
    /// Neighbouring offset lines meet at this point.
    Trim(Point2),
    /// Round join around the shared source vertex.
    Round,
    /// Route through the source vertices between the two edges.
    Pivot,
}

/// Offset a closed loop by `distance` to the left of its edges.
///
/// With the winding used by [`Boundary2D`] (material on the left) a positive
/// distance moves into the material. `tol` bounds the chord error of round
/// joins. Returns an empty list when the loop collapses.
pub fn offset_loop(poly: &Polygon, distance: f64, tol: f64) -> Vec<Polygon> {
    let src = poly.cleaned(EPS);
    if src.len() < 3 {
        return Vec::new();
    }
    if distance.abs() < EPS {
        return vec![src];
    }
    let chord_tol = tol.min(distance.abs() * 0.1).max(EPS);

    let edges = offset_edges(&src, distance);
    let Some(active) = trim_reversed(&edges, src.len(), distance) else {
        return Vec::new();
    };
    let raw = raw_curve(&src, &edges, &active, distance, chord_tol);

    let src_area = src.signed_area();
    let min_dist = distance.abs() - 2.0 * chord_tol - EPS;
    split_self_intersections(&raw)
        .into_iter()
        .map(|pts| Polygon::new(pts).cleaned(EPS))
        .filter(|p| p.len() >= 3)
        .filter(|p| {
            let area = p.signed_area();
            area.abs() > chord_tol * chord_tol && area.signum() == src_area.signum()
        })
        .filter(|p| {
            p.edges().all(|(a, b)| {
                let mid = Point2::from((a.coords + b.coords) * 0.5);
                src.distance_to(&a) >= min_dist && src.distance_to(&mid) >= min_dist
            })
        })
        .collect()
}

fn offset_edges(src: &Polygon, distance: f64) -> Vec<OffsetEdge> {
    let pts = &src.points;
    let n = pts.len();
    (0..n)
        .map(|i| {
            let dir = pts[(i + 1) % n] - pts[i];
            let len = dir.norm();
            let u = dir / len;
            let normal = Vec2::new(-u.y, u.x);
            OffsetEdge {
                src: i,
                a: pts[i] + normal * distance,
                u,
                len,
            }
        })
        .collect()
}

fn join(e: &OffsetEdge, f: &OffsetEdge, n: usize, distance: f64) -> Join {
    let turn = cross2(&e.u, &f.u) * distance.signum();
    let consecutive = (e.src + 1) % n == f.src;
    if turn > 1e-12 {
        match segment_params(&e.a, &(e.a + e.u), &f.a, &(f.a + f.u)) {
            Some((s, _)) => Join::Trim(e.a + e.u * s),
            None => Join::Pivot,
        }
    } else if consecutive && turn < -1e-12 {
        Join::Round
    } else {
        Join::Pivot
    }
}

fn param_on(e: &OffsetEdge, p: &Point2) -> f64 {
    (p - e.a).dot(&e.u)
}

/// Drop offset edges that were reversed between two trimmed corners.
/// Returns `None` once fewer than three edges remain.
fn trim_reversed(edges: &[OffsetEdge], n: usize, distance: f64) -> Option<Vec<usize>> {
    let mut active: Vec<usize> = (0..edges.len()).collect();
    loop {
        let m = active.len();
        if m < 3 {
            return None;
        }
        let joins: Vec<Join> = (0..m)
            .map(|k| join(&edges[active[k]], &edges[active[(k + 1) % m]], n, distance))
            .collect();

        let mut worst: Option<(usize, f64)> = None;
        for k in 0..m {
            let e = &edges[active[k]];
            if let (Join::Trim(x0), Join::Trim(x1)) = (joins[(k + m - 1) % m], joins[k]) {
                let deficit = param_on(e, &x0) - param_on(e, &x1);
                if deficit > EPS && worst.map_or(true, |(_, d)| deficit > d) {
                    worst = Some((k, deficit));
                }
            }
        }
        match worst {
            Some((k, _)) => {
                active.remove(k);
            }
            None => return Some(active),
        }
    }
}

fn raw_curve(
    src: &Polygon,
    edges: &[OffsetEdge],
    active: &[usize],
    distance: f64,
    chord_tol: f64,
) -> Vec<Point2> {
    let n = src.len();
    let m = active.len();
    let joins: Vec<Join> = (0..m)
        .map(|k| join(&edges[active[k]], &edges[active[(k + 1) % m]], n, distance))
        .collect();

    let mut out: Vec<Point2> = Vec::new();

    for k in 0..m {
        let e = &edges[active[k]];
        let f = &edges[active[(k + 1) % m]];
        let start = match joins[(k + m - 1) % m] {
            Join::Trim(x) => x,
            _ => e.a,
        };
        push_point(&mut out, start);
        match joins[k] {
            Join::Trim(x) => push_point(&mut out, x),
            Join::Round => {
                let b = e.a + e.u * e.len;
                push_point(&mut out, b);
                let center = src.points[f.src];
                for p in arc_points(&center, &b, &f.a, distance.abs(), chord_tol) {
                    push_point(&mut out, p);
                }
            }
            Join::Pivot => {
                push_point(&mut out, e.a + e.u * e.len);
                let mut v = (e.src + 1) % n;
                loop {
                    push_point(&mut out, src.points[v]);
                    if v == f.src {
                        break;
                    }
                    v = (v + 1) % n;
                }
            }
        }
    }
    if out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= EPS {
        out.pop();
    }
    out
}

fn push_point(out: &mut Vec<Point2>, p: Point2) {
    if out.last().map_or(true, |q| (p - *q).norm() > EPS) {
        out.push(p);
    }
}

/// Interior points of the short arc from `from` to `to` around `center`.
fn arc_points(center: &Point2, from: &Point2, to: &Point2, radius: f64, chord_tol: f64) -> Vec<Point2> {
    let v0 = from - center;
    let v1 = to - center;
    let sweep = cross2(&v0, &v1).atan2(v0.dot(&v1));
    let max_step = if chord_tol >= radius {
        std::f64::consts::FRAC_PI_2
    } else {
        2.0 * (1.0 - chord_tol / radius).acos()
    };
    let steps = (sweep.abs() / max_step).ceil().max(1.0) as usize;
    (1..steps)
        .map(|i| {
            let a = sweep * i as f64 / steps as f64;
            let (s, c) = a.sin_cos();
            *center + Vec2::new(v0.x * c - v0.y * s, v0.x * s + v0.y * c)
        })
        .collect()
}

/// Split a closed curve into loops at its self-intersections.
fn split_self_intersections(curve: &[Point2]) -> Vec<Vec<Point2>> {
    let n = curve.len();
    if n < 3 {
        return Vec::new();
    }
    let mut cuts: Vec<Vec<(f64, usize)>> = vec![Vec::new(); n];
    let mut nodes: Vec<Point2> = Vec::new();
    for i in 0..n {
        let (a, b) = (curve[i], curve[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (curve[j], curve[(j + 1) % n]);
            if let Some((t, u)) = segment_params(&a, &b, &c, &d) {
                let lo = -1e-12;
                let hi = 1.0 - 1e-12;
                if t >= lo && t < hi && u >= lo && u < hi {
                    let id = nodes.len();
                    nodes.push(a + (b - a) * t);
                    cuts[i].push((t, id));
                    cuts[j].push((u, id));
                }
            }
        }
    }

    let mut sequence: Vec<(Point2, Option<usize>)> = Vec::with_capacity(n + 2 * nodes.len());
    for (i, c) in cuts.iter_mut().enumerate() {
        sequence.push((curve[i], None));
        c.sort_by(|x, y| x.0.total_cmp(&y.0));
        sequence.extend(c.iter().map(|&(_, id)| (nodes[id], Some(id))));
    }

    let mut loops = Vec::new();
    let mut path: Vec<(Point2, Option<usize>)> = Vec::with_capacity(sequence.len());
    let mut seen: HashMap<usize, usize> = HashMap::new();
    for item in sequence {
        if let Some(id) = item.1 {
            if let Some(&k) = seen.get(&id) {
                loops.push(path[k..].iter().map(|(p, _)| *p).collect());
                path.truncate(k + 1);
                seen.retain(|_, pos| *pos <= k);
                continue;
            }
            seen.insert(id, path.len());
        }
        path.push(item);
    }
    loops.push(path.into_iter().map(|(p, _)| p).collect());
    loops
}

/// The area a tool centre may visit while staying inside a [`Boundary2D`]:
/// the union of the shrunk outer loops minus the union of the grown holes.
#[derive(Debug, Clone)]
pub struct OffsetRegion {
    /// Offset outer loops (counter-clockwise).
    pub outers: Vec<Polygon>,
    /// Offset hole loops (clockwise).
    pub holes: Vec<Polygon>,
}

/// Offset every loop of `boundary` by `distance` into the material.
///
/// Fails with [`CamError::FeatureTooSmall`] if any loop collapses.
pub fn offset_region(boundary: &Boundary2D, distance: f64, tol: f64) -> Result<OffsetRegion> {
    let collapse = |poly: &Polygon| {
        let c = poly.centroid();
        CamError::FeatureTooSmall {
            tool_radius: distance.abs(),
            x: c.x,
            y: c.y,
        }
    };
    let outers = offset_loop(boundary.outer(), distance, tol);
    if outers.is_empty() {
        return Err(collapse(boundary.outer()));
    }
    let mut holes = Vec::new();
    for hole in boundary.holes() {
        let grown = offset_loop(hole, distance, tol);
        if grown.is_empty() {
            return Err(collapse(hole));
        }
        holes.extend(grown);
    }
    Ok(OffsetRegion { outers, holes })
}

impl OffsetRegion {
    /// Outer loops followed by holes.
    pub fn loops(&self) -> impl Iterator<Item = &Polygon> {
        self.outers.iter().chain(self.holes.iter())
    }

    /// Bounding rectangle of the outer loops.
    pub fn bounds(&self) -> Bounds2 {
        let mut b = Bounds2::empty();
        for o in &self.outers {
            b.union(&o.bounds());
        }
        b
    }

    /// Strict containment.
    pub fn contains(&self, p: &Point2) -> bool {
        self.outers.iter().any(|o| o.contains(p)) && !self.holes.iter().any(|h| h.contains(p))
    }

    /// Containment that also accepts points within `tol` of an outline.
    pub fn contains_with_tol(&self, p: &Point2, tol: f64) -> bool {
        self.contains(p) || self.loops().any(|l| l.distance_to(p) <= tol)
    }

    /// Parts of the horizontal line at `y` inside the region.
    pub fn row_intervals(&self, y: f64) -> Intervals {
        let outer = self
            .outers
            .iter()
            .fold(Vec::new(), |acc, o| interval_union(&acc, &loop_intervals(o, y)));
        let holes = self
            .holes
            .iter()
            .fold(Vec::new(), |acc, h| interval_union(&acc, &loop_intervals(h, y)));
        interval_subtract(&outer, &holes)
            .into_iter()
            .filter(|(lo, hi)| hi - lo > EPS)
            .collect()
    }

    /// True if the straight move `a`–`b` stays inside the region (outlines
    /// included, within `tol`).
    pub fn contains_segment(&self, a: &Point2, b: &Point2, tol: f64) -> bool {
        let crosses = self.loops().any(|l| {
            l.edges().any(|(c, d)| match segment_params(a, b, &c, &d) {
                Some((t, u)) => t > 1e-9 && t < 1.0 - 1e-9 && u > 1e-9 && u < 1.0 - 1e-9,
                None => false,
            })
        });
        if crosses {
            return false;
        }
        [0.25, 0.5, 0.75]
            .iter()
            .all(|&t| self.contains_with_tol(&(*a + (b - a) * t), tol))
    }
}
