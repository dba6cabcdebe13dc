//! Contour-parallel pocket clearing.
//!
//! The pocket is cleared by rings offset inward from its boundary, one
//! stepover apart, until the region collapses. Where a ring of the outer
//! loop runs into a grown island (or the other way round) only the part
//! that stays clear of both is kept.

use millforge_math::{Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pocket::check_stepover;
use super::{depth_layers, Layer, Segment, SegmentKind, StrategyInput, StrategyOutput};
use crate::boundary::{segment_params, Boundary2D, Polygon};
use crate::error::{CamError, Result};
use crate::offset::{offset_region, OffsetRegion};

/// Contour pocket parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PocketContour {
    /// Run every ring against its offset winding.
    #[serde(default)]
    pub reverse: bool,
}

/// Open or closed 2D path; closed paths repeat their first point.
type Path2 = Vec<Point2>;

impl PocketContour {
    /// Contour pocket in the offset winding, or against it.
    pub fn new(reverse: bool) -> Self {
        Self { reverse }
    }

    /// Nested rings for every depth layer. The outermost ring follows the
    /// wall and is cut last in each layer.
    pub fn generate(&self, input: &StrategyInput<'_>) -> Result<StrategyOutput> {
        let boundary = input.boundary()?;
        let settings = input.settings;
        let diameter = input.tool.tool.diameter();
        check_stepover(settings.stepover, diameter)?;

        let radius = diameter / 2.0;
        let rings = contour_rings(boundary, radius, settings.stepover, settings.tolerance);
        if rings.is_empty() {
            let c = boundary.outer().centroid();
            return Err(CamError::FeatureTooSmall {
                tool_radius: radius,
                x: c.x,
                y: c.y,
            });
        }

        let layers = depth_layers(input.top_z, settings.depth, settings.stepdown)?
            .into_iter()
            .map(|z| {
                let segments = rings
                    .iter()
                    .enumerate()
                    .flat_map(|(i, ring)| {
                        let kind = if i == 0 {
                            SegmentKind::Finish
                        } else {
                            SegmentKind::Clearing
                        };
                        ring.iter().map(move |path| {
                            let mut points: Vec<Point3> =
                                path.iter().map(|p| Point3::new(p.x, p.y, z)).collect();
                            if self.reverse {
                                points.reverse();
                            }
                            Segment::new(points, kind)
                        })
                    })
                    .collect();
                Layer { z, segments }
            })
            .collect::<Vec<_>>();

        debug!(
            rings = rings.len(),
            paths = rings.iter().map(Vec::len).sum::<usize>(),
            layers = layers.len(),
            "pocket contour"
        );

        Ok(StrategyOutput {
            layers,
            warnings: Vec::new(),
        })
    }
}

/// Clipped offset rings at `radius`, `radius + stepover`, ... outermost
/// first. When a full stepover collapses the region but the stepover is
/// wider than the tool radius, one more ring is placed a radius further in
/// so the centre is not left standing.
fn contour_rings(boundary: &Boundary2D, radius: f64, stepover: f64, tol: f64) -> Vec<Vec<Path2>> {
    let b = boundary.bounds();
    let limit = 2 * ((b.width().max(b.height()) / stepover).ceil() as usize) + 4;

    let mut rings: Vec<Vec<Path2>> = Vec::new();
    let mut distance = radius;
    let mut step = stepover;
    for _ in 0..limit {
        let paths = offset_region(boundary, distance, tol)
            .map(|region| clip_region_loops(&region))
            .unwrap_or_default();
        if !paths.is_empty() {
            rings.push(paths);
            step = stepover;
            distance += step;
        } else if !rings.is_empty() && step > radius + tol {
            distance += radius - step;
            step = radius;
        } else {
            break;
        }
    }
    rings
}

fn clip_region_loops(region: &OffsetRegion) -> Vec<Path2> {
    region.loops().flat_map(|l| clip_loop(region, l)).collect()
}

/// True if `p`, a point on `own`, borders the region: inside some outer loop
/// and outside every other hole.
fn borders_region(region: &OffsetRegion, own: &Polygon, p: &Point2) -> bool {
    let in_outer = region
        .outers
        .iter()
        .any(|o| std::ptr::eq(o, own) || o.contains(p));
    in_outer
        && !region
            .holes
            .iter()
            .any(|h| !std::ptr::eq(h, own) && h.contains(p))
}

/// The parts of `own` that border the region: the whole loop (closed) if
/// nothing cuts it, otherwise the open runs between crossings.
fn clip_loop(region: &OffsetRegion, own: &Polygon) -> Vec<Path2> {
    let mut pieces: Vec<(Point2, Point2, bool)> = Vec::new();
    for (a, b) in own.edges() {
        let mut ts: Vec<f64> = region
            .loops()
            .filter(|l| !std::ptr::eq(*l, own))
            .flat_map(|l| l.edges())
            .filter_map(|(c, d)| segment_params(&a, &b, &c, &d))
            .filter(|&(t, u)| t > 1e-9 && t < 1.0 - 1e-9 && (0.0..=1.0).contains(&u))
            .map(|(t, _)| t)
            .collect();
        ts.push(0.0);
        ts.push(1.0);
        ts.sort_by(f64::total_cmp);
        for w in ts.windows(2) {
            if w[1] - w[0] <= 1e-12 {
                continue;
            }
            let mid = a + (b - a) * ((w[0] + w[1]) / 2.0);
            pieces.push((
                a + (b - a) * w[0],
                a + (b - a) * w[1],
                borders_region(region, own, &mid),
            ));
        }
    }

    let Some(first_dropped) = pieces.iter().position(|&(_, _, keep)| !keep) else {
        let mut closed = own.points.clone();
        closed.extend(own.points.first().copied());
        return vec![closed];
    };

    let mut paths = Vec::new();
    let mut current: Path2 = Vec::new();
    for i in 0..pieces.len() {
        let (p, q, keep) = pieces[(first_dropped + i) % pieces.len()];
        if keep {
            if current.is_empty() {
                current.push(p);
            }
            current.push(q);
        } else if !current.is_empty() {
            paths.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        paths.push(current);
    }
    paths
}
