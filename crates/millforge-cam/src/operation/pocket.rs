//! Zigzag pocket clearing.
//!
//! The pocket floor is rastered with rows parallel to X inside the region
//! the tool centre may visit. Rows are chained into zigzags as long as the
//! connecting move stays inside that region; a chain breaks where an island
//! or a narrow neck would be crossed.

use millforge_math::{Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::profile::closed_at;
use super::{
    depth_layers, raster_rows, Layer, Segment, SegmentKind, StrategyInput, StrategyOutput,
};
use crate::boundary::Intervals;
use crate::error::{CamError, Result, WarningKind};
use crate::offset::{offset_region, OffsetRegion};

/// Distance by which rows are kept off the height of any region vertex.
const ROW_NUDGE: f64 = 1e-6;

/// Zigzag pocket parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PocketZigZag {
    /// Follow the region outline once per layer after clearing.
    #[serde(default)]
    pub finish_pass: bool,
}

impl PocketZigZag {
    /// Pocket with or without a finishing contour.
    pub fn new(finish_pass: bool) -> Self {
        Self { finish_pass }
    }

    /// Zigzag chains (and optional finish contours) for every depth layer.
    pub fn generate(&self, input: &StrategyInput<'_>) -> Result<StrategyOutput> {
        let boundary = input.boundary()?;
        let settings = input.settings;
        let diameter = input.tool.tool.diameter();
        let stepover = settings.stepover;
        check_stepover(stepover, diameter)?;

        let radius = diameter / 2.0;
        let region = offset_region(boundary, radius, settings.tolerance)?;
        let chains = zigzag_chains(&region, stepover, settings.tolerance);
        if chains.is_empty() {
            let c = boundary.outer().centroid();
            return Err(CamError::FeatureTooSmall {
                tool_radius: radius,
                x: c.x,
                y: c.y,
            });
        }

        let mut warnings = Vec::new();
        let mut finish = Vec::new();
        if self.finish_pass {
            for (i, contour) in region.loops().enumerate() {
                let inside = contour
                    .points
                    .iter()
                    .all(|p| region.contains_with_tol(p, settings.tolerance));
                if inside {
                    finish.push(contour);
                } else {
                    warn!(contour = i, "finish contour leaves the pocket region");
                    warnings.push(WarningKind::FinishContourDropped { contour: i });
                }
            }
        }

        let layers = depth_layers(input.top_z, settings.depth, settings.stepdown)?
            .into_iter()
            .map(|z| {
                let mut segments: Vec<Segment> = chains
                    .iter()
                    .map(|chain| {
                        let points = chain.iter().map(|p| Point3::new(p.x, p.y, z)).collect();
                        Segment::new(points, SegmentKind::Clearing)
                    })
                    .collect();
                segments.extend(
                    finish
                        .iter()
                        .map(|c| Segment::new(closed_at(c, z), SegmentKind::Finish)),
                );
                Layer { z, segments }
            })
            .collect::<Vec<_>>();

        debug!(
            chains = chains.len(),
            finish = finish.len(),
            layers = layers.len(),
            "pocket zigzag"
        );

        Ok(StrategyOutput { layers, warnings })
    }
}

/// Stepover must leave no gap between neighbouring passes.
pub(super) fn check_stepover(stepover: f64, diameter: f64) -> Result<()> {
    if !stepover.is_finite() || stepover <= 0.0 || stepover > diameter {
        return Err(CamError::InvalidParameter {
            name: "stepover",
            value: stepover,
            reason: "must be positive and no larger than the tool diameter",
        });
    }
    Ok(())
}

/// Raster the region and chain the row pieces into zigzags.
fn zigzag_chains(region: &OffsetRegion, stepover: f64, tol: f64) -> Vec<Vec<Point2>> {
    let bounds = region.bounds();
    if bounds.is_empty() {
        return Vec::new();
    }
    let vertex_ys: Vec<f64> = region
        .loops()
        .flat_map(|l| l.points.iter().map(|p| p.y))
        .collect();
    let mut rows: Vec<(f64, Vec<Option<(f64, f64)>>)> = raster_rows(bounds.min.y, bounds.max.y, stepover)
        .into_iter()
        .map(|y| {
            let (y, pieces) = row_pieces(region, y, &vertex_ys);
            (y, pieces.into_iter().map(Some).collect())
        })
        .collect();

    let mut chains = Vec::new();
    loop {
        // lowest row with an unused piece, leftmost piece first
        let Some((mut row, first)) = rows
            .iter()
            .enumerate()
            .find_map(|(r, (_, pieces))| pieces.iter().position(Option::is_some).map(|i| (r, i)))
        else {
            break;
        };
        let Some((mut x0, mut x1)) = rows[row].1[first].take() else {
            break;
        };
        let y = rows[row].0;
        let mut chain = vec![Point2::new(x0, y), Point2::new(x1, y)];
        let mut rightwards = true;

        while row + 1 < rows.len() {
            let next_y = rows[row + 1].0;
            let Some(idx) = rows[row + 1]
                .1
                .iter()
                .position(|p| matches!(p, Some((a, b)) if *a <= x1 && *b >= x0))
            else {
                break;
            };
            let Some((a, b)) = rows[row + 1].1[idx] else {
                break;
            };
            // the next row is entered at the end nearest to where this one ended
            let (entry, exit) = if rightwards { (b, a) } else { (a, b) };
            let here = chain[chain.len() - 1];
            let there = Point2::new(entry, next_y);
            if !region.contains_segment(&here, &there, tol) {
                break;
            }
            rows[row + 1].1[idx] = None;
            chain.push(there);
            chain.push(Point2::new(exit, next_y));
            rightwards = !rightwards;
            (x0, x1) = (a, b);
            row += 1;
        }
        chains.push(chain);
    }
    chains
}

/// Region intervals of the row at `y`. A row at the height of a vertex is
/// moved just off it, to the side where it cuts more, so a horizontal edge
/// never truncates the row.
fn row_pieces(region: &OffsetRegion, y: f64, vertex_ys: &[f64]) -> (f64, Intervals) {
    let Some(&vy) = vertex_ys.iter().find(|&&vy| (y - vy).abs() <= ROW_NUDGE) else {
        return (y, region.row_intervals(y));
    };
    let covered = |pieces: &Intervals| pieces.iter().map(|(a, b)| b - a).sum::<f64>();
    let below = region.row_intervals(vy - ROW_NUDGE);
    let above = region.row_intervals(vy + ROW_NUDGE);
    if covered(&above) > covered(&below) {
        (vy + ROW_NUDGE, above)
    } else {
        (vy - ROW_NUDGE, below)
    }
}
