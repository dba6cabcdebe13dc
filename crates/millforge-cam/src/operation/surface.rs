//! Zigzag raster over a surface mesh.
//!
//! Samples a grid over the mesh's XY bounds with the drop-cutter, then emits
//! rows that follow the contact heights. Consecutive rows of a layer are
//! joined by a step-over at the highest contact along it, so a layer is cut
//! in one pass unless a step-over has no contact. Optional roughing layers
//! clamp the same rows to successive Z levels before the final surface pass.

use millforge_math::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{depth_layers, raster_rows, Layer, Segment, SegmentKind, StrategyInput, StrategyOutput};
use crate::dropcutter::{MemoizedContact, MeshContactSolver};
use crate::error::{CamError, Result, WarningKind};

/// Surface raster parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceZigZag {
    /// Distance between samples along a row. Defaults to half the stepover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_spacing: Option<f64>,
    /// Material left on the surface.
    #[serde(default)]
    pub stock_to_leave: f64,
    /// Cut down to the surface in stepdown layers before the final pass.
    #[serde(default)]
    pub rough: bool,
}

/// Contact heights of one raster row.
struct SampledRow {
    y: f64,
    /// `None` where the solver found nothing under the cutter.
    z: Vec<Option<f64>>,
}

impl SurfaceZigZag {
    /// Surface finishing with default sampling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the material left on the surface.
    pub fn with_stock_to_leave(mut self, stock: f64) -> Self {
        self.stock_to_leave = stock;
        self
    }

    /// Enable roughing layers.
    pub fn with_roughing(mut self) -> Self {
        self.rough = true;
        self
    }

    /// Generate rows for every layer.
    pub fn generate(&self, input: &StrategyInput<'_>) -> Result<StrategyOutput> {
        let mesh = input.mesh()?;
        mesh.validate()?;
        let settings = input.settings;
        let stepover = settings.stepover;
        if !stepover.is_finite() || stepover <= 0.0 {
            return Err(CamError::InvalidParameter {
                name: "stepover",
                value: stepover,
                reason: "must be positive",
            });
        }
        let spacing = self.sample_spacing.unwrap_or(stepover / 2.0);
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(CamError::InvalidParameter {
                name: "sample_spacing",
                value: spacing,
                reason: "must be positive",
            });
        }
        if !self.stock_to_leave.is_finite() || self.stock_to_leave < 0.0 {
            return Err(CamError::InvalidParameter {
                name: "stock_to_leave",
                value: self.stock_to_leave,
                reason: "must not be negative",
            });
        }
        let bounds = mesh.bounds().ok_or_else(|| CamError::DegenerateGeometry {
            loop_index: 0,
            reason: "mesh has no vertices".into(),
        })?;

        let local;
        let contact = match input.contact {
            Some(c) => c,
            None => {
                local = MemoizedContact::new(Box::new(MeshContactSolver::new(mesh)));
                &local
            }
        };

        let xs = sample_positions(bounds.min.x, bounds.max.x, spacing);
        let mut warnings = Vec::new();
        let rows: Vec<SampledRow> = raster_rows(bounds.min.y, bounds.max.y, stepover)
            .into_iter()
            .enumerate()
            .map(|(row, y)| {
                let z = xs
                    .iter()
                    .map(|&x| {
                        let z = contact.contact(x, y, input.tool);
                        if z.is_none() {
                            warnings.push(WarningKind::MeshContactUnresolved { row, x, y });
                        }
                        z
                    })
                    .collect();
                SampledRow { y, z }
            })
            .collect();

        let clearance = settings.clearance_height;
        let tol = settings.tolerance;
        let stl = self.stock_to_leave;
        let mut levels: Vec<(f64, Option<f64>, SegmentKind)> = Vec::new();
        if self.rough {
            let mut zs = depth_layers(input.top_z, settings.depth, settings.stepdown)?;
            zs.pop();
            levels.extend(zs.into_iter().map(|z| (z, Some(z), SegmentKind::Clearing)));
        }
        levels.push((input.bottom_z(), None, SegmentKind::Finish));

        // cutter tip height for contact `c` on a level clamped to `floor`
        let level_z = |c: f64, floor: Option<f64>| floor.map_or(c + stl, |f| f.max(c + stl));
        // step-over between row ends at the same X, lifted to the highest
        // contact sampled along it; `None` if any sample is unresolved
        let step_over = |from: Point3, to: Point3, floor: Option<f64>| -> Option<[Point3; 2]> {
            let (lo, hi) = if from.y <= to.y { (from.y, to.y) } else { (to.y, from.y) };
            let mut top = from.z.max(to.z);
            for y in sample_positions(lo, hi, spacing) {
                let c = contact.contact(from.x, y, input.tool)?;
                top = top.max(level_z(c, floor));
            }
            Some([Point3::new(from.x, from.y, top), Point3::new(to.x, to.y, top)])
        };

        let layers: Vec<Layer> = levels
            .into_iter()
            .map(|(layer_z, floor, kind)| {
                let mut segments: Vec<Segment> = Vec::new();
                for (i, row) in rows.iter().enumerate() {
                    let mut degraded = false;
                    let mut points: Vec<Point3> = xs
                        .iter()
                        .zip(&row.z)
                        .map(|(&x, z)| {
                            let z = match *z {
                                Some(c) => level_z(c, floor),
                                None => {
                                    degraded = true;
                                    clearance
                                }
                            };
                            Point3::new(x, row.y, z)
                        })
                        .collect();
                    if i % 2 == 1 {
                        points.reverse();
                    }
                    let points = simplify_row(&points, tol);
                    let degraded_rows = usize::from(degraded);

                    let bridge = match (segments.last().and_then(Segment::end), points.first()) {
                        (Some(end), Some(&start)) => step_over(end, start, floor),
                        _ => None,
                    };
                    match (bridge, segments.last_mut()) {
                        (Some(bridge), Some(chain)) => {
                            chain.points.extend(bridge);
                            chain.points.extend(points);
                            chain.degraded_rows += degraded_rows;
                        }
                        _ => segments.push(Segment {
                            points,
                            kind,
                            degraded_rows,
                        }),
                    }
                }
                Layer {
                    z: layer_z,
                    segments,
                }
            })
            .collect();

        let degraded_rows = rows.iter().filter(|r| r.z.iter().any(Option::is_none)).count();
        if degraded_rows > 0 {
            warn!(
                rows = degraded_rows,
                samples = warnings.len(),
                "surface contact unresolved, samples lifted to clearance"
            );
        }
        debug!(
            rows = rows.len(),
            samples_per_row = xs.len(),
            layers = layers.len(),
            cached = contact.cached(),
            "surface zigzag"
        );

        Ok(StrategyOutput { layers, warnings })
    }
}

/// `n` evenly spaced positions covering `[min, max]`, both ends included,
/// no further apart than `spacing`.
fn sample_positions(min: f64, max: f64, spacing: f64) -> Vec<f64> {
    let w = max - min;
    let intervals = (w / spacing - 1e-9).ceil().max(0.0) as usize;
    if intervals == 0 {
        return vec![min];
    }
    (0..=intervals)
        .map(|i| min + w * i as f64 / intervals as f64)
        .collect()
}

/// Drop points whose height the straight cut between their neighbours
/// reproduces within `tol`.
///
/// Every removed sample stays within `tol` of the emitted chord, so the
/// simplified row never dips more than `tol` below a contact height.
fn simplify_row(points: &[Point3], tol: f64) -> Vec<Point3> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let fits = |a: usize, b: usize| {
        let pa = points[a];
        let pb = points[b];
        let dx = pb.x - pa.x;
        let dy = pb.y - pa.y;
        let len_sq = dx * dx + dy * dy;
        points[a + 1..b].iter().all(|p| {
            let t = if len_sq > 0.0 {
                ((p.x - pa.x) * dx + (p.y - pa.y) * dy) / len_sq
            } else {
                0.0
            };
            (pa.z + t * (pb.z - pa.z) - p.z).abs() <= tol
        })
    };

    let mut out = vec![points[0]];
    let mut anchor = 0;
    let mut i = 2;
    while i < points.len() {
        if !fits(anchor, i) {
            anchor = i - 1;
            out.push(points[anchor]);
        }
        i += 1;
    }
    out.push(points[points.len() - 1]);
    out
}
