//! Profile (contour) operation.

use millforge_math::{Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{depth_layers, Layer, Segment, SegmentKind, StrategyInput, StrategyOutput};
use crate::boundary::{interval_union, Intervals, Polygon};
use crate::error::{CamError, Result};
use crate::offset::offset_loop;

/// Which side of the boundary the tool runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileSide {
    /// Tool stays within the material region (outer shrinks, holes grow).
    #[default]
    Inside,
    /// Tool stays outside it (outer grows, holes shrink).
    Outside,
}

/// Holding tabs left standing on a profile so the part stays attached to
/// the stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTabs {
    /// Tab centres as fractions of each contour's length, in `[0, 1)`.
    pub positions: Vec<f64>,
    /// Tab length along the contour.
    pub width: f64,
    /// Tab height above the final depth.
    pub height: f64,
}

impl EdgeTabs {
    /// `count` tabs evenly spaced along every contour.
    pub fn evenly(count: usize, width: f64, height: f64) -> Self {
        Self {
            positions: (0..count).map(|i| i as f64 / count as f64).collect(),
            width,
            height,
        }
    }

    fn validate(&self, depth: f64) -> Result<()> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(CamError::InvalidParameter {
                name: "tab_width",
                value: self.width,
                reason: "must be positive",
            });
        }
        if !self.height.is_finite() || self.height <= 0.0 || self.height >= depth {
            return Err(CamError::InvalidParameter {
                name: "tab_height",
                value: self.height,
                reason: "must be positive and below the cut depth",
            });
        }
        if let Some(&t) = self.positions.iter().find(|t| !(0.0..1.0).contains(*t)) {
            return Err(CamError::InvalidParameter {
                name: "tab_position",
                value: t,
                reason: "must be in [0, 1)",
            });
        }
        Ok(())
    }

    /// Arc-length intervals covered by tabs on a loop of length `perimeter`.
    fn spans(&self, perimeter: f64) -> Intervals {
        let half = self.width / 2.0;
        let mut pieces = Vec::new();
        for &t in &self.positions {
            let (lo, hi) = (t * perimeter - half, t * perimeter + half);
            if hi - lo >= perimeter {
                pieces.push((0.0, perimeter));
            } else if lo < 0.0 {
                pieces.extend([(0.0, hi), (lo + perimeter, perimeter)]);
            } else if hi > perimeter {
                pieces.extend([(lo, perimeter), (0.0, hi - perimeter)]);
            } else {
                pieces.push((lo, hi));
            }
        }
        interval_union(&pieces, &[])
    }
}

/// Profile operation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Side of the boundary to cut on.
    #[serde(default)]
    pub side: ProfileSide,
    /// Tabs left on every contour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabs: Option<EdgeTabs>,
}

impl Profile {
    /// Profile on the given side.
    pub fn new(side: ProfileSide) -> Self {
        Self { side, tabs: None }
    }

    /// Leave holding tabs on every contour.
    pub fn with_tabs(mut self, tabs: EdgeTabs) -> Self {
        self.tabs = Some(tabs);
        self
    }

    /// One closed contour per boundary loop per depth layer.
    pub fn generate(&self, input: &StrategyInput<'_>) -> Result<StrategyOutput> {
        let boundary = input.boundary()?;
        let settings = input.settings;
        if let Some(tabs) = &self.tabs {
            tabs.validate(settings.depth)?;
        }
        let radius = input.tool.tool.radius();
        let distance = match self.side {
            ProfileSide::Inside => radius,
            ProfileSide::Outside => -radius,
        };

        let mut contours: Vec<Polygon> = Vec::new();
        for poly in boundary.loops() {
            let offset = offset_loop(poly, distance, settings.tolerance);
            if offset.is_empty() {
                let c = poly.centroid();
                return Err(CamError::FeatureTooSmall {
                    tool_radius: radius,
                    x: c.x,
                    y: c.y,
                });
            }
            contours.extend(offset);
        }

        let tab_top = input.bottom_z() + self.tabs.as_ref().map_or(0.0, |t| t.height);
        let layers = depth_layers(input.top_z, settings.depth, settings.stepdown)?
            .into_iter()
            .map(|z| Layer {
                z,
                segments: contours
                    .iter()
                    .map(|c| {
                        let points = match &self.tabs {
                            Some(tabs) if z < tab_top => tabbed_at(c, z, tab_top, tabs),
                            _ => closed_at(c, z),
                        };
                        Segment::new(points, SegmentKind::Finish)
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        debug!(
            contours = contours.len(),
            layers = layers.len(),
            side = ?self.side,
            tabs = self.tabs.as_ref().map_or(0, |t| t.positions.len()),
            "profile contours"
        );

        Ok(StrategyOutput {
            layers,
            warnings: Vec::new(),
        })
    }
}

/// The loop as a closed 3D polyline at height `z`.
pub(crate) fn closed_at(poly: &Polygon, z: f64) -> Vec<Point3> {
    poly.points
        .iter()
        .chain(poly.points.first())
        .map(|p| Point3::new(p.x, p.y, z))
        .collect()
}

/// The loop as a closed 3D polyline at height `z`, raised to `tab_top`
/// across each tab. Tabs start and end with a vertical step.
fn tabbed_at(poly: &Polygon, z: f64, tab_top: f64, tabs: &EdgeTabs) -> Vec<Point3> {
    let ring: Vec<Point2> = poly.points.iter().chain(poly.points.first()).copied().collect();
    let mut marks = vec![0.0];
    for w in ring.windows(2) {
        let s = marks[marks.len() - 1];
        marks.push(s + (w[1] - w[0]).norm());
    }
    let perimeter = marks[marks.len() - 1];

    // tab ends within a hair of a corner are moved onto it
    let snap = |s: f64| {
        marks
            .iter()
            .copied()
            .find(|m| (m - s).abs() <= 1e-9)
            .unwrap_or(s)
    };
    let spans: Intervals = tabs
        .spans(perimeter)
        .into_iter()
        .map(|(lo, hi)| (snap(lo), snap(hi)))
        .collect();
    let height = |s: f64, after: bool| {
        let raised = spans.iter().any(|&(lo, hi)| {
            if after {
                lo <= s && s < hi
            } else {
                lo < s && s <= hi
            }
        });
        if raised {
            tab_top
        } else {
            z
        }
    };

    let mut out = Vec::new();
    for (i, w) in ring.windows(2).enumerate() {
        let (s0, s1) = (marks[i], marks[i + 1]);
        let mut stops: Vec<f64> = spans
            .iter()
            .flat_map(|&(lo, hi)| [lo, hi])
            .filter(|&s| s > s0 && s < s1)
            .collect();
        stops.sort_by(f64::total_cmp);
        if i == 0 {
            out.push(Point3::new(w[0].x, w[0].y, height(s0, true)));
        }
        if s1 - s0 <= 1e-12 {
            continue;
        }
        for s in stops.into_iter().chain([s1]) {
            let p = w[0] + (w[1] - w[0]) * ((s - s0) / (s1 - s0));
            let (before, after) = (height(s, false), height(s, true));
            out.push(Point3::new(p.x, p.y, before));
            if s < perimeter && after != before {
                out.push(Point3::new(p.x, p.y, after));
            }
        }
    }
    out
}
