//! Machining strategies.
//!
//! A strategy turns one piece of geometry into unordered cutting segments
//! grouped by depth layer. Linking segments into motion is left to the
//! [`Sequencer`](crate::Sequencer).

use millforge_math::Point3;
use serde::{Deserialize, Serialize};

use crate::boundary::Boundary2D;
use crate::dropcutter::MemoizedContact;
use crate::error::{CamError, Result, WarningKind};
use crate::geometry::{Geometry, SurfaceMesh};
use crate::tool::ToolEntry;
use crate::CamSettings;

mod contour;
mod drill;
mod pocket;
mod profile;
mod surface;

pub use contour::PocketContour;
pub use drill::Drill;
pub use pocket::PocketZigZag;
pub use profile::{EdgeTabs, Profile, ProfileSide};
pub use surface::SurfaceZigZag;

/// A machining operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// Contour following at a tool-radius offset.
    Profile(Profile),
    /// Zigzag area clearing inside a boundary.
    Pocket(PocketZigZag),
    /// Area clearing by nested offsets of a boundary.
    PocketContour(PocketContour),
    /// Zigzag raster following a mesh.
    Surface(SurfaceZigZag),
    /// Plunge at hole centres.
    Drill(Drill),
}

impl Operation {
    /// Generate the segments for this operation.
    pub fn generate(&self, input: &StrategyInput<'_>) -> Result<StrategyOutput> {
        match self {
            Operation::Profile(op) => op.generate(input),
            Operation::Pocket(op) => op.generate(input),
            Operation::PocketContour(op) => op.generate(input),
            Operation::Surface(op) => op.generate(input),
            Operation::Drill(op) => op.generate(input),
        }
    }

    /// Get a descriptive name for this operation type.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Profile(_) => "Profile",
            Operation::Pocket(_) => "Pocket ZigZag",
            Operation::PocketContour(_) => "Pocket Contour",
            Operation::Surface(_) => "Surface ZigZag",
            Operation::Drill(_) => "Drill",
        }
    }

    /// Check if this operation needs a surface contact solver.
    pub fn requires_contact(&self) -> bool {
        matches!(self, Operation::Surface(_))
    }
}

/// Everything a strategy reads.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    /// Geometry the operation references.
    pub geometry: &'a Geometry,
    /// Name of that geometry, for error messages.
    pub geometry_name: &'a str,
    /// Cutting tool.
    pub tool: &'a ToolEntry,
    /// Resolved strategy parameters.
    pub settings: &'a CamSettings,
    /// Z at which cutting starts.
    pub top_z: f64,
    /// Contact solver for mesh geometry.
    pub contact: Option<&'a MemoizedContact>,
}

impl StrategyInput<'_> {
    pub(crate) fn boundary(&self) -> Result<&Boundary2D> {
        match self.geometry {
            Geometry::Boundary(b) => b.check(),
            _ => Err(self.mismatch("boundary")),
        }
    }

    pub(crate) fn mesh(&self) -> Result<&SurfaceMesh> {
        match self.geometry {
            Geometry::Mesh(m) => Ok(m),
            _ => Err(self.mismatch("mesh")),
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> CamError {
        CamError::GeometryMismatch {
            name: self.geometry_name.to_string(),
            expected,
        }
    }

    /// Z of the final layer.
    pub fn bottom_z(&self) -> f64 {
        self.top_z - self.settings.depth
    }
}

/// Role of a segment within its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Area clearing; cut first.
    Clearing,
    /// Boundary-following finish; cut after the layer's clearing.
    Finish,
}

/// A continuous cutting polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Points in cutting order.
    pub points: Vec<Point3>,
    /// Clearing or finishing.
    pub kind: SegmentKind,
    /// Raster rows in this segment with samples lifted to clearance because
    /// the surface contact was unresolved.
    #[serde(default)]
    pub degraded_rows: usize,
}

impl Segment {
    /// Create a segment.
    pub fn new(points: Vec<Point3>, kind: SegmentKind) -> Self {
        Self {
            points,
            kind,
            degraded_rows: 0,
        }
    }

    /// First point.
    pub fn start(&self) -> Option<Point3> {
        self.points.first().copied()
    }

    /// Last point.
    pub fn end(&self) -> Option<Point3> {
        self.points.last().copied()
    }
}

/// Segments cut at one depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Nominal depth of the layer.
    pub z: f64,
    /// Unordered segments.
    pub segments: Vec<Segment>,
}

/// Result of running a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyOutput {
    /// Layers, top-down.
    pub layers: Vec<Layer>,
    /// Non-fatal conditions.
    pub warnings: Vec<WarningKind>,
}

impl StrategyOutput {
    /// Total number of segments.
    pub fn segment_count(&self) -> usize {
        self.layers.iter().map(|l| l.segments.len()).sum()
    }

    /// Number of raster rows with unresolved surface contact.
    pub fn degraded_rows(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| &l.segments)
            .map(|s| s.degraded_rows)
            .sum()
    }
}

/// Z levels from `top_z` down to `top_z - depth`.
///
/// Intermediate levels are `step_down` apart; the last level is exactly the
/// target depth so the final step is never larger than `step_down`.
pub fn depth_layers(top_z: f64, depth: f64, step_down: f64) -> Result<Vec<f64>> {
    if !depth.is_finite() || depth <= 0.0 {
        return Err(CamError::InvalidParameter {
            name: "depth",
            value: depth,
            reason: "must be positive",
        });
    }
    if !step_down.is_finite() || step_down <= 0.0 {
        return Err(CamError::InvalidParameter {
            name: "stepdown",
            value: step_down,
            reason: "must be positive",
        });
    }
    let n = (depth / step_down - 1e-9).ceil().max(1.0) as usize;
    let mut layers: Vec<f64> = (1..n).map(|k| top_z - k as f64 * step_down).collect();
    layers.push(top_z - depth);
    Ok(layers)
}

/// Y positions of raster rows `spacing` apart, centred in `[min, max]`.
pub fn raster_rows(min: f64, max: f64, spacing: f64) -> Vec<f64> {
    let h = max - min;
    if h.is_nan() || h < 0.0 || spacing <= 0.0 {
        return Vec::new();
    }
    let n = (h / spacing + 1e-9).floor() as usize + 1;
    let first = min + (h - (n - 1) as f64 * spacing) / 2.0;
    (0..n).map(|i| first + i as f64 * spacing).collect()
}
