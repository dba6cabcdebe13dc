#![warn(missing_docs)]

//! Toolpath generation and sequencing for millforge.
//!
//! This crate turns planar boundaries and surface meshes into ordered,
//! collision-safe tool motion. Post-processing to G-code lives in
//! `millforge-gcode`.
//!
//! # Operations
//!
//! - [`Profile`] - contour at a tool-radius offset, inside or outside, with
//!   optional [`EdgeTabs`]
//! - [`PocketZigZag`] - zigzag area clearing with optional finish pass
//! - [`PocketContour`] - area clearing by nested inward offsets
//! - [`SurfaceZigZag`] - drop-cutter raster over a mesh
//! - [`Drill`] - plunges at hole centres
//!
//! # Example
//!
//! ```
//! use millforge_cam::{
//!     Boundary2D, CamJob, Geometry, JobController, Operation, OperationEntry, PocketZigZag,
//!     Polygon, Stock, Tool, ToolEntry,
//! };
//! use millforge_math::Point3;
//!
//! let mut job = CamJob::new(
//!     "tray",
//!     Stock::new(Point3::new(0.0, 0.0, -15.0), Point3::new(100.0, 50.0, 0.0)),
//! );
//! job.tools.add(ToolEntry::new(1, "6mm flat", Tool::FlatEndMill { diameter: 6.0 }));
//! job.add_geometry(
//!     "outline",
//!     Geometry::Boundary(Boundary2D::simple(Polygon::rectangle(0.0, 0.0, 100.0, 50.0)).unwrap()),
//! );
//! job.add_operation(OperationEntry::new(
//!     "clear",
//!     1,
//!     "outline",
//!     Operation::Pocket(PocketZigZag::new(true)),
//! ));
//!
//! let compiled = JobController::new(&job).compile().unwrap();
//! assert!(compiled.move_count() > 0);
//! ```

pub mod boundary;
pub mod dropcutter;
mod error;
mod geometry;
mod job;
pub mod offset;
pub mod operation;
mod sequence;
mod stock;
mod tool;
mod toolpath;

use std::collections::BTreeMap;

pub use boundary::{Boundary2D, Polygon};
pub use dropcutter::{MemoizedContact, MeshContactSolver, SurfaceContact};
pub use error::{CamError, JobError, OperationError, OperationWarning, Result, WarningKind};
pub use geometry::{Geometry, SurfaceMesh};
pub use job::{
    CancelToken, CompileOptions, CompiledJob, ErrorPolicy, JobController, OperationToolpath,
};
pub use operation::{
    depth_layers, Drill, EdgeTabs, Layer, Operation, PocketContour, PocketZigZag, Profile,
    ProfileSide, Segment, SegmentKind, StrategyInput, StrategyOutput, SurfaceZigZag,
};
pub use sequence::{NearestStart, SequencePolicy, Sequencer};
pub use stock::Stock;
pub use tool::{Tool, ToolEntry, ToolLibrary};
pub use toolpath::{Move, MoveKind, Toolpath};

use serde::{Deserialize, Serialize};

/// Linear units of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    /// Millimeters.
    #[default]
    Millimeters,
    /// Inches.
    Inches,
}

impl Units {
    /// Fractional digits printed for coordinates and feeds.
    pub fn precision(self) -> usize {
        match self {
            Units::Millimeters => 3,
            Units::Inches => 4,
        }
    }
}

/// Strategy parameters shared by all operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamSettings {
    /// Stepover distance between passes.
    pub stepover: f64,
    /// Stepdown distance per Z level.
    pub stepdown: f64,
    /// Total cut depth below the top.
    pub depth: f64,
    /// Height for rapid moves between cuts.
    pub clearance_height: f64,
    /// Geometric tolerance (offset chords, surface simplification).
    pub tolerance: f64,
    /// Top of the cut; the stock top when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_z: Option<f64>,
}

impl Default for CamSettings {
    fn default() -> Self {
        Self {
            stepover: 3.0,
            stepdown: 2.0,
            depth: 5.0,
            clearance_height: 5.0,
            tolerance: 0.01,
            top_z: None,
        }
    }
}

impl CamSettings {
    /// Check that every distance is usable.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("stepover", self.stepover),
            ("stepdown", self.stepdown),
            ("depth", self.depth),
            ("tolerance", self.tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CamError::InvalidParameter {
                    name,
                    value,
                    reason: "must be positive",
                });
            }
        }
        if !self.clearance_height.is_finite() {
            return Err(CamError::InvalidParameter {
                name: "clearance_height",
                value: self.clearance_height,
                reason: "must be finite",
            });
        }
        Ok(())
    }
}

/// Named geometry available to a job's operations.
pub type GeometryLibrary = BTreeMap<String, Geometry>;

/// An operation entry in a CAM job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    /// Operation name.
    pub name: String,
    /// Tool number in the tool library.
    pub tool: u32,
    /// Name of the geometry to machine.
    pub geometry: String,
    /// The operation parameters.
    pub operation: Operation,
    /// Override settings for this operation (uses job defaults if None).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<CamSettings>,
}

impl OperationEntry {
    /// Entry using the job's default settings.
    pub fn new(
        name: impl Into<String>,
        tool: u32,
        geometry: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            name: name.into(),
            tool,
            geometry: geometry.into(),
            operation,
            settings: None,
        }
    }

    /// Override the job settings for this operation.
    pub fn with_settings(mut self, settings: CamSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// A complete CAM job with multiple operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamJob {
    /// Job name for the program header.
    pub name: String,
    /// Units of every coordinate and feed.
    #[serde(default)]
    pub units: Units,
    /// Raw material and work origin.
    pub stock: Stock,
    /// Tool library for this job.
    #[serde(default)]
    pub tools: ToolLibrary,
    /// Geometry the operations refer to by name.
    #[serde(default)]
    pub geometry: GeometryLibrary,
    /// Default settings.
    #[serde(default)]
    pub settings: CamSettings,
    /// Operations in order of execution.
    #[serde(default)]
    pub operations: Vec<OperationEntry>,
}

impl CamJob {
    /// Empty job over `stock`.
    pub fn new(name: impl Into<String>, stock: Stock) -> Self {
        Self {
            name: name.into(),
            units: Units::default(),
            stock,
            tools: ToolLibrary::new(),
            geometry: GeometryLibrary::new(),
            settings: CamSettings::default(),
            operations: Vec::new(),
        }
    }

    /// Register geometry under `name`, replacing any previous entry.
    pub fn add_geometry(&mut self, name: impl Into<String>, geometry: Geometry) {
        self.geometry.insert(name.into(), geometry);
    }

    /// Append an operation.
    pub fn add_operation(&mut self, entry: OperationEntry) {
        self.operations.push(entry);
    }

    /// Parse a job description.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize the job description.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
