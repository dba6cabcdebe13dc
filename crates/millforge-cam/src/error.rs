//! Error and warning types for toolpath generation.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while generating or sequencing a single operation.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum CamError {
    /// A boundary loop has too few points, zero area or crosses itself.
    #[error("degenerate geometry in loop {loop_index}: {reason}")]
    DegenerateGeometry {
        /// Loop index (0 = outer, 1.. = holes).
        loop_index: usize,
        /// What is wrong with the loop.
        reason: String,
    },

    /// The tool is too large for a feature; offsetting collapsed the loop.
    #[error("feature too small for tool radius {tool_radius} near ({x:.3}, {y:.3})")]
    FeatureTooSmall {
        /// Radius of the tool that did not fit.
        tool_radius: f64,
        /// X of the offending feature.
        x: f64,
        /// Y of the offending feature.
        y: f64,
    },

    /// A strategy parameter is outside its valid range.
    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Constraint that was violated.
        reason: &'static str,
    },

    /// The operation references a tool number missing from the tool library.
    #[error("unknown tool T{0}")]
    UnknownTool(u32),

    /// The operation references a geometry name missing from the library.
    #[error("unknown geometry '{0}'")]
    UnknownGeometry(String),

    /// The referenced geometry has the wrong kind for the operation.
    #[error("geometry '{name}' is not a {expected}")]
    GeometryMismatch {
        /// Geometry name.
        name: String,
        /// Kind the operation needs.
        expected: &'static str,
    },

    /// Adjacent moves do not connect.
    #[error("sequencing inconsistency at move {move_index}: {detail}")]
    SequencingInconsistency {
        /// Index of the first move of the offending pair.
        move_index: usize,
        /// Description of the gap.
        detail: String,
    },
}

impl CamError {
    /// Fatal errors abort the whole job regardless of the error policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CamError::SequencingInconsistency { .. })
    }
}

/// Result type for CAM operations.
pub type Result<T> = std::result::Result<T, CamError>;

/// A [`CamError`] tagged with the identity of the operation that raised it.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("operation {index} '{name}' (geometry '{geometry}'): {source}")]
pub struct OperationError {
    /// Position of the operation in the job.
    pub index: usize,
    /// Operation name.
    pub name: String,
    /// Geometry reference of the operation.
    pub geometry: String,
    /// Underlying error.
    #[source]
    pub source: CamError,
}

/// Errors that stop a job from compiling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// An operation failed under the abort-all policy.
    #[error("job aborted: {0}")]
    Operation(OperationError),

    /// The sequenced program is not continuous.
    #[error("sequencing failed: {0}")]
    Sequencing(OperationError),

    /// The stock block is unusable.
    #[error("invalid stock: {0}")]
    Stock(CamError),

    /// Compilation was cancelled between operations.
    #[error("job cancelled after {completed} operation(s)")]
    Cancelled {
        /// Number of operations sequenced before cancellation.
        completed: usize,
    },

    /// The job declares no operations.
    #[error("job has no operations")]
    Empty,
}

/// Non-fatal conditions recorded on an operation's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum WarningKind {
    /// The contact solver found no surface under a sample; the sample was
    /// lifted to clearance height.
    MeshContactUnresolved {
        /// Raster row of the sample.
        row: usize,
        /// Sample X.
        x: f64,
        /// Sample Y.
        y: f64,
    },
    /// A finishing contour left the clearing region and was not cut.
    FinishContourDropped {
        /// Loop index within the offset region.
        contour: usize,
    },
}

/// A warning tagged with its operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationWarning {
    /// Position of the operation in the job.
    pub operation: usize,
    /// Operation name.
    pub name: String,
    /// What happened.
    pub kind: WarningKind,
}
