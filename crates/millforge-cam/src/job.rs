//! Job compilation.
//!
//! Strategies of all operations run independently (in parallel with rayon
//! when enabled). Their results are then sequenced one after another in the
//! order the operations are declared, each starting where the previous one
//! left the tool.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use millforge_math::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dropcutter::{MemoizedContact, MeshContactSolver, SurfaceContact};
use crate::error::{CamError, JobError, OperationError, OperationWarning, Result};
use crate::geometry::Geometry;
use crate::operation::{StrategyInput, StrategyOutput};
use crate::sequence::Sequencer;
use crate::stock::Stock;
use crate::tool::ToolEntry;
use crate::toolpath::{Move, Toolpath};
use crate::{CamJob, CamSettings, OperationEntry, Units};

/// What to do when an operation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop at the first failing operation.
    #[default]
    AbortAll,
    /// Record the failure and compile the remaining operations.
    SkipAndContinue,
}

/// Job compilation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Failure handling.
    pub error_policy: ErrorPolicy,
    /// Run strategies on the rayon thread pool.
    pub parallel: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::AbortAll,
            parallel: true,
        }
    }
}

/// Shared flag to stop a compilation between operations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// New, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The sequenced motion of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationToolpath {
    /// Position of the operation in the job.
    pub index: usize,
    /// Operation name.
    pub name: String,
    /// Tool that cuts it.
    pub tool: ToolEntry,
    /// Clearance height of the operation.
    pub clearance: f64,
    /// Ordered moves.
    pub toolpath: Toolpath,
    /// Segments with unresolved surface contact.
    pub degraded_rows: usize,
}

/// Output of [`JobController::compile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledJob {
    /// Job name.
    pub name: String,
    /// Units of every coordinate and feed.
    pub units: Units,
    /// Stock, for the work origin.
    pub stock: Stock,
    /// Toolpaths in declared operation order.
    pub toolpaths: Vec<OperationToolpath>,
    /// Non-fatal conditions.
    pub warnings: Vec<OperationWarning>,
    /// Operations dropped under [`ErrorPolicy::SkipAndContinue`].
    pub skipped: Vec<OperationError>,
}

impl CompiledJob {
    /// Every move of the program in order.
    pub fn moves(&self) -> impl Iterator<Item = &Move> + '_ {
        self.toolpaths.iter().flat_map(|t| t.toolpath.iter())
    }

    /// Total number of moves.
    pub fn move_count(&self) -> usize {
        self.toolpaths.iter().map(|t| t.toolpath.len()).sum()
    }

    /// Highest clearance of any operation.
    pub fn max_clearance(&self) -> Option<f64> {
        self.toolpaths
            .iter()
            .map(|t| t.clearance)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Total distance in material.
    pub fn cutting_length(&self) -> f64 {
        self.toolpaths.iter().map(|t| t.toolpath.cutting_length()).sum()
    }

    /// Segments with unresolved surface contact across all operations.
    pub fn degraded_rows(&self) -> usize {
        self.toolpaths.iter().map(|t| t.degraded_rows).sum()
    }
}

/// A strategy result with the resources it was generated with.
struct Prepared<'a> {
    output: StrategyOutput,
    tool: &'a ToolEntry,
    settings: &'a CamSettings,
}

/// Compiles a [`CamJob`] into ordered toolpaths.
pub struct JobController<'a> {
    job: &'a CamJob,
    options: CompileOptions,
    cancel: CancelToken,
    contacts: BTreeMap<String, MemoizedContact>,
}

impl<'a> JobController<'a> {
    /// Controller with default options. Valid meshes used by surface
    /// operations get a drop-cutter contact solver; an invalid mesh is left
    /// to fail the operations that use it.
    pub fn new(job: &'a CamJob) -> Self {
        let mut contacts = BTreeMap::new();
        for entry in job.operations.iter().filter(|e| e.operation.requires_contact()) {
            if contacts.contains_key(&entry.geometry) {
                continue;
            }
            if let Some(Geometry::Mesh(mesh)) = job.geometry.get(&entry.geometry) {
                if mesh.validate().is_err() {
                    continue;
                }
                let solver = MeshContactSolver::new(mesh);
                contacts.insert(entry.geometry.clone(), MemoizedContact::new(Box::new(solver)));
            }
        }
        Self {
            job,
            options: CompileOptions::default(),
            cancel: CancelToken::new(),
            contacts,
        }
    }

    /// Set compile options.
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Observe `token` for cancellation.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Use `solver` for the mesh named `geometry`.
    pub fn with_contact_solver(
        mut self,
        geometry: impl Into<String>,
        solver: Box<dyn SurfaceContact>,
    ) -> Self {
        self.contacts
            .insert(geometry.into(), MemoizedContact::new(solver));
        self
    }

    /// Run every operation and sequence the results.
    pub fn compile(&self) -> std::result::Result<CompiledJob, JobError> {
        let job = self.job;
        if job.operations.is_empty() {
            return Err(JobError::Empty);
        }
        job.stock.validate().map_err(JobError::Stock)?;

        info!(
            job = %job.name,
            operations = job.operations.len(),
            parallel = self.options.parallel,
            "compiling job"
        );

        let run = |(index, entry): (usize, &'a OperationEntry)| {
            if self.cancel.is_cancelled() {
                return None;
            }
            Some(self.prepare(entry).map_err(|source| OperationError {
                index,
                name: entry.name.clone(),
                geometry: entry.geometry.clone(),
                source,
            }))
        };
        let results: Vec<Option<std::result::Result<Prepared<'a>, OperationError>>> =
            if self.options.parallel {
                job.operations.par_iter().enumerate().map(&run).collect()
            } else {
                job.operations.iter().enumerate().map(&run).collect()
            };

        let origin = job.stock.work_origin();
        let first_clearance = job
            .operations
            .first()
            .map_or(job.settings.clearance_height, |e| {
                self.settings_for(e).clearance_height
            });
        let mut pos = Point3::new(origin.x, origin.y, first_clearance);

        let mut toolpaths = Vec::new();
        let mut warnings = Vec::new();
        let mut skipped = Vec::new();

        for (index, (entry, result)) in job.operations.iter().zip(results).enumerate() {
            let Some(result) = result.filter(|_| !self.cancel.is_cancelled()) else {
                warn!(completed = index, "job cancelled");
                return Err(JobError::Cancelled { completed: index });
            };
            let prepared = match result {
                Ok(p) => p,
                Err(err) => {
                    if err.source.is_fatal() || self.options.error_policy == ErrorPolicy::AbortAll {
                        return Err(JobError::Operation(err));
                    }
                    warn!(operation = %entry.name, error = %err.source, "skipping operation");
                    skipped.push(err);
                    continue;
                }
            };

            let Prepared {
                output,
                tool,
                settings,
            } = prepared;
            let sequencer = Sequencer::new(settings.clearance_height, tool.cut_feed, tool.plunge_feed)
                .with_tolerance(settings.tolerance);
            let toolpath = sequencer.sequence(&output, pos).map_err(|source| {
                JobError::Sequencing(OperationError {
                    index,
                    name: entry.name.clone(),
                    geometry: entry.geometry.clone(),
                    source,
                })
            })?;
            pos = toolpath.end().unwrap_or(pos);

            debug!(
                operation = %entry.name,
                segments = output.segment_count(),
                moves = toolpath.len(),
                "operation sequenced"
            );

            let degraded_rows = output.degraded_rows();
            warnings.extend(output.warnings.into_iter().map(|kind| OperationWarning {
                operation: index,
                name: entry.name.clone(),
                kind,
            }));
            toolpaths.push(OperationToolpath {
                index,
                name: entry.name.clone(),
                tool: tool.clone(),
                clearance: settings.clearance_height,
                toolpath,
                degraded_rows,
            });
        }

        let compiled = CompiledJob {
            name: job.name.clone(),
            units: job.units,
            stock: job.stock.clone(),
            toolpaths,
            warnings,
            skipped,
        };
        info!(
            moves = compiled.move_count(),
            skipped = compiled.skipped.len(),
            warnings = compiled.warnings.len(),
            "job compiled"
        );
        Ok(compiled)
    }

    fn settings_for(&self, entry: &'a OperationEntry) -> &'a CamSettings {
        entry.settings.as_ref().unwrap_or(&self.job.settings)
    }

    /// Resolve references, validate parameters and run the strategy.
    fn prepare(&self, entry: &'a OperationEntry) -> Result<Prepared<'a>> {
        let job = self.job;
        let settings = self.settings_for(entry);
        settings.validate()?;
        let tool = job
            .tools
            .get_by_number(entry.tool)
            .ok_or(CamError::UnknownTool(entry.tool))?;
        tool.validate()?;
        let geometry = job
            .geometry
            .get(&entry.geometry)
            .ok_or_else(|| CamError::UnknownGeometry(entry.geometry.clone()))?;

        let top_z = settings.top_z.unwrap_or_else(|| job.stock.top());
        if settings.clearance_height <= top_z {
            return Err(CamError::InvalidParameter {
                name: "clearance_height",
                value: settings.clearance_height,
                reason: "must be above the top of the cut",
            });
        }

        let input = StrategyInput {
            geometry,
            geometry_name: &entry.geometry,
            tool,
            settings,
            top_z,
            contact: self.contacts.get(&entry.geometry),
        };
        debug!(operation = %entry.name, kind = entry.operation.name(), tool = tool.number, "strategy");
        let output = entry.operation.generate(&input)?;
        Ok(Prepared {
            output,
            tool,
            settings,
        })
    }
}
