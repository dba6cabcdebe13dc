#![warn(missing_docs)]

//! G-code generation for millforge.
//!
//! This crate converts a compiled job into a G-code program for 3-axis
//! mills. It supports Grbl and LinuxCNC flavors.
//!
//! # Example
//!
//! ```ignore
//! use millforge_cam::JobController;
//! use millforge_gcode::{generate_gcode, PostFlavor, PostSettings};
//!
//! let compiled = JobController::new(&job).compile()?;
//! let settings = PostSettings {
//!     flavor: PostFlavor::LinuxCnc,
//!     ..Default::default()
//! };
//! let gcode = generate_gcode(&compiled, &settings)?;
//! std::fs::write("part.nc", gcode)?;
//! ```

pub mod emitter;
pub mod error;
pub mod flavor;
pub mod format;

pub use emitter::{CodeEmitter, Coolant, PostSettings};
pub use error::{PostError, Result};
pub use flavor::PostFlavor;
pub use format::format_number;

use millforge_cam::CompiledJob;
use tracing::info;

/// Write the whole program for `job`.
pub fn generate_gcode(job: &CompiledJob, settings: &PostSettings) -> Result<String> {
    let first = match job.toolpaths.first() {
        Some(first) if job.move_count() > 0 => first,
        _ => return Err(PostError::EmptyProgram),
    };

    let mut emitter = CodeEmitter::new(settings.clone(), job.units, job.stock.work_origin());
    let program = settings.program_name.as_deref().unwrap_or(&job.name);
    emitter.preamble(program, &first.tool)?;
    for op in &job.toolpaths {
        emitter.operation(op)?;
    }
    emitter.postamble(job.max_clearance().unwrap_or(first.clearance));

    info!(
        lines = emitter.line_count(),
        flavor = ?settings.flavor,
        "program written"
    );
    Ok(emitter.finish())
}
