//! millforge CLI - toolpaths and G-code from job descriptions
//!
//! Reads a JSON job, compiles it and writes G-code or the ordered moves.
//! Logs go to stderr so G-code can be piped from stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use millforge_cam::{CamJob, CompiledJob, ErrorPolicy, Geometry, JobController};
use millforge_gcode::{generate_gcode, PostFlavor};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::MachineConfig;

#[derive(Parser)]
#[command(name = "millforge")]
#[command(about = "Toolpath generation and G-code output for 3-axis mills", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a job and write G-code
    Generate {
        /// Job description (.json)
        job: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Machine configuration (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Controller dialect, overrides the config
        #[arg(long, value_enum)]
        flavor: Option<FlavorArg>,
        /// Skip failing operations instead of aborting
        #[arg(long)]
        skip_failed: bool,
    },
    /// Compile a job and write the ordered moves as JSON
    Toolpath {
        /// Job description (.json)
        job: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Machine configuration (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Display information about a job
    Info {
        /// Job description (.json)
        job: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FlavorArg {
    Grbl,
    Linuxcnc,
}

impl From<FlavorArg> for PostFlavor {
    fn from(arg: FlavorArg) -> Self {
        match arg {
            FlavorArg::Grbl => PostFlavor::Grbl,
            FlavorArg::Linuxcnc => PostFlavor::LinuxCnc,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Generate {
            job,
            output,
            config,
            flavor,
            skip_failed,
        } => {
            let mut machine = load_config(config.as_deref())?;
            if let Some(flavor) = flavor {
                machine.post.flavor = flavor.into();
            }
            if skip_failed {
                machine.compile.error_policy = ErrorPolicy::SkipAndContinue;
            }
            let job = load_job(&job)?;
            let compiled = compile(&job, &machine)?;
            let gcode = generate_gcode(&compiled, &machine.post)
                .with_context(|| format!("writing G-code for '{}'", job.name))?;
            write_output(output.as_deref(), &gcode)?;
        }
        Commands::Toolpath {
            job,
            output,
            config,
        } => {
            let machine = load_config(config.as_deref())?;
            let job = load_job(&job)?;
            let compiled = compile(&job, &machine)?;
            let json = serde_json::to_string_pretty(&compiled)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Info { job } => {
            show_info(&job)?;
        }
    }

    Ok(())
}

/// Logs to stderr; `RUST_LOG` applies unless `-v` is given.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MachineConfig> {
    match path {
        Some(path) => MachineConfig::load(path),
        None => Ok(MachineConfig::default()),
    }
}

fn load_job(path: &Path) -> Result<CamJob> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading job {}", path.display()))?;
    CamJob::from_json(&json).with_context(|| format!("parsing job {}", path.display()))
}

fn compile(job: &CamJob, machine: &MachineConfig) -> Result<CompiledJob> {
    let compiled = JobController::new(job)
        .with_options(machine.compile.clone())
        .compile()
        .with_context(|| format!("compiling job '{}'", job.name))?;

    for w in &compiled.warnings {
        warn!(operation = %w.name, kind = ?w.kind, "operation warning");
    }
    for err in &compiled.skipped {
        warn!("skipped {err}");
    }
    info!(
        moves = compiled.move_count(),
        cutting_length = compiled.cutting_length(),
        "compiled"
    );
    Ok(compiled)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let job = load_job(path)?;

    println!("millforge job: {}", path.display());
    println!("  Name: {}", job.name);
    println!("  Units: {:?}", job.units);
    println!(
        "  Stock: [{}, {}, {}] to [{}, {}, {}]",
        job.stock.min.x, job.stock.min.y, job.stock.min.z, job.stock.max.x, job.stock.max.y,
        job.stock.max.z
    );

    println!("\nTools:");
    for t in &job.tools.tools {
        println!(
            "  T{}: {} (diameter {}, {} rpm, feed {}, plunge {})",
            t.number,
            t.name,
            t.tool.diameter(),
            t.spindle_rpm,
            t.cut_feed,
            t.plunge_feed
        );
    }

    println!("\nGeometry:");
    for (name, g) in &job.geometry {
        let detail = match g {
            Geometry::Boundary(b) => format!("{} hole(s)", b.holes().len()),
            Geometry::Mesh(m) => format!("{} triangle(s)", m.triangle_count()),
            Geometry::Points { points } => format!("{} point(s)", points.len()),
        };
        println!("  {}: {} ({})", name, g.kind(), detail);
    }

    println!("\nOperations:");
    for (i, op) in job.operations.iter().enumerate() {
        println!(
            "  {}: {} - {} on '{}' with T{}",
            i + 1,
            op.name,
            op.operation.name(),
            op.geometry,
            op.tool
        );
    }

    match JobController::new(&job).compile() {
        Ok(compiled) => {
            println!("\nToolpath stats:");
            println!("  Moves: {}", compiled.move_count());
            println!("  Cutting length: {:.1}", compiled.cutting_length());
            println!("  Warnings: {}", compiled.warnings.len());
            println!("  Degraded rows: {}", compiled.degraded_rows());
        }
        Err(e) => {
            println!("\nFailed to compile: {}", e);
        }
    }

    Ok(())
}
