//! Land data system: reads the rasters and tables named by a control file,
//! runs the reconciliation/aggregation pipeline and writes CSV tables plus a
//! diagnostics manifest.
mod control;
mod inputs;
mod raster;
mod sink;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lds_core::{Calibration, Diagnostics, Pipeline};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::control::ControlFile;
use crate::inputs::{load_grid, load_reference, FileCropSource};
use crate::sink::CsvSink;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CalibrationMode {
    None,
    HarvestedArea,
    Yield,
}

#[derive(Parser, Debug)]
#[command(name = "lds", about = "Aggregate gridded land data to country × land-unit tables")]
struct Args {
    /// Path to the JSON control file
    control: PathBuf,

    /// Output directory (overrides the control file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Calibration target (overrides the control file)
    #[arg(long, value_enum)]
    calibration: Option<CalibrationMode>,

    /// FAO reference year for calibration
    #[arg(long, default_value = "2000")]
    year: i32,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

// ── Output manifest ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Manifest<'a> {
    control: String,
    tables: &'a [String],
    elapsed_ms: u64,
    unallocated_rent_usd: f64,
    diagnostics: &'a Diagnostics,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "lds=debug,lds_core=debug" } else { "lds=info,lds_core=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut control = ControlFile::load(&args.control)?;
    if let Some(out) = &args.output {
        control.output_dir = out.clone();
    }
    if let Some(mode) = args.calibration {
        control.options.calibration = match mode {
            CalibrationMode::None => Calibration::None,
            CalibrationMode::HarvestedArea => Calibration::HarvestedArea { year: args.year },
            CalibrationMode::Yield => Calibration::Yield { year: args.year },
        };
    }

    let reference = load_reference(&control)?;
    let pipeline = Pipeline::new(&reference, control.options.clone()).context("Invalid run options")?;
    let grid = load_grid(&control)?;
    let mut crops = FileCropSource::new(&control);
    let mut sink = CsvSink::new(&control.output_dir)
        .with_context(|| format!("Cannot create {}", control.output_dir.display()))?;

    let report = pipeline.run(grid, &mut crops, &mut sink).context("Run failed")?;

    let manifest = Manifest {
        control: args.control.display().to_string(),
        tables: &report.tables,
        elapsed_ms: report.elapsed_ms,
        unallocated_rent_usd: report.diagnostics.unallocated_rent(),
        diagnostics: &report.diagnostics,
    };
    let manifest_path = control.output_dir.join("diagnostics.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("Write failed: {}", manifest_path.display()))?;

    info!(
        tables = report.tables.len(),
        output = %control.output_dir.display(),
        "done"
    );
    Ok(())
}
