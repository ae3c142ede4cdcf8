//! Command-line parsing for the photometric calibration tool.
//!
//! Argument parsing and command dispatch are kept apart from the calibration
//! code; [`crate::app`] folds parsed flags into plain config structs.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::{GateScope, DEFAULT_UNDEFINED_SENTINEL};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "photcal", version, about = "Extinction and colour-transformation calibration of instrumental photometry")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error). `PHOTCAL_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate a photometry tree against a catalog and write per-object results.
    Calibrate(CalibrateArgs),
    /// Write a synthetic catalog and photometry tree for one night.
    Simulate(SimulateArgs),
    /// Plot a calibrated series (`<name>_cal.tsv`) as an ASCII light curve.
    Curve(CurveArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    /// Catalog file (tab separated: name, ra, dec, standard flag, filter/magnitude pairs).
    #[arg(long, value_name = "TSV")]
    pub catalog: PathBuf,

    /// Root of the per-image photometry tree (`<filter>/<field>-<seq>.csv`).
    #[arg(long, value_name = "DIR")]
    pub photometry: PathBuf,

    /// Explicit source identities (field, source id, object name).
    #[arg(long, value_name = "TSV")]
    pub identities: Option<PathBuf>,

    /// Output directory for per-object result files.
    #[arg(short = 'o', long, value_name = "DIR", default_value = "photcal-out")]
    pub output: PathBuf,

    /// Also write a JSON run summary.
    #[arg(long, value_name = "JSON")]
    pub summary: Option<PathBuf>,

    /// Blue filter of the colour index.
    #[arg(long, env = "PHOTCAL_BLUE_FILTER", default_value = "B")]
    pub blue: String,

    /// Visual filter of the colour index.
    #[arg(long, env = "PHOTCAL_VISUAL_FILTER", default_value = "V")]
    pub visual: String,

    /// Marker for undefined values in input files.
    #[arg(long, env = "PHOTCAL_UNDEFINED", default_value = DEFAULT_UNDEFINED_SENTINEL)]
    pub undefined: String,

    /// Smallest extinction gate set that is trusted.
    #[arg(long, default_value_t = 1)]
    pub min_gate_samples: usize,

    /// Gate standard samples per object and night (all filters together) or
    /// per object, night and filter.
    #[arg(long, value_enum, default_value_t = GateScope::ObjectDay)]
    pub gate_scope: GateScope,

    /// Fit regression groups on a single thread.
    #[arg(long)]
    pub sequential: bool,

    /// Suppress the terminal summary.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output directory (receives `catalog.tsv` and `photometry/`).
    #[arg(short = 'o', long, value_name = "DIR", default_value = "photcal-sim")]
    pub output: PathBuf,

    /// Calendar date of the night (YYYY-MM-DD, evening UT).
    #[arg(long, default_value = "2024-03-15")]
    pub night: NaiveDate,

    /// Number of standard objects.
    #[arg(long, default_value_t = 4)]
    pub standards: usize,

    /// Number of variable target objects.
    #[arg(long, default_value_t = 2)]
    pub targets: usize,

    /// Observing rounds per night.
    #[arg(long, default_value_t = 6)]
    pub rounds: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Gaussian noise on instrumental magnitudes (mag).
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Fraction of exposures written with an undefined magnitude.
    #[arg(long, default_value_t = 0.0)]
    pub undefined_rate: f64,

    /// Variability amplitude of target objects (mag).
    #[arg(long, default_value_t = 0.2)]
    pub variability: f64,

    /// Blue filter name.
    #[arg(long, env = "PHOTCAL_BLUE_FILTER", default_value = "B")]
    pub blue: String,

    /// Visual filter name.
    #[arg(long, env = "PHOTCAL_VISUAL_FILTER", default_value = "V")]
    pub visual: String,
}

/// Options for plotting a calibrated series.
#[derive(Debug, Parser)]
pub struct CurveArgs {
    /// Series produced by `photcal calibrate` (`_cal.tsv`, or `_all.tsv` for a
    /// differential curve).
    #[arg(long, value_name = "TSV")]
    pub series: PathBuf,

    /// Plot the field-star differential curve even without the `_all.tsv` suffix.
    #[arg(long)]
    pub differential: bool,

    /// Marker for undefined values in the series.
    #[arg(long, env = "PHOTCAL_UNDEFINED", default_value = DEFAULT_UNDEFINED_SENTINEL)]
    pub undefined: String,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
