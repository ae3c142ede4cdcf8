//! Top-level application orchestration.
//!
//! `src/main.rs` only maps the result to an exit code; this module parses the
//! command line, sets up logging and dispatches to the calibration pipeline,
//! the synthetic night generator or the light-curve plot.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CalibrateArgs, Command, CurveArgs, SimulateArgs};
use crate::data::SimulationConfig;
use crate::domain::{CalibrationConfig, CalibrationOptions, ColorFilters};
use crate::error::AppError;

pub mod pipeline;

const LOG_ENV: &str = "PHOTCAL_LOG";

/// Entry point for the `photcal` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `photcal --catalog ... --photometry ...` behaves like `photcal calibrate ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_logging(&cli.log_level)?;

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Curve(args) => handle_curve(args),
    }
}

fn init_logging(level: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::input(format!("Invalid log level '{level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::input(format!("Failed to initialise logging: {e}")))
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = calibration_config_from_args(&args);
    let output = pipeline::run_calibration(&config)?;

    tracing::info!(
        calibrated = output.run.calibrated.measurement_count(),
        diagnostics = output.run.diagnostics.len(),
        "calibration finished"
    );
    if !args.quiet {
        println!("{}", crate::report::format_run_summary(&output, &config));
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = simulation_config_from_args(&args);
    let night = crate::data::generate_night(&config)?;

    let standards = night.objects.iter().filter(|o| o.is_standard).count();
    println!(
        "Wrote night MJD {} ({} standards, {} targets, {} photometry files)",
        night.mjd,
        standards,
        night.objects.len() - standards,
        night.files_written,
    );
    println!("  catalog:    {}", night.catalog_path.display());
    println!("  photometry: {}", night.photometry_dir.display());
    println!(
        "Calibrate with: photcal calibrate --catalog {} --photometry {}",
        night.catalog_path.display(),
        night.photometry_dir.display(),
    );
    Ok(())
}

fn handle_curve(args: CurveArgs) -> Result<(), AppError> {
    let points = if args.differential || crate::io::is_field_series(&args.series) {
        crate::io::read_differential_series(&args.series, &args.undefined)?
    } else {
        crate::io::read_calibrated_series(&args.series)?
    };
    let plot = crate::plot::render_light_curve(&points, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn calibration_config_from_args(args: &CalibrateArgs) -> CalibrationConfig {
    CalibrationConfig {
        catalog_path: args.catalog.clone(),
        photometry_dir: args.photometry.clone(),
        identity_path: args.identities.clone(),
        output_dir: args.output.clone(),
        summary_path: args.summary.clone(),
        undefined_sentinel: args.undefined.clone(),
        options: CalibrationOptions {
            color: ColorFilters {
                blue: args.blue.clone(),
                visual: args.visual.clone(),
            },
            min_gate_samples: args.min_gate_samples,
            gate_scope: args.gate_scope,
            parallel: !args.sequential,
        },
    }
}

pub fn simulation_config_from_args(args: &SimulateArgs) -> SimulationConfig {
    SimulationConfig {
        output_dir: args.output.clone(),
        night: args.night,
        standards: args.standards,
        targets: args.targets,
        rounds: args.rounds,
        seed: args.seed,
        noise: args.noise,
        undefined_rate: args.undefined_rate,
        variability: args.variability,
        color: ColorFilters {
            blue: args.blue.clone(),
            visual: args.visual.clone(),
        },
        ..SimulationConfig::default()
    }
}

/// Flags that never take a value.
const SWITCHES: &[&str] = &["--sequential", "-q", "--quiet", "--differential"];

/// Rewrite argv so bare flags default to `calibrate`.
///
/// - `photcal --catalog c --photometry p` -> `photcal calibrate --catalog c --photometry p`
/// - `photcal --help/--version/-h/-V`      -> unchanged
/// - first positional names a subcommand   -> unchanged
///
/// Flag values are skipped, so a path called `curve` is not a subcommand.
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1) else {
        return argv;
    };

    if matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help") {
        return argv;
    }
    let names_subcommand = first_positional(&argv[1..])
        .is_some_and(|a| matches!(a, "calibrate" | "simulate" | "curve"));
    if names_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "calibrate".to_string());
    }
    argv
}

fn first_positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if !arg.starts_with('-') {
            return Some(arg);
        }
        if !arg.contains('=') && !SWITCHES.contains(&arg.as_str()) {
            iter.next();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_flags_run_calibrate() {
        let out = rewrite_args(argv(&["photcal", "--catalog", "c.tsv", "--photometry", "p"]));
        assert_eq!(out[1], "calibrate");
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn explicit_subcommands_and_help_are_untouched() {
        let a = argv(&["photcal", "--log-level", "debug", "simulate"]);
        assert_eq!(rewrite_args(a.clone()), a);
        let h = argv(&["photcal", "--help"]);
        assert_eq!(rewrite_args(h.clone()), h);
        let empty = argv(&["photcal"]);
        assert_eq!(rewrite_args(empty.clone()), empty);
        let c = argv(&["photcal", "curve", "--series", "calibrate"]);
        assert_eq!(rewrite_args(c.clone()), c);
    }

    #[test]
    fn flag_values_named_like_subcommands_still_calibrate() {
        let out = rewrite_args(argv(&["photcal", "--photometry", "curve", "--catalog", "c.tsv"]));
        assert_eq!(out[1], "calibrate");
        assert_eq!(out[3], "curve");

        let out = rewrite_args(argv(&["photcal", "--catalog=simulate", "--sequential", "--photometry", "p"]));
        assert_eq!(out[1], "calibrate");

        let cli = crate::cli::Cli::try_parse_from(rewrite_args(argv(&[
            "photcal",
            "--photometry",
            "curve",
            "--catalog",
            "c.tsv",
        ])))
        .unwrap();
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        assert_eq!(args.photometry, std::path::PathBuf::from("curve"));
    }

    #[test]
    fn calibrate_args_map_to_config() {
        let cli = crate::cli::Cli::try_parse_from(rewrite_args(argv(&[
            "photcal",
            "--catalog",
            "cat.tsv",
            "--photometry",
            "phot",
            "--sequential",
            "--min-gate-samples",
            "3",
            "--blue",
            "g",
            "--visual",
            "r",
        ])))
        .unwrap();
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        let config = calibration_config_from_args(&args);
        assert!(!config.options.parallel);
        assert_eq!(config.options.min_gate_samples, 3);
        assert_eq!(config.options.color.blue, "g");
        assert_eq!(config.options.color.visual, "r");
        assert!(config.identity_path.is_none());
    }
}
