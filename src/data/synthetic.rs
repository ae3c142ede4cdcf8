//! Synthetic observing night.
//!
//! Writes a catalog and a photometry tree that the calibration pipeline can
//! consume directly:
//!
//! ```text
//! <out>/catalog.tsv
//! <out>/photometry/<filter>/<object>-<seq>.csv
//! ```
//!
//! The night is observed in rounds: every field is imaged once per round in
//! both filters, at the round's airmass. Instrumental magnitudes follow
//!
//! ```text
//! (B-V)_obs = ((B-V)_std - c4) / c3
//! V_obs     = V_std - c1·(B-V)_std - c2
//! inst      = obs + zero_point + k·airmass + noise
//! ```
//!
//! so a noise-free night is recovered exactly by the pipeline.

use std::f64::consts::PI;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ColorFilters, DEFAULT_UNDEFINED_SENTINEL};
use crate::error::AppError;

/// Fraction of the MJD at which the first round starts (13:12 UT).
const NIGHT_START: f64 = 0.55;
/// Length of the observing window in days.
const NIGHT_LENGTH: f64 = 0.85;
/// 1858-11-17 counted from 0001-01-01 (day 1).
const MJD_EPOCH_DAYS_FROM_CE: i64 = 678_576;
/// Delay between the blue and visual exposures of one round.
const FILTER_OFFSET: f64 = 0.003;

/// Physical and instrumental parameters of one filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterModel {
    pub extinction: f64,
    pub zero_point: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub output_dir: PathBuf,
    pub night: NaiveDate,
    pub standards: usize,
    pub targets: usize,
    /// Rounds per night (each round images every field in both filters).
    pub rounds: usize,
    pub seed: u64,
    /// Standard deviation of the Gaussian noise on instrumental magnitudes.
    pub noise: f64,
    /// Fraction of exposures whose magnitude is written as undefined.
    pub undefined_rate: f64,
    /// Sinusoidal amplitude applied to target objects.
    pub variability: f64,
    pub color: ColorFilters,
    pub blue: FilterModel,
    pub visual: FilterModel,
    /// Transformation terms `(c1, c2, c3, c4)` of the simulated instrument.
    pub transformation: (f64, f64, f64, f64),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("photcal-sim"),
            night: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap_or_default(),
            standards: 4,
            targets: 2,
            rounds: 6,
            seed: 42,
            noise: 0.01,
            undefined_rate: 0.0,
            variability: 0.2,
            color: ColorFilters::default(),
            blue: FilterModel {
                extinction: 0.28,
                zero_point: 2.3,
            },
            visual: FilterModel {
                extinction: 0.16,
                zero_point: 1.9,
            },
            transformation: (0.03, -0.12, 1.08, -0.04),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.standards + self.targets == 0 {
            return Err(AppError::input("Simulation needs at least one object."));
        }
        if self.rounds == 0 {
            return Err(AppError::input("Simulation needs at least one round."));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(AppError::input("Noise must be a finite, non-negative magnitude."));
        }
        if !(0.0..1.0).contains(&self.undefined_rate) {
            return Err(AppError::input("Undefined rate must be in [0, 1)."));
        }
        if !self.variability.is_finite() {
            return Err(AppError::input("Variability amplitude must be finite."));
        }
        let (_, _, c3, _) = self.transformation;
        if c3.abs() < 1e-9 {
            return Err(AppError::input("Transformation term c3 must be non-zero."));
        }
        Ok(())
    }
}

/// True brightness of a generated object.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticObject {
    pub name: String,
    pub is_standard: bool,
    pub blue: f64,
    pub visual: f64,
    pub period: f64,
    pub phase: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticNight {
    pub catalog_path: PathBuf,
    pub photometry_dir: PathBuf,
    /// Night label the pipeline will assign (integer MJD of the evening).
    pub mjd: i64,
    pub objects: Vec<SyntheticObject>,
    pub files_written: usize,
}

/// Modified Julian Day number of a calendar date at 0h UT.
pub fn mjd(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - MJD_EPOCH_DAYS_FROM_CE
}

/// Generate and write a synthetic night.
pub fn generate_night(config: &SimulationConfig) -> Result<SyntheticNight, AppError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise.max(1e-12))
        .map_err(|e| AppError::numeric(format!("Noise distribution error: {e}")))?;

    let objects = generate_objects(config, &mut rng);
    let photometry_dir = config.output_dir.join("photometry");
    let catalog_path = config.output_dir.join("catalog.tsv");

    for filter in [&config.color.blue, &config.color.visual] {
        let dir = photometry_dir.join(filter);
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", dir.display())))?;
    }
    write_catalog(&catalog_path, &objects, &config.color, &mut rng)?;

    let night = mjd(config.night);
    let (c1, c2, c3, c4) = config.transformation;
    let mut files_written = 0;

    for round in 0..config.rounds {
        let t_round = night as f64 + NIGHT_START + NIGHT_LENGTH * (round as f64 + 0.5) / config.rounds as f64;
        let airmass = round_airmass(round, config.rounds);

        for obj in &objects {
            let delta = variability(obj, config.variability, t_round);
            let std_color = obj.blue - obj.visual;
            let obs_color = (std_color - c4) / c3;
            let obs_visual = obj.visual + delta - c1 * std_color - c2;
            let obs_blue = obs_visual + obs_color;

            let exposures = [
                (&config.color.blue, config.blue, obs_blue, t_round),
                (&config.color.visual, config.visual, obs_visual, t_round + FILTER_OFFSET),
            ];
            for (filter, model, observed, time) in exposures {
                let mut magnitude = observed + model.zero_point + model.extinction * airmass;
                if config.noise > 0.0 {
                    magnitude += noise.sample(&mut rng);
                }
                let undefined = config.undefined_rate > 0.0 && rng.gen_bool(config.undefined_rate);

                let path = photometry_dir
                    .join(filter)
                    .join(format!("{}-{:03}.csv", obj.name, round + 1));
                let row = ImageRow {
                    time,
                    airmass,
                    magnitude: (!undefined).then_some(magnitude),
                    error: config.noise.max(0.001),
                };
                write_image(&path, &row, &mut rng)?;
                files_written += 1;
            }
        }
    }

    tracing::info!(
        objects = objects.len(),
        files = files_written,
        mjd = night,
        "wrote synthetic night to {}",
        config.output_dir.display()
    );

    Ok(SyntheticNight {
        catalog_path,
        photometry_dir,
        mjd: night,
        objects,
        files_written,
    })
}

fn generate_objects(config: &SimulationConfig, rng: &mut StdRng) -> Vec<SyntheticObject> {
    let mut objects = Vec::with_capacity(config.standards + config.targets);
    for i in 0..config.standards {
        let visual = rng.gen_range(9.0..13.0);
        objects.push(SyntheticObject {
            name: format!("STD{:02}", i + 1),
            is_standard: true,
            blue: visual + rng.gen_range(-0.2..1.6),
            visual,
            period: 1.0,
            phase: 0.0,
        });
    }
    for i in 0..config.targets {
        let visual = rng.gen_range(11.0..15.0);
        objects.push(SyntheticObject {
            name: format!("VAR{:02}", i + 1),
            is_standard: false,
            blue: visual + rng.gen_range(0.0..1.2),
            visual,
            period: rng.gen_range(0.15..0.6),
            phase: rng.gen_range(0.0..1.0),
        });
    }
    objects
}

/// Airmass of a round: high at dusk and dawn, lowest mid-night.
fn round_airmass(round: usize, rounds: usize) -> f64 {
    if rounds < 2 {
        return 1.2;
    }
    let u = round as f64 / (rounds as f64 - 1.0) * 2.0 - 1.0;
    1.05 + 1.1 * u * u
}

fn variability(obj: &SyntheticObject, amplitude: f64, time: f64) -> f64 {
    if obj.is_standard || amplitude == 0.0 {
        return 0.0;
    }
    amplitude * (2.0 * PI * (time / obj.period + obj.phase)).sin()
}

fn write_catalog(
    path: &Path,
    objects: &[SyntheticObject],
    color: &ColorFilters,
    rng: &mut StdRng,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create catalog '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::input(format!("Failed to write catalog: {e}"));

    writeln!(out, "# name\tra\tdec\tstandard\tfilter\tmag\tfilter\tmag").map_err(io_err)?;
    for obj in objects {
        let ra = sexagesimal(rng.gen_range(0.0..24.0));
        let dec = sexagesimal(rng.gen_range(-30.0..60.0));
        if obj.is_standard {
            writeln!(
                out,
                "{}\t{ra}\t{dec}\tYES\t{}\t{:.3}\t{}\t{:.3}",
                obj.name, color.blue, obj.blue, color.visual, obj.visual
            )
            .map_err(io_err)?;
        } else {
            writeln!(out, "{}\t{ra}\t{dec}\tNO", obj.name).map_err(io_err)?;
        }
    }
    out.flush().map_err(io_err)
}

fn sexagesimal(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "+" };
    let v = value.abs();
    let whole = v.floor();
    let minutes = ((v - whole) * 60.0).floor();
    let seconds = ((v - whole) * 60.0 - minutes) * 60.0;
    format!("{sign}{:02}:{:02}:{:05.2}", whole as u32, minutes as u32, seconds.min(59.99))
}

struct ImageRow {
    time: f64,
    airmass: f64,
    magnitude: Option<f64>,
    error: f64,
}

/// One image: the field object as source 0 plus one anonymous field star.
fn write_image(path: &Path, row: &ImageRow, rng: &mut StdRng) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::input(format!("Failed to write '{}': {e}", path.display()));

    let (magnitude, error) = match row.magnitude {
        Some(m) => (format!("{m:.4}"), format!("{:.4}", row.error)),
        None => (DEFAULT_UNDEFINED_SENTINEL.to_string(), DEFAULT_UNDEFINED_SENTINEL.to_string()),
    };
    writeln!(
        out,
        "0,{:.2},{:.2},{:.6},{magnitude},{:.4},{error}",
        rng.gen_range(400.0..600.0),
        rng.gen_range(400.0..600.0),
        row.time,
        row.airmass,
    )
    .map_err(io_err)?;
    writeln!(
        out,
        "1,{:.2},{:.2},{:.6},{:.4},{:.4},{:.4}",
        rng.gen_range(0.0..1000.0),
        rng.gen_range(0.0..1000.0),
        row.time,
        rng.gen_range(14.0..18.0),
        row.airmass,
        row.error,
    )
    .map_err(io_err)?;
    out.flush().map_err(io_err)
}
