//! CLI entrypoint for the sketchzone simulation harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sketchzone_core::EvaluationMode;
use sketchzone_harness::simulation::{parse_seed, sha256_file};
use sketchzone_harness::structured_log::{LogEmitter, validate_log_file};
use sketchzone_harness::{Bound, SimulationConfig, run_simulation};

/// Quorum safe-zone tooling for sketchzone.
#[derive(Debug, Parser)]
#[command(name = "sketchzone-harness")]
#[command(about = "Distributed threshold monitoring simulation over AGMS sketches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a multi-site monitoring simulation.
    Simulate {
        /// Sketch rows.
        #[arg(long, default_value_t = 5)]
        depth: usize,
        /// Sketch columns.
        #[arg(long, default_value_t = 10)]
        width: usize,
        /// Quorum threshold (defaults to a majority of rows).
        #[arg(long)]
        k: Option<usize>,
        /// Admissible side of the threshold (`upper` or `lower`).
        #[arg(long, default_value = "upper")]
        bound: String,
        /// Threshold as a multiple of the baseline estimate.
        #[arg(long, default_value_t = 1.1)]
        threshold_factor: f64,
        #[arg(long, default_value_t = 100)]
        epochs: u64,
        #[arg(long, default_value_t = 4)]
        sites: usize,
        /// Width of the per-cell uniform noise.
        #[arg(long, default_value_t = 4.0)]
        noise: f64,
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Evaluation mode.
        #[arg(long, default_value = "eikonal", value_parser = ["eikonal", "raw"])]
        mode: String,
        /// JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// JSON report output path (stdout when omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a JSONL log against the structured log schema.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            depth,
            width,
            k,
            bound,
            threshold_factor,
            epochs,
            sites,
            noise,
            seed,
            mode,
            log,
            output,
        } => {
            let config = SimulationConfig {
                depth,
                width,
                k,
                bound: Bound::parse(&bound)?,
                threshold_factor,
                epochs,
                sites,
                noise,
                seed: parse_seed(&seed)?,
                mode: EvaluationMode::from_str_loose(&mode),
                ..SimulationConfig::default()
            };
            let run_id = config.run_id();

            let mut report = match &log {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let mut emitter = LogEmitter::to_file(path, "simulate", &run_id)?;
                    let report = run_simulation(&config, &mut emitter)?;
                    drop(emitter);
                    report
                }
                None => run_simulation(&config, &mut LogEmitter::sink("simulate", &run_id))?,
            };
            if let Some(path) = &log {
                report.log_sha256 = Some(sha256_file(path)?);
            }

            let body = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, format!("{body}\n"))?;
                    eprintln!("Wrote simulation report to {}", path.display());
                }
                None => println!("{body}"),
            }

            let totals = report.totals;
            eprintln!(
                "{} site-epochs: {} admissible, {} certified, {} false certifications",
                totals.in_admissible + totals.not_in_admissible,
                totals.in_admissible,
                totals.certified,
                totals.false_certifications,
            );
            if totals.false_certifications > 0 {
                return Err(format!(
                    "{} false certifications under k={}",
                    totals.false_certifications, report.k
                )
                .into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            if errors.is_empty() {
                eprintln!("{}: {lines} lines valid", log.display());
            } else {
                for err in &errors {
                    eprintln!("{err}");
                }
                return Err(format!(
                    "{}: {} validation errors in {lines} lines",
                    log.display(),
                    errors.len()
                )
                .into());
            }
        }
    }

    Ok(())
}
