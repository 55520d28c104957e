//! Multi-site monitoring simulation.
//!
//! A baseline sketch is built from a synthetic stream; its per-row margins
//! against the threshold form the reference vector. Every epoch each site
//! rebuilds its live sketch as baseline + column noise + a few stream
//! updates, then compares the ground truth (median estimate vs. threshold)
//! with the local safe-zone verdict.
//!
//! Row margins:
//!
//! ```text
//! upper bound (estimate < T):   ζ_d = sqrt(T) - ‖row_d‖
//! lower bound (estimate ≥ T):   ζ_d = ‖row_d‖ - sqrt(T)
//! ```
//!
//! Row `d` agrees with the threshold iff `ζ_d > 0`, so with a majority
//! quorum a positive certificate implies the median estimate is admissible.
//! `false_certifications` must therefore stay at zero.

use std::path::Path;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sketchzone_core::array_ops::{median, sum};
use sketchzone_core::{AgmsSketch, EvaluationMode, QuorumSafezone, SeedTable, ZoneVerdict};

use crate::error::HarnessError;
use crate::structured_log::{LogEmitter, LogLevel, Outcome};

/// Which side of the threshold is admissible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Admissible while the estimate stays below the threshold.
    Upper,
    /// Admissible while the estimate stays at or above the threshold.
    Lower,
}

impl Bound {
    pub fn parse(s: &str) -> Result<Self, HarnessError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upper" | "ub" => Ok(Self::Upper),
            "lower" | "lb" => Ok(Self::Lower),
            other => Err(HarnessError::InvalidArgument(format!(
                "bound must be upper or lower, got '{other}'"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
        }
    }

    /// Ground truth for an estimate.
    #[must_use]
    pub fn admits(self, estimate: f64, threshold: f64) -> bool {
        match self {
            Self::Upper => estimate < threshold,
            Self::Lower => estimate >= threshold,
        }
    }
}

/// Per-row margins of `sketch` against `threshold`.
#[must_use]
pub fn row_margins(sketch: &AgmsSketch, threshold: f64, bound: Bound) -> Vec<f64> {
    let root = threshold.sqrt();
    (0..sketch.depth())
        .map(|d| {
            let norm = sketch.row_sum_of_squares(d).sqrt();
            match bound {
                Bound::Upper => root - norm,
                Bound::Lower => norm - root,
            }
        })
        .collect()
}

/// Parse a root seed written as decimal or `0x` hex, `_` separators allowed.
pub fn parse_seed(raw: &str) -> Result<u64, HarnessError> {
    let s = raw.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        s.replace('_', "").parse::<u64>()
    };
    parsed.map_err(|_| HarnessError::InvalidSeed(raw.to_string()))
}

/// SHA-256 of a file, lowercase hex.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub depth: usize,
    pub width: usize,
    /// Quorum; `None` means majority of rows (`depth / 2 + 1`).
    pub k: Option<usize>,
    pub bound: Bound,
    /// Threshold as a multiple of the baseline estimate.
    pub threshold_factor: f64,
    pub epochs: u64,
    pub sites: usize,
    /// Unit-weight updates that build the baseline stream.
    pub baseline_updates: usize,
    /// Keys are drawn from `0..key_domain`.
    pub key_domain: i64,
    /// ±1 stream updates applied by each site per epoch.
    pub epoch_updates: usize,
    /// Width of the uniform column noise, centered on zero.
    pub noise: f64,
    pub seed: u64,
    pub mode: EvaluationMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            depth: 5,
            width: 10,
            k: None,
            bound: Bound::Upper,
            threshold_factor: 1.1,
            epochs: 100,
            sites: 4,
            baseline_updates: 1_000,
            key_domain: 100,
            epoch_updates: 10,
            noise: 4.0,
            seed: 0xDEAD_BEEF,
            mode: EvaluationMode::Eikonal,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn quorum(&self) -> usize {
        self.k.unwrap_or(self.depth / 2 + 1)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |msg: String| Err(HarnessError::InvalidArgument(msg));
        if self.depth == 0 || self.width == 0 {
            return invalid(format!(
                "sketch must be non-empty, got {}x{}",
                self.depth, self.width
            ));
        }
        if self.sites == 0 {
            return invalid("at least one site is required".to_string());
        }
        if self.key_domain <= 0 {
            return invalid(format!(
                "key domain must be positive, got {}",
                self.key_domain
            ));
        }
        if !(self.threshold_factor.is_finite() && self.threshold_factor > 0.0) {
            return invalid(format!(
                "threshold factor must be positive, got {}",
                self.threshold_factor
            ));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return invalid(format!("noise must be non-negative, got {}", self.noise));
        }
        let k = self.quorum();
        if !(1..=self.depth).contains(&k) {
            return invalid(format!("k={k} outside [1, {}]", self.depth));
        }
        Ok(())
    }

    /// Run id used in trace ids and the report.
    #[must_use]
    pub fn run_id(&self) -> String {
        format!("sim-{:x}", self.seed)
    }
}

/// Admissibility vs. certification counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SiteTally {
    pub in_admissible: u64,
    pub not_in_admissible: u64,
    pub certified: u64,
    pub escalated: u64,
    /// Certified while the estimate was not admissible.
    pub false_certifications: u64,
    /// Escalated while the estimate was still admissible.
    pub conservative_escalations: u64,
}

impl SiteTally {
    fn record(&mut self, admissible: bool, certified: bool) {
        if admissible {
            self.in_admissible += 1;
        } else {
            self.not_in_admissible += 1;
        }
        if certified {
            self.certified += 1;
        } else {
            self.escalated += 1;
        }
        if certified && !admissible {
            self.false_certifications += 1;
        }
        if admissible && !certified {
            self.conservative_escalations += 1;
        }
    }

    fn merge(&mut self, other: &Self) {
        self.in_admissible += other.in_admissible;
        self.not_in_admissible += other.not_in_admissible;
        self.certified += other.certified;
        self.escalated += other.escalated;
        self.false_certifications += other.false_certifications;
        self.conservative_escalations += other.conservative_escalations;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site: usize,
    #[serde(flatten)]
    pub tally: SiteTally,
    pub evaluations: u64,
    pub cache_builds: u64,
    pub subsets_enumerated: u64,
    pub sketch_updates: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub mode: String,
    pub bound: Bound,
    pub depth: usize,
    pub width: usize,
    pub k: usize,
    pub sites: usize,
    pub epochs: u64,
    pub seed: String,
    pub seed_fingerprint: String,
    pub baseline_estimate: f64,
    pub threshold: f64,
    pub reference_margins: Vec<f64>,
    pub legal_dimensions: Vec<usize>,
    pub site_summaries: Vec<SiteSummary>,
    pub totals: SiteTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_sha256: Option<String>,
}

/// Shared read-only inputs for one epoch.
struct EpochContext<'a> {
    baseline: &'a AgmsSketch,
    threshold: f64,
    bound: Bound,
    key_domain: i64,
    epoch_updates: usize,
    noise: f64,
}

#[derive(Debug, Clone, Copy)]
struct EpochObservation {
    site: usize,
    estimate: f64,
    admissible: bool,
    verdict: ZoneVerdict,
    latency_ns: u64,
}

/// One site: exclusive owner of its live sketch and evaluator.
struct MonitoringSite {
    id: usize,
    rng: StdRng,
    sketch: AgmsSketch,
    zone: QuorumSafezone,
    tally: SiteTally,
}

impl MonitoringSite {
    fn observe_epoch(&mut self, ctx: &EpochContext<'_>) -> EpochObservation {
        let depth = ctx.baseline.depth();
        for w in 0..ctx.baseline.width() {
            let noise: Vec<f64> = (0..depth)
                .map(|_| ctx.noise * (self.rng.gen_range(0.0..1.0) - 0.5))
                .collect();
            self.sketch.set_column(w, &sum(&ctx.baseline.column(w), &noise));
        }
        for _ in 0..ctx.epoch_updates {
            let key = self.rng.gen_range(0..ctx.key_domain);
            let value = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            self.sketch.update(key, value);
        }

        let estimate = median(&self.sketch);
        let admissible = ctx.bound.admits(estimate, ctx.threshold);
        let candidate = row_margins(&self.sketch, ctx.threshold, ctx.bound);

        let started = Instant::now();
        let verdict = self.zone.verdict(&candidate);
        let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        self.tally.record(admissible, verdict.is_safe());
        EpochObservation {
            site: self.id,
            estimate,
            admissible,
            verdict,
            latency_ns,
        }
    }

    fn summary(&self) -> SiteSummary {
        let zone = self.zone.metrics().snapshot();
        SiteSummary {
            site: self.id,
            tally: self.tally,
            evaluations: zone.evaluations,
            cache_builds: zone.cache_builds,
            subsets_enumerated: zone.subsets_enumerated,
            sketch_updates: self.sketch.metrics().snapshot().updates,
        }
    }
}

fn site_seed(root: u64, site: usize) -> u64 {
    root ^ 0x9E37_79B9_7F4A_7C15u64.wrapping_mul(site as u64 + 1)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Run the simulation, logging every decision to `log`.
pub fn run_simulation(
    config: &SimulationConfig,
    log: &mut LogEmitter,
) -> Result<SimulationReport, HarnessError> {
    config.validate()?;
    let k = config.quorum();
    let mode = config.mode.as_str();

    let start = log
        .entry(LogLevel::Info, "simulation_start")
        .with_mode(mode)
        .with_details(serde_json::json!({
            "depth": config.depth,
            "width": config.width,
            "k": k,
            "sites": config.sites,
            "epochs": config.epochs,
            "seed": format!("0x{:X}", config.seed),
        }));
    log.emit_entry(start)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let seeds = SeedTable::generate(config.depth, &mut rng);
    let mut baseline = AgmsSketch::with_seeds(config.width, seeds.clone());
    for _ in 0..config.baseline_updates {
        let key = rng.gen_range(0..config.key_domain);
        baseline.update(key, 1.0);
    }

    let baseline_estimate = median(&baseline);
    let threshold = config.threshold_factor * baseline_estimate;
    let reference = row_margins(&baseline, threshold, config.bound);

    let template = QuorumSafezone::with_reference(&reference, k, config.mode);
    let template = match template {
        Ok(zone) => zone,
        Err(err) => {
            let rejected = log
                .entry(LogLevel::Error, "reference_rejected")
                .with_bound(config.bound.as_str(), threshold)
                .with_outcome(Outcome::Error)
                .with_details(serde_json::json!({ "margins": reference, "k": k }));
            log.emit_entry(rejected)?;
            return Err(err.into());
        }
    };
    let legal_dimensions = template
        .reference()
        .map(|r| r.legal_indices().to_vec())
        .unwrap_or_default();

    let prepared = log
        .entry(LogLevel::Info, "reference_prepared")
        .with_mode(mode)
        .with_bound(config.bound.as_str(), threshold)
        .with_details(serde_json::json!({
            "baseline_estimate": baseline_estimate,
            "margins": reference,
            "legal": legal_dimensions,
            "k": k,
        }));
    log.emit_entry(prepared)?;

    let sites: Vec<Mutex<MonitoringSite>> = (0..config.sites)
        .map(|id| -> Result<_, HarnessError> {
            Ok(Mutex::new(MonitoringSite {
                id,
                rng: StdRng::seed_from_u64(site_seed(config.seed, id)),
                sketch: AgmsSketch::with_seeds(config.width, seeds.clone()),
                zone: QuorumSafezone::with_reference(&reference, k, config.mode)?,
                tally: SiteTally::default(),
            }))
        })
        .collect::<Result<_, _>>()?;

    let ctx = EpochContext {
        baseline: &baseline,
        threshold,
        bound: config.bound,
        key_domain: config.key_domain,
        epoch_updates: config.epoch_updates,
        noise: config.noise,
    };

    for epoch in 0..config.epochs {
        let observations: Vec<EpochObservation> = thread::scope(|s| {
            let handles: Vec<_> = sites
                .iter()
                .map(|site| {
                    let ctx = &ctx;
                    s.spawn(move || site.lock().observe_epoch(ctx))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });

        for obs in observations {
            let certified = obs.verdict.is_safe();
            let level = match (certified, obs.admissible) {
                (true, false) => LogLevel::Error,
                (false, _) => LogLevel::Warn,
                (true, true) => LogLevel::Info,
            };
            let evaluated = log
                .entry(level, "epoch_evaluated")
                .with_site_epoch(obs.site, epoch)
                .with_mode(mode)
                .with_bound(config.bound.as_str(), threshold)
                .with_estimate(obs.estimate, obs.admissible)
                .with_verdict(obs.verdict)
                .with_latency_ns(obs.latency_ns);
            log.emit_entry(evaluated)?;
        }
    }

    let site_summaries: Vec<SiteSummary> = sites.iter().map(|s| s.lock().summary()).collect();
    let mut totals = SiteTally::default();
    for summary in &site_summaries {
        totals.merge(&summary.tally);
    }

    let outcome = if totals.false_certifications == 0 {
        Outcome::Pass
    } else {
        Outcome::Fail
    };
    let complete = log
        .entry(LogLevel::Info, "simulation_complete")
        .with_mode(mode)
        .with_outcome(outcome)
        .with_details(serde_json::to_value(totals)?);
    log.emit_entry(complete)?;
    log.flush()?;

    Ok(SimulationReport {
        run_id: config.run_id(),
        mode: mode.to_string(),
        bound: config.bound,
        depth: config.depth,
        width: config.width,
        k,
        sites: config.sites,
        epochs: config.epochs,
        seed: format!("0x{:X}", config.seed),
        seed_fingerprint: hex(&seeds.fingerprint()),
        baseline_estimate,
        threshold,
        reference_margins: reference,
        legal_dimensions,
        site_summaries,
        totals,
        log_sha256: None,
    })
}
