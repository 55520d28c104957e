//! # Quorum Safe Zone
//!
//! Local admissibility certificate under a k-out-of-n agreement rule.
//!
//! ## Mathematical Foundation
//!
//! A reference vector `zE ∈ ℝⁿ` is computed once from a baseline sketch.
//! Dimensions with `zE_i ≤ 0` are illegal and dropped; the remaining
//! indices form the legal set `L` (strictly increasing). For a candidate
//! `zX` the per-dimension products are
//!
//! ```text
//! p_i = zE_i · zX_i      for i ∈ L
//! ```
//!
//! The quorum condition "at least k of the |L| dimensions agree" holds
//! whenever *every* choice of `m = |L| - k + 1` dimensions still scores
//! positively: any m-subset must contain at least one agreeing dimension.
//! The certificate is therefore the adversarial minimum over all m-subsets:
//!
//! ```text
//! raw:      min_{|S|=m} Σ_S p_i                      = sum of the m smallest p_i
//! eikonal:  min_{|S|=m} Σ_S p_i / sqrt(Σ_S zE_i²)    (exhaustive enumeration)
//! ```
//!
//! In raw mode the terms are independent, so sorting finds the minimum. In
//! eikonal mode the denominator couples the terms and all `C(|L|, m)`
//! subsets are enumerated in increasing index order. `|L|` is the number of
//! sketch rows (tens at most), so the exponential worst case is acceptable.
//!
//! A positive certificate means "certified safe"; a non-positive one means
//! "threshold may have been crossed, escalate".
//!
//! ## Boundaries
//!
//! - `k = |L|` (m = 1): raw `min p_i`, eikonal `min p_i / |zE_i|`
//! - `k = 1` (m = |L|): raw `Σ p_i`, eikonal `Σ p_i / sqrt(Σ zE_i²)`

use thiserror::Error;

use crate::array_ops::multiply;
use crate::config::{self, EvaluationMode};
use crate::metrics::{self, SafezoneMetrics};

/// Recoverable safe-zone errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafezoneError {
    /// Fewer than `k` positive reference entries: no candidate can ever be certified.
    #[error("non-admissible reference vector: {legal} legal dimensions, quorum requires {k}")]
    NonAdmissibleReference { legal: usize, k: usize },
}

/// Squared reference entries, built on first eikonal evaluation.
#[derive(Debug, Clone, PartialEq)]
enum SquaresCache {
    Uncached,
    Cached(Vec<f64>),
}

impl SquaresCache {
    fn get_or_build(&mut self, zeta_e: &[f64], metrics: &SafezoneMetrics) -> &[f64] {
        match *self {
            Self::Cached(ref squares) => squares.as_slice(),
            Self::Uncached => {
                metrics::inc(&metrics.cache_builds);
                *self = Self::Cached(multiply(zeta_e, zeta_e));
                self.get_or_build(zeta_e, metrics)
            }
        }
    }
}

/// Reference state created by one `prepare` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReference {
    n: usize,
    k: usize,
    legal: Vec<usize>,
    zeta_e: Vec<f64>,
    squares: SquaresCache,
}

impl PreparedReference {
    /// Length of the unfiltered reference (and of every candidate).
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Quorum threshold.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Legal dimension indices, strictly increasing.
    #[must_use]
    pub fn legal_indices(&self) -> &[usize] {
        &self.legal
    }

    /// Reference values at the legal indices.
    #[must_use]
    pub fn filtered_reference(&self) -> &[f64] {
        &self.zeta_e
    }

    /// `zE_i²` for legal indices, once an eikonal evaluation has run.
    #[must_use]
    pub fn cached_squares(&self) -> Option<&[f64]> {
        match &self.squares {
            SquaresCache::Cached(squares) => Some(squares),
            SquaresCache::Uncached => None,
        }
    }

    /// Adversarial subset size `m = |L| - k + 1`.
    #[must_use]
    pub fn subset_size(&self) -> usize {
        self.legal.len() - self.k + 1
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneVerdict {
    /// Certificate > 0.
    Safe { certificate: f64 },
    /// Certificate ≤ 0 (or NaN): the threshold may have been crossed.
    Escalate { certificate: f64 },
}

impl ZoneVerdict {
    #[must_use]
    pub fn from_certificate(certificate: f64) -> Self {
        if certificate > 0.0 {
            Self::Safe { certificate }
        } else {
            Self::Escalate { certificate }
        }
    }

    #[must_use]
    pub const fn certificate(self) -> f64 {
        match self {
            Self::Safe { certificate } | Self::Escalate { certificate } => certificate,
        }
    }

    #[must_use]
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Safe { .. })
    }
}

/// Quorum safe-zone evaluator.
///
/// Owned by a single monitoring site; `evaluate` takes `&mut self` because
/// the squared-reference cache is filled lazily.
#[derive(Debug)]
pub struct QuorumSafezone {
    reference: Option<PreparedReference>,
    mode: EvaluationMode,
    metrics: SafezoneMetrics,
}

impl Default for QuorumSafezone {
    fn default() -> Self {
        Self::new()
    }
}

impl QuorumSafezone {
    /// Unprepared evaluator in the configured default mode.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(config::default_mode())
    }

    /// Unprepared evaluator in `mode`.
    #[must_use]
    pub fn with_mode(mode: EvaluationMode) -> Self {
        Self {
            reference: None,
            mode,
            metrics: SafezoneMetrics::new(),
        }
    }

    /// Prepared evaluator in one step.
    pub fn with_reference(
        reference: &[f64],
        k: usize,
        mode: EvaluationMode,
    ) -> Result<Self, SafezoneError> {
        let mut zone = Self::with_mode(mode);
        zone.prepare(reference, k)?;
        Ok(zone)
    }

    /// Install a new reference vector and quorum threshold.
    ///
    /// Any previous reference and its cached squares are discarded first,
    /// so a failed call leaves the evaluator unprepared.
    ///
    /// # Panics
    ///
    /// Panics if `reference` is empty or `k` is outside `[1, n]`.
    pub fn prepare(&mut self, reference: &[f64], k: usize) -> Result<(), SafezoneError> {
        let n = reference.len();
        assert!(n >= 1, "reference vector must have at least one dimension");
        assert!((1..=n).contains(&k), "quorum threshold k={k} outside [1, {n}]");

        self.reference = None;
        metrics::inc(&self.metrics.prepares);

        let legal: Vec<usize> = reference
            .iter()
            .enumerate()
            .filter(|&(_, &z)| z > 0.0)
            .map(|(i, _)| i)
            .collect();

        if legal.len() < k {
            metrics::inc(&self.metrics.rejected_references);
            return Err(SafezoneError::NonAdmissibleReference {
                legal: legal.len(),
                k,
            });
        }

        let zeta_e = legal.iter().map(|&i| reference[i]).collect();
        self.reference = Some(PreparedReference {
            n,
            k,
            legal,
            zeta_e,
            squares: SquaresCache::Uncached,
        });
        Ok(())
    }

    /// Select the evaluation formula. Does not touch the cache.
    pub fn set_mode(&mut self, mode: EvaluationMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.reference.is_some()
    }

    /// Current reference state, if prepared.
    #[must_use]
    pub fn reference(&self) -> Option<&PreparedReference> {
        self.reference.as_ref()
    }

    #[must_use]
    pub fn metrics(&self) -> &SafezoneMetrics {
        &self.metrics
    }

    /// Certificate for `candidate`; positive means certified safe.
    ///
    /// # Panics
    ///
    /// Panics if the evaluator is unprepared or `candidate.len() != n`.
    pub fn evaluate(&mut self, candidate: &[f64]) -> f64 {
        let Some(reference) = self.reference.as_mut() else {
            panic!("evaluate called before prepare");
        };
        assert_eq!(
            candidate.len(),
            reference.n,
            "candidate length must match the prepared reference"
        );

        let products: Vec<f64> = reference
            .legal
            .iter()
            .zip(&reference.zeta_e)
            .map(|(&i, &ze)| ze * candidate[i])
            .collect();
        let m = reference.legal.len() - reference.k + 1;

        metrics::inc(&self.metrics.evaluations);
        match self.mode {
            EvaluationMode::Raw => {
                metrics::inc(&self.metrics.raw_evaluations);
                smallest_sum(products, m)
            }
            EvaluationMode::Eikonal => {
                metrics::inc(&self.metrics.eikonal_evaluations);
                let squares = reference
                    .squares
                    .get_or_build(&reference.zeta_e, &self.metrics);
                let mut visited = 0;
                let certificate =
                    normalized_minimum(&products, squares, m, 0, 0.0, 0.0, &mut visited);
                metrics::add(&self.metrics.subsets_enumerated, visited);
                certificate
            }
        }
    }

    /// [`Self::evaluate`] wrapped as a verdict.
    pub fn verdict(&mut self, candidate: &[f64]) -> ZoneVerdict {
        ZoneVerdict::from_certificate(self.evaluate(candidate))
    }
}

/// Sum of the `m` smallest values; NaN if any value is NaN.
fn smallest_sum(mut products: Vec<f64>, m: usize) -> f64 {
    if products.iter().any(|p| p.is_nan()) {
        return f64::NAN;
    }
    products.sort_by(f64::total_cmp);
    products[..m].iter().sum()
}

/// Minimum of `(dot + Σ_S p) / sqrt(norm2 + Σ_S zE²)` over all `remaining`-subsets
/// `S` of `start..`, in increasing index order. The first NaN score ends the
/// search and is returned.
fn normalized_minimum(
    products: &[f64],
    squares: &[f64],
    remaining: usize,
    start: usize,
    dot: f64,
    norm2: f64,
    visited: &mut u64,
) -> f64 {
    if remaining == 0 {
        *visited += 1;
        return dot / norm2.sqrt();
    }
    // Leave room for the remaining - 1 indices after i.
    let last = products.len() - remaining;
    let mut best = f64::INFINITY;
    for i in start..=last {
        let score = normalized_minimum(
            products,
            squares,
            remaining - 1,
            i + 1,
            dot + products[i],
            norm2 + squares[i],
            visited,
        );
        if score.is_nan() {
            return score;
        }
        best = best.min(score);
    }
    best
}
