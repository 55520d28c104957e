//! Evaluation mode configuration.
//!
//! The default safe-zone evaluation mode is set via the `SKETCHZONE_EVAL_MODE`
//! environment variable:
//! - `eikonal` (default): each adversarial subset sum is normalized by the
//!   norm of the matching reference entries. Exact, exponential in the
//!   number of legal dimensions.
//! - `raw`: plain sum of the smallest products. Sort-based, O(n log n).
//!
//! Callers can always override the default per evaluator with
//! [`crate::QuorumSafezone::set_mode`].

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted by [`default_mode`].
pub const MODE_ENV_VAR: &str = "SKETCHZONE_EVAL_MODE";

/// Formula used by the quorum safe zone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationMode {
    /// Normalized subset score `Σ zE·zX / sqrt(Σ zE²)`.
    #[default]
    Eikonal,
    /// Sum of the `m` smallest products `zE·zX`.
    Raw,
}

impl EvaluationMode {
    /// Parse from string (case-insensitive). Unknown strings map to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "eikonal" | "normalized" | "cosine" | "true" => Self::Eikonal,
            "raw" | "linear" | "sum" | "false" => Self::Raw,
            _ => Self::Eikonal,
        }
    }

    /// Mode from the legacy boolean switch (`true` = eikonal).
    #[must_use]
    pub const fn from_eikonal_flag(eikonal: bool) -> Self {
        if eikonal { Self::Eikonal } else { Self::Raw }
    }

    /// Returns true for the normalized formula.
    #[must_use]
    pub const fn is_eikonal(self) -> bool {
        matches!(self, Self::Eikonal)
    }

    /// Stable lowercase name, used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eikonal => "eikonal",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Atomic cache: 0=unresolved, 1=Eikonal, 2=Raw.
static CACHED_MODE: AtomicU8 = AtomicU8::new(0);

const MODE_UNRESOLVED: u8 = 0;
const MODE_EIKONAL: u8 = 1;
const MODE_RAW: u8 = 2;

fn mode_to_u8(mode: EvaluationMode) -> u8 {
    match mode {
        EvaluationMode::Eikonal => MODE_EIKONAL,
        EvaluationMode::Raw => MODE_RAW,
    }
}

fn u8_to_mode(v: u8) -> EvaluationMode {
    match v {
        MODE_RAW => EvaluationMode::Raw,
        _ => EvaluationMode::Eikonal,
    }
}

/// Get the configured default mode (reads env var on first call, caches thereafter).
///
/// Concurrent first calls may both read the environment; they resolve to the
/// same value, so the race is benign.
#[must_use]
pub fn default_mode() -> EvaluationMode {
    let cached = CACHED_MODE.load(Ordering::Relaxed);
    if cached != MODE_UNRESOLVED {
        return u8_to_mode(cached);
    }

    let mode = std::env::var(MODE_ENV_VAR)
        .map(|v| EvaluationMode::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_MODE.store(mode_to_u8(mode), Ordering::Release);
    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!(EvaluationMode::from_str_loose("eikonal"), EvaluationMode::Eikonal);
        assert_eq!(EvaluationMode::from_str_loose("EIKONAL"), EvaluationMode::Eikonal);
        assert_eq!(EvaluationMode::from_str_loose("normalized"), EvaluationMode::Eikonal);
        assert_eq!(EvaluationMode::from_str_loose(" raw "), EvaluationMode::Raw);
        assert_eq!(EvaluationMode::from_str_loose("linear"), EvaluationMode::Raw);
        assert_eq!(EvaluationMode::from_str_loose("false"), EvaluationMode::Raw);
        assert_eq!(EvaluationMode::from_str_loose("bogus"), EvaluationMode::Eikonal);
    }

    #[test]
    fn default_is_eikonal() {
        assert_eq!(EvaluationMode::default(), EvaluationMode::Eikonal);
        assert!(EvaluationMode::default().is_eikonal());
    }

    #[test]
    fn legacy_flag_maps_to_modes() {
        assert_eq!(EvaluationMode::from_eikonal_flag(true), EvaluationMode::Eikonal);
        assert_eq!(EvaluationMode::from_eikonal_flag(false), EvaluationMode::Raw);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(EvaluationMode::Raw.to_string(), "raw");
        assert_eq!(EvaluationMode::Eikonal.to_string(), "eikonal");
    }

    #[test]
    fn cached_mode_is_process_sticky_until_cache_reset() {
        let previous = CACHED_MODE.swap(MODE_RAW, Ordering::SeqCst);
        assert_eq!(default_mode(), EvaluationMode::Raw);
        assert_eq!(default_mode(), EvaluationMode::Raw);

        CACHED_MODE.store(MODE_EIKONAL, Ordering::SeqCst);
        assert_eq!(default_mode(), EvaluationMode::Eikonal);

        CACHED_MODE.store(previous, Ordering::SeqCst);
    }
}
