//! Structured logging contract for sketchzone simulations.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to a file or any writer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.

use serde::{Deserialize, Serialize};
use sketchzone_core::ZoneVerdict;
use std::io::Write;
use std::path::Path;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Safe-zone decision for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Escalate,
}

impl From<ZoneVerdict> for Verdict {
    fn from(v: ZoneVerdict) -> Self {
        if v.is_safe() { Self::Safe } else { Self::Escalate }
    }
}

/// Run or check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Error,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
/// Verdict events must also carry `site`, `epoch` and `certificate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    /// Evaluation mode (`eikonal|raw`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Monitored bound (`upper|lower`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Self-join estimate of the evaluated sketch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    /// Whether the estimate is inside the admissible region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admissible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            run_id: None,
            site: None,
            epoch: None,
            mode: None,
            bound: None,
            threshold: None,
            estimate: None,
            admissible: None,
            certificate: None,
            verdict: None,
            outcome: None,
            latency_ns: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set site and epoch.
    #[must_use]
    pub fn with_site_epoch(mut self, site: usize, epoch: u64) -> Self {
        self.site = Some(site);
        self.epoch = Some(epoch);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn with_bound(mut self, bound: impl Into<String>, threshold: f64) -> Self {
        self.bound = Some(bound.into());
        self.threshold = Some(threshold);
        self
    }

    /// Set the estimate and whether it is admissible.
    #[must_use]
    pub fn with_estimate(mut self, estimate: f64, admissible: bool) -> Self {
        self.estimate = Some(estimate);
        self.admissible = Some(admissible);
        self
    }

    /// Set certificate and the verdict derived from it.
    #[must_use]
    pub fn with_verdict(mut self, verdict: ZoneVerdict) -> Self {
        self.certificate = Some(verdict.certificate());
        self.verdict = Some(verdict.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_latency_ns(mut self, ns: u64) -> Self {
        self.latency_ns = Some(ns);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries.
pub struct LogEmitter {
    writer: Box<dyn Write + Send>,
    seq: u64,
    scope: String,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, scope: &str, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(
            Box::new(std::io::BufWriter::new(file)),
            scope,
            run_id,
        ))
    }

    /// Create an emitter over an arbitrary writer.
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write + Send>, scope: &str, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            scope: scope.to_string(),
            run_id: run_id.to_string(),
        }
    }

    /// Create an emitter that discards its output.
    #[must_use]
    pub fn sink(scope: &str, run_id: &str) -> Self {
        Self::to_writer(Box::new(std::io::sink()), scope, run_id)
    }

    /// Number of trace ids issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.seq
    }

    /// Generate the next trace ID: `<scope>::<run_id>::<seq>`.
    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.scope, self.run_id, self.seq)
    }

    /// Start an entry with the next trace id and the run id filled in.
    pub fn entry(&mut self, level: LogLevel, event: &str) -> LogEntry {
        let trace_id = self.next_trace_id();
        LogEntry::new(trace_id, level, event).with_run(&self.run_id)
    }

    /// Emit a bare event.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let entry = self.entry(level, event);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a fully-populated entry, filling trace and run ids if missing.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        self.write_line(&entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

fn check_enum(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    allowed: &[&str],
    line_number: usize,
    errors: &mut Vec<LogValidationError>,
) {
    if let Some(value) = obj.get(field).and_then(|v| v.as_str())
        && !allowed.contains(&value)
    {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message: format!("invalid {field}: '{value}'"),
        });
    }
}

/// Validate a single JSONL line against the schema.
///
/// Returns the parsed entry if valid, or a list of validation errors.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<json>".to_string(),
                message: format!("invalid JSON: {e}"),
            });
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(LogValidationError {
            line_number,
            field: "<root>".to_string(),
            message: "expected JSON object".to_string(),
        });
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError {
                line_number,
                field: field.to_string(),
                message: "required field missing".to_string(),
            });
        }
    }

    check_enum(
        obj,
        "level",
        &["trace", "debug", "info", "warn", "error", "fatal"],
        line_number,
        &mut errors,
    );
    check_enum(obj, "mode", &["eikonal", "raw"], line_number, &mut errors);
    check_enum(obj, "bound", &["upper", "lower"], line_number, &mut errors);
    check_enum(
        obj,
        "outcome",
        &["pass", "fail", "skip", "error"],
        line_number,
        &mut errors,
    );
    check_enum(obj, "verdict", &["safe", "escalate"], line_number, &mut errors);

    // Verdict explainability: a decision must say where, when and why.
    if let Some(verdict) = obj.get("verdict") {
        for field in ["site", "epoch", "certificate"] {
            if !obj.contains_key(field) {
                errors.push(LogValidationError {
                    line_number,
                    field: field.to_string(),
                    message: "verdict events must include this field".to_string(),
                });
            }
        }
        // NaN certificates serialize as null and can never be safe.
        let certificate = obj.get("certificate").and_then(serde_json::Value::as_f64);
        if verdict.as_str() == Some("safe") && !certificate.is_some_and(|c| c > 0.0) {
            errors.push(LogValidationError {
                line_number,
                field: "certificate".to_string(),
                message: "safe verdict requires a positive certificate".to_string(),
            });
        }
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        errors.push(LogValidationError {
            line_number,
            field: "trace_id".to_string(),
            message: format!(
                "trace_id should follow <scope>::<run_id>::<seq> format, got: '{trace_id}'"
            ),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match serde_json::from_value::<LogEntry>(value) {
        Ok(entry) => Ok(entry),
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<deserialization>".to_string(),
                message: format!("failed to deserialize: {e}"),
            });
            Err(errors)
        }
    }
}

/// Validate an entire JSONL file.
///
/// Returns the total line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RFC 3339 UTC timestamp with millisecond precision.
fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::new("sketchzone::run::001", LogLevel::Info, "simulation_start");
        let json = entry.to_jsonl().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["level"], "info");
        assert_eq!(v["event"], "simulation_start");
        assert!(v.get("verdict").is_none());
    }

    #[test]
    fn verdict_entry_validates() {
        let entry = LogEntry::new("sketchzone::run::002", LogLevel::Info, "epoch_evaluated")
            .with_site_epoch(1, 4)
            .with_mode("eikonal")
            .with_verdict(ZoneVerdict::from_certificate(0.75));
        let json = entry.to_jsonl().unwrap();
        let parsed = validate_log_line(&json, 1).unwrap();
        assert_eq!(parsed.verdict, Some(Verdict::Safe));
        assert_eq!(parsed.certificate, Some(0.75));
    }

    #[test]
    fn verdicts_serialize_lowercase() {
        let entry = LogEntry::new("a::b::1", LogLevel::Warn, "epoch_evaluated")
            .with_site_epoch(0, 0)
            .with_verdict(ZoneVerdict::from_certificate(-0.5));
        let v: serde_json::Value = serde_json::from_str(&entry.to_jsonl().unwrap()).unwrap();
        assert_eq!(v["verdict"], "escalate");

        let capitalized = r#"{"timestamp":"t","trace_id":"a::b::1","level":"info","event":"e","site":0,"epoch":0,"certificate":1.0,"verdict":"Safe"}"#;
        let errs = validate_log_line(capitalized, 1).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "verdict"));
    }

    #[test]
    fn safe_verdict_with_negative_certificate_is_rejected() {
        let line = r#"{"timestamp":"t","trace_id":"a::b::1","level":"info","event":"e","site":0,"epoch":0,"certificate":-1.0,"verdict":"safe"}"#;
        let errs = validate_log_line(line, 3).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "certificate"));
    }

    #[test]
    fn verdict_without_site_is_rejected() {
        let line = r#"{"timestamp":"t","trace_id":"a::b::1","level":"warn","event":"e","epoch":0,"certificate":-1.0,"verdict":"escalate"}"#;
        let errs = validate_log_line(line, 1).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "site");
    }

    #[test]
    fn bad_enums_and_trace_ids_are_reported() {
        let line = r#"{"timestamp":"t","trace_id":"flat","level":"loud","event":"e","mode":"fast"}"#;
        let errs = validate_log_line(line, 2).unwrap_err();
        let fields: Vec<&str> = errs.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"level"));
        assert!(fields.contains(&"mode"));
        assert!(fields.contains(&"trace_id"));
        assert!(errs[0].to_string().starts_with("line 2: field"));
    }

    #[test]
    fn emitter_numbers_trace_ids() {
        let mut emitter = LogEmitter::sink("sketchzone", "r1");
        let first = emitter.emit(LogLevel::Info, "a").unwrap();
        let second = emitter.emit(LogLevel::Info, "b").unwrap();
        assert_eq!(first.trace_id, "sketchzone::r1::001");
        assert_eq!(second.trace_id, "sketchzone::r1::002");
        assert_eq!(second.run_id.as_deref(), Some("r1"));
        assert_eq!(emitter.issued(), 2);
    }

    #[test]
    fn utc_formatting_is_exact() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        // 2000-02-29T12:34:56.789Z
        assert_eq!(format_utc(951_827_696, 789), "2000-02-29T12:34:56.789Z");
        // 2024-12-31T23:59:59.000Z
        assert_eq!(format_utc(1_735_689_599, 0), "2024-12-31T23:59:59.000Z");
    }
}
