//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.

use crate::error::StrokeError;
use crate::risk::PredictionResult;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One audit record per prediction request. Carries the outcome only,
/// never patient values, not even inside error messages.
#[derive(Debug, Serialize)]
pub struct PredictionLog<'a> {
    pub ts: String,
    pub model_id: &'a str,
    /// 1-based position of the request in its input stream
    pub line: usize,
    /// `ok` or the error kind
    pub outcome: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    /// Fields a rejected request failed on; names only, never values
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl<'a> PredictionLog<'a> {
    pub fn new(model_id: &'a str, line: usize, outcome: &Result<PredictionResult, StrokeError>) -> Self {
        let ts = chrono::Utc::now().to_rfc3339();
        match outcome {
            Ok(r) => Self {
                ts,
                model_id,
                line,
                outcome: "ok",
                probability: Some(r.probability),
                risk_level: Some(r.risk_level.to_string()),
                fields: Vec::new(),
            },
            Err(e) => Self {
                ts,
                model_id,
                line,
                outcome: e.kind(),
                probability: None,
                risk_level: None,
                fields: e.fields().into_iter().map(str::to_string).collect(),
            },
        }
    }
}

/// Initialize tracing, plain or JSON (one object per line)
pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber writing to stderr, level from RUST_LOG or `default_level`.
    /// Stdout stays free for command output.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    /// Emit a single structured line (e.g. a prediction audit record) without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}
