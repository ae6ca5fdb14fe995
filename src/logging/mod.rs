//! Structured logging setup and the prediction audit line.

mod format;

pub use format::{PredictionLog, StructuredLogger};
