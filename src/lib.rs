//! stroke-risk: a locally hosted binary stroke-risk classifier.
//!
//! Modular structure:
//! - [`record`] — Patient record schema, request parsing and validation
//! - [`features`] — Versioned encoding scheme and feature-vector encoder
//! - [`trainer`] — Seeded, reproducible logistic-regression training
//! - [`model`] — Trained parameters, versioned artifact, swappable handle
//! - [`risk`] — Probability, decision threshold and risk level
//! - [`service`] — Prediction entry point used by callers
//! - [`dataset`] — Labeled CSV loading
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod record;
pub mod risk;
pub mod service;
pub mod trainer;

pub use config::ServiceConfig;
pub use error::{Result, StrokeError};
pub use features::{encode, EncodingScheme, FeatureVector};
pub use logging::StructuredLogger;
pub use model::{ModelHandle, ModelParameters};
pub use record::{PatientRecord, RawPatientRecord};
pub use risk::{PredictionResult, RiskClassifier, RiskLevel};
pub use service::PredictionService;
pub use trainer::{train, CancellationToken, TrainingReport};
