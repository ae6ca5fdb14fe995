//! Inference: linear score → probability → decision and risk bucket.

mod engine;

pub use engine::{sigmoid, Contribution, PredictionResult, RiskClassifier, RiskLevel};
