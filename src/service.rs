//! Prediction service: validate, encode and classify a patient record
//! against the currently served model.
//!
//! Every failure is returned as a typed error. There is no fallback answer.

use crate::config::{RiskConfig, ServiceConfig};
use crate::error::{Result, StrokeError};
use crate::features::{encode, FeatureVector};
use crate::model::{self, ModelHandle, ModelParameters};
use crate::record::{PatientRecord, RawPatientRecord};
use crate::risk::{Contribution, PredictionResult, RiskClassifier};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PredictionService {
    model: ModelHandle,
    classifier: RiskClassifier,
}

impl PredictionService {
    pub fn new(params: ModelParameters, risk: RiskConfig) -> Result<Self> {
        risk.validate()?;
        params.validate()?;
        Ok(Self {
            model: ModelHandle::new(params),
            classifier: RiskClassifier::new(risk),
        })
    }

    /// Load the configured artifact. A service without a model does not start.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let params = model::load(&config.model_path)?;
        info!(
            model_id = %params.model_id,
            path = %config.model_path.display(),
            "prediction service ready"
        );
        Self::new(params, config.risk.clone())
    }

    /// Snapshot of the served model. Holding it keeps that model alive
    /// across a concurrent reload.
    pub fn current_model(&self) -> Arc<ModelParameters> {
        self.model.current()
    }

    pub fn risk_config(&self) -> &RiskConfig {
        self.classifier.config()
    }

    pub fn predict_risk(&self, record: &PatientRecord) -> Result<PredictionResult> {
        let params = self.model.current();
        let vector = encode(record, &params.scheme)?;
        let result = self.classifier.predict(&vector, &params)?;
        debug!(
            model_id = %params.model_id,
            probability = result.probability,
            risk_level = %result.risk_level,
            "prediction"
        );
        Ok(result)
    }

    /// Classify an already encoded vector; shape is checked against the served model.
    pub fn predict_vector(&self, vector: &FeatureVector) -> Result<PredictionResult> {
        let params = self.model.current();
        self.classifier.predict(vector, &params)
    }

    pub fn predict_raw(&self, raw: &RawPatientRecord) -> Result<PredictionResult> {
        let record = PatientRecord::try_from(raw)?;
        self.predict_risk(&record)
    }

    /// JSON request in, JSON response out: the prediction on success,
    /// `{"error": {"kind", "message"}}` otherwise.
    pub fn respond_json(&self, request: &str) -> String {
        let outcome = self.predict_json(request);
        render(&outcome)
    }

    /// Parse and predict one JSON request.
    pub fn predict_json(&self, request: &str) -> Result<PredictionResult> {
        let raw: RawPatientRecord = serde_json::from_str(request)
            .map_err(|e| StrokeError::validation(format!("malformed request: {e}")))?;
        self.predict_raw(&raw)
    }

    /// Per-feature contributions to the score, largest first.
    pub fn explain(&self, record: &PatientRecord) -> Result<Vec<Contribution>> {
        let params = self.model.current();
        let vector = encode(record, &params.scheme)?;
        self.classifier.contributions(&vector, &params)
    }

    /// Load a new artifact and swap it in. On any failure the served
    /// model stays as it was. Returns the replaced model.
    pub fn reload(&self, path: &Path) -> Result<Arc<ModelParameters>> {
        let params = match model::load(path) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "reload failed, keeping current model");
                return Err(e);
            }
        };
        let model_id = params.model_id.clone();
        let previous = self.model.swap(params);
        info!(
            previous = %previous.model_id,
            current = %model_id,
            "model reloaded"
        );
        Ok(previous)
    }
}

/// Serialize a prediction outcome to its wire form.
pub fn render(outcome: &Result<PredictionResult>) -> String {
    let rendered = match outcome {
        Ok(result) => serde_json::to_string(result),
        Err(e) => serde_json::to_string(&e.to_response()),
    };
    rendered.unwrap_or_else(|_| {
        r#"{"error":{"kind":"SerializationError","message":"response could not be serialized"}}"#
            .to_string()
    })
}
