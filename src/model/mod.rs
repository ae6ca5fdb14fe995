//! Trained model parameters, their on-disk artifact, and the swappable
//! handle the service predicts through.

mod artifact;
mod handle;

pub use artifact::{load, save, FORMAT_VERSION};
pub use handle::ModelHandle;

use crate::error::{Result, StrokeError};
use crate::features::EncodingScheme;
use crate::trainer::TrainingReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weights, bias and the exact encoding scheme they were fitted against.
/// Never mutated after training; shared as `Arc<ModelParameters>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub schema_version: u32,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub scheme: EncodingScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

impl ModelParameters {
    pub fn new(weights: Vec<f64>, bias: f64, scheme: EncodingScheme) -> Result<Self> {
        let params = Self {
            model_id: uuid::Uuid::new_v4().to_string(),
            trained_at: Utc::now(),
            schema_version: scheme.schema_version,
            weights,
            bias,
            scheme,
            report: None,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_report(mut self, report: TrainingReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    /// Weights must line up with the scheme's layout and be finite.
    pub fn validate(&self) -> Result<()> {
        self.scheme.validate()?;
        if self.schema_version != self.scheme.schema_version {
            return Err(StrokeError::SchemaMismatch(format!(
                "parameters tagged v{} but scheme is v{}",
                self.schema_version, self.scheme.schema_version
            )));
        }
        let expected = self.scheme.dimension();
        if self.weights.len() != expected {
            return Err(StrokeError::SchemaMismatch(format!(
                "expected {} weights for schema v{}, got {}",
                expected,
                self.schema_version,
                self.weights.len()
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(StrokeError::SchemaMismatch("non-finite model parameters".into()));
        }
        Ok(())
    }
}
