//! Applies trained parameters to an encoded record; thresholds the
//! probability for `isStroke` and buckets it into a risk level.

use crate::config::RiskConfig;
use crate::error::{Result, StrokeError};
use crate::features::FeatureVector;
use crate::model::ModelParameters;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordered: `Low < Moderate < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// `p < moderate_cut` is Low, `p < high_cut` is Moderate, anything else High.
    pub fn from_probability(probability: f64, config: &RiskConfig) -> Self {
        if probability >= config.high_cut {
            RiskLevel::High
        } else if probability >= config.moderate_cut {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Moderate => write!(f, "Moderate"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Response contract: `{"isStroke": bool, "probability": 0..1, "riskLevel": "Low"|"Moderate"|"High"}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub is_stroke: bool,
    pub probability: f64,
    pub risk_level: RiskLevel,
}

/// One feature's share of the linear score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// Logistic function, written to avoid overflow for large |z|.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Schema version and length must match the model, and every entry must be finite.
fn check_vector(vector: &FeatureVector, params: &ModelParameters) -> Result<()> {
    if vector.schema_version != params.schema_version {
        return Err(StrokeError::SchemaMismatch(format!(
            "vector encoded with schema v{}, model expects v{}",
            vector.schema_version, params.schema_version
        )));
    }
    if vector.dim() != params.dimension() {
        return Err(StrokeError::SchemaMismatch(format!(
            "expected {} features, got {}",
            params.dimension(),
            vector.dim()
        )));
    }
    if let Some(i) = vector.as_slice().iter().position(|x| !x.is_finite()) {
        return Err(StrokeError::validation(format!(
            "feature {i} of the encoded vector is not a finite number"
        )));
    }
    Ok(())
}

pub struct RiskClassifier {
    config: RiskConfig,
}

impl RiskClassifier {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// `bias + w·x`. Caller guarantees matching dimensions.
    fn score(vector: &FeatureVector, params: &ModelParameters) -> f64 {
        params
            .weights
            .iter()
            .zip(vector.as_slice())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + params.bias
    }

    /// Decision and bucket for an already computed probability.
    pub fn classify(&self, probability: f64) -> PredictionResult {
        PredictionResult {
            is_stroke: probability >= self.config.decision_threshold,
            probability,
            risk_level: RiskLevel::from_probability(probability, &self.config),
        }
    }

    pub fn predict(&self, vector: &FeatureVector, params: &ModelParameters) -> Result<PredictionResult> {
        check_vector(vector, params)?;
        Ok(self.classify(sigmoid(Self::score(vector, params))))
    }

    /// Independent predictions in parallel; output order matches input order.
    pub fn predict_batch(
        &self,
        vectors: &[FeatureVector],
        params: &ModelParameters,
    ) -> Result<Vec<PredictionResult>> {
        vectors.par_iter().map(|v| self.predict(v, params)).collect()
    }

    /// Per-feature `weight * value`, largest magnitude first.
    pub fn contributions(
        &self,
        vector: &FeatureVector,
        params: &ModelParameters,
    ) -> Result<Vec<Contribution>> {
        check_vector(vector, params)?;
        let mut out: Vec<Contribution> = params
            .scheme
            .feature_names()
            .into_iter()
            .zip(params.weights.iter().zip(vector.as_slice()))
            .map(|(feature, (&weight, &value))| Contribution {
                feature,
                value,
                weight,
                contribution: weight * value,
            })
            .collect();
        out.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        Ok(out)
    }
}
