//! Service and training configuration. JSON on disk, defaults for everything.

use crate::error::{Result, StrokeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Trained model artifact loaded at startup
    pub model_path: PathBuf,
    /// Decision threshold and risk-level cut points
    pub risk: RiskConfig,
    /// Trainer parameters
    pub training: TrainingConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// `isStroke` is true when probability >= this (0.0-1.0)
    pub decision_threshold: f64,
    /// Probability at or above this is at least Moderate
    pub moderate_cut: f64,
    /// Probability at or above this is High
    pub high_cut: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    None,
    Balanced,
}

impl std::str::FromStr for ClassWeight {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!("unknown class weight '{other}' (expected none|balanced)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed for the train/eval shuffle
    pub seed: u64,
    /// Share of records held out for evaluation
    pub eval_fraction: f64,
    /// L2 penalty on weights (bias is not penalized). Must be positive:
    /// the full one-hot layout is collinear with the bias.
    pub l2: f64,
    /// Newton steps before giving up
    pub max_iterations: usize,
    /// Converged once every gradient component is below this
    pub tolerance: f64,
    pub class_weight: ClassWeight,
    /// Rows per gradient shard
    pub shard_rows: usize,
    /// Wall-clock limit for a training run; none when unset
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.json"),
            risk: RiskConfig::default(),
            training: TrainingConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            moderate_cut: 0.2,
            high_cut: 0.5,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            eval_fraction: 0.2,
            l2: 1e-3,
            max_iterations: 100,
            tolerance: 1e-6,
            class_weight: ClassWeight::None,
            shard_rows: 1024,
            timeout_secs: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.decision_threshold) {
            return Err(StrokeError::Config(format!(
                "decision_threshold {} outside [0, 1]",
                self.decision_threshold
            )));
        }
        if !unit.contains(&self.moderate_cut)
            || !unit.contains(&self.high_cut)
            || self.moderate_cut > self.high_cut
        {
            return Err(StrokeError::Config(format!(
                "risk cut points must satisfy 0 <= moderate_cut ({}) <= high_cut ({}) <= 1",
                self.moderate_cut, self.high_cut
            )));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.eval_fraction) {
            return Err(StrokeError::Config(format!(
                "eval_fraction {} outside [0, 1)",
                self.eval_fraction
            )));
        }
        if !(self.l2.is_finite() && self.l2 > 0.0) {
            return Err(StrokeError::Config("l2 must be positive".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(StrokeError::Config("tolerance must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(StrokeError::Config("max_iterations must be at least 1".into()));
        }
        if self.shard_rows == 0 {
            return Err(StrokeError::Config("shard_rows must be at least 1".into()));
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Load from JSON file if present; otherwise return default.
    /// A file that exists but does not parse is an error, not a silent default.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| StrokeError::Config(format!("{}: {e}", path.display())))?;
        let config: ServiceConfig = serde_json::from_str(&data)
            .map_err(|e| StrokeError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.risk.validate()?;
        self.training.validate()
    }
}
