//! Encoding of patient records into fixed-layout numeric feature vectors.

mod encoder;
mod scheme;

pub use encoder::{encode, encode_batch};
pub use scheme::{EncodingScheme, Scaler, Scalers, SCHEMA_VERSION};

use serde::{Deserialize, Serialize};

/// Encoded record. Only meaningful together with the scheme version that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema_version: u32,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(schema_version: u32, values: Vec<f64>) -> Self {
        Self {
            schema_version,
            values,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
