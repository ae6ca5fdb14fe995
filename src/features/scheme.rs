//! Versioned encoding scheme: category order per field plus the imputation
//! and scaling constants fitted on the training partition.

use crate::error::{Result, StrokeError};
use crate::record::{Category, Gender, PatientRecord, ResidenceType, SmokingStatus, WorkType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Layout version of the encoded vector. Bump when the field order,
/// the set of fields, or the transformation of any field changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Continuous fields, in vector order
const CONTINUOUS: [&str; 3] = ["age", "avg_glucose_level", "bmi"];
/// Binary flags, in vector order
const FLAGS: [&str; 3] = ["hypertension", "heart_disease", "ever_married"];

/// Standardization constants: `(x - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: f64,
    pub std: f64,
}

impl Scaler {
    /// Population mean and standard deviation. A constant column gets std 1.
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        Some(Self {
            mean,
            std: if std > f64::EPSILON { std } else { 1.0 },
        })
    }

    pub fn apply(&self, x: f64) -> f64 {
        (x - self.mean) / self.std
    }

    fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.std.is_finite() && self.std > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scalers {
    pub age: Scaler,
    pub avg_glucose_level: Scaler,
    pub bmi: Scaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingScheme {
    pub schema_version: u32,
    pub gender: Vec<String>,
    pub work_type: Vec<String>,
    pub residence_type: Vec<String>,
    pub smoking_status: Vec<String>,
    /// Substituted for a missing bmi before scaling
    pub bmi_fill: f64,
    pub scalers: Scalers,
}

fn names<T: Category>() -> Vec<String> {
    T::ALL.iter().map(|c| c.name().to_string()).collect()
}

impl EncodingScheme {
    /// Current-version scheme with canonical category order and the given constants.
    pub fn new(bmi_fill: f64, scalers: Scalers) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            gender: names::<Gender>(),
            work_type: names::<WorkType>(),
            residence_type: names::<ResidenceType>(),
            smoking_status: names::<SmokingStatus>(),
            bmi_fill,
            scalers,
        }
    }

    /// Fit imputation and scaling constants. The bmi scaler is computed after
    /// imputation, so it sees the same values the encoder will produce.
    pub fn fit<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Result<Self> {
        let records: Vec<&PatientRecord> = records.into_iter().collect();
        if records.is_empty() {
            return Err(StrokeError::Dataset(
                "cannot fit encoding scheme on zero records".into(),
            ));
        }

        let known_bmi: Vec<f64> = records.iter().filter_map(|r| r.bmi).collect();
        let bmi_fill = Scaler::fit(&known_bmi)
            .map(|s| s.mean)
            .ok_or_else(|| StrokeError::Dataset("no bmi values to impute from".into()))?;

        let ages: Vec<f64> = records.iter().map(|r| r.age).collect();
        let glucose: Vec<f64> = records.iter().map(|r| r.avg_glucose_level).collect();
        let bmi: Vec<f64> = records.iter().map(|r| r.bmi.unwrap_or(bmi_fill)).collect();

        let fit = |field: &str, values: &[f64]| {
            Scaler::fit(values)
                .ok_or_else(|| StrokeError::Dataset(format!("no values for {field}")))
        };
        let scalers = Scalers {
            age: fit("age", &ages)?,
            avg_glucose_level: fit("avg_glucose_level", &glucose)?,
            bmi: fit("bmi", &bmi)?,
        };

        Ok(Self::new(bmi_fill, scalers))
    }

    /// Category list for a categorical field, by field name.
    pub fn categories(&self, field: &str) -> Option<&[String]> {
        match field {
            "gender" => Some(self.gender.as_slice()),
            "work_type" => Some(self.work_type.as_slice()),
            "residence_type" => Some(self.residence_type.as_slice()),
            "smoking_status" => Some(self.smoking_status.as_slice()),
            _ => None,
        }
    }

    /// Position of a category within its one-hot group.
    pub fn category_index<T: Category>(&self, value: T) -> Option<usize> {
        self.categories(T::FIELD)?
            .iter()
            .position(|c| c == value.name())
    }

    fn groups(&self) -> [(&'static str, &[String]); 4] {
        [
            ("gender", self.gender.as_slice()),
            ("work_type", self.work_type.as_slice()),
            ("residence_type", self.residence_type.as_slice()),
            ("smoking_status", self.smoking_status.as_slice()),
        ]
    }

    pub fn dimension(&self) -> usize {
        CONTINUOUS.len() + FLAGS.len() + self.groups().iter().map(|(_, c)| c.len()).sum::<usize>()
    }

    /// Names of the vector's entries, e.g. `age`, `gender=male`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut out: Vec<String> = CONTINUOUS.iter().chain(FLAGS.iter()).map(|s| s.to_string()).collect();
        for (field, cats) in self.groups() {
            out.extend(cats.iter().map(|c| format!("{field}={c}")));
        }
        out
    }

    /// Reject schemes this build cannot interpret.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(StrokeError::SchemaMismatch(format!(
                "encoding scheme v{} is not supported (expected v{})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        for (field, cats) in self.groups() {
            if cats.is_empty() {
                return Err(StrokeError::SchemaMismatch(format!("{field}: no categories")));
            }
            let mut seen = std::collections::HashSet::new();
            if !cats.iter().all(|c| seen.insert(c)) {
                return Err(StrokeError::SchemaMismatch(format!(
                    "{field}: duplicate categories"
                )));
            }
        }
        let s = &self.scalers;
        if !(s.age.is_valid() && s.avg_glucose_level.is_valid() && s.bmi.is_valid()) {
            return Err(StrokeError::SchemaMismatch("invalid scaler constants".into()));
        }
        if !(self.bmi_fill.is_finite() && self.bmi_fill > 0.0) {
            return Err(StrokeError::SchemaMismatch(format!(
                "invalid bmi imputation constant {}",
                self.bmi_fill
            )));
        }
        Ok(())
    }

    /// Hex SHA-256 over the scheme's JSON form.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_record;

    #[test]
    fn v1_layout_has_twenty_features() {
        let scheme = EncodingScheme::fit([&sample_record()]).unwrap();
        assert_eq!(scheme.dimension(), 20);
        let names = scheme.feature_names();
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], "age");
        assert_eq!(names[6], "gender=male");
        assert_eq!(names[19], "smoking_status=unknown");
    }

    #[test]
    fn category_indices_follow_canonical_order() {
        let scheme = EncodingScheme::fit([&sample_record()]).unwrap();
        assert_eq!(scheme.category_index(WorkType::Private), Some(0));
        assert_eq!(scheme.category_index(WorkType::NeverWorked), Some(4));
        assert_eq!(scheme.category_index(SmokingStatus::Formerly), Some(1));
        assert_eq!(scheme.category_index(ResidenceType::Rural), Some(1));
    }

    #[test]
    fn fit_imputes_bmi_from_known_values() {
        let a = PatientRecord { bmi: Some(20.0), ..sample_record() };
        let b = PatientRecord { bmi: Some(30.0), ..sample_record() };
        let c = PatientRecord { bmi: None, ..sample_record() };
        let scheme = EncodingScheme::fit([&a, &b, &c]).unwrap();
        assert!((scheme.bmi_fill - 25.0).abs() < 1e-12);
        assert!((scheme.scalers.bmi.mean - 25.0).abs() < 1e-12);
        // identical ages: constant column falls back to unit std
        assert_eq!(scheme.scalers.age.std, 1.0);
    }

    #[test]
    fn fit_without_any_bmi_fails() {
        let r = PatientRecord { bmi: None, ..sample_record() };
        assert!(matches!(EncodingScheme::fit([&r]), Err(StrokeError::Dataset(_))));
        assert!(EncodingScheme::fit(std::iter::empty()).is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let scheme = EncodingScheme::fit([&sample_record()]).unwrap();
        let again = scheme.clone();
        assert_eq!(scheme.fingerprint().unwrap(), again.fingerprint().unwrap());
        assert_eq!(scheme.fingerprint().unwrap().len(), 64);
        let expected = hex::encode(Sha256::digest(serde_json::to_vec(&scheme).unwrap()));
        assert_eq!(scheme.fingerprint().unwrap(), expected);
        assert!(expected.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

        let mut reordered = scheme.clone();
        reordered.work_type.swap(0, 1);
        assert_ne!(scheme.fingerprint().unwrap(), reordered.fingerprint().unwrap());
    }

    #[test]
    fn validate_rejects_foreign_versions_and_duplicates() {
        let scheme = EncodingScheme::fit([&sample_record()]).unwrap();
        assert!(scheme.validate().is_ok());

        let mut future = scheme.clone();
        future.schema_version = 2;
        assert!(matches!(future.validate(), Err(StrokeError::SchemaMismatch(_))));

        let mut dup = scheme;
        dup.gender.push("male".into());
        assert!(dup.validate().is_err());
    }
}
