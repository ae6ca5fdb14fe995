//! Patient record schema: categorical fields, the validated record, and the
//! loosely-typed request shape it is parsed from.

mod raw;

pub use raw::{FieldValue, RawPatientRecord};

use crate::error::{Result, StrokeError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Accepted age range in years
pub const AGE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=120.0;
/// Upper bound for average glucose (mg/dL); lower bound is exclusive zero
pub const GLUCOSE_MAX: f64 = 1000.0;
/// Upper bound for BMI; lower bound is exclusive zero
pub const BMI_MAX: f64 = 150.0;

/// A categorical attribute with a closed, ordered set of values.
///
/// `ALL` order is the canonical category order written into new encoding
/// schemes; `name` is the canonical spelling stored there.
pub trait Category: Copy + FromStr<Err = String> + 'static {
    const FIELD: &'static str;
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;
}

/// Lowercase, trim, and fold spaces/hyphens to underscores so that
/// `Self-employed`, `self employed` and `self_employed` compare equal.
fn normalize(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn unknown<T: Category>(value: &str) -> String {
    let expected: Vec<&str> = T::ALL.iter().map(Category::name).collect();
    format!(
        "{}: unrecognized value '{}' (expected one of {})",
        T::FIELD,
        value,
        expected.join(", ")
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Category for Gender {
    const FIELD: &'static str = "gender";
    const ALL: &'static [Self] = &[Self::Male, Self::Female, Self::Other];

    fn name(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(unknown::<Self>(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum WorkType {
    Private,
    SelfEmployed,
    Government,
    Child,
    NeverWorked,
}

impl Category for WorkType {
    const FIELD: &'static str = "work_type";
    const ALL: &'static [Self] = &[
        Self::Private,
        Self::SelfEmployed,
        Self::Government,
        Self::Child,
        Self::NeverWorked,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::SelfEmployed => "self_employed",
            Self::Government => "government",
            Self::Child => "child",
            Self::NeverWorked => "never_worked",
        }
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "private" => Ok(Self::Private),
            "self_employed" => Ok(Self::SelfEmployed),
            "government" | "govt_job" | "govt" => Ok(Self::Government),
            "child" | "children" => Ok(Self::Child),
            "never_worked" => Ok(Self::NeverWorked),
            _ => Err(unknown::<Self>(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ResidenceType {
    Urban,
    Rural,
}

impl Category for ResidenceType {
    const FIELD: &'static str = "residence_type";
    const ALL: &'static [Self] = &[Self::Urban, Self::Rural];

    fn name(&self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Rural => "rural",
        }
    }
}

impl FromStr for ResidenceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "urban" => Ok(Self::Urban),
            "rural" => Ok(Self::Rural),
            _ => Err(unknown::<Self>(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum SmokingStatus {
    Never,
    Formerly,
    Currently,
    Unknown,
}

impl Category for SmokingStatus {
    const FIELD: &'static str = "smoking_status";
    const ALL: &'static [Self] = &[Self::Never, Self::Formerly, Self::Currently, Self::Unknown];

    fn name(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Formerly => "formerly",
            Self::Currently => "currently",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for SmokingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "never" | "never_smoked" => Ok(Self::Never),
            "formerly" | "formerly_smoked" => Ok(Self::Formerly),
            "currently" | "smokes" => Ok(Self::Currently),
            "unknown" => Ok(Self::Unknown),
            _ => Err(unknown::<Self>(s)),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;
    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for WorkType {
    type Error = String;
    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for ResidenceType {
    type Error = String;
    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for SmokingStatus {
    type Error = String;
    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// One patient's validated attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub gender: Gender,
    /// Years, within [`AGE_RANGE`]
    pub age: f64,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub ever_married: bool,
    pub work_type: WorkType,
    #[serde(alias = "Residence_type", alias = "residence")]
    pub residence_type: ResidenceType,
    /// mg/dL
    pub avg_glucose_level: f64,
    /// Absent values are imputed by the encoder
    #[serde(default)]
    pub bmi: Option<f64>,
    #[serde(alias = "smoking")]
    pub smoking_status: SmokingStatus,
}

impl PatientRecord {
    /// Check numeric fields; every problem is reported, not just the first.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !self.age.is_finite() || !AGE_RANGE.contains(&self.age) {
            errors.push(format!(
                "age: {} out of range [{}, {}]",
                self.age,
                AGE_RANGE.start(),
                AGE_RANGE.end()
            ));
        }
        if !self.avg_glucose_level.is_finite()
            || self.avg_glucose_level <= 0.0
            || self.avg_glucose_level > GLUCOSE_MAX
        {
            errors.push(format!(
                "avg_glucose_level: {} out of range (0, {}]",
                self.avg_glucose_level, GLUCOSE_MAX
            ));
        }
        if let Some(bmi) = self.bmi {
            if !bmi.is_finite() || bmi <= 0.0 || bmi > BMI_MAX {
                errors.push(format!("bmi: {} out of range (0, {}]", bmi, BMI_MAX));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StrokeError::Validation(errors))
        }
    }
}
