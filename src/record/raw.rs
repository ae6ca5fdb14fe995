//! Request shape as sent by forms and other callers: numbers may arrive as
//! strings, flags as `0`/`1`/`Yes`/`No`. Conversion into [`PatientRecord`]
//! parses and range-checks everything and never coerces bad input to zero.

use super::{Category, Gender, PatientRecord, ResidenceType, SmokingStatus, WorkType};
use crate::error::StrokeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPatientRecord {
    pub gender: Option<FieldValue>,
    pub age: Option<FieldValue>,
    pub hypertension: Option<FieldValue>,
    pub heart_disease: Option<FieldValue>,
    pub ever_married: Option<FieldValue>,
    pub work_type: Option<FieldValue>,
    #[serde(alias = "Residence_type", alias = "residence")]
    pub residence_type: Option<FieldValue>,
    pub avg_glucose_level: Option<FieldValue>,
    pub bmi: Option<FieldValue>,
    #[serde(alias = "smoking")]
    pub smoking_status: Option<FieldValue>,
}

/// Text that stands for "no value" in an optional numeric field
fn is_blank(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "" | "n/a" | "na" | "nan" | "null"
    )
}

fn number(field: &str, value: Option<&FieldValue>) -> Result<Option<f64>, String> {
    match value {
        None => Ok(None),
        Some(FieldValue::Number(n)) if n.is_finite() => Ok(Some(*n)),
        Some(FieldValue::Number(n)) => Err(format!("{field}: {n} is not a finite number")),
        Some(FieldValue::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(FieldValue::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(format!("{field}: '{s}' is not a number")),
        },
        Some(FieldValue::Bool(b)) => Err(format!("{field}: expected a number, got {b}")),
    }
}

fn required_number(field: &str, value: Option<&FieldValue>) -> Result<f64, String> {
    number(field, value)?.ok_or_else(|| format!("{field}: required"))
}

fn flag(field: &str, value: Option<&FieldValue>) -> Result<bool, String> {
    match value {
        None => Err(format!("{field}: required")),
        Some(FieldValue::Bool(b)) => Ok(*b),
        Some(FieldValue::Number(n)) if *n == 0.0 => Ok(false),
        Some(FieldValue::Number(n)) if *n == 1.0 => Ok(true),
        Some(FieldValue::Number(n)) => Err(format!("{field}: expected 0 or 1, got {n}")),
        Some(FieldValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" => Ok(true),
            "0" | "no" | "false" => Ok(false),
            _ => Err(format!("{field}: '{s}' is not a yes/no value")),
        },
    }
}

fn category<T: Category>(value: Option<&FieldValue>) -> Result<T, String> {
    match value {
        None => Err(format!("{}: required", T::FIELD)),
        Some(FieldValue::Text(s)) => s.parse(),
        Some(other) => Err(format!("{}: expected text, got {:?}", T::FIELD, other)),
    }
}

/// Keep the value when parsing succeeded, otherwise record the message.
fn collect<T>(errors: &mut Vec<String>, r: Result<T, String>) -> Option<T> {
    match r {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

impl TryFrom<&RawPatientRecord> for PatientRecord {
    type Error = StrokeError;

    fn try_from(raw: &RawPatientRecord) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();

        let gender = collect(&mut errors, category::<Gender>(raw.gender.as_ref()));
        let age = collect(&mut errors, required_number("age", raw.age.as_ref()));
        let hypertension = collect(&mut errors, flag("hypertension", raw.hypertension.as_ref()));
        let heart_disease = collect(&mut errors, flag("heart_disease", raw.heart_disease.as_ref()));
        let ever_married = collect(&mut errors, flag("ever_married", raw.ever_married.as_ref()));
        let work_type = collect(&mut errors, category::<WorkType>(raw.work_type.as_ref()));
        let residence_type = collect(
            &mut errors,
            category::<ResidenceType>(raw.residence_type.as_ref()),
        );
        let avg_glucose_level = collect(
            &mut errors,
            required_number("avg_glucose_level", raw.avg_glucose_level.as_ref()),
        );
        let bmi = match raw.bmi.as_ref() {
            Some(FieldValue::Text(s)) if is_blank(s) => Some(None),
            other => collect(&mut errors, number("bmi", other)),
        };
        let smoking_status = collect(
            &mut errors,
            category::<SmokingStatus>(raw.smoking_status.as_ref()),
        );

        match (
            gender,
            age,
            hypertension,
            heart_disease,
            ever_married,
            work_type,
            residence_type,
            avg_glucose_level,
            bmi,
            smoking_status,
        ) {
            (
                Some(gender),
                Some(age),
                Some(hypertension),
                Some(heart_disease),
                Some(ever_married),
                Some(work_type),
                Some(residence_type),
                Some(avg_glucose_level),
                Some(bmi),
                Some(smoking_status),
            ) if errors.is_empty() => {
                let record = PatientRecord {
                    gender,
                    age,
                    hypertension,
                    heart_disease,
                    ever_married,
                    work_type,
                    residence_type,
                    avg_glucose_level,
                    bmi,
                    smoking_status,
                };
                record.validate()?;
                Ok(record)
            }
            _ => Err(StrokeError::Validation(errors)),
        }
    }
}

impl TryFrom<RawPatientRecord> for PatientRecord {
    type Error = StrokeError;

    fn try_from(raw: RawPatientRecord) -> Result<Self, Self::Error> {
        PatientRecord::try_from(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_json() -> &'static str {
        r#"{
            "gender": "Male", "age": "67", "hypertension": "0", "heart_disease": "1",
            "ever_married": "Yes", "work_type": "Private", "Residence_type": "Urban",
            "avg_glucose_level": "228.69", "bmi": "36.6", "smoking_status": "formerly smoked"
        }"#
    }

    #[test]
    fn form_strings_parse_into_record() {
        let raw: RawPatientRecord = serde_json::from_str(form_json()).unwrap();
        let record = PatientRecord::try_from(&raw).unwrap();
        assert_eq!(record, crate::record::tests::sample_record());
    }

    #[test]
    fn short_field_names_parse_like_full_ones() {
        let short = form_json()
            .replace("\"Residence_type\"", "\"residence\"")
            .replace("\"smoking_status\"", "\"smoking\"");
        let raw: RawPatientRecord = serde_json::from_str(&short).unwrap();
        let record = PatientRecord::try_from(&raw).unwrap();
        assert_eq!(record, crate::record::tests::sample_record());
    }

    #[test]
    fn non_numeric_age_is_rejected_not_zeroed() {
        let mut raw: RawPatientRecord = serde_json::from_str(form_json()).unwrap();
        raw.age = Some(FieldValue::Text("sixty".into()));
        let err = PatientRecord::try_from(&raw).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("age: 'sixty' is not a number"));
    }

    #[test]
    fn blank_bmi_means_missing() {
        for blank in ["", "N/A", " na "] {
            let mut raw: RawPatientRecord = serde_json::from_str(form_json()).unwrap();
            raw.bmi = Some(FieldValue::Text(blank.into()));
            assert_eq!(PatientRecord::try_from(&raw).unwrap().bmi, None);
        }
        let mut raw: RawPatientRecord = serde_json::from_str(form_json()).unwrap();
        raw.bmi = None;
        assert_eq!(PatientRecord::try_from(&raw).unwrap().bmi, None);
    }

    #[test]
    fn every_missing_field_is_reported() {
        let err = PatientRecord::try_from(&RawPatientRecord::default()).unwrap_err();
        match err {
            StrokeError::Validation(errors) => assert_eq!(errors.len(), 9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let mut raw: RawPatientRecord = serde_json::from_str(form_json()).unwrap();
        raw.age = Some(FieldValue::Number(180.0));
        assert!(PatientRecord::try_from(&raw).is_err());
    }

    #[test]
    fn flags_accept_numbers_and_words() {
        assert!(flag("x", Some(&FieldValue::Number(1.0))).unwrap());
        assert!(!flag("x", Some(&FieldValue::Text("No".into()))).unwrap());
        assert!(flag("x", Some(&FieldValue::Number(2.0))).is_err());
        assert!(flag("x", Some(&FieldValue::Text("maybe".into()))).is_err());
    }
}
