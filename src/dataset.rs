//! Labeled records from the public stroke dataset's CSV layout:
//! `id, gender, age, hypertension, heart_disease, ever_married, work_type,
//! Residence_type, avg_glucose_level, bmi, smoking_status, stroke`.
//!
//! Cells go through the same parsing as request fields, so `N/A` bmi means
//! missing and `Self-employed` or `never smoked` are recognized. Unknown
//! columns (such as `id`) are ignored.

use crate::error::{Result, StrokeError};
use crate::record::{FieldValue, PatientRecord, RawPatientRecord};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// At most this many row errors are spelled out in the message
const MAX_REPORTED_ROWS: usize = 10;

#[derive(Debug, Deserialize)]
struct CsvRow {
    gender: Option<String>,
    age: Option<String>,
    hypertension: Option<String>,
    heart_disease: Option<String>,
    ever_married: Option<String>,
    work_type: Option<String>,
    #[serde(alias = "Residence_type")]
    residence_type: Option<String>,
    avg_glucose_level: Option<String>,
    bmi: Option<String>,
    smoking_status: Option<String>,
    stroke: Option<String>,
}

impl CsvRow {
    fn label(&self) -> std::result::Result<bool, String> {
        match self.stroke.as_deref().map(str::trim) {
            Some("1") => Ok(true),
            Some("0") => Ok(false),
            Some(other) => Err(format!("stroke: expected 0 or 1, got '{other}'")),
            None => Err("stroke: required".to_string()),
        }
    }

    fn into_raw(self) -> RawPatientRecord {
        let text = |v: Option<String>| v.map(FieldValue::Text);
        RawPatientRecord {
            gender: text(self.gender),
            age: text(self.age),
            hypertension: text(self.hypertension),
            heart_disease: text(self.heart_disease),
            ever_married: text(self.ever_married),
            work_type: text(self.work_type),
            residence_type: text(self.residence_type),
            avg_glucose_level: text(self.avg_glucose_level),
            bmi: text(self.bmi),
            smoking_status: text(self.smoking_status),
        }
    }
}

pub fn load_csv(path: &Path) -> Result<Vec<(PatientRecord, bool)>> {
    let file = std::fs::File::open(path)
        .map_err(|e| StrokeError::Dataset(format!("{}: {e}", path.display())))?;
    let samples = read_csv(file)?;
    info!(
        path = %path.display(),
        records = samples.len(),
        positives = samples.iter().filter(|(_, y)| *y).count(),
        "dataset loaded"
    );
    Ok(samples)
}

/// Parse every row; fails with all row problems if any row is bad.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<(PatientRecord, bool)>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples = Vec::new();
    let mut problems = Vec::new();
    let mut bad_rows = 0usize;

    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = i + 2;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                bad_rows += 1;
                if problems.len() < MAX_REPORTED_ROWS {
                    problems.push(format!("line {line}: {e}"));
                }
                continue;
            }
        };
        let label = row.label();
        let record = PatientRecord::try_from(row.into_raw());
        match (record, label) {
            (Ok(record), Ok(label)) => samples.push((record, label)),
            (record, label) => {
                bad_rows += 1;
                if problems.len() < MAX_REPORTED_ROWS {
                    let mut msgs = Vec::new();
                    if let Err(e) = record {
                        msgs.push(e.to_string());
                    }
                    if let Err(e) = label {
                        msgs.push(e);
                    }
                    problems.push(format!("line {line}: {}", msgs.join("; ")));
                }
            }
        }
    }

    if bad_rows > 0 {
        return Err(StrokeError::Dataset(format!(
            "{bad_rows} invalid row(s): {}",
            problems.join(" | ")
        )));
    }
    if samples.is_empty() {
        return Err(StrokeError::Dataset("no data rows".into()));
    }
    Ok(samples)
}
