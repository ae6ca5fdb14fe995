//! Record → vector. Pure: the output depends only on the record and the scheme.

use super::{EncodingScheme, FeatureVector};
use crate::error::{Result, StrokeError};
use crate::record::{Category, PatientRecord};
use rayon::prelude::*;

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn one_hot<T: Category>(out: &mut Vec<f64>, scheme: &EncodingScheme, value: T) -> Result<()> {
    let width = scheme
        .categories(T::FIELD)
        .map(<[String]>::len)
        .unwrap_or(0);
    let idx = scheme.category_index(value).ok_or_else(|| {
        StrokeError::validation(format!(
            "{}: category '{}' is not part of encoding scheme v{}",
            T::FIELD,
            value.name(),
            scheme.schema_version
        ))
    })?;
    out.extend((0..width).map(|i| if i == idx { 1.0 } else { 0.0 }));
    Ok(())
}

/// Encode one record. A missing bmi is replaced by the scheme's stored mean
/// before scaling, so an absent bmi and a bmi equal to that mean encode identically.
pub fn encode(record: &PatientRecord, scheme: &EncodingScheme) -> Result<FeatureVector> {
    record.validate()?;

    let s = &scheme.scalers;
    let mut values = Vec::with_capacity(scheme.dimension());
    values.push(s.age.apply(record.age));
    values.push(s.avg_glucose_level.apply(record.avg_glucose_level));
    values.push(s.bmi.apply(record.bmi.unwrap_or(scheme.bmi_fill)));

    values.push(flag(record.hypertension));
    values.push(flag(record.heart_disease));
    values.push(flag(record.ever_married));

    one_hot(&mut values, scheme, record.gender)?;
    one_hot(&mut values, scheme, record.work_type)?;
    one_hot(&mut values, scheme, record.residence_type)?;
    one_hot(&mut values, scheme, record.smoking_status)?;

    Ok(FeatureVector::new(scheme.schema_version, values))
}

/// Encode many records in parallel; output order matches input order.
/// Fails if any record is invalid, naming its position.
pub fn encode_batch(records: &[PatientRecord], scheme: &EncodingScheme) -> Result<Vec<FeatureVector>> {
    records
        .par_iter()
        .enumerate()
        .map(|(i, r)| {
            encode(r, scheme).map_err(|e| match e {
                StrokeError::Validation(errors) => StrokeError::Validation(
                    errors.into_iter().map(|m| format!("record {i}: {m}")).collect(),
                ),
                other => other,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Scaler, Scalers};
    use crate::record::tests::sample_record;
    use crate::record::{Gender, ResidenceType, SmokingStatus, WorkType};
    use proptest::prelude::*;

    fn scheme() -> EncodingScheme {
        EncodingScheme::new(
            30.0,
            Scalers {
                age: Scaler { mean: 50.0, std: 10.0 },
                avg_glucose_level: Scaler { mean: 100.0, std: 50.0 },
                bmi: Scaler { mean: 30.0, std: 5.0 },
            },
        )
    }

    #[test]
    fn sample_record_layout() {
        let v = encode(&sample_record(), &scheme()).unwrap();
        assert_eq!(v.dim(), 20);
        assert_eq!(v.schema_version, 1);
        assert!((v.values[0] - 1.7).abs() < 1e-12);
        assert!((v.values[1] - 2.5738).abs() < 1e-12);
        assert!((v.values[2] - 1.32).abs() < 1e-12);
        assert_eq!(&v.values[3..6], &[0.0, 1.0, 1.0]);
        // gender=male, work_type=private, residence=urban, smoking=formerly
        assert_eq!(&v.values[6..9], &[1.0, 0.0, 0.0]);
        assert_eq!(&v.values[9..14], &[1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&v.values[14..16], &[1.0, 0.0]);
        assert_eq!(&v.values[16..20], &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_bmi_matches_stored_mean() {
        let s = scheme();
        let missing = PatientRecord { bmi: None, ..sample_record() };
        let at_mean = PatientRecord { bmi: Some(s.bmi_fill), ..sample_record() };
        assert_eq!(encode(&missing, &s).unwrap(), encode(&at_mean, &s).unwrap());
    }

    #[test]
    fn category_absent_from_scheme_is_rejected() {
        let mut s = scheme();
        s.work_type.retain(|c| c != "never_worked");
        let r = PatientRecord { work_type: WorkType::NeverWorked, ..sample_record() };
        let err = encode(&r, &s).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn invalid_numeric_is_rejected() {
        let r = PatientRecord { avg_glucose_level: -3.0, ..sample_record() };
        assert!(encode(&r, &scheme()).is_err());
    }

    #[test]
    fn batch_preserves_order_and_names_bad_record() {
        let records = vec![
            sample_record(),
            PatientRecord { age: 30.0, ..sample_record() },
        ];
        let out = encode_batch(&records, &scheme()).unwrap();
        assert_eq!(out[1], encode(&records[1], &scheme()).unwrap());

        let bad = vec![sample_record(), PatientRecord { age: 200.0, ..sample_record() }];
        let err = encode_batch(&bad, &scheme()).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    fn any_record() -> impl Strategy<Value = PatientRecord> {
        (
            (0usize..3, 0.0..120.0f64, any::<bool>(), any::<bool>(), any::<bool>()),
            (0usize..5, 0usize..2, 1.0..400.0f64, proptest::option::of(10.0..80.0f64), 0usize..4),
        )
            .prop_map(|((g, age, ht, hd, em), (w, res, glucose, bmi, smoke))| PatientRecord {
                gender: Gender::ALL[g],
                age,
                hypertension: ht,
                heart_disease: hd,
                ever_married: em,
                work_type: WorkType::ALL[w],
                residence_type: ResidenceType::ALL[res],
                avg_glucose_level: glucose,
                bmi,
                smoking_status: SmokingStatus::ALL[smoke],
            })
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(record in any_record()) {
            let s = scheme();
            let a = encode(&record, &s).unwrap();
            let b = encode(&record, &s.clone()).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn each_one_hot_group_has_exactly_one_hot(record in any_record()) {
            let v = encode(&record, &scheme()).unwrap();
            for range in [6..9, 9..14, 14..16, 16..20] {
                let group = &v.values[range];
                let ones = group.iter().filter(|x| **x == 1.0).count();
                let zeros = group.iter().filter(|x| **x == 0.0).count();
                prop_assert_eq!(ones, 1);
                prop_assert_eq!(ones + zeros, group.len());
            }
        }
    }
}
