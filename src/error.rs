//! Error taxonomy shared by every stage of the classifier.

use serde::Serialize;

pub type Result<T> = std::result::Result<T, StrokeError>;

#[derive(Debug, thiserror::Error)]
pub enum StrokeError {
    /// Bad, missing or unrecognized input field(s). One entry per problem.
    #[error("invalid patient record: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("feature vector does not match model: {0}")]
    SchemaMismatch(String),

    #[error("training did not converge: {0}")]
    Convergence(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("training cancelled: {0}")]
    Cancelled(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StrokeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(vec![msg.into()])
    }

    /// Machine-readable kind carried in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::SchemaMismatch(_) => "SchemaMismatchError",
            Self::Convergence(_) => "ConvergenceError",
            Self::ModelUnavailable(_) => "ModelUnavailableError",
            Self::Cancelled(_) => "CancelledError",
            Self::Dataset(_) => "DatasetError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Field names a validation error refers to, without the offending values.
    /// Empty for every other kind.
    pub fn fields(&self) -> Vec<&str> {
        let Self::Validation(messages) = self else {
            return Vec::new();
        };
        let mut out: Vec<&str> = Vec::new();
        for msg in messages {
            let Some((field, _)) = msg.split_once(':') else {
                continue;
            };
            let field = field.trim();
            let is_name = !field.is_empty()
                && field.chars().all(|c| c.is_ascii_lowercase() || c == '_');
            if is_name && !out.contains(&field) {
                out.push(field);
            }
        }
        out
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                kind: self.kind(),
                message: self.to_string(),
            },
        }
    }
}

/// Wire shape of a failed request: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_joins_all_problems() {
        let e = StrokeError::Validation(vec!["age missing".into(), "bmi not a number".into()]);
        assert_eq!(e.kind(), "ValidationError");
        assert_eq!(
            e.to_string(),
            "invalid patient record: age missing; bmi not a number"
        );
    }

    #[test]
    fn fields_name_the_problem_without_its_value() {
        let e = StrokeError::Validation(vec![
            "age: 180 out of range [0, 120]".into(),
            "work_type: unrecognized value 'Astronaut'".into(),
            "age: duplicate".into(),
            "malformed request: trailing comma".into(),
        ]);
        assert_eq!(e.fields(), vec!["age", "work_type"]);
        assert!(StrokeError::Convergence("x: y".into()).fields().is_empty());
    }

    #[test]
    fn response_carries_kind_and_message() {
        let e = StrokeError::SchemaMismatch("expected 20 features, got 3".into());
        let json = serde_json::to_value(e.to_response()).unwrap();
        assert_eq!(json["error"]["kind"], "SchemaMismatchError");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("expected 20 features"));
    }
}
