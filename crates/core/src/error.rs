use thiserror::Error;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Segment evaluation failed: {0}")]
    Evaluation(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CrmError {
    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CrmError::Config(_) => "config_error",
            CrmError::Store(_) | CrmError::Evaluation(_) => "evaluation_failed",
            CrmError::NotFound { .. } => "not_found",
            CrmError::Validation(_) => "invalid_request",
            CrmError::Serialization(_) => "serialization_error",
            CrmError::Io(_) | CrmError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_resource() {
        let err = CrmError::NotFound {
            resource: "Segment",
            id: 42,
        };
        assert_eq!(err.to_string(), "Segment not found: 42");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_store_and_evaluation_share_code() {
        assert_eq!(CrmError::Store("down".into()).code(), "evaluation_failed");
        assert_eq!(
            CrmError::Evaluation("down".into()).code(),
            "evaluation_failed"
        );
    }
}
