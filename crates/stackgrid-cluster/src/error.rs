//! Error types for cluster operations.

use thiserror::Error;

use crate::api::Verb;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster API error: {0}")]
    Api(#[from] kube::Error),

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} definition has no metadata.name")]
    MissingName { kind: String },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("injected failure on {verb} {kind}")]
    Injected { verb: Verb, kind: String },
}

impl ClusterError {
    /// A create lost a race against another writer for the same name.
    pub fn is_conflict(&self) -> bool {
        match self {
            ClusterError::AlreadyExists { .. } => true,
            ClusterError::Api(kube::Error::Api(resp)) => resp.code == 409,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterError::NotFound { .. } => true,
            ClusterError::Api(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Codec(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        let err = ClusterError::AlreadyExists {
            kind: "Deployment".into(),
            name: "deployment-acme-webhook-1".into(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Deployment deployment-acme-webhook-1 already exists");
    }

    #[test]
    fn api_status_codes_are_classified() {
        let resp = kube::core::ErrorResponse {
            status: "Failure".into(),
            message: "services \"x\" not found".into(),
            reason: "NotFound".into(),
            code: 404,
        };
        let err = ClusterError::Api(kube::Error::Api(resp));
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }
}
