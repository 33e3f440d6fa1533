use serde::Serialize;
use thiserror::Error;

use crate::core::graph::GraphError;
use crate::report::ReportError;

/// Failures reported by the external collaborators (graph linking, results,
/// method catalog).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("could not link `{descriptor}`: {reason}")]
    Linking { descriptor: String, reason: String },
}

impl SourceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        SourceError::NotFound { what: what.into() }
    }

    pub fn linking(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Linking {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }
}

/// Coarse classification used for batch failure markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    Linking,
    InvalidResult,
    Write,
    Cancelled,
    Config,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("{0} not found")]
    NotFound(String),

    /// `descriptor` is `None` when the graph was built by the caller rather
    /// than linked from a descriptor.
    #[error("linking failed{}: {reason}", for_descriptor(.descriptor))]
    Linking {
        descriptor: Option<String>,
        reason: String,
    },

    #[error("direct result of `{provider}` in `{category}` is not a finite number: {value}")]
    InvalidResult {
        provider: String,
        category: String,
        value: f64,
    },

    #[error(transparent)]
    Write(#[from] ReportError),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::NotFound(_) => ErrorKind::NotFound,
            AnalysisError::Linking { .. } => ErrorKind::Linking,
            AnalysisError::InvalidResult { .. } => ErrorKind::InvalidResult,
            AnalysisError::Write(_) => ErrorKind::Write,
            AnalysisError::Cancelled => ErrorKind::Cancelled,
            AnalysisError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<SourceError> for AnalysisError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound { what } => AnalysisError::NotFound(what),
            SourceError::Linking { descriptor, reason } => AnalysisError::Linking {
                descriptor: Some(descriptor),
                reason,
            },
        }
    }
}

impl From<GraphError> for AnalysisError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::ProviderNotFound(id) => AnalysisError::NotFound(format!("provider `{id}`")),
            GraphError::ProviderIdxOutOfRange(idx) => {
                AnalysisError::NotFound(format!("provider #{idx}"))
            }
            GraphError::EdgeNotFound(idx) => AnalysisError::NotFound(format!("edge #{idx}")),
            other => AnalysisError::Linking {
                descriptor: None,
                reason: other.to_string(),
            },
        }
    }
}

fn for_descriptor(descriptor: &Option<String>) -> String {
    descriptor
        .as_deref()
        .map(|d| format!(" for `{d}`"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_keep_their_kind() {
        let e: AnalysisError = SourceError::not_found("process `p-1`").into();
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert_eq!(e.to_string(), "process `p-1` not found");

        let e: AnalysisError = SourceError::linking("p-2", "no default provider").into();
        assert_eq!(e.kind(), ErrorKind::Linking);
        assert_eq!(e.to_string(), "linking failed for `p-2`: no default provider");
    }

    #[test]
    fn graph_errors_map_to_not_found_or_linking() {
        let e: AnalysisError = GraphError::ProviderNotFound("grid".into()).into();
        assert_eq!(e, AnalysisError::NotFound("provider `grid`".into()));

        let e: AnalysisError = GraphError::DuplicateProvider("grid".into()).into();
        assert_eq!(e.kind(), ErrorKind::Linking);
        match &e {
            AnalysisError::Linking { descriptor, .. } => assert_eq!(*descriptor, None),
            other => panic!("expected Linking, got {other:?}"),
        }
        assert!(e.to_string().starts_with("linking failed: "));
    }
}
