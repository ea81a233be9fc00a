//! Error taxonomy shared by the core and the pipelines.
//!
//! Pipelines propagate `anyhow::Error`; callers that need to tell the
//! kinds apart use `err.downcast_ref::<RepolensError>()`.
//!
//! Malformed LLM output is deliberately absent: the summary parser
//! recovers locally and never produces an error value.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepolensError {
    /// Bad input rejected before any collaborator call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A repository, file, or session does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Retrieval was asked to rank a repository with zero stored vectors.
    #[error("No index: repository {0} has no embeddings")]
    NoIndex(String),

    /// Network or auth failure talking to GitHub, the embedder, or the LLM.
    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(String),
}

impl RepolensError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn unavailable(collaborator: &'static str, reason: impl ToString) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            reason: reason.to_string(),
        }
    }

    /// True for the "absent" family (`NotFound` and `NoIndex`).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoIndex(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = RepolensError::not_found("Repository", "abc");
        assert_eq!(err.to_string(), "Repository not found: abc");

        let err = RepolensError::unavailable("GitHub", "403 rate limited");
        assert_eq!(err.to_string(), "GitHub unavailable: 403 rate limited");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = RepolensError::NoIndex("r1".into()).into();
        let err = err.context("chat failed");
        let inner = err.downcast_ref::<RepolensError>().unwrap();
        assert!(inner.is_not_found());
    }
}
