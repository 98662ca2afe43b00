//! Errors surfaced by the lifecycle coordinator.

use thiserror::Error;

use crate::engine::ExecutionError;
use crate::models::FeatureId;
use crate::store::StoreError;
use crate::transport::TransportError;

/// Input rejected before any work is done.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please describe what you want to create.")]
    EmptyPrompt,

    #[error("Feature not found: {0}")]
    UnknownFeature(FeatureId),
}

#[derive(Debug, Error)]
pub enum GenuxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Generation cancelled")]
    Cancelled,
}

impl GenuxError {
    /// Short message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Execution(e) => e.to_string(),
            Self::Cancelled => "Generation cancelled.".to_string(),
            other => format!("Failed: {}. Try rephrasing your prompt.", other),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
