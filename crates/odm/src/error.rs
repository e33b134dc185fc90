//! Error types for the ODM
//!
//! Every public collection and transaction operation returns `ModelError`.
//! Errors carry the phase that produced them so callers can tell "nothing
//! happened" apart from "the mutation happened but post-processing failed".

use std::fmt;

use crate::backends::{StoreError, StoreOperation};
use crate::event_error::HookError;
use crate::events::HookPhase;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Where in an operation an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Hook(HookPhase),
    Store(StoreOperation),
    UnitOfWork,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Hook(phase) => write!(f, "{} hook", phase),
            Phase::Store(operation) => write!(f, "store {}", operation),
            Phase::UnitOfWork => write!(f, "unit of work"),
        }
    }
}

/// Error types for ODM operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid identity format '{input}': {reason}")]
    InvalidIdentityFormat { input: String, reason: String },

    #[error("Identity is missing on model for collection '{collection}'")]
    MissingIdentity { collection: String },

    #[error("Record {id} not found in collection '{collection}'")]
    NotFound { collection: String, id: String },

    #[error("Record {id} in collection '{collection}' is stale or missing")]
    StaleOrMissingRecord { collection: String, id: String },

    #[error("Persistence error during {operation} on '{collection}': {source}")]
    Persistence {
        operation: StoreOperation,
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Operation aborted by {phase} hook: {source}")]
    HookAborted {
        phase: HookPhase,
        #[source]
        source: HookError,
    },

    #[error("Mutation committed but {phase} hook failed: {source}")]
    AfterHookFailed {
        phase: HookPhase,
        #[source]
        source: HookError,
    },

    #[error("Deadline exceeded during {phase}")]
    DeadlineExceeded { phase: Phase },

    #[error("Operation canceled during {phase}")]
    Canceled { phase: Phase },

    #[error("No connection configured; configure the connection manager first")]
    NotConfigured,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    pub(crate) fn hook(phase: HookPhase, source: HookError) -> Self {
        if phase.is_before() {
            ModelError::HookAborted { phase, source }
        } else {
            ModelError::AfterHookFailed { phase, source }
        }
    }

    pub(crate) fn persistence(
        operation: StoreOperation,
        collection: &str,
        source: StoreError,
    ) -> Self {
        ModelError::Persistence {
            operation,
            collection: collection.to_string(),
            source,
        }
    }

    /// The phase that produced this error, when it is tied to one
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ModelError::Persistence { operation, .. } => Some(Phase::Store(*operation)),
            ModelError::StaleOrMissingRecord { .. } => Some(Phase::Store(StoreOperation::ReplaceById)),
            ModelError::NotFound { .. } => Some(Phase::Store(StoreOperation::FindById)),
            ModelError::HookAborted { phase, .. } | ModelError::AfterHookFailed { phase, .. } => {
                Some(Phase::Hook(*phase))
            }
            ModelError::DeadlineExceeded { phase } | ModelError::Canceled { phase } => Some(*phase),
            _ => None,
        }
    }

    /// True when the store mutation went through before the error was raised
    pub fn is_mutation_committed(&self) -> bool {
        matches!(self, ModelError::AfterHookFailed { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ModelError::DeadlineExceeded { .. })
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
