//! Errors raised from inside hook chains
//!
//! A hook or observer returns `HookError` to stop its chain. The collection
//! wraps it with the phase it came from, see `ModelError::HookAborted` and
//! `ModelError::AfterHookFailed`.

/// Why a model hook or an observer refused to continue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    /// The model is not acceptable in its current state
    #[error("{message}{}", hint_suffix(.hint))]
    Validation {
        message: String,
        hint: Option<String>,
    },

    /// An observer could not do its own work
    #[error("observer failed: {message}")]
    Observer { message: String },
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref()
        .map(|hint| format!(" (hint: {})", hint))
        .unwrap_or_default()
}

impl HookError {
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: None,
        }
    }

    /// Validation failure carrying advice for the caller
    pub fn validation_with_hint(message: &str, hint: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn observer(message: &str) -> Self {
        Self::Observer {
            message: message.to_string(),
        }
    }
}

// Lets observers that encode audit records use `?`
impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        Self::observer(&err.to_string())
    }
}
