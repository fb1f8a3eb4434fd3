//! Error taxonomy for the merge gate
//!
//! Errors here are converted into decision reasons, check-run failure
//! output, or explanatory comments before they reach a user; only
//! genuinely unexpected errors escape to the outer handler.

use thiserror::Error;

/// Errors raised by the merge-gate core
#[derive(Error, Debug)]
pub enum GateError {
    /// Repository or ownership configuration is missing or malformed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A code-hosting API call failed
    #[error("transient remote error: {0}")]
    TransientRemote(#[from] anyhow::Error),

    /// The command issuer lacks the required role
    #[error("user '{user}' is not authorized to run '/{command}'")]
    Authorization { user: String, command: String },

    /// Unparsable ownership file, oversized label, or similar bad input
    #[error("validation error: {0}")]
    Validation(String),
}

pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_display() {
        let err = GateError::Authorization {
            user: "mallory".to_string(),
            command: "hold".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "user 'mallory' is not authorized to run '/hold'"
        );
    }

    #[test]
    fn test_transient_remote_from_anyhow() {
        let err: GateError = anyhow::anyhow!("api down").into();
        assert!(matches!(err, GateError::TransientRemote(_)));
    }
}
