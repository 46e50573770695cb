use thiserror::Error;

use crate::llm_client::LlmError;
use crate::protocol::config::ProtocolConfig;
use crate::protocol::validator::ValidationStatus;

/// Crate-level error type.
///
/// Splitting and validation never produce these: they return statuses.
/// Only retry exhaustion, hard collaborator failures and the policy gate
/// are raised.
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation failed after {attempts} attempts: {last_status}")]
    GenerationFailure {
        attempts: u32,
        last_status: ValidationStatus,
    },

    #[error("Model produced an article for a request that did not ask for one")]
    PolicyViolation,

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl ComposerError {
    /// Logs the detail and returns the text shown to the end user.
    ///
    /// The user never sees validation detail or collaborator errors, only the
    /// locale's generic request to rephrase.
    pub fn user_message(&self, config: &ProtocolConfig) -> String {
        match self {
            ComposerError::Llm(e) => {
                tracing::error!("LLM error: {e}");
            }
            ComposerError::GenerationFailure {
                attempts,
                last_status,
            } => {
                tracing::error!(attempts, %last_status, "Generation failed");
            }
            ComposerError::PolicyViolation => {
                tracing::warn!("Article produced without an explicit request; asking to rephrase");
            }
            ComposerError::Config(e) => {
                tracing::error!("Configuration error: {e:?}");
            }
        }
        config.rephrase_message().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::section::SectionKind;
    use crate::protocol::validator::Constraint;

    #[test]
    fn test_generation_failure_hides_validation_detail() {
        let config = ProtocolConfig::default();
        let err = ComposerError::GenerationFailure {
            attempts: 3,
            last_status: ValidationStatus::ConstraintViolation {
                kind: SectionKind::Title,
                constraint: Constraint::MissingHeading,
                reason: "title must be '# ' followed by text".to_string(),
            },
        };
        assert!(err.to_string().contains("title must be"));

        let shown = err.user_message(&config);
        assert_eq!(shown, config.rephrase_message());
        assert!(!shown.contains("title"));
    }

    #[test]
    fn test_every_error_maps_to_rephrase_message() {
        let config = ProtocolConfig::default();
        for err in [
            ComposerError::PolicyViolation,
            ComposerError::Llm(LlmError::EmptyContent),
            ComposerError::Config(anyhow::anyhow!("missing key")),
        ] {
            assert_eq!(err.user_message(&config), config.rephrase_message());
        }
    }
}
