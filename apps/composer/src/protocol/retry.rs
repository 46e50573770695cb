//! Retry Controller: bounded recovery from malformed completions.
//!
//! Flow: classify intent → render prompt → call model → assemble.
//! A rejected completion adds a corrective instruction to the conversation
//! and tries again, strictly one attempt after another. After
//! `max_retries` corrections the turn fails with the last status. Nothing
//! partial is ever returned.
//!
//! A policy violation is a well-formed reply and is returned as is: asking
//! the same ambiguous question again would likely repeat it.

use tracing::{debug, info, warn};

use crate::errors::ComposerError;
use crate::llm_client::{ChatMessage, CompletionRequest, CompletionSource, Usage};
use crate::protocol::assembler::{assemble, ConversationTurn, TurnContext};
use crate::protocol::config::ProtocolConfig;
use crate::protocol::intent::classify;
use crate::protocol::prompts::{build_system_prompt, build_user_message, corrective_instruction};
use crate::protocol::section::RawCompletion;
use crate::protocol::validator::ValidationStatus;

/// Everything the caller supplies for one turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub message: &'a str,
    /// Earlier messages of this conversation, oldest first.
    pub history: &'a [ChatMessage],
    /// Context returned with the previous turn; default for a new conversation.
    pub context: &'a TurnContext,
    /// Markdown of the article being discussed, if any.
    pub current_article: Option<&'a str>,
}

/// A successful turn plus what persistence needs to record it.
#[derive(Debug, Clone)]
pub struct ComposedTurn {
    pub turn: ConversationTurn,
    pub system_prompt: String,
    /// User message as sent on the first attempt.
    pub prompt: String,
    pub raw_completion: String,
    pub model: String,
    /// Summed over all attempts.
    pub usage: Usage,
}

pub struct RetryController<'a, S: ?Sized> {
    source: &'a S,
    config: &'a ProtocolConfig,
}

impl<'a, S> RetryController<'a, S>
where
    S: CompletionSource + ?Sized,
{
    pub fn new(source: &'a S, config: &'a ProtocolConfig) -> Self {
        Self { source, config }
    }

    pub async fn run(&self, request: TurnRequest<'_>) -> Result<ComposedTurn, ComposerError> {
        let config = self.config;
        let intent = classify(request.message, request.context.prior(), config);
        info!(intent = intent.label(), "Classified user message");

        let system_prompt = build_system_prompt(config, &intent);
        let prompt = build_user_message(request.message, request.current_article);

        let mut messages = request.history.to_vec();
        messages.push(ChatMessage::user(prompt.clone()));

        let max_attempts = config.max_attempts();
        let mut usage = Usage::default();
        let mut last_status = ValidationStatus::empty_completion();

        for attempt in 1..=max_attempts {
            let completion_request = CompletionRequest {
                system: system_prompt.clone(),
                messages: messages.clone(),
            };

            let (raw, model) = match self.source.complete(&completion_request).await {
                Ok(completion) => {
                    usage += completion.usage;
                    debug!(
                        attempt,
                        input_tokens = completion.usage.input_tokens,
                        output_tokens = completion.usage.output_tokens,
                        "Completion received"
                    );
                    (completion.text, Some(completion.model))
                }
                Err(e) if e.is_transient() => {
                    warn!(attempt, "Completion unavailable, treating as empty: {e}");
                    (String::new(), None)
                }
                Err(e) => return Err(ComposerError::Llm(e)),
            };

            match assemble(&intent, &RawCompletion::new(raw.as_str()), config) {
                Ok(outcome) => {
                    let turn = ConversationTurn::new(
                        intent,
                        outcome,
                        request.context,
                        request.message,
                        attempt,
                    );
                    if turn.is_policy_violation() {
                        warn!(attempt, "Model produced an article for an ambiguous request");
                    } else {
                        info!(
                            attempt,
                            outcome = turn.outcome.label(),
                            "Turn completed"
                        );
                    }
                    return Ok(ComposedTurn {
                        turn,
                        system_prompt,
                        prompt,
                        raw_completion: raw,
                        model: model.unwrap_or_default(),
                        usage,
                    });
                }
                Err(status) => {
                    warn!(
                        attempt,
                        max_attempts,
                        %status,
                        "Completion rejected"
                    );
                    if attempt < max_attempts {
                        let fix = corrective_instruction(&status, &intent, config);
                        append_correction(&mut messages, &raw, fix);
                    }
                    last_status = status;
                }
            }
        }

        Err(ComposerError::GenerationFailure {
            attempts: max_attempts,
            last_status,
        })
    }
}

/// Keeps roles alternating: a rejected reply is echoed as the assistant turn,
/// an empty one folds the correction into the last user message.
fn append_correction(messages: &mut Vec<ChatMessage>, rejected: &str, fix: String) {
    if rejected.trim().is_empty() {
        if let Some(last) = messages.last_mut() {
            last.content.push_str("\n\n");
            last.content.push_str(&fix);
            return;
        }
    } else {
        messages.push(ChatMessage::assistant(rejected));
    }
    messages.push(ChatMessage::user(fix));
}
