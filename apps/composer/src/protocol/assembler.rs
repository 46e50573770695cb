//! Response Assembler: combines the classified intent with the validated
//! reply into the externally consumed `ConversationTurn`.
//!
//! | intent | reply shape | outcome |
//! |---|---|---|
//! | NewTopic | 4 valid sections | Generated |
//! | ExplicitEdit | 4 valid sections | Revised |
//! | Ambiguous | one terminated question | Clarify |
//! | Ambiguous | 4 valid sections | PolicyViolation |
//! | any | malformed / constraint violation | `Err`, handed to the retry controller |
//!
//! An ambiguous request never yields `Generated` or `Revised`.

use serde::{Deserialize, Serialize};

use crate::errors::ComposerError;
use crate::protocol::config::ProtocolConfig;
use crate::protocol::intent::{PriorTurn, UserIntent};
use crate::protocol::section::RawCompletion;
use crate::protocol::splitter::split_completion;
use crate::protocol::validator::{
    validate_article, validate_clarification, ClarificationTurn, ParsedTurn, ValidationStatus,
    ARTICLE_SECTION_COUNT,
};

/// Longest topic anchor kept, in characters.
const TOPIC_ANCHOR_MAX_CHARS: usize = 200;

/// What the turn produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reply", rename_all = "snake_case")]
pub enum TurnOutcome {
    Generated(ParsedTurn),
    Revised(ParsedTurn),
    Clarify(ClarificationTurn),
    /// Well-formed article delivered for an ambiguous request. Flagged, not accepted.
    PolicyViolation(ParsedTurn),
}

impl TurnOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Generated(_) => "generated",
            TurnOutcome::Revised(_) => "revised",
            TurnOutcome::Clarify(_) => "clarify",
            TurnOutcome::PolicyViolation(_) => "policy_violation",
        }
    }
}

/// State carried from one turn to the next by the caller. Nothing else
/// crosses turn boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContext {
    /// Subject of the conversation, fixed by the first new-topic message.
    pub topic_anchor: Option<String>,
    pub article_in_context: bool,
    pub last_was_clarification: bool,
}

impl TurnContext {
    pub fn prior(&self) -> PriorTurn {
        PriorTurn {
            article_in_context: self.article_in_context,
            was_clarification: self.last_was_clarification,
        }
    }

    /// Context after `outcome`, given the message that produced it.
    pub fn advance(&self, intent: &UserIntent, outcome: &TurnOutcome, message: &str) -> Self {
        let topic_anchor = self.topic_anchor.clone().or_else(|| {
            matches!(intent, UserIntent::NewTopic).then(|| anchor_from(message))
        });

        let article_in_context = self.article_in_context
            || matches!(outcome, TurnOutcome::Generated(_) | TurnOutcome::Revised(_));

        Self {
            topic_anchor,
            article_in_context,
            last_was_clarification: matches!(outcome, TurnOutcome::Clarify(_)),
        }
    }
}

fn anchor_from(message: &str) -> String {
    message
        .trim()
        .chars()
        .take(TOPIC_ANCHOR_MAX_CHARS)
        .collect()
}

/// One user interaction, as handed to persistence. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub intent: UserIntent,
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    /// Context to pass into the next turn.
    pub context: TurnContext,
    /// Model calls it took, retries included.
    pub attempts: u32,
}

impl ConversationTurn {
    pub fn new(
        intent: UserIntent,
        outcome: TurnOutcome,
        previous: &TurnContext,
        message: &str,
        attempts: u32,
    ) -> Self {
        let context = previous.advance(&intent, &outcome, message);
        Self {
            intent,
            outcome,
            context,
            attempts,
        }
    }

    /// The accepted article, if this turn produced one.
    pub fn article(&self) -> Option<&ParsedTurn> {
        match &self.outcome {
            TurnOutcome::Generated(turn) | TurnOutcome::Revised(turn) => Some(turn),
            TurnOutcome::Clarify(_) | TurnOutcome::PolicyViolation(_) => None,
        }
    }

    pub fn is_policy_violation(&self) -> bool {
        matches!(self.outcome, TurnOutcome::PolicyViolation(_))
    }

    /// Turns a policy violation into an error; passes every other turn through.
    pub fn require_compliant(self) -> Result<Self, ComposerError> {
        if self.is_policy_violation() {
            return Err(ComposerError::PolicyViolation);
        }
        Ok(self)
    }
}

/// Splits, validates and labels one completion for the given intent.
pub fn assemble(
    intent: &UserIntent,
    raw: &RawCompletion,
    config: &ProtocolConfig,
) -> Result<TurnOutcome, ValidationStatus> {
    let pieces = split_completion(raw, config.delimiter);

    match intent {
        UserIntent::NewTopic => validate_article(&pieces, config).map(TurnOutcome::Generated),
        UserIntent::ExplicitEdit { .. } => {
            validate_article(&pieces, config).map(TurnOutcome::Revised)
        }
        UserIntent::Ambiguous if pieces.len() == ARTICLE_SECTION_COUNT => {
            validate_article(&pieces, config).map(TurnOutcome::PolicyViolation)
        }
        UserIntent::Ambiguous => {
            validate_clarification(raw.as_str(), &pieces, config).map(TurnOutcome::Clarify)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "Bonjour! §\n# Titre §\nCorps de l'article. §\nUne question ? §";
    const CLARIFICATION: &str = "Souhaitez-vous une section sur les horaires ? §";

    fn edit() -> UserIntent {
        UserIntent::ExplicitEdit {
            trigger: "ajoute".to_string(),
        }
    }

    #[test]
    fn test_new_topic_with_article_is_generated() {
        let outcome =
            assemble(&UserIntent::NewTopic, &ARTICLE.into(), &ProtocolConfig::default()).unwrap();
        assert!(matches!(outcome, TurnOutcome::Generated(_)));
    }

    #[test]
    fn test_explicit_edit_with_article_is_revised() {
        let outcome = assemble(&edit(), &ARTICLE.into(), &ProtocolConfig::default()).unwrap();
        assert!(matches!(outcome, TurnOutcome::Revised(_)));
    }

    #[test]
    fn test_ambiguous_with_question_is_clarify() {
        let outcome = assemble(
            &UserIntent::Ambiguous,
            &CLARIFICATION.into(),
            &ProtocolConfig::default(),
        )
        .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Clarify(ClarificationTurn {
                question: "Souhaitez-vous une section sur les horaires ?".to_string()
            })
        );
    }

    #[test]
    fn test_scenario_ambiguous_with_full_article_is_policy_violation() {
        let outcome = assemble(
            &UserIntent::Ambiguous,
            &ARTICLE.into(),
            &ProtocolConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.label(), "policy_violation");

        let previous = TurnContext {
            topic_anchor: Some("Horaires".to_string()),
            article_in_context: true,
            last_was_clarification: false,
        };
        let turn = ConversationTurn::new(
            UserIntent::Ambiguous,
            outcome,
            &previous,
            "Et pour les horaires ?",
            1,
        );
        assert!(turn.article().is_none());
        assert!(matches!(
            turn.require_compliant(),
            Err(ComposerError::PolicyViolation)
        ));
    }

    #[test]
    fn test_question_only_reply_for_new_topic_is_malformed() {
        let result = assemble(
            &UserIntent::NewTopic,
            &CLARIFICATION.into(),
            &ProtocolConfig::default(),
        );
        assert_eq!(
            result,
            Err(ValidationStatus::MalformedCount {
                expected: 4,
                found: 1
            })
        );
    }

    #[test]
    fn test_ambiguous_with_partial_reply_expects_one_question() {
        let result = assemble(
            &UserIntent::Ambiguous,
            &"Bonjour § # Titre §".into(),
            &ProtocolConfig::default(),
        );
        assert_eq!(
            result,
            Err(ValidationStatus::MalformedCount {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_context_anchor_is_set_once() {
        let config = ProtocolConfig::default();
        let generated = assemble(&UserIntent::NewTopic, &ARTICLE.into(), &config).unwrap();

        let first = ConversationTurn::new(
            UserIntent::NewTopic,
            generated.clone(),
            &TurnContext::default(),
            "  Le stress au travail  ",
            1,
        );
        assert_eq!(
            first.context.topic_anchor.as_deref(),
            Some("Le stress au travail")
        );
        assert!(first.context.article_in_context);

        let second = ConversationTurn::new(
            UserIntent::NewTopic,
            generated,
            &first.context,
            "Écris un article sur l'onboarding",
            1,
        );
        assert_eq!(
            second.context.topic_anchor.as_deref(),
            Some("Le stress au travail")
        );
    }

    #[test]
    fn test_clarification_is_remembered_for_one_turn() {
        let config = ProtocolConfig::default();
        let previous = TurnContext {
            topic_anchor: None,
            article_in_context: true,
            last_was_clarification: false,
        };
        let clarify = assemble(&UserIntent::Ambiguous, &CLARIFICATION.into(), &config).unwrap();
        let turn = ConversationTurn::new(UserIntent::Ambiguous, clarify, &previous, "Et ?", 1);

        assert!(turn.context.last_was_clarification);
        assert!(turn.context.article_in_context);
        assert!(turn.context.prior().was_clarification);
        assert!(turn.context.topic_anchor.is_none());
    }

    #[test]
    fn test_turn_serializes_with_flattened_outcome() {
        let config = ProtocolConfig::default();
        let outcome = assemble(&edit(), &ARTICLE.into(), &config).unwrap();
        let turn = ConversationTurn::new(edit(), outcome, &TurnContext::default(), "x", 2);

        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["outcome"], "revised");
        assert_eq!(json["intent"]["intent"], "explicit_edit");
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["reply"]["sections"][1]["text"], "# Titre");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ambiguous_intent_never_generates_or_revises(raw in ".{0,200}", use_article in any::<bool>()) {
                let raw = if use_article { format!("{ARTICLE}{raw}") } else { raw };
                let result = assemble(&UserIntent::Ambiguous, &raw.as_str().into(), &ProtocolConfig::default());
                let accepted = matches!(
                    result,
                    Ok(TurnOutcome::Generated(_)) | Ok(TurnOutcome::Revised(_))
                );
                prop_assert!(!accepted);
            }
        }
    }
}
