use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::assembler::TurnOutcome;
use crate::protocol::intent::UserIntent;
use crate::protocol::retry::ComposedTurn;
use crate::protocol::section::Section;

/// The entity a generation was requested for (a page, a post, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub entity_type: String,
}

/// Everything persistence needs to store one completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub prompt: String,
    pub raw_completion: String,
    pub intent: UserIntent,
    pub outcome: String,
    /// Present for article outcomes, including policy violations.
    pub sections: Option<Vec<Section>>,
    pub clarification: Option<String>,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub attempts: u32,
    pub origin: Option<EntityRef>,
}

impl GenerationRecord {
    pub fn from_composed(composed: &ComposedTurn, origin: Option<EntityRef>) -> Self {
        let turn = &composed.turn;
        let (sections, clarification) = match &turn.outcome {
            TurnOutcome::Generated(parsed)
            | TurnOutcome::Revised(parsed)
            | TurnOutcome::PolicyViolation(parsed) => (Some(parsed.sections().to_vec()), None),
            TurnOutcome::Clarify(clarify) => (None, Some(clarify.question.clone())),
        };

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            prompt: composed.prompt.clone(),
            raw_completion: composed.raw_completion.clone(),
            intent: turn.intent.clone(),
            outcome: turn.outcome.label().to_string(),
            sections,
            clarification,
            model: composed.model.clone(),
            input_tokens: composed.usage.input_tokens,
            output_tokens: composed.usage.output_tokens,
            attempts: turn.attempts,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::Usage;
    use crate::protocol::assembler::{assemble, ConversationTurn, TurnContext};
    use crate::protocol::config::ProtocolConfig;
    use crate::protocol::section::SectionKind;

    fn composed(intent: UserIntent, raw: &str) -> ComposedTurn {
        let outcome = assemble(&intent, &raw.into(), &ProtocolConfig::default()).unwrap();
        ComposedTurn {
            turn: ConversationTurn::new(intent, outcome, &TurnContext::default(), "Sujet", 2),
            system_prompt: "system".to_string(),
            prompt: "Sujet".to_string(),
            raw_completion: raw.to_string(),
            model: "claude-sonnet-4-5".to_string(),
            usage: Usage {
                input_tokens: 120,
                output_tokens: 480,
            },
        }
    }

    #[test]
    fn test_article_record_carries_sections() {
        let raw = "Bonjour §\n# Titre §\nCorps. §\nQuestion ? §";
        let record = GenerationRecord::from_composed(
            &composed(UserIntent::NewTopic, raw),
            Some(EntityRef {
                id: "42".to_string(),
                entity_type: "page".to_string(),
            }),
        );

        assert_eq!(record.outcome, "generated");
        assert_eq!(record.attempts, 2);
        assert_eq!(record.input_tokens, 120);
        assert!(record.clarification.is_none());
        let sections = record.sections.as_ref().unwrap();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[1].kind, SectionKind::Title);
        assert_eq!(record.raw_completion, raw);
    }

    #[test]
    fn test_clarification_record_has_no_sections() {
        let record = GenerationRecord::from_composed(
            &composed(UserIntent::Ambiguous, "Quel aspect voulez-vous ? §"),
            None,
        );
        assert_eq!(record.outcome, "clarify");
        assert!(record.sections.is_none());
        assert_eq!(
            record.clarification.as_deref(),
            Some("Quel aspect voulez-vous ?")
        );
    }

    #[test]
    fn test_records_get_distinct_ids_and_serialize() {
        let turn = composed(UserIntent::Ambiguous, "Quel aspect voulez-vous ? §");
        let a = GenerationRecord::from_composed(&turn, None);
        let b = GenerationRecord::from_composed(&turn, None);
        assert_ne!(a.id, b.id);

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["intent"]["intent"], "ambiguous");
        assert_eq!(json["model"], "claude-sonnet-4-5");
        assert!(json["created_at"].is_string());
    }
}
