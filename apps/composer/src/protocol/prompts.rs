// Prompt rendering for the article protocol.
// The system prompt is rendered from ProtocolConfig so the model is told the
// same rules the validator enforces.

use crate::llm_client::prompts::{
    EDIT_PERMISSION_INSTRUCTION, FORMAT_INSTRUCTION, PRESERVATION_INSTRUCTION, ROLE_INSTRUCTION,
};
use crate::protocol::config::ProtocolConfig;
use crate::protocol::intent::UserIntent;
use crate::protocol::section::SectionKind;
use crate::protocol::validator::{Constraint, ValidationStatus};

/// System prompt template. Placeholders are replaced by `build_system_prompt`.
pub const SYSTEM_PROMPT_TEMPLATE: &str = r#"{role_instruction}

LANGUAGE: Write everything in {language}.
PROTOCOL VERSION: {version}

{format_instruction}

HOOK: at most {max_hook_chars} characters.
VOCABULARY: never use these words: {banned_terms}.

{edit_permission_instruction}
Explicit edit verbs look like: {edit_verbs}.

CURRENT TASK:
{mode_instruction}"#;

const NEW_TOPIC_MODE: &str = "The user is asking for a new article. \
    Write a complete article in the four-part format.";

const CLARIFY_MODE: &str = "The user's request is unclear. Do NOT write or \
    rewrite any article. Reply with exactly ONE clarification question \
    ending with {delimiter}, and nothing else.";

/// Renders the system prompt for one turn.
pub fn build_system_prompt(config: &ProtocolConfig, intent: &UserIntent) -> String {
    let delimiter = config.delimiter.to_string();
    let edit_verbs = config
        .lexicon()
        .map(|l| l.example_verbs.join(", "))
        .unwrap_or_default();

    SYSTEM_PROMPT_TEMPLATE
        .replace("{role_instruction}", ROLE_INSTRUCTION)
        .replace("{language}", &config.language)
        .replace("{version}", &config.version.to_string())
        .replace("{format_instruction}", FORMAT_INSTRUCTION)
        .replace("{max_hook_chars}", &config.max_hook_chars.to_string())
        .replace("{banned_terms}", &config.banned_terms.join(", "))
        .replace("{edit_permission_instruction}", EDIT_PERMISSION_INSTRUCTION)
        .replace("{edit_verbs}", &edit_verbs)
        .replace("{mode_instruction}", &mode_instruction(intent))
        .replace("{delimiter}", &delimiter)
}

fn mode_instruction(intent: &UserIntent) -> String {
    match intent {
        UserIntent::NewTopic => NEW_TOPIC_MODE.to_string(),
        UserIntent::ExplicitEdit { trigger } => format!(
            "The user explicitly asked to change the current article (\"{trigger}\"). \
             Return the full revised article in the four-part format. {PRESERVATION_INSTRUCTION}"
        ),
        UserIntent::Ambiguous => CLARIFY_MODE.to_string(),
    }
}

/// User message, with the current article attached when there is one.
pub fn build_user_message(message: &str, current_article: Option<&str>) -> String {
    match current_article {
        Some(article) if !article.trim().is_empty() => format!(
            "Current article:\n---\n{}\n---\n\nRequest: {}",
            article.trim(),
            message.trim()
        ),
        _ => message.trim().to_string(),
    }
}

/// Instruction appended after a rejected attempt, naming what was wrong.
pub fn corrective_instruction(
    status: &ValidationStatus,
    intent: &UserIntent,
    config: &ProtocolConfig,
) -> String {
    let d = config.delimiter;
    let expected_shape = if intent.is_ambiguous() {
        format!("exactly one clarification question ending with {d}")
    } else {
        format!("exactly four parts (hook, title, body, question), each ending with {d}")
    };

    let problem = match status {
        ValidationStatus::Valid => return String::new(),
        ValidationStatus::MalformedCount { found: 0, .. } => "Your previous reply was empty.".to_string(),
        ValidationStatus::MalformedCount { found, .. } => {
            format!("Your previous reply had {found} part(s) separated by {d}.")
        }
        ValidationStatus::ConstraintViolation {
            kind, constraint, ..
        } => describe_violation(*kind, constraint, config),
    };

    format!("{problem} Reply again with {expected_shape}.")
}

fn describe_violation(kind: SectionKind, constraint: &Constraint, config: &ProtocolConfig) -> String {
    let d = config.delimiter;
    match constraint {
        Constraint::Empty => format!("The {kind} part was empty."),
        Constraint::TooLong { max, .. } => format!("The {kind} was longer than {max} characters."),
        Constraint::MissingHeading | Constraint::MultipleHeadingLevels => {
            "The title must be a single '# ' heading followed by the title text.".to_string()
        }
        Constraint::ForbiddenMarkup { .. } => {
            format!("The {kind} contained HTML or a code block, which is not allowed.")
        }
        Constraint::EmbeddedDelimiter => {
            format!("The {d} character appeared inside the article body.")
        }
        Constraint::IncompleteContent => format!(
            "The article body looked cut off; do not use {d} inside tables or quotes."
        ),
        Constraint::NotAQuestion => "The closing part must be a question.".to_string(),
        Constraint::MissingTerminator => format!("The question did not end with {d}."),
        Constraint::BannedVocabulary { term } => {
            format!("The {kind} used the technical word '{term}', which readers must never see.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_has_no_unfilled_placeholders() {
        let config = ProtocolConfig::default();
        for intent in [
            UserIntent::NewTopic,
            UserIntent::Ambiguous,
            UserIntent::ExplicitEdit {
                trigger: "ajoute".to_string(),
            },
        ] {
            let prompt = build_system_prompt(&config, &intent);
            assert!(!prompt.contains('{'), "unfilled placeholder in {prompt}");
            assert!(prompt.contains("Write everything in fr"));
            assert!(prompt.contains("at most 1000 characters"));
            assert!(prompt.contains('§'));
        }
    }

    #[test]
    fn test_mode_follows_intent() {
        let config = ProtocolConfig::default();
        let clarify = build_system_prompt(&config, &UserIntent::Ambiguous);
        assert!(clarify.contains("Do NOT write or rewrite"));

        let edit = build_system_prompt(
            &config,
            &UserIntent::ExplicitEdit {
                trigger: "ajoute".to_string(),
            },
        );
        assert!(edit.contains("\"ajoute\""));
        assert!(edit.contains("manually added detail"));
    }

    #[test]
    fn test_edit_verbs_are_full_words() {
        let config = ProtocolConfig::default();
        let prompt = build_system_prompt(&config, &UserIntent::NewTopic);
        assert!(prompt.contains("Explicit edit verbs look like: ajoute, modifie, supprime"));
        assert!(!prompt.contains("modifi,"));
    }

    #[test]
    fn test_custom_delimiter_is_rendered() {
        let config = ProtocolConfig {
            delimiter: '¤',
            ..ProtocolConfig::default()
        };
        let prompt = build_system_prompt(&config, &UserIntent::NewTopic);
        assert!(prompt.contains('¤'));
        assert!(!prompt.contains('§'));
    }

    #[test]
    fn test_user_message_attaches_current_article() {
        let msg = build_user_message(" Ajoute un exemple ", Some("# Titre\n\nTexte"));
        assert!(msg.starts_with("Current article:"));
        assert!(msg.ends_with("Request: Ajoute un exemple"));

        assert_eq!(build_user_message("Bonjour", None), "Bonjour");
        assert_eq!(build_user_message("Bonjour", Some("  ")), "Bonjour");
    }

    #[test]
    fn test_corrective_instruction_names_the_problem() {
        let config = ProtocolConfig::default();

        let fix = corrective_instruction(
            &ValidationStatus::MalformedCount {
                expected: 4,
                found: 3,
            },
            &UserIntent::NewTopic,
            &config,
        );
        assert!(fix.contains("3 part(s)"));
        assert!(fix.contains("exactly four parts"));

        let fix = corrective_instruction(
            &ValidationStatus::ConstraintViolation {
                kind: SectionKind::Title,
                constraint: Constraint::MultipleHeadingLevels,
                reason: String::new(),
            },
            &UserIntent::NewTopic,
            &config,
        );
        assert!(fix.contains("single '# ' heading"));

        let fix = corrective_instruction(
            &ValidationStatus::empty_completion(),
            &UserIntent::Ambiguous,
            &config,
        );
        assert!(fix.contains("empty"));
        assert!(fix.contains("one clarification question"));

        assert!(corrective_instruction(&ValidationStatus::Valid, &UserIntent::NewTopic, &config)
            .is_empty());
    }
}
