//! Intent Classifier: decides from the user's message alone whether an
//! existing article may be rewritten.
//!
//! Runs before the model is called, so the caller can pick a stricter
//! instruction for ambiguous input instead of trusting the model to police
//! itself. Never fails: anything indeterminate is `Ambiguous`.
//!
//! Decision table (article already in context):
//!
//! | edit trigger | new-topic opener | article reference | verdict |
//! |---|---|---|---|
//! | yes | yes | any | Ambiguous |
//! | yes | no | yes | ExplicitEdit |
//! | yes | no | no | ExplicitEdit after a clarification, else Ambiguous |
//! | no | yes | any | NewTopic |
//! | no | no | any | Ambiguous |
//!
//! Without an article in context there is nothing to edit: any substantive
//! message is a `NewTopic`, a bare acknowledgment is `Ambiguous`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::protocol::config::{LocaleLexicon, ProtocolConfig};

/// Classification of the incoming user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum UserIntent {
    NewTopic,
    /// `trigger` is the word as the user wrote it.
    ExplicitEdit {
        trigger: String,
    },
    Ambiguous,
}

impl UserIntent {
    pub fn label(&self) -> &'static str {
        match self {
            UserIntent::NewTopic => "new_topic",
            UserIntent::ExplicitEdit { .. } => "explicit_edit",
            UserIntent::Ambiguous => "ambiguous",
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, UserIntent::Ambiguous)
    }
}

/// What the classifier knows about the conversation so far: only the
/// immediately preceding turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorTurn {
    /// An article exists that an edit could apply to.
    pub article_in_context: bool,
    /// The preceding reply was a clarification question.
    pub was_clarification: bool,
}

/// Classifies `message` against the session lexicon.
pub fn classify(message: &str, prior: PriorTurn, config: &ProtocolConfig) -> UserIntent {
    let lexicons: Vec<&LocaleLexicon> = match config.lexicon() {
        Some(lexicon) => vec![lexicon],
        None => config.lexicons.iter().collect(),
    };

    let normalized = normalize(message);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        return UserIntent::Ambiguous;
    }

    let only_acknowledgment = tokens.iter().all(|t| {
        lexicons
            .iter()
            .any(|l| l.acknowledgments.iter().any(|a| a == t))
    });
    if only_acknowledgment {
        return UserIntent::Ambiguous;
    }

    if !prior.article_in_context {
        return UserIntent::NewTopic;
    }

    let trigger = find_trigger(message, &lexicons);
    let opener = lexicons
        .iter()
        .any(|l| l.topic_openers.iter().any(|o| contains_phrase(&normalized, o)));
    let references_article = has_clitic_reference(message)
        || tokens.iter().any(|t| {
            lexicons
                .iter()
                .any(|l| l.article_references.iter().any(|r| r == t))
        });

    match (trigger, opener) {
        // A trigger on a brand-new subject could rewrite an unrelated article.
        (Some(_), true) => UserIntent::Ambiguous,
        (Some(trigger), false) if references_article || prior.was_clarification => {
            UserIntent::ExplicitEdit { trigger }
        }
        (Some(_), false) => UserIntent::Ambiguous,
        (None, true) => UserIntent::NewTopic,
        (None, false) => UserIntent::Ambiguous,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matching helpers
// ────────────────────────────────────────────────────────────────────────────

/// Lowercase, strip diacritics, and turn every non-alphanumeric run into a
/// single space.
pub(crate) fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

/// Returns the first word of `message` that is an edit stem plus an
/// allowed inflection, in its original spelling.
fn find_trigger(message: &str, lexicons: &[&LocaleLexicon]) -> Option<String> {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .find(|word| {
            let token = normalize(word);
            lexicons.iter().any(|l| is_inflected_stem(&token, l))
        })
        .map(|word| word.to_string())
}

fn is_inflected_stem(token: &str, lexicon: &LocaleLexicon) -> bool {
    lexicon.edit_stems.iter().any(|stem| {
        token
            .strip_prefix(stem.as_str())
            .is_some_and(|suffix| lexicon.inflections.iter().any(|i| i == suffix))
    })
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return false;
    }
    format!(" {normalized} ").contains(&format!(" {phrase} "))
}

/// French imperative with an object pronoun: "ajoute-le", "développe-la".
fn has_clitic_reference(message: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\w+-(le|la|les|lui|leur|y|en)\b").expect("valid clitic regex")
    })
    .is_match(message)
}
