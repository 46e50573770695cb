//! Protocol configuration: the versioned rule set the validator and the
//! intent classifier enforce in code.
//!
//! The same object renders the system prompt, so the model is told the rules
//! the core actually checks. Nothing here is hard-coded inside the components;
//! every component takes a `&ProtocolConfig`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::validator::compile_banned_terms;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_DELIMITER: char = '§';
pub const DEFAULT_MAX_HOOK_CHARS: usize = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Word lists for one supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleLexicon {
    /// Language tag, e.g. `fr`.
    pub locale: String,
    /// Stems of explicit edit verbs (add / modify / remove), accent-free, lowercase.
    pub edit_stems: Vec<String>,
    /// Full verbs shown to the model as examples of explicit edit requests.
    #[serde(default)]
    pub example_verbs: Vec<String>,
    /// Suffixes a stem may carry and still count as the same verb.
    pub inflections: Vec<String>,
    /// Words that point back at the article already produced.
    pub article_references: Vec<String>,
    /// Phrases that open a brand-new subject.
    pub topic_openers: Vec<String>,
    /// Words that, on their own, only acknowledge the previous reply.
    #[serde(default)]
    pub acknowledgments: Vec<String>,
    /// Generic message shown when a turn cannot be completed.
    pub rephrase_message: String,
}

impl LocaleLexicon {
    pub fn french() -> Self {
        Self {
            locale: "fr".to_string(),
            edit_stems: strings(&[
                "ajout", "modifi", "supprim", "retir", "enlev", "chang", "remplac", "corrig",
                "etend", "developp", "allong", "rallong", "raccourc", "reformul", "inser",
                "reecri",
            ]),
            example_verbs: strings(&[
                "ajoute", "modifie", "supprime", "retire", "remplace", "corrige", "développe",
                "allonge",
            ]),
            inflections: strings(&[
                "", "e", "es", "er", "ez", "ons", "ent", "s", "is", "it", "ir", "ant", "erai",
                "eras", "ais", "ait", "ee", "ees",
            ]),
            article_references: strings(&[
                "article", "texte", "titre", "intro", "introduction", "section", "sections",
                "paragraphe", "paragraphes", "partie", "parties", "conclusion", "contenu",
                "exemple", "exemples", "passage", "phrase", "phrases", "liste", "point",
                "points", "accroche", "question", "ca", "cela", "ceci",
            ]),
            topic_openers: strings(&[
                "parle-moi",
                "parlez-moi",
                "un article sur",
                "un nouvel article",
                "nouvel article",
                "nouveau sujet",
                "autre sujet",
                "ecris un article",
                "ecris-moi",
                "redige",
                "cree un article",
                "genere un article",
            ]),
            acknowledgments: strings(&[
                "merci", "beaucoup", "ok", "okay", "parfait", "super", "bien", "d", "accord",
                "compris", "entendu", "oui", "non", "top", "genial", "excellent", "c", "est",
                "ca", "marche", "va", "me", "tres", "mieux", "bon",
            ]),
            rephrase_message: "Je n'ai pas pu finaliser votre demande. Pourriez-vous la reformuler ?"
                .to_string(),
        }
    }

    pub fn english() -> Self {
        Self {
            locale: "en".to_string(),
            edit_stems: strings(&[
                "add", "modif", "remov", "delet", "chang", "edit", "replac", "rewrit", "extend",
                "expand", "shorten", "insert", "updat", "lengthen", "trim",
            ]),
            example_verbs: strings(&[
                "add", "modify", "remove", "delete", "change", "replace", "expand", "shorten",
            ]),
            inflections: strings(&[
                "", "s", "e", "es", "ed", "d", "ing", "y", "ies", "ied", "ying", "ten",
            ]),
            article_references: strings(&[
                "article", "text", "title", "intro", "introduction", "section", "sections",
                "paragraph", "paragraphs", "part", "conclusion", "content", "example",
                "examples", "passage", "sentence", "list", "point", "points", "hook", "it",
                "this", "that",
            ]),
            topic_openers: strings(&[
                "tell me about",
                "write about",
                "write an article",
                "an article about",
                "an article on",
                "new article",
                "new topic",
                "another topic",
                "create an article",
                "generate an article",
            ]),
            acknowledgments: strings(&[
                "thanks", "thank", "you", "ok", "okay", "great", "perfect", "yes", "no", "sure",
                "fine", "good", "cool", "got", "it", "nice", "that", "s", "works", "much",
            ]),
            rephrase_message: "I couldn't complete that request. Could you rephrase it?"
                .to_string(),
        }
    }
}

/// Versioned protocol rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub version: u32,
    pub delimiter: char,
    pub max_hook_chars: usize,
    pub max_retries: u32,
    /// Session language; picks the lexicon the classifier uses.
    pub language: String,
    /// Characters that terminate a question, across supported scripts.
    pub question_marks: Vec<char>,
    /// Technical vocabulary that must never reach the reader.
    pub banned_terms: Vec<String>,
    pub lexicons: Vec<LocaleLexicon>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            delimiter: DEFAULT_DELIMITER,
            max_hook_chars: DEFAULT_MAX_HOOK_CHARS,
            max_retries: DEFAULT_MAX_RETRIES,
            language: "fr".to_string(),
            // Latin, fullwidth, Arabic, Greek (U+037E), Armenian
            question_marks: vec!['?', '？', '؟', '\u{037E}', '՞'],
            banned_terms: strings(&["API", "markdown", "JSON", "HTML", "LLM"]),
            lexicons: vec![LocaleLexicon::french(), LocaleLexicon::english()],
        }
    }
}

impl ProtocolConfig {
    /// Loads a config from a JSON file. Missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read protocol config '{}'", path.display()))?;
        let config: ProtocolConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid protocol config '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise defaults, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides scalar settings from `lookup` (the process environment in
    /// production, a map in tests).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ARTICLE_DELIMITER") {
            let mut chars = value.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => self.delimiter = c,
                _ => bail!("ARTICLE_DELIMITER must be exactly one character, got '{value}'"),
            }
        }
        if let Some(value) = lookup("MAX_HOOK_CHARS") {
            self.max_hook_chars = value
                .trim()
                .parse()
                .context("MAX_HOOK_CHARS must be a positive integer")?;
        }
        if let Some(value) = lookup("MAX_GENERATION_RETRIES") {
            self.max_retries = value
                .trim()
                .parse()
                .context("MAX_GENERATION_RETRIES must be a non-negative integer")?;
        }
        if let Some(value) = lookup("ARTICLE_LANGUAGE") {
            self.language = value.trim().to_lowercase();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_whitespace() || self.delimiter == '#' {
            bail!(
                "Delimiter {:?} would collide with section content",
                self.delimiter
            );
        }
        if self.max_hook_chars == 0 {
            bail!("max_hook_chars must be greater than zero");
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            bail!(
                "max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            );
        }
        if self.question_marks.is_empty() {
            bail!("At least one question mark character is required");
        }
        if self.lexicon().is_none() {
            bail!("No lexicon configured for language '{}'", self.language);
        }
        compile_banned_terms(&self.banned_terms).context("Invalid banned_terms")?;
        Ok(())
    }

    /// Model calls allowed per turn: the first attempt plus every retry.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Lexicon for the session language.
    pub fn lexicon(&self) -> Option<&LocaleLexicon> {
        self.lexicons
            .iter()
            .find(|l| l.locale.eq_ignore_ascii_case(&self.language))
    }

    pub fn rephrase_message(&self) -> &str {
        self.lexicon()
            .map(|l| l.rephrase_message.as_str())
            .unwrap_or("Could you rephrase your request?")
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
