//! Section Validator: decides whether split pieces form a usable reply.
//!
//! # Article replies
//! Exactly four pieces, kinds assigned by position (hook, title, body,
//! question). Any other count is `MalformedCount` and no partial structure is
//! produced. Each section is then checked in order; the first failing rule is
//! reported as `ConstraintViolation` and the other sections are discarded.
//!
//! # Clarification replies
//! Exactly one delimiter-terminated question.
//!
//! Both checks are pure functions of their input.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::protocol::config::ProtocolConfig;
use crate::protocol::section::{Section, SectionKind};
use crate::protocol::splitter::is_delimiter_terminated;

pub const ARTICLE_SECTION_COUNT: usize = 4;

// ────────────────────────────────────────────────────────────────────────────
// Result types
// ────────────────────────────────────────────────────────────────────────────

/// Markup the wire format forbids inside sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Markup {
    HtmlTag,
    FencedCode,
}

/// The rule a section broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Constraint {
    Empty,
    TooLong { max: usize, actual: usize },
    MissingHeading,
    MultipleHeadingLevels,
    ForbiddenMarkup { markup: Markup },
    EmbeddedDelimiter,
    /// Content that looks cut in half, usually by a delimiter inside a table or quote.
    IncompleteContent,
    NotAQuestion,
    MissingTerminator,
    BannedVocabulary { term: String },
}

/// Outcome of validating one completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    MalformedCount {
        expected: usize,
        found: usize,
    },
    ConstraintViolation {
        kind: SectionKind,
        constraint: Constraint,
        reason: String,
    },
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }

    /// Status for an empty or missing completion (timeouts included).
    pub fn empty_completion() -> Self {
        ValidationStatus::MalformedCount {
            expected: ARTICLE_SECTION_COUNT,
            found: 0,
        }
    }

    pub fn of<T>(result: &Result<T, ValidationStatus>) -> ValidationStatus {
        match result {
            Ok(_) => ValidationStatus::Valid,
            Err(status) => status.clone(),
        }
    }

    fn violation(kind: SectionKind, constraint: Constraint, reason: impl Into<String>) -> Self {
        ValidationStatus::ConstraintViolation {
            kind,
            constraint,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStatus::Valid => write!(f, "valid"),
            ValidationStatus::MalformedCount { expected, found } => {
                write!(f, "expected {expected} sections, found {found}")
            }
            ValidationStatus::ConstraintViolation { kind, reason, .. } => {
                write!(f, "{kind}: {reason}")
            }
        }
    }
}

/// Four validated sections: a fresh or revised article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTurn {
    sections: [Section; ARTICLE_SECTION_COUNT],
}

impl ParsedTurn {
    pub fn sections(&self) -> &[Section; ARTICLE_SECTION_COUNT] {
        &self.sections
    }

    pub fn section(&self, kind: SectionKind) -> &Section {
        &self.sections[kind.position()]
    }

    pub fn hook(&self) -> &str {
        &self.section(SectionKind::Hook).text
    }

    pub fn title(&self) -> &str {
        &self.section(SectionKind::Title).text
    }

    pub fn body(&self) -> &str {
        &self.section(SectionKind::Body).text
    }

    pub fn question(&self) -> &str {
        &self.section(SectionKind::Question).text
    }

    pub fn status(&self) -> ValidationStatus {
        ValidationStatus::Valid
    }
}

/// A question-only reply asking the user what they meant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationTurn {
    pub question: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Validates split pieces as a four-section article reply.
pub fn validate_article(
    pieces: &[String],
    config: &ProtocolConfig,
) -> Result<ParsedTurn, ValidationStatus> {
    if pieces.len() != ARTICLE_SECTION_COUNT {
        return Err(ValidationStatus::MalformedCount {
            expected: ARTICLE_SECTION_COUNT,
            found: pieces.len(),
        });
    }

    for (kind, text) in SectionKind::ORDER.iter().zip(pieces) {
        check_section(*kind, text, config)?;
    }

    Ok(ParsedTurn {
        sections: [
            Section::new(SectionKind::Hook, pieces[0].as_str()),
            Section::new(SectionKind::Title, pieces[1].as_str()),
            Section::new(SectionKind::Body, pieces[2].as_str()),
            Section::new(SectionKind::Question, pieces[3].as_str()),
        ],
    })
}

/// Validates a reply as a single clarification question.
///
/// `raw` is needed on top of the pieces because the terminating delimiter is
/// dropped by the splitter.
pub fn validate_clarification(
    raw: &str,
    pieces: &[String],
    config: &ProtocolConfig,
) -> Result<ClarificationTurn, ValidationStatus> {
    if pieces.len() != 1 {
        return Err(ValidationStatus::MalformedCount {
            expected: 1,
            found: pieces.len(),
        });
    }

    if !is_delimiter_terminated(raw, config.delimiter) {
        return Err(ValidationStatus::violation(
            SectionKind::Question,
            Constraint::MissingTerminator,
            format!(
                "clarification must end with the delimiter '{}'",
                config.delimiter
            ),
        ));
    }

    let question = &pieces[0];
    check_section(SectionKind::Question, question, config)?;
    if let Some(markup) = forbidden_markup(question) {
        return Err(markup_violation(SectionKind::Question, markup));
    }

    Ok(ClarificationTurn {
        question: question.clone(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Per-kind rules
// ────────────────────────────────────────────────────────────────────────────

fn check_section(
    kind: SectionKind,
    text: &str,
    config: &ProtocolConfig,
) -> Result<(), ValidationStatus> {
    if text.trim().is_empty() {
        return Err(ValidationStatus::violation(
            kind,
            Constraint::Empty,
            format!("{kind} is empty"),
        ));
    }

    match kind {
        SectionKind::Hook => check_hook(text, config)?,
        SectionKind::Title => check_title(text)?,
        SectionKind::Body => check_body(text, config)?,
        SectionKind::Question => check_question(text, config)?,
    }

    if let Some(term) = banned_term(text, &config.banned_terms) {
        return Err(ValidationStatus::violation(
            kind,
            Constraint::BannedVocabulary { term: term.clone() },
            format!("{kind} uses the technical term '{term}'"),
        ));
    }

    Ok(())
}

fn check_hook(text: &str, config: &ProtocolConfig) -> Result<(), ValidationStatus> {
    // Code points, not bytes: content is mostly non-English.
    let actual = text.chars().count();
    if actual > config.max_hook_chars {
        return Err(ValidationStatus::violation(
            SectionKind::Hook,
            Constraint::TooLong {
                max: config.max_hook_chars,
                actual,
            },
            format!(
                "hook is {actual} characters long, limit is {}",
                config.max_hook_chars
            ),
        ));
    }
    if let Some(markup) = forbidden_markup(text) {
        return Err(markup_violation(SectionKind::Hook, markup));
    }
    Ok(())
}

fn check_title(text: &str) -> Result<(), ValidationStatus> {
    let level = text.chars().take_while(|c| *c == '#').count();
    let rest = &text[level..];

    if level > 1 {
        return Err(ValidationStatus::violation(
            SectionKind::Title,
            Constraint::MultipleHeadingLevels,
            format!("title uses a level-{level} heading, expected a single '#'"),
        ));
    }
    if level == 0 || !rest.starts_with(char::is_whitespace) || rest.trim().is_empty() {
        return Err(ValidationStatus::violation(
            SectionKind::Title,
            Constraint::MissingHeading,
            "title must be '# ' followed by text",
        ));
    }
    Ok(())
}

fn check_body(text: &str, config: &ProtocolConfig) -> Result<(), ValidationStatus> {
    if text.contains(config.delimiter) {
        return Err(ValidationStatus::violation(
            SectionKind::Body,
            Constraint::EmbeddedDelimiter,
            format!("body contains the delimiter '{}'", config.delimiter),
        ));
    }
    if let Some(markup) = forbidden_markup(text) {
        return Err(markup_violation(SectionKind::Body, markup));
    }
    if looks_incomplete(text) {
        return Err(ValidationStatus::violation(
            SectionKind::Body,
            Constraint::IncompleteContent,
            "body looks truncated (unbalanced emphasis, quotes or table row)",
        ));
    }
    Ok(())
}

fn check_question(text: &str, config: &ProtocolConfig) -> Result<(), ValidationStatus> {
    let tail = text
        .trim_end()
        .trim_end_matches(['"', '\'', '»', '”', '’', ')', ' ', '\u{00A0}', '\u{202F}']);
    let ends_with_mark = tail
        .chars()
        .last()
        .is_some_and(|c| config.question_marks.contains(&c));

    if !ends_with_mark {
        return Err(ValidationStatus::violation(
            SectionKind::Question,
            Constraint::NotAQuestion,
            "closing section must be a question",
        ));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn re_html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<!--|</?[a-z][a-z0-9-]*(\s[^<>]*)?/?>").expect("valid html tag regex")
    })
}

fn re_fenced_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(```|~~~)").expect("valid code fence regex"))
}

fn forbidden_markup(text: &str) -> Option<Markup> {
    if re_fenced_code().is_match(text) {
        Some(Markup::FencedCode)
    } else if re_html_tag().is_match(text) {
        Some(Markup::HtmlTag)
    } else {
        None
    }
}

fn markup_violation(kind: SectionKind, markup: Markup) -> ValidationStatus {
    let what = match markup {
        Markup::HtmlTag => "an HTML tag",
        Markup::FencedCode => "a fenced code block",
    };
    ValidationStatus::violation(
        kind,
        Constraint::ForbiddenMarkup { markup },
        format!("{kind} contains {what}"),
    )
}

/// Heuristic for a section that was cut by a stray delimiter.
fn looks_incomplete(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let emphasis: usize = lines
        .iter()
        .filter(|l| !is_thematic_break(l))
        .map(|l| l.matches("**").count())
        .sum();
    if emphasis % 2 != 0 {
        return true;
    }
    if text.matches('«').count() != text.matches('»').count() {
        return true;
    }

    // Only the edges can be split mid-row.
    let cut_row = |line: &&str| line.starts_with('|') != line.ends_with('|');
    let cut = lines.first().is_some_and(cut_row) || lines.last().is_some_and(cut_row);
    cut
}

/// `***`, `- - -`, `___`: a horizontal rule, not emphasis.
fn is_thematic_break(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && ['*', '-', '_']
            .iter()
            .any(|m| marks.iter().all(|c| c == m))
}

/// One case-insensitive, whole-word alternation over all banned terms.
/// `None` when there is nothing to ban.
pub(crate) fn compile_banned_terms(terms: &[String]) -> Result<Option<Regex>, regex::Error> {
    let alternation = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    if alternation.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).map(Some)
}

/// Compiled pattern per distinct term list, built on first use.
fn banned_pattern(terms: &[String]) -> Option<Arc<Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<Vec<String>, Option<Arc<Regex>>>>> = OnceLock::new();
    let mut cache = CACHE
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let pattern = cache
        .entry(terms.to_vec())
        .or_insert_with(|| match compile_banned_terms(terms) {
            Ok(re) => re.map(Arc::new),
            // Unreachable for a config that passed validate()
            Err(e) => {
                tracing::warn!("Banned term pattern rejected, vocabulary check disabled: {e}");
                None
            }
        })
        .clone();
    pattern
}

/// The configured spelling of the first banned term found in `text`.
fn banned_term(text: &str, terms: &[String]) -> Option<String> {
    let found = banned_pattern(terms)?.find(text)?.as_str().to_lowercase();
    let term = terms
        .iter()
        .find(|t| t.trim().to_lowercase() == found)
        .map(|t| t.trim().to_string())
        .unwrap_or(found);
    Some(term)
}
