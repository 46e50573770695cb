//! Section types shared by the splitter, validator and assembler.

use serde::{Deserialize, Serialize};

/// The four semantic slots of an article reply, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hook,
    Title,
    Body,
    Question,
}

impl SectionKind {
    /// Wire order. Kinds are assigned positionally.
    pub const ORDER: [SectionKind; 4] = [
        SectionKind::Hook,
        SectionKind::Title,
        SectionKind::Body,
        SectionKind::Question,
    ];

    pub fn at(position: usize) -> Option<SectionKind> {
        Self::ORDER.get(position).copied()
    }

    pub fn position(self) -> usize {
        match self {
            SectionKind::Hook => 0,
            SectionKind::Title => 1,
            SectionKind::Body => 2,
            SectionKind::Question => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Hook => "hook",
            SectionKind::Title => "title",
            SectionKind::Body => "body",
            SectionKind::Question => "question",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One validated slot. `text` is delimiter-stripped and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub position: usize,
    pub text: String,
}

impl Section {
    pub fn new(kind: SectionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            position: kind.position(),
            text: text.into(),
        }
    }
}

/// Unparsed text returned by the model for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion(String);

impl RawCompletion {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for RawCompletion {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
