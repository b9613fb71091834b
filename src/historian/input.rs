//! Input classification
//!
//! Decides how raw query text is executed before any parsing happens.

use crate::historian::error::{HistorianError, HistorianResult};

/// Symbolic preset keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// `latest`, `current`, `realtime`: one instant read
    Latest,
    /// `history`, `historical`, `trend`: one historical read
    History,
}

impl Preset {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_lowercase().as_str() {
            "latest" | "current" | "realtime" => Some(Self::Latest),
            "history" | "historical" | "trend" => Some(Self::History),
            _ => None,
        }
    }
}

/// Classified query input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryInput<'a> {
    /// A literal historian URL fetched verbatim
    DirectUrl(&'a str),
    Preset(Preset),
    /// SQL-like text routed through the parser
    Declarative(&'a str),
}

/// Classify raw query text
pub fn classify(text: &str) -> HistorianResult<QueryInput<'_>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(HistorianError::Parse("query text is empty".to_string()));
    }

    let lower = text.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(QueryInput::DirectUrl(text));
    }

    if let Some(preset) = Preset::from_keyword(text) {
        return Ok(QueryInput::Preset(preset));
    }

    // Anything else must pass the declarative shape check in the parser
    Ok(QueryInput::Declarative(text))
}
