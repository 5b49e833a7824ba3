use serde::Serialize;

use crate::lexicon::{Lexicon, Status};

const SAFE_CATEGORY: &str = "Safe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    Block,
    Exception,
}

/// Classification outcome for one ingredient candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub original_text: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_word: Option<String>,
    pub category: String,
    #[serde(rename = "desc")]
    pub description: String,
}

impl Verdict {
    pub fn is_flagged(&self) -> bool {
        self.status != Status::Green
    }
}

/// Classify one candidate against the lexicon.
///
/// Exceptions are erased from the text first, longest first, so a cleared
/// phrase like "coconut milk" cannot also hit the "milk" keyword. The
/// first remaining token found in the blocklist decides the verdict.
pub fn classify(candidate: &str, lexicon: &Lexicon) -> Option<Verdict> {
    if candidate.trim().is_empty() {
        return None;
    }

    let mut working = candidate.to_lowercase();
    let mut found_exception: Option<&str> = None;

    for exception in lexicon.exceptions() {
        if working.contains(exception.as_str()) {
            found_exception = Some(exception.as_str());
            working = working.replacen(exception.as_str(), " ", 1);
        }
    }

    let hit = working
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | '.'))
        .filter(|t| !t.is_empty())
        .find_map(|token| lexicon.lookup(token).map(|entry| (token, entry)));

    if let Some((token, entry)) = hit {
        return Some(Verdict {
            original_text: candidate.to_string(),
            status: entry.status,
            match_type: Some(MatchType::Block),
            matched_word: Some(token.to_string()),
            category: entry.category.clone(),
            description: entry.description.clone(),
        });
    }

    let verdict = match found_exception {
        Some(exception) => Verdict {
            original_text: candidate.to_string(),
            status: Status::Green,
            match_type: Some(MatchType::Exception),
            matched_word: None,
            category: SAFE_CATEGORY.to_string(),
            description: format!("Cleared as {}", exception),
        },
        None => Verdict {
            original_text: candidate.to_string(),
            status: Status::Green,
            match_type: None,
            matched_word: None,
            category: SAFE_CATEGORY.to_string(),
            description: "No flagged ingredient detected.".to_string(),
        },
    };
    Some(verdict)
}

// ── Tests ──
