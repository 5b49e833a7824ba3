pub mod blocks;
pub mod classify;
pub mod ocr;
pub mod split;

use serde::Serialize;

use crate::lexicon::Lexicon;
use classify::Verdict;
use ocr::OcrResult;

/// Switches for the hardening steps layered on top of the basic pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Take the block after each anchor block as well.
    pub anchor_lookahead: bool,
    /// Drop everything from a translated "ingrédients :" / "contient :" label on.
    pub secondary_language_cut: bool,
    /// Remove "(…)" asides and "/Eau"-style suffixes before splitting.
    /// Parenthesized sub-ingredient lists go too, so "Chocolate chips
    /// (sugar, milk fat)" is judged on "Chocolate chips" alone; turn this
    /// off for labels that nest their components.
    pub strip_asides: bool,
    /// Drop leftover French function words.
    pub stopword_filter: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            anchor_lookahead: true,
            secondary_language_cut: true,
            strip_asides: true,
            stopword_filter: true,
        }
    }
}

/// `results[i]` is the verdict for `parsed_ingredients[i]`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub raw_text: String,
    pub parsed_ingredients: Vec<String>,
    pub results: Vec<Verdict>,
}

impl AnalysisResult {
    pub fn flagged(&self) -> Vec<&Verdict> {
        self.results.iter().filter(|v| v.is_flagged()).collect()
    }
}

/// Three-pass pipeline: OCR tree → ingredient text → candidates → verdicts.
pub fn analyze(ocr: &OcrResult, lexicon: &Lexicon, config: &PipelineConfig) -> AnalysisResult {
    let raw_text = blocks::extract_ingredient_text(ocr, config);
    analyze_text(&raw_text, lexicon, config)
}

/// Split and classify text that was already extracted.
pub fn analyze_text(text: &str, lexicon: &Lexicon, config: &PipelineConfig) -> AnalysisResult {
    let mut result = AnalysisResult {
        raw_text: text.to_string(),
        ..AnalysisResult::default()
    };

    for item in split::split_ingredients(text, config) {
        if let Some(verdict) = classify::classify(&item, lexicon) {
            result.parsed_ingredients.push(item);
            result.results.push(verdict);
        }
    }

    result
}

// ── Tests ──
