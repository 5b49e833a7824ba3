//! Subset of the Cloud Vision `AnnotateImageResponse` the pipeline reads.
//!
//! Every level defaults when absent, so a partial document deserializes
//! to an emptier tree instead of failing.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    #[serde(default)]
    pub full_text_annotation: Option<TextAnnotation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextAnnotation {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Word {
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Symbol {
    #[serde(default)]
    pub text: String,
}

impl OcrResult {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn has_text(&self) -> bool {
        self.full_text_annotation.is_some()
    }
}
