use tracing::debug;

use super::ocr::{OcrResult, TextBlock};
use super::PipelineConfig;

const ANCHOR_MARKERS: &[&str] = &["ingredients", "contains:", "ingrédients"];

/// Rebuild a block's text: symbols form words, words form paragraph lines.
pub fn block_text(block: &TextBlock) -> String {
    block
        .paragraphs
        .iter()
        .map(|p| {
            p.words
                .iter()
                .map(|w| w.symbols.iter().map(|s| s.text.as_str()).collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_anchor(text: &str) -> bool {
    let lower = text.to_lowercase();
    ANCHOR_MARKERS.iter().any(|m| lower.contains(m))
}

/// Locate the ingredient list inside an OCR document.
///
/// Each anchor block is taken together with the block right after it.
/// Without any anchor the whole recognized text is returned; without an
/// annotation or pages the result is empty.
pub fn extract_ingredient_text(result: &OcrResult, config: &PipelineConfig) -> String {
    let Some(annotation) = &result.full_text_annotation else {
        return String::new();
    };
    if annotation.pages.is_empty() {
        return String::new();
    }

    let texts: Vec<String> = annotation
        .pages
        .iter()
        .flat_map(|p| &p.blocks)
        .map(block_text)
        .collect();

    let mut chunks: Vec<&str> = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        if !is_anchor(text) {
            continue;
        }
        chunks.push(text);
        if config.anchor_lookahead {
            if let Some(next) = texts.get(i + 1) {
                chunks.push(next);
            }
        }
    }

    if chunks.is_empty() {
        debug!("No ingredient anchor in {} blocks, using full text", texts.len());
        return annotation.text.clone();
    }

    chunks.join("\n")
}

// ── Tests ──
