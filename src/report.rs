use std::fmt::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

use crate::lexicon::Status;
use crate::parser::classify::MatchType;
use crate::parser::AnalysisResult;

const PREVIEW_CHARS: usize = 150;
const NO_TEXT_WARNING: &str = "No text detected. Image might be too blurry.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// One analyzed input, as printed by the CLI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub source: String,
    pub analyzed_at: DateTime<Utc>,
    pub text_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

impl ScanReport {
    pub fn new(source: impl Into<String>, analysis: AnalysisResult) -> Self {
        Self {
            source: source.into(),
            analyzed_at: Utc::now(),
            text_detected: true,
            warning: None,
            analysis,
        }
    }

    /// The OCR provider found no text at all.
    pub fn no_text(source: impl Into<String>) -> Self {
        Self {
            text_detected: false,
            warning: Some(NO_TEXT_WARNING.to_string()),
            ..Self::new(source, AnalysisResult::default())
        }
    }
}

pub fn render(reports: &[ScanReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(reports),
        OutputFormat::Text => {
            let mut out = reports
                .iter()
                .map(render_text)
                .collect::<Vec<_>>()
                .join("\n");
            if reports.len() > 1 {
                out.push('\n');
                out.push_str(&render_summary(reports));
            }
            Ok(out)
        }
    }
}

/// A single report renders as an object, several as an array.
pub fn render_json(reports: &[ScanReport]) -> Result<String> {
    let json = match reports {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    Ok(json)
}

pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let a = &report.analysis;
    let _ = writeln!(out, "== {}", report.source);

    if let Some(warning) = &report.warning {
        let _ = writeln!(out, "{}", warning);
        return out;
    }

    let _ = writeln!(out, "--- OCR TEXT ---");
    if a.raw_text.is_empty() {
        let _ = writeln!(out, "Nothing detected");
    } else {
        let _ = writeln!(out, "{}", truncate(&a.raw_text.replace('\n', " "), PREVIEW_CHARS));
    }

    let _ = writeln!(out, "--- VERDICTS ---");
    if a.results.is_empty() {
        let _ = writeln!(out, "No ingredients parsed.");
        return out;
    }

    for v in &a.results {
        match (v.status, v.match_type) {
            (Status::Green, Some(MatchType::Exception)) => {
                let _ = writeln!(out, "[SAFE]   {} --> (Exception: {})", v.original_text, v.description);
            }
            (Status::Green, Some(MatchType::Block)) => {
                let _ = writeln!(out, "[SAFE]   {} --> ({})", v.original_text, v.category);
            }
            (Status::Green, None) => {
                let _ = writeln!(out, "[OK]     {}", v.original_text);
            }
            (status, _) => {
                let tag = format!("[{}]", status.label());
                let _ = writeln!(
                    out,
                    "{:<8} {} --> ({}: {})",
                    tag, v.original_text, v.category, v.description
                );
            }
        }
    }

    let _ = writeln!(
        out,
        "{} ingredients, {} flagged",
        a.results.len(),
        a.flagged().len()
    );
    out
}

/// Compact one-row-per-input table.
pub fn render_summary(reports: &[ScanReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3} | {:<32} | {:>5} | {:>7} | {:<24}",
        "#", "Source", "Items", "Flagged", "First flag"
    );
    let _ = writeln!(out, "{}", "-".repeat(82));

    for (i, r) in reports.iter().enumerate() {
        let flagged = r.analysis.flagged();
        let first = flagged
            .first()
            .map(|v| format!("{} ({})", v.category, v.matched_word.as_deref().unwrap_or("")))
            .unwrap_or_else(|| if r.text_detected { "-".into() } else { "no text".into() });
        let _ = writeln!(
            out,
            "{:>3} | {:<32} | {:>5} | {:>7} | {:<24}",
            i + 1,
            truncate(&r.source, 32),
            r.analysis.results.len(),
            flagged.len(),
            truncate(&first, 24)
        );
    }

    let total_flagged: usize = reports.iter().map(|r| r.analysis.flagged().len()).sum();
    let _ = writeln!(out, "\n{} inputs | {} flagged ingredients", reports.len(), total_flagged);
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

// ── Tests ──
