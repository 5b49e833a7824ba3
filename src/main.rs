mod lexicon;
mod parser;
mod report;
mod vision;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use lexicon::Lexicon;
use parser::ocr::OcrResult;
use parser::PipelineConfig;
use report::{OutputFormat, ScanReport};

const LEXICON_VAR: &str = "POLARIS_LEXICON";

#[derive(Parser)]
#[command(name = "polaris_scan", about = "Food-label ingredient scanner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Keyword dataset (JSON). Falls back to $POLARIS_LEXICON, then the built-in list
    #[arg(long = "lexicon", global = true)]
    lexicon_path: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct PipelineArgs {
    /// Only take anchor blocks, not the block following each one
    #[arg(long, global = true)]
    no_lookahead: bool,
    /// Keep text after a French "Ingrédients :" / "Contient :" label
    #[arg(long, global = true)]
    no_language_cut: bool,
    /// Keep "(…)" asides and "/…" suffixes
    #[arg(long, global = true)]
    no_strip_asides: bool,
    /// Keep French stopword items
    #[arg(long, global = true)]
    no_stopwords: bool,
}

impl PipelineArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            anchor_lookahead: !self.no_lookahead,
            secondary_language_cut: !self.no_language_cut,
            strip_asides: !self.no_strip_asides,
            stopword_filter: !self.no_stopwords,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send label images to Cloud Vision and classify their ingredients
    Scan {
        /// Image files (or files holding a base64 data URL)
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Classify ingredients from saved Vision OCR JSON
    Analyze {
        /// OCR documents: a bare annotation or a full images:annotate response
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Classify an ingredient list given as text (reads stdin if omitted)
    Check { text: Option<String> },
    /// Validate the keyword dataset and show its statistics
    Lexicon,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = cli.pipeline.config();
    let lexicon = load_lexicon(cli.lexicon_path.as_deref())?;

    let result = match cli.command {
        Commands::Scan { images } => {
            let client = Arc::new(vision::VisionClient::from_env()?);
            info!("Scanning {} images", images.len());
            let outcomes = vision::scan_images(client, images).await?;
            let total = outcomes.len();
            let (reports, failed) = scan_reports(outcomes, &lexicon, &config);
            print_reports(&reports, cli.format)?;
            if failed > 0 {
                bail!("{} of {} images could not be scanned", failed, total);
            }
            Ok(())
        }
        Commands::Analyze { files } => {
            let reports = analyze_files(&files, &lexicon, &config)?;
            print_reports(&reports, cli.format)
        }
        Commands::Check { text } => {
            let text = match text {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read ingredient text from stdin")?;
                    buf
                }
            };
            let analysis = parser::analyze_text(&text, &lexicon, &config);
            print_reports(&[ScanReport::new("<text>", analysis)], cli.format)
        }
        Commands::Lexicon => {
            let s = lexicon.stats();
            println!("Groups:     {}", s.groups);
            println!("Keywords:   {}", s.keywords);
            println!("Exceptions: {}", s.exceptions);
            println!("\n{:<28} | {:>8}", "Category", "Keywords");
            println!("{}", "-".repeat(39));
            for (category, count) in &s.per_category {
                println!("{:<28} | {:>8}", category, count);
            }
            println!("\n{:<12} | {:<32} | {:<6}", "Group", "Name", "Status");
            println!("{}", "-".repeat(56));
            for entry in lexicon.entries() {
                println!("{:<12} | {:<32} | {:<6}", entry.id, entry.display_name, entry.status.label());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn load_lexicon(path: Option<&Path>) -> Result<Lexicon> {
    if let Some(path) = path {
        return Lexicon::load(path);
    }
    match std::env::var(LEXICON_VAR) {
        Ok(path) if !path.is_empty() => Lexicon::load(Path::new(&path)),
        _ => Lexicon::builtin(),
    }
}

fn print_reports(reports: &[ScanReport], format: OutputFormat) -> Result<()> {
    if reports.is_empty() {
        bail!("No input could be analyzed");
    }
    println!("{}", report::render(reports, format)?);
    Ok(())
}

/// Turn scan outcomes into reports. Failed images are counted, not reported.
fn scan_reports(
    outcomes: Vec<(PathBuf, Result<OcrResult>)>,
    lexicon: &Lexicon,
    config: &PipelineConfig,
) -> (Vec<ScanReport>, usize) {
    let mut reports = Vec::with_capacity(outcomes.len());
    let mut failed = 0usize;
    for (path, outcome) in outcomes {
        let source = path.display().to_string();
        match outcome {
            Ok(ocr) if !ocr.has_text() => reports.push(ScanReport::no_text(source)),
            Ok(ocr) => reports.push(ScanReport::new(source, parser::analyze(&ocr, lexicon, config))),
            Err(e) => {
                warn!("Skipping {}: {:#}", source, e);
                failed += 1;
            }
        }
    }
    (reports, failed)
}

/// Read an OCR document, accepting either the bare annotation object or
/// a raw `images:annotate` response.
fn load_ocr_document(path: &Path) -> Result<OcrResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&json)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    if value.get("responses").is_some() {
        return vision::parse_annotate_response(&json);
    }
    OcrResult::from_json(&json).with_context(|| format!("Not an OCR document: {}", path.display()))
}

fn analyze_files(
    files: &[PathBuf],
    lexicon: &Lexicon,
    config: &PipelineConfig,
) -> Result<Vec<ScanReport>> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let outcomes: Vec<_> = files
        .par_iter()
        .map(|path| {
            let outcome = load_ocr_document(path).map(|ocr| {
                let source = path.display().to_string();
                if ocr.has_text() {
                    ScanReport::new(source, parser::analyze(&ocr, lexicon, config))
                } else {
                    ScanReport::no_text(source)
                }
            });
            pb.inc(1);
            outcome
        })
        .collect();
    pb.finish_and_clear();

    let mut reports = Vec::with_capacity(outcomes.len());
    let mut errors = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(r) => reports.push(r),
            Err(e) => {
                warn!("{:#}", e);
                errors += 1;
            }
        }
    }
    info!("Analyzed {} documents ({} errors)", files.len(), errors);
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_flags_map_to_config() {
        let cli = Cli::parse_from(["polaris_scan", "check", "Sugar", "--no-lookahead", "--no-stopwords"]);
        let config = cli.pipeline.config();
        assert!(!config.anchor_lookahead);
        assert!(config.secondary_language_cut);
        assert!(config.strip_asides);
        assert!(!config.stopword_filter);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn format_flag() {
        let cli = Cli::parse_from(["polaris_scan", "--format", "json", "lexicon"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Lexicon));
    }

    #[test]
    fn analyze_accepts_bare_and_wrapped_documents() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("bare.json");
        let wrapped = dir.path().join("wrapped.json");
        let blank = dir.path().join("blank.json");
        let broken = dir.path().join("broken.json");
        std::fs::write(&bare, r#"{"fullTextAnnotation": {"text": "Whey, Salt", "pages": [{"blocks": []}]}}"#).unwrap();
        std::fs::write(
            &wrapped,
            r#"{"responses": [{"fullTextAnnotation": {"text": "Sugar", "pages": [{}]}}]}"#,
        )
        .unwrap();
        std::fs::write(&blank, r#"{"responses": [{}]}"#).unwrap();
        std::fs::write(&broken, "not json").unwrap();

        let lexicon = Lexicon::builtin().unwrap();
        let reports = analyze_files(
            &[bare, wrapped, blank, broken],
            &lexicon,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].analysis.parsed_ingredients, vec!["Whey", "Salt"]);
        assert_eq!(reports[0].analysis.flagged().len(), 1);
        assert_eq!(reports[1].analysis.parsed_ingredients, vec!["Sugar"]);
        assert!(!reports[2].text_detected);
    }

    #[test]
    fn scan_failures_are_counted() {
        let ocr = OcrResult::from_json(
            r#"{"fullTextAnnotation": {"text": "Ingredients: Whey", "pages": [{"blocks": []}]}}"#,
        )
        .unwrap();
        let outcomes = vec![
            (PathBuf::from("a.jpg"), Ok(ocr)),
            (PathBuf::from("b.jpg"), Err(anyhow::anyhow!("Vision rejected image (3): Bad image data."))),
            (PathBuf::from("c.jpg"), Ok(OcrResult::default())),
        ];
        let lexicon = Lexicon::builtin().unwrap();
        let (reports, failed) = scan_reports(outcomes, &lexicon, &PipelineConfig::default());

        assert_eq!(failed, 1);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].source, "a.jpg");
        assert_eq!(reports[0].analysis.flagged().len(), 1);
        assert!(!reports[1].text_detected);
    }

    #[test]
    fn lexicon_flag_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(
            &path,
            r#"[{"id": "x", "category": "Custom", "display_name": "Custom",
                "status": "BLOCK", "description": "x", "keywords": ["salt"]}]"#,
        )
        .unwrap();
        let lexicon = load_lexicon(Some(&path)).unwrap();
        assert_eq!(lexicon.stats().groups, 1);
        assert!(lexicon.lookup("salt").is_some());
    }
}
