use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::parser::ocr::OcrResult;

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
const API_KEY_VAR: &str = "GOOGLE_VISION_API_KEY";
const CONCURRENCY: usize = 10;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
/// Limit on the base64 payload sent per image.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

static DATA_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/\w+;base64,").unwrap());

#[derive(Deserialize)]
struct AnnotateBatch {
    #[serde(default)]
    responses: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct VisionClient {
    http: reqwest::Client,
    api_key: String,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| anyhow!("{} environment variable must be set", API_KEY_VAR))?;
        Ok(Self::new(api_key))
    }

    /// Run document text detection on a base64 image, retrying on rate
    /// limits and transient server errors.
    pub async fn annotate(&self, content: &str, label: &str) -> Result<OcrResult> {
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": content },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        });

        let url = format!("{}?key={}", ANNOTATE_URL, self.api_key);
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let resp = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Vision request failed for {}", label))?;
            let status = resp.status();
            let text = resp.text().await?;

            if status.is_success() {
                info!(
                    "Vision responded for {} in {}ms",
                    label,
                    start.elapsed().as_millis()
                );
                return parse_annotate_response(&text);
            }

            if !is_retryable(status) || attempt == MAX_RETRIES {
                bail!("Vision API error {} for {}: {}", status, label, text);
            }

            let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
            warn!(
                "Vision returned {} for {} (attempt {}/{}), backing off {:.1}s",
                status,
                label,
                attempt + 1,
                MAX_RETRIES,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Pull the first image result out of an `images:annotate` response body.
pub fn parse_annotate_response(body: &str) -> Result<OcrResult> {
    let batch: AnnotateBatch =
        serde_json::from_str(body).context("Malformed Vision response")?;
    let Some(first) = batch.responses.into_iter().next() else {
        return Ok(OcrResult::default());
    };
    if let Some(err) = first.get("error") {
        let err: ApiStatus = serde_json::from_value(err.clone()).unwrap_or(ApiStatus {
            code: 0,
            message: err.to_string(),
        });
        bail!("Vision rejected image ({}): {}", err.code, err.message);
    }
    serde_json::from_value(first).context("Malformed Vision annotation")
}

/// Base64 payload for an image file's contents. Files holding a
/// `data:image/...;base64,` URL are passed through without the prefix.
pub fn encode_image(bytes: &[u8]) -> Result<String> {
    let payload = if bytes.starts_with(b"data:image/") {
        let text = std::str::from_utf8(bytes).context("Data URL is not valid UTF-8")?;
        let stripped = DATA_URL_RE.replace(text.trim(), "");
        STANDARD
            .decode(stripped.as_bytes())
            .context("Invalid base64 in data URL")?;
        stripped.into_owned()
    } else {
        STANDARD.encode(bytes)
    };

    if payload.len() > MAX_PAYLOAD_BYTES {
        bail!(
            "Image payload is {} bytes, limit is {}",
            payload.len(),
            MAX_PAYLOAD_BYTES
        );
    }
    Ok(payload)
}

pub fn load_image(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    encode_image(&bytes).with_context(|| format!("Unusable image {}", path.display()))
}

/// Scan images concurrently. Results come back in input order.
pub async fn scan_images(
    client: Arc<VisionClient>,
    paths: Vec<PathBuf>,
) -> Result<Vec<(PathBuf, Result<OcrResult>)>> {
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = paths.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(usize, PathBuf, Result<OcrResult>)>(CONCURRENCY * 2);

    for (idx, path) in paths.into_iter().enumerate() {
        let client = Arc::clone(&client);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let label = path.display().to_string();
            let result = match load_image(&path) {
                Ok(content) => client.annotate(&content, &label).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!("Scan failed for {}: {:#}", label, e);
            }
            let _ = tx.send((idx, path, result)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    outcomes.sort_by_key(|(idx, _, _)| *idx);
    let failed = outcomes.iter().filter(|(_, _, r)| r.is_err()).count();
    info!("Scanned {} images ({} failed)", total, failed);

    Ok(outcomes
        .into_iter()
        .map(|(_, path, result)| (path, result))
        .collect())
}

// ── Tests ──
