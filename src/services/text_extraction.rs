use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

use crate::core::config::OcrSettings;

static RECOGNIZABLE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("Invalid word regex"));

const PAGE_DELIMITER: &str = "--- Page";

#[derive(Debug, Error)]
pub(crate) enum OcrError {
    #[error("OCR engine is not available: {0}")]
    NotAvailable(String),
    #[error("OCR extraction failed: {0}")]
    Extraction(String),
    #[error("OCR io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct ExtractOptions {
    pub(crate) language: String,
    pub(crate) page_seg_mode: u8,
    pub(crate) engine_mode: u8,
    pub(crate) preprocess: bool,
}

impl ExtractOptions {
    pub(crate) fn from_settings(settings: &OcrSettings) -> Self {
        Self {
            language: settings.language.clone(),
            page_seg_mode: settings.page_seg_mode,
            engine_mode: settings.engine_mode,
            preprocess: settings.preprocess,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Extraction {
    pub(crate) text: String,
    pub(crate) confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PageExtraction {
    pub(crate) page: usize,
    pub(crate) success: bool,
    pub(crate) confidence: Option<f64>,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CombinedExtraction {
    pub(crate) success: bool,
    pub(crate) text: String,
    pub(crate) confidence: f64,
    pub(crate) pages: Vec<PageExtraction>,
}

#[async_trait]
pub(crate) trait TextExtractor: Send + Sync {
    /// Whether the engine can be invoked at all. Checked once per batch.
    async fn is_available(&self) -> bool;

    async fn extract(
        &self,
        image_path: &Path,
        options: &ExtractOptions,
    ) -> Result<Extraction, OcrError>;
}

/// Extracts every page and joins the texts with page markers. Confidence is
/// averaged over the pages that succeeded.
pub(crate) async fn extract_pages(
    extractor: &dyn TextExtractor,
    image_paths: &[PathBuf],
    options: &ExtractOptions,
) -> CombinedExtraction {
    let mut sections = Vec::new();
    let mut pages = Vec::with_capacity(image_paths.len());
    let mut confidence_sum = 0.0;

    for (index, path) in image_paths.iter().enumerate() {
        let page = index + 1;
        match extractor.extract(path, options).await {
            Ok(extraction) => {
                sections.push(format!("{PAGE_DELIMITER} {page} ---\n{}", extraction.text));
                confidence_sum += extraction.confidence;
                pages.push(PageExtraction {
                    page,
                    success: true,
                    confidence: Some(extraction.confidence),
                    error: None,
                });
            }
            Err(err) => {
                tracing::warn!(page, path = %path.display(), error = %err, "Page extraction failed");
                pages.push(PageExtraction {
                    page,
                    success: false,
                    confidence: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let succeeded = pages.iter().filter(|page| page.success).count();
    let confidence = if succeeded == 0 { 0.0 } else { confidence_sum / succeeded as f64 };

    CombinedExtraction { success: succeeded > 0, text: sections.join("\n\n"), confidence, pages }
}

/// Heuristic quality score in `[0, 100]` for recognised text.
pub(crate) fn confidence_score(text: &str) -> f64 {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    let mut score: f64 = 100.0;

    if length < 10 {
        score -= 30.0;
    } else if length < 50 {
        score -= 15.0;
    }

    if length > 0 {
        let special = trimmed.chars().filter(|c| is_symbol(*c)).count();
        let ratio = special as f64 / length as f64;
        if ratio > 0.2 {
            score -= 25.0;
        } else if ratio > 0.1 {
            score -= 10.0;
        }
    }

    if longest_symbol_run(trimmed) >= 5 {
        score -= 20.0;
    }

    if RECOGNIZABLE_WORD.find_iter(trimmed).count() < 3 {
        score -= 20.0;
    }

    score.clamp(0.0, 100.0)
}

fn is_symbol(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

fn longest_symbol_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if is_symbol(c) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Runs the `tesseract` binary as a child process.
#[derive(Debug, Clone)]
pub(crate) struct TesseractExtractor {
    binary: String,
    temp_dir: PathBuf,
}

impl TesseractExtractor {
    pub(crate) fn from_settings(settings: &OcrSettings) -> Self {
        Self { binary: settings.tesseract_path.clone(), temp_dir: PathBuf::from(&settings.temp_dir) }
    }

    async fn run(
        &self,
        input: &Path,
        output_base: &Path,
        options: &ExtractOptions,
    ) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg(input)
            .arg(output_base)
            .arg("-l")
            .arg(&options.language)
            .arg("--psm")
            .arg(options.page_seg_mode.to_string())
            .arg("--oem")
            .arg(options.engine_mode.to_string())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| OcrError::NotAvailable(format!("{}: {err}", self.binary)))?;

        if !output.status.success() {
            let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                if !message.is_empty() {
                    message.push('\n');
                }
                message.push_str(stdout.trim());
            }
            if message.is_empty() {
                message = format!("exit status {}", output.status);
            }
            return Err(OcrError::Extraction(message));
        }

        let text_path = output_base.with_extension("txt");
        let text = tokio::fs::read_to_string(&text_path).await?;
        remove_quietly(&text_path).await;
        Ok(text.trim().to_string())
    }

    /// Writes a grayscale, contrast-boosted, sharpened copy. `None` means the
    /// original should be used.
    async fn preprocess(&self, source: &Path) -> Option<PathBuf> {
        let target = self.temp_dir.join(format!("ocr_pre_{}.png", uuid::Uuid::new_v4()));
        let source_owned = source.to_path_buf();
        let target_owned = target.clone();

        let result = tokio::task::spawn_blocking(move || -> image::ImageResult<()> {
            let image = image::open(&source_owned)?;
            image.grayscale().adjust_contrast(30.0).unsharpen(1.0, 2).save(&target_owned)
        })
        .await;

        match result {
            Ok(Ok(())) => Some(target),
            Ok(Err(err)) => {
                tracing::warn!(path = %source.display(), error = %err, "Preprocessing failed, using original image");
                remove_quietly(&target).await;
                None
            }
            Err(err) => {
                tracing::warn!(path = %source.display(), error = %err, "Preprocessing task failed, using original image");
                remove_quietly(&target).await;
                None
            }
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn extract(
        &self,
        image_path: &Path,
        options: &ExtractOptions,
    ) -> Result<Extraction, OcrError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let preprocessed =
            if options.preprocess { self.preprocess(image_path).await } else { None };
        let input = preprocessed.as_deref().unwrap_or(image_path);
        let output_base = self.temp_dir.join(format!("ocr_out_{}", uuid::Uuid::new_v4()));

        let result = self.run(input, &output_base, options).await;

        if let Some(path) = &preprocessed {
            remove_quietly(path).await;
        }

        let text = result?;
        let confidence = confidence_score(&text);
        Ok(Extraction { text, confidence })
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove temporary OCR file");
        }
    }
}
