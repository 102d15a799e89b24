//! Tesseract CLI Engine
//!
//! Drives the external `tesseract` binary in TSV mode. Each request
//! stages the RGBA buffer as a PNG in a temporary file, runs the binary
//! against it, and parses word rows out of the TSV written to stdout.
//! The binary is probed once at startup; until the probe succeeds the
//! engine reports not-ready and rejects requests.

use image::RgbaImage;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::engine::{EngineError, Recognition, RecognitionEngine, WordBox};

/// TSV rows at this level describe individual words; lower levels are
/// page/block/paragraph/line structure.
const WORD_LEVEL: u32 = 5;

/// Recognition engine backed by the external `tesseract` binary
pub struct TesseractCli {
    binary: String,
    language: String,
    min_confidence: f32,
    timeout: Duration,
    ready: AtomicBool,
}

impl TesseractCli {
    /// Create an engine from settings. The engine is not ready until
    /// [`TesseractCli::init`] has probed the binary.
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            language: settings.language.clone(),
            min_confidence: settings.min_confidence,
            timeout: Duration::from_secs(settings.timeout_secs),
            ready: AtomicBool::new(false),
        }
    }

    /// Probe the binary with `--version` and mark the engine ready.
    ///
    /// Returns the version banner's first line on success.
    pub async fn init(&self) -> Result<String, EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--version");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| EngineError::TimedOut(self.timeout))??;

        if !output.status.success() {
            return Err(EngineError::Failed(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }

        // Older Tesseract releases print the version banner on stderr.
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let banner = if stdout.trim().is_empty() { stderr } else { stdout };
        let version = banner.lines().next().unwrap_or("tesseract").trim().to_string();

        self.ready.store(true, Ordering::SeqCst);
        info!("Tesseract engine ready: {}", version);
        Ok(version)
    }
}

#[async_trait::async_trait]
impl RecognitionEngine for TesseractCli {
    async fn recognize(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Recognition, EngineError> {
        if pixels.is_empty() || width == 0 || height == 0 {
            return Err(EngineError::InvalidInput("empty frame".to_string()));
        }
        // The length product overflows u64 for dimensions near u32::MAX.
        let expected = (width as u64)
            .checked_mul(height as u64)
            .and_then(|count| count.checked_mul(4));
        if expected != Some(pixels.len() as u64) {
            return Err(EngineError::InvalidInput(format!(
                "buffer length {} does not match {}x{} RGBA",
                pixels.len(),
                width,
                height
            )));
        }
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }

        let staged = stage_png(pixels.to_vec(), width, height).await?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(staged.path());
        cmd.arg("stdout");
        cmd.args(["-l", &self.language, "tsv"]);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| EngineError::TimedOut(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let recognition = parse_tsv(&tsv, self.min_confidence);
        debug!(
            "Tesseract recognized {} words from {}x{} frame",
            recognition.word_boxes.len(),
            width,
            height
        );
        Ok(recognition)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// Encode the RGBA buffer as a PNG in a temporary file.
///
/// PNG encoding is CPU-bound, so it runs on the blocking pool. The
/// returned handle deletes the file when dropped.
async fn stage_png(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
) -> Result<NamedTempFile, EngineError> {
    tokio::task::spawn_blocking(move || -> Result<NamedTempFile, EngineError> {
        let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            EngineError::InvalidInput("buffer does not form an RGBA image".to_string())
        })?;

        let file = tempfile::Builder::new()
            .prefix("ocr-relay-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(file.path(), image::ImageFormat::Png)
            .map_err(|e| EngineError::Failed(format!("failed to encode PNG: {e}")))?;
        Ok(file)
    })
    .await
    .map_err(|e| EngineError::Failed(format!("PNG staging task failed: {e}")))?
}

/// Parse Tesseract TSV output into a [`Recognition`].
///
/// The header row and structural rows are rejected by the per-row
/// parser; surviving words keep their TSV order, which is Tesseract's
/// reading order.
fn parse_tsv(tsv: &str, min_confidence: f32) -> Recognition {
    let mut word_boxes = Vec::new();

    for row in tsv.lines() {
        if let Some(word_box) = parse_word_row(row, min_confidence) {
            word_boxes.push(word_box);
        }
    }

    let full_text = word_boxes
        .iter()
        .map(|word_box| word_box.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Recognition {
        full_text,
        word_boxes,
    }
}

/// Parse one TSV row, returning a box only for confident word rows.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text.
fn parse_word_row(row: &str, min_confidence: f32) -> Option<WordBox> {
    let fields: Vec<&str> = row.split('\t').collect();
    if fields.len() < 12 {
        return None;
    }

    let level: u32 = fields[0].trim().parse().ok()?;
    if level != WORD_LEVEL {
        return None;
    }

    let confidence: f32 = fields[10].trim().parse().ok()?;
    if confidence < min_confidence {
        return None;
    }

    let word = fields[11].trim();
    if word.is_empty() {
        return None;
    }

    Some(WordBox {
        word: word.to_string(),
        x: fields[6].trim().parse().ok()?,
        y: fields[7].trim().parse().ok()?,
        w: fields[8].trim().parse().ok()?,
        h: fields[9].trim().parse().ok()?,
    })
}
