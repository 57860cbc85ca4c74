use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{OcrEngine, OcrResult, TextRegion};
use crate::error::OcrError;

/// Word level entries in tesseract's TSV output
const WORD_LEVEL: u32 = 5;
const TSV_COLUMNS: usize = 12;

/// Runs the `tesseract` CLI, feeding the image as PNG on stdin.
pub struct TesseractEngine {
    cmd: PathBuf,
    languages: Vec<String>,
}

impl TesseractEngine {
    pub fn new(cmd: impl Into<PathBuf>, languages: Vec<String>) -> Self {
        Self {
            cmd: cmd.into(),
            languages,
        }
    }

    fn language_arg(&self) -> String {
        if self.languages.is_empty() {
            "eng".to_string()
        } else {
            self.languages.join("+")
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: RgbaImage) -> Result<OcrResult, OcrError> {
        let (width, height) = image.dimensions();
        let png = encode_png(image)?;

        info!(
            "Running tesseract on {}x{} image, languages={}",
            width,
            height,
            self.language_arg()
        );

        let mut child = Command::new(&self.cmd)
            .args(["stdin", "stdout", "-l", &self.language_arg(), "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Worker("tesseract stdin unavailable".to_string()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(OcrError::Engine {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        writer
            .await
            .map_err(|e| OcrError::Worker(e.to_string()))??;

        let result = parse_tsv(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "tesseract found {} words, mean confidence {:?}",
            result.words.len(),
            result.mean_confidence()
        );
        Ok(result)
    }
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>, OcrError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Parse `tesseract ... tsv` output into word regions.
///
/// Columns: level page_num block_num par_num line_num word_num left top width height conf text
pub fn parse_tsv(tsv: &str) -> Result<OcrResult, OcrError> {
    let mut lines = tsv.lines();
    match lines.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => return Err(OcrError::Parse(format!("unexpected header: {other}"))),
        None => return Ok(OcrResult::default()),
    }

    let mut words = Vec::new();
    for (index, row) in lines.enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = row.splitn(TSV_COLUMNS, '\t').collect();
        if fields.len() < TSV_COLUMNS - 1 {
            return Err(OcrError::Parse(format!("row {}: expected {} columns", index + 2, TSV_COLUMNS)));
        }

        let number = |i: usize| -> Result<i64, OcrError> {
            fields[i]
                .trim()
                .parse::<f64>()
                .map(|v| v as i64)
                .map_err(|_| OcrError::Parse(format!("row {}: bad number '{}'", index + 2, fields[i])))
        };

        if number(0)? != WORD_LEVEL as i64 {
            continue;
        }
        let text = fields.get(11).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            continue;
        }

        words.push(TextRegion {
            text: text.to_string(),
            block: number(2)? as u32,
            paragraph: number(3)? as u32,
            line: number(4)? as u32,
            x: number(6)? as i32,
            y: number(7)? as i32,
            width: number(8)? as i32,
            height: number(9)? as i32,
            confidence: fields[10].trim().parse::<f32>().unwrap_or(-1.0),
        });
    }

    Ok(OcrResult { words })
}
