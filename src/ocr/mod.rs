pub mod tesseract;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

pub use tesseract::TesseractEngine;

/// One recognised word and where it sits in the OCR'd image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub words: Vec<TextRegion>,
}

impl OcrResult {
    /// Build a result from plain text: blank lines separate paragraphs,
    /// newlines separate lines, whitespace separates words.
    pub fn from_text(text: &str) -> Self {
        let mut words = Vec::new();
        let mut paragraph = 0;
        let mut line = 0;
        let mut in_paragraph = false;

        for raw_line in text.lines() {
            if raw_line.trim().is_empty() {
                if in_paragraph {
                    paragraph += 1;
                    line = 0;
                    in_paragraph = false;
                }
                continue;
            }
            in_paragraph = true;
            for word in raw_line.split_whitespace() {
                words.push(TextRegion {
                    text: word.to_string(),
                    x: 0,
                    y: 0,
                    width: 0,
                    height: 0,
                    confidence: 100.0,
                    block: 1,
                    paragraph,
                    line,
                });
            }
            line += 1;
        }

        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Lines grouped by paragraph, in reading order
    pub fn paragraphs(&self) -> Vec<Vec<String>> {
        let mut paragraphs: Vec<Vec<String>> = Vec::new();
        let mut last_paragraph = None;
        let mut last_line = None;

        for word in &self.words {
            let paragraph_key = (word.block, word.paragraph);
            let line_key = (word.block, word.paragraph, word.line);

            if last_paragraph != Some(paragraph_key) {
                paragraphs.push(Vec::new());
                last_paragraph = Some(paragraph_key);
                last_line = None;
            }
            let Some(lines) = paragraphs.last_mut() else {
                continue;
            };

            match lines.last_mut() {
                Some(current) if last_line == Some(line_key) => {
                    current.push(' ');
                    current.push_str(&word.text);
                }
                _ => {
                    lines.push(word.text.clone());
                    last_line = Some(line_key);
                }
            }
        }

        paragraphs
    }

    pub fn lines(&self) -> Vec<String> {
        self.paragraphs().into_iter().flatten().collect()
    }

    /// Text as laid out: lines separated by newlines, paragraphs by a blank line
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|lines| lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn mean_confidence(&self) -> Option<f32> {
        if self.words.is_empty() {
            return None;
        }
        let sum: f32 = self.words.iter().map(|w| w.confidence).sum();
        Some(sum / self.words.len() as f32)
    }
}

/// Text recognition backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: RgbaImage) -> Result<OcrResult, OcrError>;
}
