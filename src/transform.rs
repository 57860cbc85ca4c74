use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ocr::OcrResult;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();

    static ref URL_REGEX: Regex =
        Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+[^\s<>.,;:!?)\]]").unwrap();
}

/// Fraction of max line length a line needs to count as "full width"
const FULL_LINE_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Raw,
    Parse,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Mode::Raw),
            "parse" => Ok(Mode::Parse),
            other => Err(format!("unknown mode '{other}' (expected 'raw' or 'parse')")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Raw => write!(f, "raw"),
            Mode::Parse => write!(f, "parse"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transformer {
    Raw,
    Email,
    Url,
    SingleLine,
    Paragraph,
    MultiLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transformed {
    pub text: String,
    pub transformer: Transformer,
}

/// Post-process recognised text.
///
/// In [`Mode::Parse`] every transformer scores the OCR result and the
/// highest score wins. [`Mode::Raw`] keeps the layout tesseract reported.
pub fn transform(mode: Mode, result: &OcrResult) -> Transformed {
    match mode {
        Mode::Raw => Transformed {
            text: result.text(),
            transformer: Transformer::Raw,
        },
        Mode::Parse => parse(result),
    }
}

fn parse(result: &OcrResult) -> Transformed {
    let paragraphs = result.paragraphs();
    let lines: Vec<&str> = paragraphs.iter().flatten().map(String::as_str).collect();
    if lines.is_empty() {
        return Transformed {
            text: String::new(),
            transformer: Transformer::MultiLine,
        };
    }
    let joined = lines.join(" ");

    // Ties go to the earlier entry.
    let candidates = [
        (Transformer::Email, score_email(&joined)),
        (Transformer::Url, score_url(&joined)),
        (Transformer::SingleLine, score_single_line(&lines)),
        (Transformer::Paragraph, score_paragraph(&paragraphs)),
        (Transformer::MultiLine, score_multi_line(&paragraphs)),
    ];

    let transformer = candidates
        .iter()
        .fold((Transformer::MultiLine, f64::MIN), |best, &(kind, score)| {
            if score > best.1 {
                (kind, score)
            } else {
                best
            }
        })
        .0;

    let text = match transformer {
        Transformer::Email => matches(&EMAIL_REGEX, &joined).join(", "),
        Transformer::Url => matches(&URL_REGEX, &joined).join("\n"),
        Transformer::SingleLine => lines.first().map(|l| l.to_string()).unwrap_or_default(),
        Transformer::Paragraph => paragraphs
            .iter()
            .map(|p| join_wrapped(p))
            .collect::<Vec<_>>()
            .join("\n\n"),
        Transformer::MultiLine | Transformer::Raw => lines.join("\n"),
    };

    Transformed { text, transformer }
}

fn matches(regex: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in regex.find_iter(text) {
        if !found.iter().any(|f| f == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}

fn non_space_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Share of the text covered by matches, 0-100
fn coverage(regex: &Regex, text: &str) -> f64 {
    let total = non_space_len(text);
    if total == 0 {
        return 0.0;
    }
    let covered: usize = regex.find_iter(text).map(|m| non_space_len(m.as_str())).sum();
    covered as f64 / total as f64 * 100.0
}

fn score_email(text: &str) -> f64 {
    coverage(&EMAIL_REGEX, text)
}

fn score_url(text: &str) -> f64 {
    coverage(&URL_REGEX, text)
}

fn score_single_line(lines: &[&str]) -> f64 {
    if lines.len() == 1 {
        50.0
    } else {
        0.0
    }
}

/// Fraction of wrapped (non-final) lines that run close to the widest line
fn full_line_fraction(paragraphs: &[Vec<String>]) -> Option<f64> {
    let max_len = paragraphs
        .iter()
        .flatten()
        .map(|l| l.chars().count())
        .max()?;
    let wrapped: Vec<&String> = paragraphs
        .iter()
        .flat_map(|p| p.iter().take(p.len().saturating_sub(1)))
        .collect();
    if wrapped.is_empty() || max_len == 0 {
        return None;
    }
    let full = wrapped
        .iter()
        .filter(|l| l.chars().count() as f64 >= max_len as f64 * FULL_LINE_RATIO)
        .count();
    Some(full as f64 / wrapped.len() as f64)
}

fn score_paragraph(paragraphs: &[Vec<String>]) -> f64 {
    full_line_fraction(paragraphs).map_or(0.0, |fraction| fraction * 60.0)
}

fn score_multi_line(paragraphs: &[Vec<String>]) -> f64 {
    let line_count: usize = paragraphs.iter().map(Vec::len).sum();
    if line_count < 2 {
        return 0.0;
    }
    match full_line_fraction(paragraphs) {
        Some(fraction) => (1.0 - fraction) * 60.0,
        // Only single-line paragraphs: a list of separate lines.
        None => 50.0,
    }
}

/// Join visually wrapped lines, undoing end-of-line hyphenation
fn join_wrapped(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        let line = line.trim();
        if out.is_empty() {
            out.push_str(line);
        } else if out.ends_with('-') && line.starts_with(|c: char| c.is_lowercase()) {
            out.pop();
            out.push_str(line);
        } else {
            out.push(' ');
            out.push_str(line);
        }
    }
    out
}
