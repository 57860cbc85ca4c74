use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::transform::Mode;

#[derive(Debug, Parser)]
#[command(name = "normcap")]
#[command(about = "OCR-powered screen capture: select a region, get its text")]
#[command(version)]
pub struct Cli {
    /// Start minimized to the tray instead of capturing right away
    #[arg(long)]
    pub background_mode: bool,

    /// Tesseract language(s), e.g. `-l eng -l deu` or `-l eng,deu`
    #[arg(short, long, value_delimiter = ',')]
    pub language: Vec<String>,

    /// Text post-processing: `parse` or `raw`
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Use image file(s) as screenshots, one per display
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,

    /// Device pixels per logical pixel for --image screenshots
    #[arg(long, default_value_t = 1.0)]
    pub scale_factor: f64,

    /// Path to the tesseract binary
    #[arg(long, value_name = "PATH")]
    pub tesseract_cmd: Option<PathBuf>,

    /// Check for a newer release on startup
    #[arg(long, overrides_with = "no_update")]
    pub update: bool,

    #[arg(long, overrides_with = "update", hide = true)]
    pub no_update: bool,

    /// Read config from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Override persisted settings with the flags given on the command line
    pub fn apply(&self, config: &mut Config) {
        if self.background_mode {
            config.capture.background_mode = true;
        }
        if !self.language.is_empty() {
            config.ocr.languages = self.language.clone();
        }
        if let Some(mode) = self.mode {
            config.capture.mode = mode;
        }
        if let Some(cmd) = &self.tesseract_cmd {
            config.ocr.tesseract_cmd = cmd.clone();
        }
        if self.update {
            config.update.enabled = true;
        } else if self.no_update {
            config.update.enabled = false;
        }
    }
}
