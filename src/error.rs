use thiserror::Error;

use crate::capture::SessionState;

/// Precondition failures raised synchronously by [`crate::fetcher::AsyncFetcher`].
///
/// Network and decode failures never surface here; they are reported
/// through the fetcher's notification channel instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Url {0} not allowed to be opened")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Rejected transitions on a [`crate::capture::CaptureSession`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid transition: cannot {event} while {state:?}")]
    InvalidTransition {
        event: &'static str,
        state: SessionState,
    },

    #[error("selection already set for this session")]
    SelectionAlreadySet,

    #[error("no captured image for display {0}")]
    UnknownDisplay(u32),

    #[error("selected region is empty after clamping to the image")]
    EmptyRegion,
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to encode image for OCR: {0}")]
    Encode(String),

    #[error("failed to run OCR engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("OCR engine exited with status {status}: {stderr}")]
    Engine { status: i32, stderr: String },

    #[error("could not parse OCR output: {0}")]
    Parse(String),

    #[error("OCR did not finish within {0:?}")]
    Timeout(std::time::Duration),

    #[error("OCR worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("no images to show an overlay for")]
    NoImages,

    #[error("failed to open overlay on display {display}: {reason}")]
    Open { display: u32, reason: String },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen grab failed: {0}")]
    Grab(String),

    #[error("screen grab returned no images")]
    NoImages,

    #[error("failed to load screenshot {path}: {reason}")]
    Load { path: String, reason: String },

    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrayError {
    #[error("no tray action with identifier '{0}'")]
    UnknownAction(String),

    #[error("tray controller is no longer running")]
    ControllerGone,
}
