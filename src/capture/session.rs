use image::RgbaImage;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use super::screenshot::{CapturedImage, DisplayId, Rect};
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Images captured, overlays not shown yet
    Created,
    AwaitingSelection,
    AwaitingOcr,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

/// A region chosen on one display's overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub display: DisplayId,
    /// As drawn, in logical pixels
    pub logical: Rect,
    /// The same region in the display image's device pixels
    pub image: Rect,
}

/// Read-only view of a session for observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub selection: Option<Selection>,
    pub ocr_text: Option<String>,
    pub error: Option<String>,
}

/// One screenshot → selection → OCR cycle.
#[derive(Debug)]
pub struct CaptureSession {
    id: SessionId,
    source_images: Vec<CapturedImage>,
    selection: Option<Selection>,
    ocr_text: Option<String>,
    state: SessionState,
    error: Option<String>,
}

impl CaptureSession {
    pub fn new(source_images: Vec<CapturedImage>) -> Self {
        Self {
            id: SessionId::new(),
            source_images,
            selection: None,
            ocr_text: None,
            state: SessionState::Created,
            error: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn source_images(&self) -> &[CapturedImage] {
        &self.source_images
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn ocr_text(&self) -> Option<&str> {
        self.ocr_text.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            selection: self.selection,
            ocr_text: self.ocr_text.clone(),
            error: self.error.clone(),
        }
    }

    fn expect_state(&self, expected: SessionState, event: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                event,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        debug!(session = %self.id, from = ?self.state, to = ?to, "Session transition");
        self.state = to;
    }

    /// Overlays are up; wait for the user.
    pub fn begin_selection(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Created, "begin selection")?;
        self.transition(SessionState::AwaitingSelection);
        Ok(())
    }

    pub fn select(&mut self, selection: Selection) -> Result<(), SessionError> {
        if self.selection.is_some() {
            return Err(SessionError::SelectionAlreadySet);
        }
        self.expect_state(SessionState::AwaitingSelection, "select")?;
        if self.image_for(selection.display).is_none() {
            return Err(SessionError::UnknownDisplay(selection.display));
        }

        self.selection = Some(selection);
        self.transition(SessionState::AwaitingOcr);
        Ok(())
    }

    pub fn complete(&mut self, text: String) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingOcr, "complete")?;
        self.ocr_text = Some(text);
        self.transition(SessionState::Completed);
        Ok(())
    }

    /// OCR failed; the session ends without text and keeps the error for diagnostics.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingOcr, "fail")?;
        self.error = Some(error.into());
        self.transition(SessionState::Cancelled);
        Ok(())
    }

    /// Returns false if the session had already ended.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.transition(SessionState::Cancelled);
        true
    }

    fn image_for(&self, display: DisplayId) -> Option<&CapturedImage> {
        self.source_images.iter().find(|img| img.display == display)
    }

    /// Selected pixels of the owning display's image
    pub fn crop(&self) -> Result<RgbaImage, SessionError> {
        let selection = self.selection.as_ref().ok_or(SessionError::InvalidTransition {
            event: "crop",
            state: self.state,
        })?;
        let image = self
            .image_for(selection.display)
            .ok_or(SessionError::UnknownDisplay(selection.display))?;
        image.crop(&selection.image).ok_or(SessionError::EmptyRegion)
    }
}

/// Holds at most one running session.
///
/// The finished session stays readable until the next one replaces it.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<CaptureSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|s| !s.is_terminal())
    }

    /// Install `session` unless another one is still running, in which case it is handed back.
    pub fn try_begin(&mut self, session: CaptureSession) -> Result<&mut CaptureSession, CaptureSession> {
        if self.is_busy() {
            return Err(session);
        }
        Ok(self.current.insert(session))
    }

    pub fn current(&self) -> Option<&CaptureSession> {
        self.current.as_ref()
    }

    /// The running session, if any
    pub fn active_mut(&mut self) -> Option<&mut CaptureSession> {
        self.current.as_mut().filter(|s| !s.is_terminal())
    }

    /// The running session when it has id `id`
    pub fn active_with_id(&mut self, id: SessionId) -> Option<&mut CaptureSession> {
        self.active_mut().filter(|s| s.id() == id)
    }
}
