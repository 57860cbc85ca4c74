use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::window::{OverlayInput, OverlayWindow, SelectionEvent};
use crate::capture::{CapturedImage, DisplayId, Rect};
use crate::error::OverlayError;

/// Window backend for overlays (GUI toolkit side).
///
/// A real host shows a borderless, always-on-top, input-capturing window
/// covering the display, with the screenshot as background.
pub trait OverlayHost: Send + Sync {
    fn show(&self, image: &CapturedImage) -> anyhow::Result<()>;

    /// Redraw the selection rectangle while dragging
    fn update_selection(&self, _display: DisplayId, _rect: Option<Rect>) {}

    fn close(&self, display: DisplayId);
}

/// Host without windows; logs what a GUI would do
#[derive(Debug, Default)]
pub struct HeadlessOverlayHost;

impl OverlayHost for HeadlessOverlayHost {
    fn show(&self, image: &CapturedImage) -> anyhow::Result<()> {
        info!(
            "Overlay ready on display {} ({}x{} logical)",
            image.display,
            image.logical_size().0,
            image.logical_size().1
        );
        Ok(())
    }

    fn close(&self, display_id: DisplayId) {
        debug!("Overlay closed on display {}", display_id);
    }
}

/// Owns the overlay windows of the running session, one per display.
///
/// Windows are released together: a finalized selection, a cancellation
/// or [`close_all`](Self::close_all) closes every one of them.
pub struct OverlaySupervisor {
    host: Arc<dyn OverlayHost>,
    windows: BTreeMap<DisplayId, OverlayWindow>,
}

impl OverlaySupervisor {
    pub fn new(host: Arc<dyn OverlayHost>) -> Self {
        Self {
            host,
            windows: BTreeMap::new(),
        }
    }

    pub fn open_displays(&self) -> Vec<DisplayId> {
        self.windows.keys().copied().collect()
    }

    /// Open one window per image. On failure nothing stays open.
    pub fn open_all(&mut self, images: &[CapturedImage]) -> Result<(), OverlayError> {
        if images.is_empty() {
            return Err(OverlayError::NoImages);
        }
        self.close_all();

        for image in images {
            let result = if self.windows.contains_key(&image.display) {
                Err(format!("display {} captured twice", image.display))
            } else {
                self.host.show(image).map_err(|e| format!("{:#}", e))
            };

            if let Err(reason) = result {
                self.close_all();
                return Err(OverlayError::Open {
                    display: image.display,
                    reason,
                });
            }
            self.windows.insert(image.display, OverlayWindow::new(image));
        }

        info!("Opened {} overlay window(s)", self.windows.len());
        Ok(())
    }

    /// Route input to the display's window; a finished selection closes all windows.
    pub fn handle(&mut self, display_id: DisplayId, input: OverlayInput) -> Option<SelectionEvent> {
        let Some(window) = self.windows.get_mut(&display_id) else {
            warn!("Input for display {} without an open overlay: {:?}", display_id, input);
            return None;
        };

        let event = window.handle(input);
        match event {
            Some(_) => {
                self.close_all();
            }
            None => self.host.update_selection(display_id, window.current_rect()),
        }
        event
    }

    /// Close every window, returning how many were open
    pub fn close_all(&mut self) -> usize {
        let windows = std::mem::take(&mut self.windows);
        for display in windows.keys() {
            self.host.close(*display);
        }
        if !windows.is_empty() {
            debug!("Closed {} overlay window(s)", windows.len());
        }
        windows.len()
    }
}

impl Drop for OverlaySupervisor {
    fn drop(&mut self) {
        self.close_all();
    }
}
