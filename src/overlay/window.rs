use serde::{Deserialize, Serialize};

use crate::capture::{CapturedImage, DisplayId, Point, Rect, Selection};

/// Input delivered to one display's overlay, in that display's logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayInput {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp(Point),
    Escape,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    Finalized(Selection),
    Cancelled,
}

/// Rectangle selection on a single display.
#[derive(Debug, Clone)]
pub struct OverlayWindow {
    display: DisplayId,
    scale_factor: f64,
    image_size: (u32, u32),
    drag: Option<(Point, Point)>,
}

impl OverlayWindow {
    pub fn new(image: &CapturedImage) -> Self {
        Self {
            display: image.display,
            scale_factor: image.scale_factor,
            image_size: (image.width(), image.height()),
            drag: None,
        }
    }

    /// The rectangle being dragged, for live rendering
    pub fn current_rect(&self) -> Option<Rect> {
        self.drag.map(|(start, end)| Rect::from_corners(start, end))
    }

    pub fn handle(&mut self, input: OverlayInput) -> Option<SelectionEvent> {
        match input {
            OverlayInput::PointerDown(p) => {
                self.drag = Some((p, p));
                None
            }
            OverlayInput::PointerMove(p) => {
                if let Some((_, end)) = self.drag.as_mut() {
                    *end = p;
                }
                None
            }
            OverlayInput::PointerUp(p) => {
                let (start, _) = self.drag.take()?;
                self.finalize(Rect::from_corners(start, p))
            }
            OverlayInput::Escape | OverlayInput::Closed => {
                self.drag = None;
                Some(SelectionEvent::Cancelled)
            }
        }
    }

    /// Zero-area drags (plain clicks) are discarded and the overlay keeps waiting.
    fn finalize(&self, logical: Rect) -> Option<SelectionEvent> {
        if logical.is_empty() {
            return None;
        }
        let (width, height) = self.image_size;
        let image = logical.scaled(self.scale_factor).clamp_to(width, height)?;
        Some(SelectionEvent::Finalized(Selection {
            display: self.display,
            logical,
            image,
        }))
    }
}
