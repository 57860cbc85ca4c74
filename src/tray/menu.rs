use serde::Serialize;

use crate::error::TrayError;

pub const CAPTURE_ACTION: &str = "capture";
pub const EXIT_ACTION: &str = "exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrayAction {
    Capture,
    Exit,
}

/// A user-triggerable menu entry with a stable id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayMenuAction {
    pub id: &'static str,
    pub label: String,
    pub enabled: bool,
    pub action: TrayAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayMenu {
    actions: Vec<TrayMenuAction>,
}

impl TrayMenu {
    /// Menu for the current controller state. Capture is greyed out while a
    /// session is running.
    pub fn build(session_active: bool) -> Self {
        let capture_label = if session_active {
            "Capturing..."
        } else {
            "Capture"
        };

        Self {
            actions: vec![
                TrayMenuAction {
                    id: CAPTURE_ACTION,
                    label: capture_label.to_string(),
                    enabled: !session_active,
                    action: TrayAction::Capture,
                },
                TrayMenuAction {
                    id: EXIT_ACTION,
                    label: "Exit".to_string(),
                    enabled: true,
                    action: TrayAction::Exit,
                },
            ],
        }
    }

    pub fn actions(&self) -> &[TrayMenuAction] {
        &self.actions
    }

    pub fn find(&self, id: &str) -> Result<&TrayMenuAction, TrayError> {
        self.actions
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| TrayError::UnknownAction(id.to_string()))
    }
}
