use tracing::{debug, info};

use super::menu::TrayMenu;

/// Process-wide tray icon. Only the controller holds one.
pub trait TrayIcon: Send {
    fn set_menu(&mut self, menu: &TrayMenu);

    /// Remove the icon from the tray
    fn hide(&mut self);
}

/// Receives recognised text
pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> anyhow::Result<()>;
}

/// Logs menu changes instead of drawing an icon
#[derive(Debug, Default)]
pub struct HeadlessTray {
    visible: bool,
}

impl HeadlessTray {
    pub fn new() -> Self {
        Self { visible: true }
    }
}

impl TrayIcon for HeadlessTray {
    fn set_menu(&mut self, menu: &TrayMenu) {
        if !self.visible {
            return;
        }
        let entries: Vec<String> = menu
            .actions()
            .iter()
            .map(|a| {
                if a.enabled {
                    a.label.clone()
                } else {
                    format!("({})", a.label)
                }
            })
            .collect();
        debug!("Tray menu: {}", entries.join(" | "));
    }

    fn hide(&mut self) {
        if self.visible {
            info!("Tray icon released");
            self.visible = false;
        }
    }
}

/// Prints captured text to stdout
#[derive(Debug, Default)]
pub struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn set_text(&mut self, text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }
}
