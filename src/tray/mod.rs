pub mod controller;
pub mod icon;
pub mod menu;

pub use controller::{
    CaptureOutcome, Collaborators, ControllerOptions, ControllerStatus, ExitHook, TrayController,
    TrayHandle,
};
pub use icon::{Clipboard, HeadlessTray, StdoutClipboard, TrayIcon};
pub use menu::{TrayAction, TrayMenu, TrayMenuAction, CAPTURE_ACTION, EXIT_ACTION};
