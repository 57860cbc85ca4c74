pub mod supervisor;
pub mod window;

pub use supervisor::{HeadlessOverlayHost, OverlayHost, OverlaySupervisor};
pub use window::{OverlayInput, OverlayWindow, SelectionEvent};
