pub mod grabber;
pub mod screenshot;
pub mod session;

pub use grabber::{FileGrabber, ScreenGrabber};
pub use screenshot::{CapturedImage, DisplayId, Point, Rect};
pub use session::{CaptureSession, Selection, SessionId, SessionSlot, SessionSnapshot, SessionState};
