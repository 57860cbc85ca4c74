use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use normcap::capture::{CapturedImage, DisplayId, Rect, SessionState};
use normcap::error::{CaptureError, OcrError, TrayError};
use normcap::ocr::{OcrEngine, OcrResult};
use normcap::overlay::OverlayHost;
use normcap::transform::{Mode, Transformer};
use normcap::tray::{
    CaptureOutcome, Clipboard, Collaborators, ControllerOptions, ControllerStatus, TrayController,
    TrayHandle, TrayIcon, TrayMenu, CAPTURE_ACTION, EXIT_ACTION,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

const SAMPLE_TEXT: &str = "NormCap turns any region of your screen into text.";
const TEXT_ORIGIN: (i32, i32) = (40, 30);

/// Reads text that [`screen_with_text`] encoded into the red channel
enum FakeOcr {
    Pixels,
    Fail,
    Hang,
    Panic,
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(&self, image: RgbaImage) -> Result<OcrResult, OcrError> {
        match self {
            FakeOcr::Pixels => {
                let lines: Vec<String> = image
                    .rows()
                    .map(|row| row.filter(|p| p[0] != 0).map(|p| p[0] as char).collect::<String>())
                    .filter(|line| !line.is_empty())
                    .collect();
                Ok(OcrResult::from_text(&lines.join("\n")))
            }
            FakeOcr::Fail => Err(OcrError::Engine {
                status: 1,
                stderr: "Failed loading language 'xyz'".to_string(),
            }),
            FakeOcr::Hang => std::future::pending::<Result<OcrResult, OcrError>>().await,
            FakeOcr::Panic => panic!("engine crashed on a malformed image"),
        }
    }
}

fn screen_with_text(display: DisplayId) -> CapturedImage {
    let mut image = RgbaImage::from_pixel(400, 120, Rgba([0, 0, 0, 255]));
    for (i, byte) in SAMPLE_TEXT.bytes().enumerate() {
        let x = TEXT_ORIGIN.0 as u32 + i as u32;
        image.put_pixel(x, TEXT_ORIGIN.1 as u32, Rgba([byte, 0, 0, 255]));
    }
    CapturedImage::new(display, image)
}

fn text_region() -> Rect {
    Rect::new(TEXT_ORIGIN.0, TEXT_ORIGIN.1, SAMPLE_TEXT.len() as u32, 1)
}

#[derive(Default)]
struct OverlayLog {
    shown: Mutex<Vec<DisplayId>>,
    closed: Mutex<Vec<DisplayId>>,
}

impl OverlayHost for OverlayLog {
    fn show(&self, image: &CapturedImage) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push(image.display);
        Ok(())
    }

    fn close(&self, display: DisplayId) {
        self.closed.lock().unwrap().push(display);
    }
}

#[derive(Default)]
struct TrayLog {
    menus: Vec<TrayMenu>,
    hidden: usize,
}

struct FakeTray(Arc<Mutex<TrayLog>>);

impl TrayIcon for FakeTray {
    fn set_menu(&mut self, menu: &TrayMenu) {
        self.0.lock().unwrap().menus.push(menu.clone());
    }

    fn hide(&mut self) {
        self.0.lock().unwrap().hidden += 1;
    }
}

struct FakeClipboard(Arc<Mutex<Vec<String>>>);

impl Clipboard for FakeClipboard {
    fn set_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Harness {
    handle: TrayHandle,
    controller: JoinHandle<()>,
    exits: Arc<Mutex<Vec<i32>>>,
    grabs: Arc<AtomicUsize>,
    overlay: Arc<OverlayLog>,
    tray: Arc<Mutex<TrayLog>>,
    clipboard: Arc<Mutex<Vec<String>>>,
}

fn start_with(
    images: Vec<CapturedImage>,
    ocr: FakeOcr,
    options: ControllerOptions,
) -> Harness {
    let exits = Arc::new(Mutex::new(Vec::new()));
    let grabs = Arc::new(AtomicUsize::new(0));
    let overlay = Arc::new(OverlayLog::default());
    let tray = Arc::new(Mutex::new(TrayLog::default()));
    let clipboard = Arc::new(Mutex::new(Vec::new()));

    let grab_count = grabs.clone();
    let grabber = move || -> Result<Vec<CapturedImage>, CaptureError> {
        grab_count.fetch_add(1, Ordering::SeqCst);
        Ok(images.clone())
    };
    let exit_log = exits.clone();

    let collaborators = Collaborators {
        grabber: Arc::new(grabber),
        ocr: Arc::new(ocr),
        overlay_host: overlay.clone(),
        tray_icon: Box::new(FakeTray(tray.clone())),
        clipboard: Some(Box::new(FakeClipboard(clipboard.clone()))),
        exit: Arc::new(move |code| exit_log.lock().unwrap().push(code)),
    };

    let (handle, controller) = TrayController::spawn(collaborators, options);
    Harness {
        handle,
        controller,
        exits,
        grabs,
        overlay,
        tray,
        clipboard,
    }
}

fn start(ocr: FakeOcr) -> Harness {
    start_with(vec![screen_with_text(0)], ocr, ControllerOptions::default())
}

async fn wait(handle: &TrayHandle, predicate: impl FnMut(&ControllerStatus) -> bool) -> ControllerStatus {
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for(predicate))
        .await
        .expect("controller did not reach the expected state")
        .expect("controller stopped")
}

async fn wait_for_state(handle: &TrayHandle, state: SessionState) -> ControllerStatus {
    wait(handle, |s| s.session_state() == Some(state)).await
}

/// Normalized Levenshtein similarity in [0, 1]
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    1.0 - previous[b.len()] as f64 / a.len().max(b.len()) as f64
}

#[test]
fn test_similarity_helper() {
    assert_eq!(similarity("kitten", "kitten"), 1.0);
    assert!((similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
}

#[tokio::test]
async fn test_exit_action_exits_once_with_zero() {
    let h = start(FakeOcr::Pixels);

    h.handle.trigger(EXIT_ACTION).await.unwrap();
    let again = h.handle.trigger(EXIT_ACTION).await;
    assert!(matches!(again, Ok(()) | Err(TrayError::ControllerGone)));

    h.controller.await.unwrap();
    assert_eq!(*h.exits.lock().unwrap(), vec![0]);
    assert_eq!(h.tray.lock().unwrap().hidden, 1);
    assert_eq!(h.handle.status().exit_code, Some(0));
    assert_eq!(h.handle.exit(false), Err(TrayError::ControllerGone));
}

#[tokio::test]
async fn test_repeated_delayed_exit_is_idempotent() {
    let h = start(FakeOcr::Pixels);

    for _ in 0..3 {
        let _ = h.handle.exit(true);
    }
    let _ = h.handle.exit(false);

    h.controller.await.unwrap();
    assert_eq!(*h.exits.lock().unwrap(), vec![0]);
}

#[tokio::test]
async fn test_full_capture_cycle() {
    let h = start(FakeOcr::Pixels);
    let mut outcomes = h.handle.subscribe_outcomes();

    h.handle.trigger(CAPTURE_ACTION).await.unwrap();
    let status = wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    assert_eq!(status.overlays, vec![0]);

    h.handle.select_region(0, text_region()).unwrap();
    let status = wait_for_state(&h.handle, SessionState::Completed).await;

    let session = status.session.clone().unwrap();
    let text = session.ocr_text.expect("completed session has text");
    assert!(similarity(&text, SAMPLE_TEXT) >= 0.98, "got {text:?}");
    assert_eq!(session.selection.unwrap().image, text_region());
    assert!(status.overlays.is_empty());
    assert!(status.is_ready());

    match outcomes.recv().await.unwrap() {
        CaptureOutcome::Completed {
            session: id,
            text: outcome_text,
            transformer,
        } => {
            assert_eq!(id, session.id);
            assert_eq!(outcome_text, text);
            assert_eq!(transformer, Transformer::SingleLine);
        }
        other => panic!("expected completion, got {other:?}"),
    }

    assert_eq!(*h.clipboard.lock().unwrap(), vec![text]);
    assert_eq!(*h.overlay.closed.lock().unwrap(), vec![0]);
    assert!(h.exits.lock().unwrap().is_empty());
    assert!(!h.controller.is_finished());
}

#[tokio::test]
async fn test_drag_with_pointer_moves() {
    let h = start_with(
        vec![screen_with_text(0)],
        FakeOcr::Pixels,
        ControllerOptions {
            mode: Mode::Raw,
            ..Default::default()
        },
    );

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;

    let region = text_region();
    let end = normcap::capture::Point::new(region.right() as i32, region.bottom() as i32);
    h.handle
        .pointer_down(0, normcap::capture::Point::new(region.x, region.y))
        .unwrap();
    h.handle
        .pointer_move(0, normcap::capture::Point::new(region.x + 5, region.y + 1))
        .unwrap();
    h.handle.pointer_up(0, end).unwrap();

    let status = wait_for_state(&h.handle, SessionState::Completed).await;
    assert_eq!(status.session.unwrap().ocr_text.as_deref(), Some(SAMPLE_TEXT));
}

#[tokio::test]
async fn test_cancel_returns_to_ready() {
    let h = start(FakeOcr::Pixels);
    let mut outcomes = h.handle.subscribe_outcomes();

    h.handle.capture().unwrap();
    let first = wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.window_closed(0).unwrap();

    let status = wait_for_state(&h.handle, SessionState::Cancelled).await;
    let session = status.session.clone().unwrap();
    assert_eq!(session.ocr_text, None);
    assert!(status.overlays.is_empty());
    assert!(status.is_ready());
    assert!(matches!(
        outcomes.recv().await.unwrap(),
        CaptureOutcome::Cancelled { .. }
    ));

    h.handle.trigger(CAPTURE_ACTION).await.unwrap();
    let second = wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    assert_ne!(first.session.unwrap().id, second.session.unwrap().id);
    assert!(h.clipboard.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_escape_cancels_selection() {
    let h = start(FakeOcr::Pixels);

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle
        .pointer_down(0, normcap::capture::Point::new(1, 1))
        .unwrap();
    h.handle.escape(0).unwrap();

    let status = wait_for_state(&h.handle, SessionState::Cancelled).await;
    assert!(status.session.unwrap().selection.is_none());
}

#[tokio::test]
async fn test_second_trigger_does_not_start_second_session() {
    let h = start(FakeOcr::Pixels);

    h.handle.capture().unwrap();
    h.handle.capture().unwrap();
    h.handle.trigger(CAPTURE_ACTION).await.unwrap();
    let menu = h.handle.menu().await.unwrap();

    let status = h.handle.status();
    assert_eq!(status.session_state(), Some(SessionState::AwaitingSelection));
    assert_eq!(h.grabs.load(Ordering::SeqCst), 1);
    assert_eq!(*h.overlay.shown.lock().unwrap(), vec![0]);
    assert!(!menu.find(CAPTURE_ACTION).unwrap().enabled);
}

#[tokio::test]
async fn test_finalizing_on_one_display_closes_all() {
    let h = start_with(
        vec![screen_with_text(0), screen_with_text(1)],
        FakeOcr::Pixels,
        ControllerOptions::default(),
    );

    h.handle.capture().unwrap();
    let status = wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    assert_eq!(status.overlays, vec![0, 1]);

    h.handle.select_region(1, text_region()).unwrap();
    let status = wait_for_state(&h.handle, SessionState::Completed).await;
    assert_eq!(status.session.unwrap().selection.unwrap().display, 1);

    let mut closed = h.overlay.closed.lock().unwrap().clone();
    closed.sort_unstable();
    assert_eq!(closed, vec![0, 1]);
}

#[tokio::test]
async fn test_capture_on_start() {
    let h = start_with(
        vec![screen_with_text(0)],
        FakeOcr::Pixels,
        ControllerOptions {
            capture_on_start: true,
            ..Default::default()
        },
    );

    let status = wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    assert_eq!(status.overlays, vec![0]);
}

#[tokio::test]
async fn test_ocr_error_cancels_session() {
    let h = start(FakeOcr::Fail);
    let mut outcomes = h.handle.subscribe_outcomes();

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.select_region(0, text_region()).unwrap();

    let status = wait_for_state(&h.handle, SessionState::Cancelled).await;
    let session = status.session.clone().unwrap();
    assert_eq!(session.ocr_text, None);
    assert!(session.error.unwrap().contains("Failed loading language"));
    assert!(status.is_ready());
    assert!(h.exits.lock().unwrap().is_empty());

    match outcomes.recv().await.unwrap() {
        CaptureOutcome::Cancelled { reason, .. } => assert!(reason.contains("status 1")),
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_panicking_ocr_worker_cancels_session() {
    let h = start(FakeOcr::Panic);
    let mut outcomes = h.handle.subscribe_outcomes();

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.select_region(0, text_region()).unwrap();

    let status = wait_for_state(&h.handle, SessionState::Cancelled).await;
    let session = status.session.clone().unwrap();
    assert_eq!(session.ocr_text, None);
    assert!(session.error.unwrap().contains("OCR worker failed"));
    assert!(status.is_ready());
    assert!(h.exits.lock().unwrap().is_empty());

    match outcomes.recv().await.unwrap() {
        CaptureOutcome::Cancelled { reason, .. } => assert!(reason.contains("OCR worker failed")),
        other => panic!("expected cancellation, got {other:?}"),
    }

    // The loop survives the panic and serves the next capture
    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.escape(0).unwrap();
    wait_for_state(&h.handle, SessionState::Cancelled).await;
}

#[tokio::test]
async fn test_ocr_timeout_cancels_session() {
    let h = start_with(
        vec![screen_with_text(0)],
        FakeOcr::Hang,
        ControllerOptions {
            ocr_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        },
    );

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.select_region(0, text_region()).unwrap();

    let status = wait_for_state(&h.handle, SessionState::Cancelled).await;
    assert!(status.session.unwrap().error.unwrap().contains("did not finish"));
}

#[tokio::test]
async fn test_selection_timeout_cancels_session() {
    let h = start_with(
        vec![screen_with_text(0)],
        FakeOcr::Pixels,
        ControllerOptions {
            selection_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        },
    );

    h.handle.capture().unwrap();
    let status = wait_for_state(&h.handle, SessionState::Cancelled).await;
    assert!(status.session.unwrap().selection.is_none());
    assert!(status.overlays.is_empty());
}

#[tokio::test]
async fn test_exit_during_selection_tears_everything_down() {
    let h = start(FakeOcr::Pixels);
    let mut outcomes = h.handle.subscribe_outcomes();

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.exit(false).unwrap();
    h.controller.await.unwrap();

    assert_eq!(*h.exits.lock().unwrap(), vec![0]);
    assert_eq!(*h.overlay.closed.lock().unwrap(), vec![0]);
    assert_eq!(h.tray.lock().unwrap().hidden, 1);
    assert!(matches!(
        outcomes.recv().await.unwrap(),
        CaptureOutcome::Cancelled { .. }
    ));
}

#[tokio::test]
async fn test_unknown_action_is_an_error() {
    let h = start(FakeOcr::Pixels);
    assert_eq!(
        h.handle.trigger("settings").await,
        Err(TrayError::UnknownAction("settings".to_string()))
    );
}

#[tokio::test]
async fn test_grab_failure_leaves_controller_ready() {
    let exits = Arc::new(Mutex::new(Vec::new()));
    let exit_log = exits.clone();
    let collaborators = Collaborators {
        grabber: Arc::new(|| -> Result<Vec<CapturedImage>, CaptureError> {
            Err(CaptureError::Grab("permission denied".to_string()))
        }),
        ocr: Arc::new(FakeOcr::Pixels),
        overlay_host: Arc::new(OverlayLog::default()),
        tray_icon: Box::new(FakeTray(Arc::default())),
        clipboard: None,
        exit: Arc::new(move |code| exit_log.lock().unwrap().push(code)),
    };
    let (handle, _controller) = TrayController::spawn(collaborators, ControllerOptions::default());

    handle.trigger(CAPTURE_ACTION).await.unwrap();
    let status = handle.status();
    assert!(status.session.is_none());
    assert!(status.is_ready());
    assert!(exits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_menu_reflects_session() {
    let h = start(FakeOcr::Pixels);

    h.handle.capture().unwrap();
    wait_for_state(&h.handle, SessionState::AwaitingSelection).await;
    h.handle.escape(0).unwrap();
    wait_for_state(&h.handle, SessionState::Cancelled).await;

    let menus = h.tray.lock().unwrap().menus.clone();
    let capture_enabled: Vec<bool> = menus
        .iter()
        .map(|m| m.find(CAPTURE_ACTION).unwrap().enabled)
        .collect();
    assert_eq!(capture_enabled, vec![true, false, true]);
}
