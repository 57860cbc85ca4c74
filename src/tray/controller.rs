use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::icon::{Clipboard, TrayIcon};
use super::menu::{TrayAction, TrayMenu};
use crate::capture::{
    CaptureSession, DisplayId, Point, Rect, ScreenGrabber, Selection, SessionId, SessionSlot,
    SessionSnapshot, SessionState,
};
use crate::config::Config;
use crate::error::{CaptureError, OcrError, TrayError};
use crate::ocr::OcrEngine;
use crate::overlay::{OverlayHost, OverlayInput, OverlaySupervisor, SelectionEvent};
use crate::signal::Signal;
use crate::transform::{transform, Mode, Transformed, Transformer};

/// Called once with the process exit code
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

const EXIT_CODE: i32 = 0;

/// Everything outside the core the controller drives
pub struct Collaborators {
    pub grabber: Arc<dyn ScreenGrabber>,
    pub ocr: Arc<dyn OcrEngine>,
    pub overlay_host: Arc<dyn OverlayHost>,
    pub tray_icon: Box<dyn TrayIcon>,
    pub clipboard: Option<Box<dyn Clipboard>>,
    pub exit: ExitHook,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub mode: Mode,
    pub ocr_timeout: Option<Duration>,
    pub selection_timeout: Option<Duration>,
    /// Start a capture as soon as the loop runs
    pub capture_on_start: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Parse,
            ocr_timeout: None,
            selection_timeout: None,
            capture_on_start: false,
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.capture.mode,
            ocr_timeout: config.ocr_timeout(),
            selection_timeout: config.selection_timeout(),
            capture_on_start: !config.capture.background_mode,
        }
    }
}

/// Observable controller state, published after every transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerStatus {
    /// The running session, or the last finished one
    pub session: Option<SessionSnapshot>,
    pub overlays: Vec<DisplayId>,
    pub exit_requested: bool,
    pub exit_code: Option<i32>,
}

impl ControllerStatus {
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state)
    }

    /// No session running and no exit pending
    pub fn is_ready(&self) -> bool {
        !self.exit_requested && self.session_state().map_or(true, SessionState::is_terminal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Completed {
        session: SessionId,
        text: String,
        transformer: Transformer,
    },
    Cancelled {
        session: SessionId,
        reason: String,
    },
}

pub(crate) enum TrayCommand {
    Trigger {
        id: String,
        reply: oneshot::Sender<Result<(), TrayError>>,
    },
    Capture,
    Input {
        display: DisplayId,
        input: OverlayInput,
    },
    OcrFinished {
        session: SessionId,
        result: Result<Transformed, String>,
    },
    SelectionTimedOut(SessionId),
    Exit {
        delayed: bool,
    },
    /// Deferred teardown queued by a delayed exit
    ExitNow,
    Menu(oneshot::Sender<TrayMenu>),
}

/// The tray event loop.
///
/// Runs as one tokio task and is the only owner of the tray icon, the menu,
/// the session slot and the overlay windows. Everything else talks to it
/// through a [`TrayHandle`]; OCR workers post their results back as
/// commands, so session state only changes on the loop.
pub struct TrayController {
    options: ControllerOptions,
    grabber: Arc<dyn ScreenGrabber>,
    ocr: Arc<dyn OcrEngine>,
    tray_icon: Box<dyn TrayIcon>,
    clipboard: Option<Box<dyn Clipboard>>,
    exit: ExitHook,

    menu: TrayMenu,
    slot: SessionSlot,
    overlays: OverlaySupervisor,

    commands: mpsc::UnboundedReceiver<TrayCommand>,
    self_tx: mpsc::WeakUnboundedSender<TrayCommand>,
    status: watch::Sender<ControllerStatus>,
    outcomes: Signal<CaptureOutcome>,

    exit_requested: bool,
    exit_code: Option<i32>,
}

impl TrayController {
    /// Start the event loop. The loop stops after exit, or when every handle is dropped.
    pub fn spawn(collaborators: Collaborators, options: ControllerOptions) -> (TrayHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ControllerStatus::default());
        let outcomes = Signal::new();

        let controller = Self {
            options,
            grabber: collaborators.grabber,
            ocr: collaborators.ocr,
            tray_icon: collaborators.tray_icon,
            clipboard: collaborators.clipboard,
            exit: collaborators.exit,
            menu: TrayMenu::build(false),
            slot: SessionSlot::new(),
            overlays: OverlaySupervisor::new(collaborators.overlay_host),
            commands: rx,
            self_tx: tx.downgrade(),
            status: status_tx,
            outcomes: outcomes.clone(),
            exit_requested: false,
            exit_code: None,
        };

        let handle = TrayHandle {
            commands: tx,
            status: status_rx,
            outcomes,
        };

        (handle, tokio::spawn(controller.run()))
    }

    async fn run(mut self) {
        info!("Tray controller started");
        self.tray_icon.set_menu(&self.menu);

        if self.options.capture_on_start {
            self.on_capture_triggered();
        }

        while let Some(command) = self.commands.recv().await {
            self.dispatch(command);
            if self.exit_code.is_some() {
                break;
            }
        }

        if self.exit_code.is_none() {
            info!("All tray handles dropped, releasing resources");
            self.overlays.close_all();
            self.tray_icon.hide();
        }
        debug!("Tray controller stopped");
    }

    fn dispatch(&mut self, command: TrayCommand) {
        match command {
            TrayCommand::Trigger { id, reply } => {
                let result = self.trigger(&id);
                let _ = reply.send(result);
            }
            TrayCommand::Capture => self.on_capture_triggered(),
            TrayCommand::Input { display, input } => self.on_overlay_input(display, input),
            TrayCommand::OcrFinished { session, result } => match result {
                Ok(transformed) => self.on_ocr_result(session, transformed),
                Err(error) => self.on_ocr_error(session, error),
            },
            TrayCommand::SelectionTimedOut(session) => self.on_selection_timed_out(session),
            TrayCommand::Exit { delayed } => self.on_exit_triggered(delayed),
            TrayCommand::ExitNow => self.teardown(),
            TrayCommand::Menu(reply) => {
                let _ = reply.send(self.menu.clone());
            }
        }
    }

    fn trigger(&mut self, id: &str) -> Result<(), TrayError> {
        let (action, enabled) = self.menu.find(id).map(|a| (a.action, a.enabled))?;
        info!("Tray event: {}", id);

        if !enabled {
            info!("Ignoring tray action '{}' - currently disabled", id);
            return Ok(());
        }

        match action {
            TrayAction::Capture => self.on_capture_triggered(),
            TrayAction::Exit => self.on_exit_triggered(false),
        }
        Ok(())
    }

    pub fn on_capture_triggered(&mut self) {
        if self.exit_requested {
            debug!("Exit pending, ignoring capture request");
            return;
        }
        if self.slot.is_busy() {
            info!("Capture already in progress, ignoring trigger");
            return;
        }

        let images = match self.grabber.grab() {
            Ok(images) if images.is_empty() => {
                warn!("{}", CaptureError::NoImages);
                return;
            }
            Ok(images) => images,
            Err(e) => {
                error!("Screen capture failed: {}", e);
                return;
            }
        };

        let session = match self.slot.try_begin(CaptureSession::new(images)) {
            Ok(session) => session,
            Err(_) => {
                warn!("Session slot occupied, dropping new capture");
                return;
            }
        };
        let id = session.id();
        info!(session = %id, "Capture started on {} display(s)", session.source_images().len());

        let opened = self
            .overlays
            .open_all(session.source_images())
            .map_err(|e| e.to_string())
            .and_then(|_| session.begin_selection().map_err(|e| e.to_string()));

        if let Err(reason) = opened {
            error!(session = %id, "Could not show selection overlay: {}", reason);
            session.cancel();
            self.overlays.close_all();
            self.finish(CaptureOutcome::Cancelled { session: id, reason });
            return;
        }

        if let Some(limit) = self.options.selection_timeout {
            self.schedule(limit, TrayCommand::SelectionTimedOut(id));
        }
        self.refresh();
    }

    fn on_overlay_input(&mut self, display: DisplayId, input: OverlayInput) {
        if self.slot.active_mut().is_none() {
            debug!("No active session, dropping overlay input {:?}", input);
            return;
        }
        match self.overlays.handle(display, input) {
            Some(SelectionEvent::Finalized(selection)) => self.on_selection_finalized(selection),
            Some(SelectionEvent::Cancelled) => self.on_selection_cancelled("selection cancelled"),
            None => {}
        }
    }

    pub fn on_selection_finalized(&mut self, selection: Selection) {
        self.overlays.close_all();

        let Some(session) = self.slot.active_mut() else {
            warn!("Selection without an active session");
            return;
        };
        if let Err(e) = session.select(selection) {
            warn!(session = %session.id(), "Ignoring selection: {}", e);
            return;
        }
        let id = session.id();
        info!(session = %id, "Region selected on display {}: {:?}", selection.display, selection.image);

        let image = match session.crop() {
            Ok(image) => image,
            Err(e) => {
                let reason = e.to_string();
                let _ = session.fail(reason.clone());
                self.finish(CaptureOutcome::Cancelled { session: id, reason });
                return;
            }
        };

        self.spawn_ocr(id, image);
        self.refresh();
    }

    pub fn on_selection_cancelled(&mut self, reason: &str) {
        self.overlays.close_all();

        let Some(session) = self.slot.active_mut() else {
            return;
        };
        let id = session.id();
        if session.cancel() {
            info!(session = %id, "Capture cancelled: {}", reason);
            self.finish(CaptureOutcome::Cancelled {
                session: id,
                reason: reason.to_string(),
            });
        }
    }

    fn on_selection_timed_out(&mut self, id: SessionId) {
        let waiting = self
            .slot
            .active_with_id(id)
            .is_some_and(|s| s.state() == SessionState::AwaitingSelection);
        if waiting {
            warn!(session = %id, "No selection made in time");
            self.on_selection_cancelled("selection timed out");
        }
    }

    pub fn on_ocr_result(&mut self, id: SessionId, transformed: Transformed) {
        let Some(session) = self.slot.active_with_id(id) else {
            debug!(session = %id, "Dropping OCR result for inactive session");
            return;
        };
        if let Err(e) = session.complete(transformed.text.clone()) {
            warn!(session = %id, "Dropping OCR result: {}", e);
            return;
        }
        info!(
            session = %id,
            "Capture completed ({:?}, {} chars)",
            transformed.transformer,
            transformed.text.chars().count()
        );

        if let Some(clipboard) = self.clipboard.as_mut() {
            if transformed.text.is_empty() {
                info!("No text detected, clipboard left untouched");
            } else if let Err(e) = clipboard.set_text(&transformed.text) {
                error!("Failed to copy text to clipboard: {:#}", e);
            }
        }

        self.finish(CaptureOutcome::Completed {
            session: id,
            text: transformed.text,
            transformer: transformed.transformer,
        });
    }

    pub fn on_ocr_error(&mut self, id: SessionId, error: String) {
        let Some(session) = self.slot.active_with_id(id) else {
            debug!(session = %id, "Dropping OCR error for inactive session: {}", error);
            return;
        };
        if let Err(e) = session.fail(error.clone()) {
            warn!(session = %id, "Dropping OCR error: {}", e);
            return;
        }
        error!(session = %id, "OCR failed: {}", error);
        self.finish(CaptureOutcome::Cancelled {
            session: id,
            reason: error,
        });
    }

    /// Request exit. Only the first call has any effect.
    pub fn on_exit_triggered(&mut self, delayed: bool) {
        if self.exit_requested {
            debug!("Exit already requested");
            return;
        }
        self.exit_requested = true;
        info!("Exit requested (delayed={})", delayed);

        if delayed {
            if let Some(tx) = self.self_tx.upgrade() {
                if tx.send(TrayCommand::ExitNow).is_ok() {
                    self.publish();
                    return;
                }
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.exit_code.is_some() {
            return;
        }

        if let Some(session) = self.slot.active_mut() {
            let id = session.id();
            if session.cancel() {
                self.outcomes.emit(CaptureOutcome::Cancelled {
                    session: id,
                    reason: "application exiting".to_string(),
                });
            }
        }
        self.overlays.close_all();
        self.tray_icon.hide();

        self.exit_code = Some(EXIT_CODE);
        self.publish();
        info!("Exiting with code {}", EXIT_CODE);
        (self.exit)(EXIT_CODE);
    }

    fn spawn_ocr(&self, id: SessionId, image: image::RgbaImage) {
        let ocr = self.ocr.clone();
        let mode = self.options.mode;
        let limit = self.options.ocr_timeout;
        let tx = self.self_tx.clone();

        tokio::spawn(async move {
            let mut job = tokio::spawn(async move { ocr.recognize(image).await });

            let joined = match limit {
                Some(limit) => match tokio::time::timeout(limit, &mut job).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        job.abort();
                        Ok(Err(OcrError::Timeout(limit)))
                    }
                },
                None => job.await,
            };

            let result = match joined {
                Ok(Ok(ocr_result)) => Ok(transform(mode, &ocr_result)),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(OcrError::Worker(e.to_string()).to_string()),
            };

            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(TrayCommand::OcrFinished { session: id, result });
            }
        });
    }

    fn schedule(&self, after: Duration, command: TrayCommand) {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(command);
            }
        });
    }

    fn finish(&mut self, outcome: CaptureOutcome) {
        self.outcomes.emit(outcome);
        self.refresh();
    }

    /// Sync menu and published status with the current state
    fn refresh(&mut self) {
        let menu = TrayMenu::build(self.slot.is_busy());
        if menu != self.menu && !self.exit_requested {
            self.tray_icon.set_menu(&menu);
        }
        self.menu = menu;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(ControllerStatus {
            session: self.slot.current().map(CaptureSession::snapshot),
            overlays: self.overlays.open_displays(),
            exit_requested: self.exit_requested,
            exit_code: self.exit_code,
        });
    }
}

/// Cloneable remote control for a running [`TrayController`]
#[derive(Clone)]
pub struct TrayHandle {
    commands: mpsc::UnboundedSender<TrayCommand>,
    status: watch::Receiver<ControllerStatus>,
    outcomes: Signal<CaptureOutcome>,
}

impl TrayHandle {
    fn send(&self, command: TrayCommand) -> Result<(), TrayError> {
        self.commands
            .send(command)
            .map_err(|_| TrayError::ControllerGone)
    }

    /// Trigger a menu action by its identifier
    pub async fn trigger(&self, id: &str) -> Result<(), TrayError> {
        let (reply, rx) = oneshot::channel();
        self.send(TrayCommand::Trigger {
            id: id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| TrayError::ControllerGone)?
    }

    pub fn capture(&self) -> Result<(), TrayError> {
        self.send(TrayCommand::Capture)
    }

    pub fn exit(&self, delayed: bool) -> Result<(), TrayError> {
        self.send(TrayCommand::Exit { delayed })
    }

    pub fn overlay_input(&self, display: DisplayId, input: OverlayInput) -> Result<(), TrayError> {
        self.send(TrayCommand::Input { display, input })
    }

    pub fn pointer_down(&self, display: DisplayId, at: Point) -> Result<(), TrayError> {
        self.overlay_input(display, OverlayInput::PointerDown(at))
    }

    pub fn pointer_move(&self, display: DisplayId, at: Point) -> Result<(), TrayError> {
        self.overlay_input(display, OverlayInput::PointerMove(at))
    }

    pub fn pointer_up(&self, display: DisplayId, at: Point) -> Result<(), TrayError> {
        self.overlay_input(display, OverlayInput::PointerUp(at))
    }

    pub fn escape(&self, display: DisplayId) -> Result<(), TrayError> {
        self.overlay_input(display, OverlayInput::Escape)
    }

    pub fn window_closed(&self, display: DisplayId) -> Result<(), TrayError> {
        self.overlay_input(display, OverlayInput::Closed)
    }

    /// Drag out `rect` (logical pixels) on `display`
    pub fn select_region(&self, display: DisplayId, rect: Rect) -> Result<(), TrayError> {
        let right = i32::try_from(rect.right()).unwrap_or(i32::MAX);
        let bottom = i32::try_from(rect.bottom()).unwrap_or(i32::MAX);
        self.pointer_down(display, Point::new(rect.x, rect.y))?;
        self.pointer_up(display, Point::new(right, bottom))
    }

    pub async fn menu(&self) -> Result<TrayMenu, TrayError> {
        let (reply, rx) = oneshot::channel();
        self.send(TrayCommand::Menu(reply))?;
        rx.await.map_err(|_| TrayError::ControllerGone)
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    /// Wait until the published status satisfies `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ControllerStatus) -> bool,
    ) -> Result<ControllerStatus, TrayError> {
        let mut rx = self.status.clone();
        let status = match rx.wait_for(predicate).await {
            Ok(status) => status.clone(),
            Err(_) => return Err(TrayError::ControllerGone),
        };
        Ok(status)
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<CaptureOutcome> {
        self.outcomes.subscribe()
    }
}
