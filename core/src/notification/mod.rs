//! Transient overlay that shows pipeline progress and results.
//!
//! The surface runs as its own task and is driven only by [`SurfaceMessage`]s
//! sent through a [`NotificationHandle`]. Senders never wait on it: rendering,
//! measurement and placement happen on the surface task, and backend failures
//! are logged there instead of being reported back.

pub mod layout;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use layout::{Bounds, WorkArea, anchor_bottom_right};
use layout::{DEFAULT_SURFACE_HEIGHT, SURFACE_MARGIN, SURFACE_WIDTH};

const DEFAULT_MEASURE_TIMEOUT_MS: u64 = 750;
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("notification window is unavailable")]
    WindowUnavailable,
    #[error("failed to measure notification content: {0}")]
    Measure(String),
    #[error("failed to query display work area: {0}")]
    WorkArea(String),
    #[error("notification backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfacePhase {
    Hidden,
    Pending,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceMessage {
    ShowPending(NotificationContent),
    ShowResult(NotificationContent),
    Hide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub visible: bool,
    pub title: String,
    pub body: String,
    pub query: Option<String>,
    pub measured_height: f64,
}

impl NotificationState {
    fn hidden(default_height: f64) -> Self {
        Self {
            visible: false,
            title: String::new(),
            body: String::new(),
            query: None,
            measured_height: default_height,
        }
    }
}

/// Published after every applied transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceEvent {
    pub phase: SurfacePhase,
    pub state: NotificationState,
    pub bounds: Option<Bounds>,
}

/// Platform side of the overlay: a window that can show content, report the
/// height its layout settled on, and be moved around.
pub trait SurfaceBackend: Send + Sync {
    fn work_area(&self) -> Result<WorkArea, SurfaceError>;

    /// Pushes `content` to the window and resolves with the content height
    /// once a layout pass has happened.
    fn render(
        &self,
        content: &NotificationContent,
    ) -> impl Future<Output = Result<f64, SurfaceError>> + Send;

    fn place(&self, bounds: Bounds) -> Result<(), SurfaceError>;

    fn set_visible(&self, visible: bool) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub width: f64,
    pub margin: f64,
    pub default_height: f64,
    pub measure_timeout: Duration,
    /// Hide settled content after this long. `None` keeps it until hidden.
    pub auto_dismiss: Option<Duration>,
    pub fallback_work_area: WorkArea,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: SURFACE_WIDTH,
            margin: SURFACE_MARGIN,
            default_height: DEFAULT_SURFACE_HEIGHT,
            measure_timeout: Duration::from_millis(DEFAULT_MEASURE_TIMEOUT_MS),
            auto_dismiss: None,
            fallback_work_area: WorkArea {
                x: 0.0,
                y: 0.0,
                width: 1280.0,
                height: 800.0,
            },
        }
    }
}

/// Fire-and-forget sender side of the surface.
#[derive(Debug, Clone)]
pub struct NotificationHandle {
    tx: mpsc::UnboundedSender<SurfaceMessage>,
}

impl NotificationHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SurfaceMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: SurfaceMessage) {
        if self.tx.send(message).is_err() {
            warn!("notification surface is not running; message dropped");
        }
    }

    pub fn show_pending(&self, content: NotificationContent) {
        self.send(SurfaceMessage::ShowPending(content));
    }

    pub fn show_result(&self, content: NotificationContent) {
        self.send(SurfaceMessage::ShowResult(content));
    }

    pub fn hide(&self) {
        self.send(SurfaceMessage::Hide);
    }
}

pub struct NotificationSurface<B> {
    backend: B,
    config: SurfaceConfig,
    phase: SurfacePhase,
    state: NotificationState,
    bounds: Option<Bounds>,
    events: broadcast::Sender<SurfaceEvent>,
}

impl<B: SurfaceBackend> NotificationSurface<B> {
    pub fn new(backend: B, config: SurfaceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = NotificationState::hidden(config.default_height);
        Self {
            backend,
            config,
            phase: SurfacePhase::Hidden,
            state,
            bounds: None,
            events,
        }
    }

    pub fn phase(&self) -> SurfacePhase {
        self.phase
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    pub async fn apply(&mut self, message: SurfaceMessage) {
        match message {
            SurfaceMessage::ShowPending(content) => {
                self.show(SurfacePhase::Pending, content).await;
            }
            SurfaceMessage::ShowResult(content) => {
                self.show(SurfacePhase::Settled, content).await;
            }
            SurfaceMessage::Hide => self.hide(),
        }
    }

    async fn show(&mut self, phase: SurfacePhase, content: NotificationContent) {
        let measured_height = self.measure(&content).await;
        let work_area = match self.backend.work_area() {
            Ok(area) => area,
            Err(err) => {
                warn!("using fallback work area for notification: {err}");
                self.config.fallback_work_area
            }
        };
        let bounds = anchor_bottom_right(
            work_area,
            self.config.width,
            measured_height,
            self.config.margin,
        );

        if let Err(err) = self.backend.place(bounds) {
            warn!("failed to position notification surface: {err}");
        }
        if let Err(err) = self.backend.set_visible(true) {
            warn!("failed to show notification surface: {err}");
        }

        debug!(from = ?self.phase, to = ?phase, height = measured_height, "notification transition");
        self.phase = phase;
        self.bounds = Some(bounds);
        self.state = NotificationState {
            visible: true,
            title: content.title,
            body: content.body,
            query: content.query,
            measured_height,
        };
        self.publish();
    }

    fn hide(&mut self) {
        if self.phase == SurfacePhase::Hidden {
            return;
        }

        if let Err(err) = self.backend.set_visible(false) {
            warn!("failed to hide notification surface: {err}");
        }
        debug!(from = ?self.phase, "notification hidden");
        self.phase = SurfacePhase::Hidden;
        self.state.visible = false;
        self.publish();
    }

    async fn measure(&self, content: &NotificationContent) -> f64 {
        let fallback = self.config.default_height;
        match tokio::time::timeout(self.config.measure_timeout, self.backend.render(content)).await
        {
            Ok(Ok(height)) if height.is_finite() && height >= 0.0 => height,
            Ok(Ok(height)) => {
                warn!(height, "ignored invalid notification height");
                fallback
            }
            Ok(Err(err)) => {
                warn!("notification measurement failed, using default height: {err}");
                fallback
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.measure_timeout.as_millis() as u64,
                    "notification measurement timed out, using default height"
                );
                fallback
            }
        }
    }

    fn publish(&self) {
        // No subscribers is fine.
        let _ = self.events.send(SurfaceEvent {
            phase: self.phase,
            state: self.state.clone(),
            bounds: self.bounds,
        });
    }

    /// Consumes messages until every [`NotificationHandle`] is dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SurfaceMessage>) {
        let mut dismiss_at: Option<Instant> = None;

        loop {
            let message = match dismiss_at {
                Some(deadline) => {
                    tokio::select! {
                        message = rx.recv() => message,
                        _ = tokio::time::sleep_until(deadline) => {
                            info!("auto-dismissing settled notification");
                            dismiss_at = None;
                            self.hide();
                            continue;
                        }
                    }
                }
                None => rx.recv().await,
            };

            let Some(message) = message else {
                break;
            };

            self.apply(message).await;
            dismiss_at = match (self.phase, self.config.auto_dismiss) {
                (SurfacePhase::Settled, Some(delay)) => Some(Instant::now() + delay),
                _ => None,
            };
        }

        info!("notification surface stopped");
    }
}

impl<B: SurfaceBackend + 'static> NotificationSurface<B> {
    /// Starts the surface on its own task.
    pub fn spawn(
        backend: B,
        config: SurfaceConfig,
    ) -> (
        NotificationHandle,
        broadcast::Receiver<SurfaceEvent>,
        JoinHandle<()>,
    ) {
        let surface = Self::new(backend, config);
        let events = surface.subscribe();
        let (handle, rx) = NotificationHandle::channel();
        let task = tokio::spawn(surface.run(rx));
        (handle, events, task)
    }
}
