use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use copywizz_core::notification::{Bounds, WorkArea};
use copywizz_core::{NotificationContent, SurfaceBackend, SurfaceError};
use serde::Serialize;
use tauri::{AppHandle, Emitter, LogicalPosition, LogicalSize, Manager, WebviewWindow};
use tokio::sync::oneshot;
use tracing::debug;

pub const NOTIFICATION_WINDOW_LABEL: &str = "notification";
const SHOW_NOTIFICATION_EVENT: &str = "show-notification";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload<'a> {
    token: u64,
    title: &'a str,
    body: &'a str,
    query: Option<&'a str>,
}

/// Pairs a rendered notification with the height its page reports back.
/// Only the newest render is awaited; older reports are dropped.
#[derive(Default)]
pub struct MeasurementSlot {
    next_token: AtomicU64,
    pending: Mutex<Option<(u64, oneshot::Sender<f64>)>>,
}

impl MeasurementSlot {
    fn begin(&self) -> (u64, oneshot::Receiver<f64>) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        *self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((token, tx));
        (token, rx)
    }

    pub fn resolve(&self, token: u64, height: f64) -> bool {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match pending.take() {
            Some((expected, tx)) if expected == token => tx.send(height).is_ok(),
            other => {
                debug!(token, "ignored stale notification measurement");
                *pending = other;
                false
            }
        }
    }
}

/// Drives the `notification` webview window.
pub struct TauriSurfaceBackend {
    app_handle: AppHandle,
    measurements: Arc<MeasurementSlot>,
}

impl TauriSurfaceBackend {
    pub fn new(app_handle: AppHandle, measurements: Arc<MeasurementSlot>) -> Self {
        Self {
            app_handle,
            measurements,
        }
    }

    fn window(&self) -> Result<WebviewWindow, SurfaceError> {
        self.app_handle
            .get_webview_window(NOTIFICATION_WINDOW_LABEL)
            .ok_or(SurfaceError::WindowUnavailable)
    }
}

impl SurfaceBackend for TauriSurfaceBackend {
    fn work_area(&self) -> Result<WorkArea, SurfaceError> {
        let monitor = self
            .window()?
            .primary_monitor()
            .map_err(|err| SurfaceError::WorkArea(err.to_string()))?
            .ok_or_else(|| SurfaceError::WorkArea("no primary monitor".to_string()))?;

        let scale = monitor.scale_factor();
        let area = monitor.work_area();
        Ok(WorkArea {
            x: f64::from(area.position.x) / scale,
            y: f64::from(area.position.y) / scale,
            width: f64::from(area.size.width) / scale,
            height: f64::from(area.size.height) / scale,
        })
    }

    fn render(
        &self,
        content: &NotificationContent,
    ) -> impl Future<Output = Result<f64, SurfaceError>> + Send {
        let (token, rx) = self.measurements.begin();
        let emitted = self
            .app_handle
            .emit_to(
                NOTIFICATION_WINDOW_LABEL,
                SHOW_NOTIFICATION_EVENT,
                NotificationPayload {
                    token,
                    title: &content.title,
                    body: &content.body,
                    query: content.query.as_deref(),
                },
            )
            .map_err(|err| SurfaceError::Backend(err.to_string()));

        async move {
            emitted?;
            rx.await
                .map_err(|_| SurfaceError::Measure("measurement superseded".to_string()))
        }
    }

    fn place(&self, bounds: Bounds) -> Result<(), SurfaceError> {
        let window = self.window()?;
        window
            .set_size(LogicalSize::new(bounds.width, bounds.height))
            .map_err(|err| SurfaceError::Backend(err.to_string()))?;
        window
            .set_position(LogicalPosition::new(bounds.x, bounds.y))
            .map_err(|err| SurfaceError::Backend(err.to_string()))
    }

    fn set_visible(&self, visible: bool) -> Result<(), SurfaceError> {
        let window = self.window()?;
        let result = if visible { window.show() } else { window.hide() };
        result.map_err(|err| SurfaceError::Backend(err.to_string()))
    }
}
