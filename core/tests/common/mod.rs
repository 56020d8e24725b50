//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};

use copywizz_core::notification::{Bounds, WorkArea};
use copywizz_core::{NotificationContent, SurfaceBackend, SurfaceError};

/// Overlay backend that reports a fixed content height and records what the
/// surface asked it to do.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    height: f64,
    placements: Arc<Mutex<Vec<Bounds>>>,
    rendered: Arc<Mutex<Vec<NotificationContent>>>,
}

impl RecordingBackend {
    pub fn new(height: f64) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    pub fn placements(&self) -> Vec<Bounds> {
        self.placements.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<NotificationContent> {
        self.rendered.lock().unwrap().clone()
    }
}

pub const SCREEN: WorkArea = WorkArea {
    x: 0.0,
    y: 0.0,
    width: 1512.0,
    height: 944.0,
};

impl SurfaceBackend for RecordingBackend {
    fn work_area(&self) -> Result<WorkArea, SurfaceError> {
        Ok(SCREEN)
    }

    fn render(
        &self,
        content: &NotificationContent,
    ) -> impl Future<Output = Result<f64, SurfaceError>> + Send {
        self.rendered.lock().unwrap().push(content.clone());
        let height = self.height;
        async move { Ok(height) }
    }

    fn place(&self, bounds: Bounds) -> Result<(), SurfaceError> {
        self.placements.lock().unwrap().push(bounds);
        Ok(())
    }

    fn set_visible(&self, _visible: bool) -> Result<(), SurfaceError> {
        Ok(())
    }
}
