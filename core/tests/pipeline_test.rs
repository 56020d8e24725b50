/// End-to-end tests for a hotkey invocation
///
/// These wire the orchestrator to a running notification surface and a
/// history file on disk: clipboard → prompt → provider → surface → history
mod common;

use std::sync::Arc;
use std::time::Duration;

use copywizz_core::settings::{API_KEY, MemorySettingsStore};
use copywizz_core::{
    HistoryStore, InvocationOutcome, NotificationSurface, ProviderError, QueryOrchestrator,
    RetryableCompletionClient, ScriptedProvider, StaticText, SurfaceConfig, SurfaceEvent,
    SurfacePhase,
};
use common::{RecordingBackend, SCREEN};
use tempfile::TempDir;
use tokio::sync::broadcast;

const ANSWER: &str = "Photosynthesis converts light into chemical energy.";

async fn next_event(events: &mut broadcast::Receiver<SurfaceEvent>) -> SurfaceEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("surface event in time")
        .expect("surface still running")
}

#[tokio::test]
async fn test_e2e_hotkey_shows_answer_and_records_history() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let backend = RecordingBackend::new(140.0);
    let (handle, mut events, _surface) =
        NotificationSurface::spawn(backend.clone(), SurfaceConfig::default());
    let orchestrator = QueryOrchestrator::new(
        RetryableCompletionClient::new(ScriptedProvider::new(vec![Ok(ANSWER.to_string())])),
        StaticText("photosynthesis".to_string()),
        MemorySettingsStore::new().with(API_KEY, "test-key"),
        Arc::new(HistoryStore::in_dir(dir.path())),
        handle,
    );

    let outcome = orchestrator.invoke().await;
    assert!(matches!(outcome, InvocationOutcome::Succeeded { entry: Some(_), .. }));

    let pending = next_event(&mut events).await;
    assert_eq!(pending.phase, SurfacePhase::Pending);
    assert_eq!(pending.state.body, "Getting info...");

    let settled = next_event(&mut events).await;
    assert_eq!(settled.phase, SurfacePhase::Settled);
    assert_eq!(settled.state.body, ANSWER);
    assert!(settled.state.visible);
    assert_eq!(settled.state.measured_height, 140.0);

    let bounds = settled.bounds.expect("settled surface is placed");
    assert_eq!(bounds.x, SCREEN.width - 350.0 - 20.0);
    assert_eq!(bounds.y, SCREEN.height - 140.0 - 20.0);

    // A fresh store over the same directory sees the committed entry
    let reopened = HistoryStore::in_dir(dir.path()).read_all().await;
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened[0].query, "photosynthesis");
    assert_eq!(reopened[0].response, ANSWER);
    assert!(!reopened[0].favorited);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_overloaded_provider_recovers_within_one_invocation() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::Overloaded("503".into())),
        Err(ProviderError::Overloaded("503".into())),
        Ok(ANSWER.to_string()),
    ]);
    let (handle, mut events, _surface) =
        NotificationSurface::spawn(RecordingBackend::new(100.0), SurfaceConfig::default());
    let orchestrator = QueryOrchestrator::new(
        RetryableCompletionClient::new(provider),
        StaticText("photosynthesis".to_string()),
        MemorySettingsStore::new().with(API_KEY, "test-key"),
        Arc::new(HistoryStore::in_dir(dir.path())),
        handle,
    );

    let outcome = orchestrator.invoke().await;

    assert!(matches!(outcome, InvocationOutcome::Succeeded { .. }));
    assert_eq!(orchestrator.client().provider().call_count(), 3);
    assert_eq!(next_event(&mut events).await.phase, SurfacePhase::Pending);
    assert_eq!(next_event(&mut events).await.state.body, ANSWER);
    assert_eq!(orchestrator.history().read_all().await.len(), 1);
}

#[tokio::test]
async fn test_e2e_favorite_survives_later_invocations() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (handle, _events, _surface) =
        NotificationSurface::spawn(RecordingBackend::new(100.0), SurfaceConfig::default());
    let orchestrator = QueryOrchestrator::new(
        RetryableCompletionClient::new(ScriptedProvider::new(vec![
            Ok("first answer".to_string()),
            Ok("second answer".to_string()),
        ])),
        StaticText("entropy".to_string()),
        MemorySettingsStore::new().with(API_KEY, "test-key"),
        Arc::new(HistoryStore::in_dir(dir.path())),
        handle,
    );

    let InvocationOutcome::Succeeded {
        entry: Some(first), ..
    } = orchestrator.invoke().await
    else {
        panic!("first invocation should succeed");
    };
    let history = orchestrator.history();
    let toggled = history
        .toggle_favorite(&first.id)
        .await
        .expect("entry exists");
    assert!(toggled.favorited);

    orchestrator.invoke().await;

    let entries = history.read_all().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].response, "second answer");
    assert!(!entries[0].favorited);
    assert_eq!(entries[1].id, first.id);
    assert!(entries[1].favorited);
    assert_eq!(history.favorites().await, vec![entries[1].clone()]);
}
