//! Integration tests driving the player actor through its channels with a
//! scripted playback engine. Every collaborator callback is marshaled in
//! through the event channel, the way a real embedder would deliver it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use url::Url;

use audiopilot::config::PlayerSettings;
use audiopilot::connectivity::ConnectivityEvent;
use audiopilot::engine::{EngineError, EngineEvent, PlaybackEngine};
use audiopilot::host::HostEnvironment;
use audiopilot::item::{AudioItem, QualitySources};
use audiopilot::player::{
    NowPlayingDisplay, NowPlayingInfo, Player, PlayerCommand, PlayerError, PlayerEvent,
    PlayerNotification, PlayerState,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum EngineCall {
    Load(Url),
    Play,
    Pause,
    Seek(Duration),
    SetRate(f32),
    SetVolume(f32),
    ReplaceSource(Url),
    Release,
}

/// Records every control call; playback behavior is scripted by the test
/// through the player's event channel.
struct ScriptedEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

#[async_trait]
impl PlaybackEngine for ScriptedEngine {
    async fn load(&mut self, url: &Url) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::Load(url.clone()));
        Ok(())
    }

    async fn play(&mut self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::Play);
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::Pause);
        Ok(())
    }

    async fn seek(&mut self, to: Duration) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::Seek(to));
        Ok(())
    }

    async fn set_rate(&mut self, rate: f32) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::SetRate(rate));
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::SetVolume(volume));
        Ok(())
    }

    async fn replace_source(&mut self, url: &Url) -> Result<(), EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::ReplaceSource(url.clone()));
        Ok(())
    }

    async fn release(&mut self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall::Release);
        Ok(())
    }
}

struct NullHost;

impl HostEnvironment for NullHost {
    fn begin_background_task(&self) {}
    fn end_background_task(&self) {}
}

#[derive(Default)]
struct RecordingDisplay {
    last: Mutex<Option<NowPlayingInfo>>,
}

impl NowPlayingDisplay for RecordingDisplay {
    fn update(&self, info: &NowPlayingInfo) {
        *self.last.lock().unwrap() = Some(info.clone());
    }

    fn clear(&self) {
        *self.last.lock().unwrap() = None;
    }
}

struct Harness {
    command_tx: mpsc::Sender<PlayerCommand>,
    event_tx: mpsc::Sender<PlayerEvent>,
    notifications: broadcast::Receiver<PlayerNotification>,
    calls: Arc<Mutex<Vec<EngineCall>>>,
    display: Arc<RecordingDisplay>,
    player_task: tokio::task::JoinHandle<()>,
}

fn spawn_player(settings: PlayerSettings) -> Harness {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let engine = Box::new(ScriptedEngine {
        calls: calls.clone(),
    });
    let display = Arc::new(RecordingDisplay::default());

    let (mut player, command_tx) = Player::new(
        engine,
        Arc::new(NullHost),
        display.clone(),
        settings,
        16,
        64,
    );
    let event_tx = player.event_sender();
    let notifications = player.subscribe_notifications();
    let player_task = tokio::spawn(async move {
        player.run().await;
    });

    Harness {
        command_tx,
        event_tx,
        notifications,
        calls,
        display,
        player_task,
    }
}

fn test_items(names: &[&str]) -> Vec<Arc<AudioItem>> {
    names
        .iter()
        .map(|name| {
            let url = |tier: &str| {
                Url::parse(&format!("https://cdn.example.com/{}/{}.mp3", name, tier)).unwrap()
            };
            Arc::new(AudioItem {
                title: name.to_string(),
                artist: "Integration Artist".to_string(),
                album: "Integration Album".to_string(),
                track_number: Some(1),
                track_count: Some(3),
                artwork_url: None,
                sources: QualitySources {
                    low: url("low"),
                    medium: url("medium"),
                    high: url("high"),
                },
            })
        })
        .collect()
}

/// Waits for the next state-change notification, skipping everything else.
async fn next_state_change(
    notifications: &mut broadcast::Receiver<PlayerNotification>,
) -> (PlayerState, PlayerState) {
    loop {
        let notification = timeout(WAIT, notifications.recv())
            .await
            .expect("timed out waiting for a state change")
            .expect("notification channel closed");
        if let PlayerNotification::StateChanged { from, to } = notification {
            return (from, to);
        }
    }
}

async fn full_state(command_tx: &mpsc::Sender<PlayerCommand>) -> audiopilot::player::PlayerStateSnapshot {
    let (tx, rx) = oneshot::channel();
    command_tx
        .send(PlayerCommand::GetFullState(tx))
        .await
        .expect("player task gone");
    timeout(WAIT, rx).await.expect("timed out").expect("player task gone")
}

#[tokio::test]
async fn play_items_reaches_playing_through_buffering() {
    let mut harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["first", "second"]),
            start_index: 0,
        })
        .await
        .unwrap();

    assert_eq!(
        next_state_change(&mut harness.notifications).await,
        (PlayerState::Stopped, PlayerState::Buffering)
    );

    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::LikelyToKeepUp))
        .await
        .unwrap();
    assert_eq!(
        next_state_change(&mut harness.notifications).await,
        (PlayerState::Buffering, PlayerState::Playing)
    );

    let calls = harness.calls.lock().unwrap().clone();
    assert_eq!(
        calls[0],
        EngineCall::Load(Url::parse("https://cdn.example.com/first/medium.mp3").unwrap())
    );
    assert!(calls.contains(&EngineCall::Play));

    // The now-playing surface follows the current item.
    let info = harness.display.last.lock().unwrap().clone().unwrap();
    assert_eq!(info.title, "first");
}

#[tokio::test]
async fn connection_loss_waits_and_recovers() {
    let mut harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["remote"]),
            start_index: 0,
        })
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;
    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::LikelyToKeepUp))
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;

    harness
        .event_tx
        .send(PlayerEvent::Connectivity(ConnectivityEvent::Unreachable))
        .await
        .unwrap();
    assert_eq!(
        next_state_change(&mut harness.notifications).await,
        (PlayerState::Playing, PlayerState::WaitingForConnection)
    );

    harness
        .event_tx
        .send(PlayerEvent::Connectivity(ConnectivityEvent::Reachable))
        .await
        .unwrap();
    assert_eq!(
        next_state_change(&mut harness.notifications).await,
        (PlayerState::WaitingForConnection, PlayerState::Buffering)
    );

    // The current item was reloaded for the retry.
    let loads = harness
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| matches!(c, EngineCall::Load(_)))
        .count();
    assert_eq!(loads, 2);
}

#[tokio::test]
async fn next_at_end_leaves_selection_unchanged() {
    let harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a", "b"]),
            start_index: 1,
        })
        .await
        .unwrap();
    harness.command_tx.send(PlayerCommand::Next).await.unwrap();

    let snapshot = full_state(&harness.command_tx).await;
    assert_eq!(snapshot.current_index, Some(1));
    assert_eq!(snapshot.current_item.unwrap().title, "b");
}

#[tokio::test]
async fn next_at_end_wraps_under_repeat_all() {
    let mut settings = PlayerSettings::default();
    settings.mode = settings.mode.with_repeat_all(true);
    let harness = spawn_player(settings);

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a", "b"]),
            start_index: 1,
        })
        .await
        .unwrap();
    harness.command_tx.send(PlayerCommand::Next).await.unwrap();

    let snapshot = full_state(&harness.command_tx).await;
    assert_eq!(snapshot.current_index, Some(0));
    assert_eq!(snapshot.current_item.unwrap().title, "a");
}

#[tokio::test]
async fn has_next_follows_queue_and_mode() {
    let harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a", "b"]),
            start_index: 0,
        })
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    harness
        .command_tx
        .send(PlayerCommand::HasNext(tx))
        .await
        .unwrap();
    assert!(timeout(WAIT, rx).await.unwrap().unwrap());

    harness.command_tx.send(PlayerCommand::Next).await.unwrap();
    let (tx, rx) = oneshot::channel();
    harness
        .command_tx
        .send(PlayerCommand::HasNext(tx))
        .await
        .unwrap();
    assert!(!timeout(WAIT, rx).await.unwrap().unwrap());
}

#[tokio::test]
async fn remove_at_out_of_range_fails_loudly() {
    let harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a"]),
            start_index: 0,
        })
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    harness
        .command_tx
        .send(PlayerCommand::RemoveAt {
            index: 7,
            respond_to: tx,
        })
        .await
        .unwrap();
    let result = timeout(WAIT, rx).await.unwrap().unwrap();
    assert_eq!(result, Err(PlayerError::IndexOutOfRange { index: 7, len: 1 }));

    // Nothing was mutated.
    let snapshot = full_state(&harness.command_tx).await;
    assert_eq!(snapshot.queue_len, 1);
}

#[tokio::test]
async fn item_end_advances_and_reports_next_item() {
    let mut harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a", "b"]),
            start_index: 0,
        })
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;
    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::LikelyToKeepUp))
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;

    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::ItemEnded))
        .await
        .unwrap();
    assert_eq!(
        next_state_change(&mut harness.notifications).await,
        (PlayerState::Playing, PlayerState::Buffering)
    );

    let snapshot = full_state(&harness.command_tx).await;
    assert_eq!(snapshot.current_item.unwrap().title, "b");
}

#[tokio::test]
async fn stop_clears_queue_and_now_playing() {
    let mut harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a"]),
            start_index: 0,
        })
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;

    harness.command_tx.send(PlayerCommand::Stop).await.unwrap();
    assert_eq!(
        next_state_change(&mut harness.notifications).await,
        (PlayerState::Buffering, PlayerState::Stopped)
    );

    let snapshot = full_state(&harness.command_tx).await;
    assert_eq!(snapshot.queue_len, 0);
    assert!(snapshot.current_item.is_none());
    assert!(harness.display.last.lock().unwrap().is_none());
    assert!(harness.calls.lock().unwrap().contains(&EngineCall::Release));
}

#[tokio::test]
async fn shutdown_releases_engine_and_ends_task() {
    let harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::Shutdown)
        .await
        .unwrap();
    timeout(WAIT, harness.player_task)
        .await
        .expect("player task did not exit")
        .expect("player task panicked");

    assert!(harness.calls.lock().unwrap().contains(&EngineCall::Release));
}

#[tokio::test]
async fn duration_and_progress_flow_to_observers() {
    let mut harness = spawn_player(PlayerSettings::default());

    harness
        .command_tx
        .send(PlayerCommand::PlayItems {
            items: test_items(&["a"]),
            start_index: 0,
        })
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;
    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::LikelyToKeepUp))
        .await
        .unwrap();
    next_state_change(&mut harness.notifications).await;

    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::DurationKnown(
            Duration::from_secs(200),
        )))
        .await
        .unwrap();
    harness
        .event_tx
        .send(PlayerEvent::Engine(EngineEvent::PositionTick(
            Duration::from_secs(50),
        )))
        .await
        .unwrap();

    let mut saw_duration = false;
    let mut saw_progress = false;
    while !(saw_duration && saw_progress) {
        let notification = timeout(WAIT, harness.notifications.recv())
            .await
            .expect("timed out waiting for notifications")
            .expect("notification channel closed");
        match notification {
            PlayerNotification::DurationFound { duration, item } => {
                assert_eq!(duration, Duration::from_secs(200));
                assert_eq!(item.title, "a");
                saw_duration = true;
            }
            PlayerNotification::ProgressionUpdated { position, percent } => {
                assert_eq!(position, Duration::from_secs(50));
                assert!((percent - 25.0).abs() < 0.001);
                saw_progress = true;
            }
            _ => {}
        }
    }

    // Round-trip a query so the pending now-playing refresh has run.
    let _ = full_state(&harness.command_tx).await;
    let info = harness.display.last.lock().unwrap().clone().unwrap();
    assert_eq!(info.duration, Some(Duration::from_secs(200)));
    assert_eq!(info.elapsed, Duration::from_secs(50));
}
