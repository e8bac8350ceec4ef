// src/player/run_loop.rs
use super::state::PlayerCommand;
use super::{Player, PLAYER_LOG_TARGET};
use std::time::Instant;
use tracing::{error, info, trace};

/// Runs the player's command and event processing loop.
pub(crate) async fn run_player_loop(player: &mut Player) {
    info!(target: PLAYER_LOG_TARGET, "Player run loop started.");

    loop {
        tokio::select! {
            biased; // Check commands first

            // --- Command Processing ---
            Some(command) = player.command_rx.recv() => {
                trace!(target: PLAYER_LOG_TARGET, "Received command: {:?}", command);
                match command {
                    PlayerCommand::PlayItems { items, start_index } => {
                        let effects = player.core.play_items(items, start_index, Instant::now());
                        player.perform(effects).await;
                    }
                    PlayerCommand::AddItems { items } => {
                        let effects = player.core.add_items(items, Instant::now());
                        player.perform(effects).await;
                    }
                    PlayerCommand::RemoveAt { index, respond_to } => {
                        match player.core.remove_at(index, Instant::now()) {
                            Ok(effects) => {
                                let _ = respond_to.send(Ok(()));
                                player.perform(effects).await;
                            }
                            Err(e) => {
                                // Fail loudly, mutate nothing.
                                let _ = respond_to.send(Err(e));
                            }
                        }
                    }
                    PlayerCommand::Play => {
                        let effects = player.core.play(Instant::now());
                        player.perform(effects).await;
                    }
                    PlayerCommand::Pause => {
                        let effects = player.core.pause();
                        player.perform(effects).await;
                    }
                    PlayerCommand::Stop => {
                        let effects = player.core.stop();
                        player.perform(effects).await;
                    }
                    PlayerCommand::Next => {
                        let effects = player.core.next(Instant::now());
                        player.perform(effects).await;
                    }
                    PlayerCommand::Previous => {
                        let effects = player.core.previous(Instant::now());
                        player.perform(effects).await;
                    }
                    PlayerCommand::HasNext(respond_to) => {
                        let _ = respond_to.send(player.core.has_next()); // Ignore error if receiver dropped
                    }
                    PlayerCommand::SeekTo(to) => {
                        let effects = player.core.seek_to(to);
                        player.perform(effects).await;
                    }
                    PlayerCommand::SetMode(mode) => {
                        let effects = player.core.set_mode(mode);
                        player.perform(effects).await;
                    }
                    PlayerCommand::SetRate(rate) => {
                        let effects = player.core.set_rate(rate);
                        player.perform(effects).await;
                    }
                    PlayerCommand::SetVolume(volume) => {
                        let effects = player.core.set_volume(volume);
                        player.perform(effects).await;
                    }
                    PlayerCommand::Remote(remote) => {
                        let effects = player.core.remote(remote, Instant::now());
                        player.perform(effects).await;
                    }
                    PlayerCommand::GetFullState(respond_to) => {
                        let _ = respond_to.send(player.core.snapshot()); // Ignore error if receiver dropped
                    }
                    PlayerCommand::Shutdown => {
                        info!(target: PLAYER_LOG_TARGET, "Shutdown command received. Exiting run loop.");
                        let effects = player.core.stop();
                        player.perform(effects).await;
                        break;
                    }
                }
            }

            // --- Collaborator Events ---
            Some(event) = player.event_rx.recv() => {
                trace!(target: PLAYER_LOG_TARGET, "Received event: {:?}", event);
                let effects = player.core.apply(event, Instant::now());
                player.perform(effects).await;
            }

            else => {
                // All channels closed, break the loop
                info!(target: PLAYER_LOG_TARGET, "Command channel closed. Exiting run loop.");
                break;
            }
        }
    }

    info!(target: PLAYER_LOG_TARGET, "Player run loop finished. Performing final cleanup.");
    // 1. No timer callback may fire into torn-down state.
    player.retry_timer.cancel();
    player.quality_timer.cancel();
    // 2. Explicitly release the playback engine.
    if let Err(e) = player.engine.release().await {
        error!(target: PLAYER_LOG_TARGET, "Error releasing playback engine: {}", e);
    }
    info!(target: PLAYER_LOG_TARGET, "Player task cleanup complete.");
}
