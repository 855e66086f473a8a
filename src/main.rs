//! Rail Clash Headless Client
//!
//! Connects to the game server and runs the board simulation at the
//! configured frame rate, logging board events as they happen.

use std::time::Duration;

use anyhow::Context;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use rail_clash::{
    game::events::{BoardEvent, BoardEventData},
    network::client::{connect, ConnectionConfig},
    GameConfig, GameState, Millis, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let game_config = GameConfig::from_env();
    let connection_config = ConnectionConfig::from_env();

    info!("Rail Clash client v{}", VERSION);
    info!("Tick Rate: {} Hz", game_config.tick_rate);
    info!(
        "Train: {} px/s, scroll {} ms, tie-break {:?}",
        game_config.rail.train_speed,
        game_config.rail.scroll_ms(),
        game_config.rail.tie_break
    );

    let mut connection = connect(&connection_config)
        .await
        .with_context(|| format!("failed to connect to {}", connection_config.url))?;
    let mut game = GameState::new(game_config, connection.outbox.clone());

    let tick_duration = Duration::from_micros(1_000_000 / game_config.tick_rate as u64);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report_interval = interval(Duration::from_secs(10));
    let mut last_frame = Instant::now();

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let now = Instant::now();
                let delta = now.duration_since(last_frame).as_millis() as Millis;
                last_frame = now;

                let result = game.tick(delta);
                for event in &result.events {
                    log_event(event);
                }
            }
            inbound = connection.inbound.recv() => {
                match inbound {
                    Some(message) => game.handle_message(message),
                    None => {
                        info!("Server connection closed");
                        break;
                    }
                }
            }
            _ = report_interval.tick() => {
                let fps = game.average_fps().unwrap_or(0.0);
                match game.compute_hash() {
                    Ok(hash) => info!("{:.1} fps, state hash {}", fps, hex::encode(&hash[..8])),
                    Err(e) => error!("Failed to hash state: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    connection.close();
    Ok(())
}

fn log_event(event: &BoardEvent) {
    match &event.data {
        BoardEventData::EventActivated { rail, kind, reached_at, .. } => {
            info!("[{}] {} rail {}: {} reaches train at {}", event.at, event.owner, rail, kind, reached_at);
        }
        BoardEventData::SabotageSettled { rail, outcome } => {
            info!("[{}] {} rail {}: sabotage {:?}", event.at, event.owner, rail, outcome);
        }
        BoardEventData::Regenerated { heal } => {
            info!("[{}] {} regenerated {}", event.at, event.owner, heal);
        }
        BoardEventData::EventResolved { .. } | BoardEventData::RailUnblocked { .. } => {
            debug!("[{}] {} {:?}", event.at, event.owner, event.data);
        }
    }
}
