//! Abandoned-room sweeper.
//!
//! Rooms whose last participant left more than a TTL ago are deleted on
//! a fixed cadence. Runs as a background task beside the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::common::time::Clock;
use crate::domain::{RoomRepository, Timestamp};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// How long an empty room may linger before deletion.
    pub room_ttl: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            room_ttl: Duration::from_secs(600),
        }
    }
}

pub struct RoomSweeper {
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
    config: SweepConfig,
}

impl RoomSweeper {
    pub fn new(rooms: Arc<dyn RoomRepository>, clock: Arc<dyn Clock>, config: SweepConfig) -> Self {
        Self {
            rooms,
            clock,
            config,
        }
    }

    /// Sweep forever. Spawn on its own task.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// One sweep pass. Store failures are logged and retried on the
    /// next tick.
    pub async fn sweep_once(&self) {
        let cutoff =
            Timestamp::new(self.clock.now_millis() - self.config.room_ttl.as_millis() as i64);
        match self.rooms.delete_abandoned_rooms(cutoff).await {
            Ok(0) => {}
            Ok(deleted) => tracing::info!("Deleted {} abandoned room(s)", deleted),
            Err(e) => tracing::warn!("Abandoned-room sweep failed: {}", e),
        }
    }
}
