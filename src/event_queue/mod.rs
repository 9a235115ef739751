//! Long-poll event queues, sharded across actors by realm.

mod actor;
mod queue;

pub use actor::{EventQueueHandle, FetchRequest, QueueStats, RegisterClient, spawn};
pub use queue::{ClientDescriptor, Delivery, EventQueue, FetchOutcome, QueueFull};

use crate::config::EventQueueConfig;
use crate::error::SubcastError;

/// Spawns `cfg.shards` queue actors (at least one).
pub async fn spawn_shards(cfg: &EventQueueConfig) -> Result<Vec<EventQueueHandle>, SubcastError> {
    let count = cfg.shards.max(1);
    let mut shards = Vec::with_capacity(count);
    for shard in 0..count {
        shards.push(spawn(shard, cfg.clone()).await?);
    }
    Ok(shards)
}
