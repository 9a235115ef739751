use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Long-poll event queue configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventQueueConfig {
    /// Number of queue shard actors; realms are assigned by `realm_id mod shards`.
    /// TOML: `event_queue.shards`. Default: `1`.
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Seconds a held `GET /events` waits before answering with a heartbeat.
    /// TOML: `event_queue.heartbeat_secs`. Default: `45`.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Idle lifespan of a queue when the client does not ask for one.
    /// TOML: `event_queue.default_lifespan_secs`. Default: `600`.
    #[serde(default = "default_lifespan_secs")]
    pub default_lifespan_secs: u64,

    /// Upper bound for client-requested lifespans.
    /// TOML: `event_queue.max_lifespan_secs`. Default: `604800` (7 days).
    #[serde(default = "default_max_lifespan_secs")]
    pub max_lifespan_secs: u64,

    /// Interval of the idle-queue sweep.
    /// TOML: `event_queue.gc_interval_secs`. Default: `60`.
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,

    /// Pending events a queue may hold before it is invalidated.
    /// TOML: `event_queue.max_queue_len`. Default: `10000`.
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            heartbeat_secs: default_heartbeat_secs(),
            default_lifespan_secs: default_lifespan_secs(),
            max_lifespan_secs: default_max_lifespan_secs(),
            gc_interval_secs: default_gc_interval_secs(),
            max_queue_len: default_max_queue_len(),
        }
    }
}

impl EventQueueConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs.max(1))
    }

    /// Effective lifespan for a client request; `None` or 0 selects the default.
    pub fn lifespan_for(&self, requested_secs: Option<u64>) -> Duration {
        let floor = self.default_lifespan_secs;
        let ceiling = self.max_lifespan_secs.max(floor);
        let secs = match requested_secs {
            None | Some(0) => floor,
            Some(secs) => secs.clamp(floor, ceiling),
        };
        Duration::from_secs(secs)
    }
}

fn default_shards() -> usize {
    1
}

fn default_heartbeat_secs() -> u64 {
    45
}

fn default_lifespan_secs() -> u64 {
    600
}

fn default_max_lifespan_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_gc_interval_secs() -> u64 {
    60
}

fn default_max_queue_len() -> usize {
    10_000
}
