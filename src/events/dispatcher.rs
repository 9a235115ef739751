use super::Notice;
use crate::db::UnitOfWork;
use crate::error::SubcastError;
use crate::event_queue::EventQueueHandle;
use crate::utils::logging::with_pretty_json_debug;
use std::sync::Arc;
use subcast_schema::Event;
use tracing::debug;

/// Routes notices to the queue shard owning their realm.
#[derive(Clone)]
pub struct EventDispatcher {
    shards: Arc<[EventQueueHandle]>,
}

impl EventDispatcher {
    pub fn new(shards: Vec<EventQueueHandle>) -> Self {
        Self {
            shards: shards.into(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_for_realm(&self, realm_id: i64) -> Result<&EventQueueHandle, SubcastError> {
        let count = i64::try_from(self.shards.len()).unwrap_or(i64::MAX);
        if count == 0 {
            return Err(SubcastError::QueueUnavailable(
                "no event queue shards running".to_string(),
            ));
        }
        let index = usize::try_from(realm_id.rem_euclid(count)).unwrap_or(0);
        self.shards.get(index).ok_or_else(|| {
            SubcastError::QueueUnavailable(format!("no event queue shard {index}"))
        })
    }

    /// Sends `event` to `users` now. An empty user list is a no-op.
    pub fn send_event(
        &self,
        realm_id: i64,
        event: Event,
        users: Vec<i64>,
    ) -> Result<(), SubcastError> {
        if users.is_empty() {
            return Ok(());
        }
        with_pretty_json_debug(&event, |pretty| {
            debug!(realm_id, users = ?users, event = %pretty, "dispatching event");
        });
        self.shard_for_realm(realm_id)?.deliver(Notice {
            realm_id,
            event,
            users,
        })
    }

    /// Defers [`Self::send_event`] until `uow` commits.
    pub fn send_event_on_commit(
        &self,
        uow: &mut UnitOfWork,
        realm_id: i64,
        event: Event,
        users: Vec<i64>,
    ) {
        if users.is_empty() {
            return;
        }
        let dispatcher = self.clone();
        uow.on_commit(move || dispatcher.send_event(realm_id, event, users));
    }
}
