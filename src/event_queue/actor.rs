use super::queue::{ClientDescriptor, Delivery, FetchOutcome};
use crate::config::EventQueueConfig;
use crate::error::SubcastError;
use crate::events::Notice;
use ahash::{AHashMap, AHashSet};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::time::{Duration, Instant};
use subcast_schema::QueuedEvent;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RegisterClient {
    pub user_id: i64,
    pub realm_id: i64,
    pub event_types: Option<Vec<String>>,
    /// Requested idle lifespan; clamped by the shard's config.
    pub lifespan_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub queue_id: String,
    pub user_id: i64,
    pub last_event_id: Option<i64>,
    pub dont_block: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub clients: usize,
    pub waiting: usize,
    pub queued_events: usize,
}

#[derive(Debug)]
pub enum EventQueueMessage {
    /// Create a client queue and return its id.
    Register(RegisterClient, RpcReplyPort<String>),

    /// Acknowledge and read a queue, possibly parking a waiter.
    Fetch(FetchRequest, RpcReplyPort<Result<FetchOutcome, SubcastError>>),

    /// Fan a committed notice out to the matching queues.
    Deliver(Notice),

    /// A parked request timed out; push a heartbeat to it.
    Heartbeat { queue_id: String, waiter_id: u64 },

    /// A parked request's client disconnected.
    Detach { queue_id: String, waiter_id: u64 },

    /// Drop a queue (queue id, owning user id) on the owner's request.
    Delete(String, i64, RpcReplyPort<Result<(), SubcastError>>),

    // Internal messages (sent by the shard's own ticker)
    /// Remove queues idle past their lifespan.
    GarbageCollect,

    Stats(RpcReplyPort<QueueStats>),
}

/// Handle for one event queue shard.
#[derive(Clone)]
pub struct EventQueueHandle {
    actor: ActorRef<EventQueueMessage>,
}

impl EventQueueHandle {
    pub async fn register(&self, register: RegisterClient) -> Result<String, SubcastError> {
        ractor::call!(self.actor, EventQueueMessage::Register, register)
            .map_err(|e| SubcastError::QueueUnavailable(format!("Register RPC failed: {e}")))
    }

    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome, SubcastError> {
        ractor::call!(self.actor, EventQueueMessage::Fetch, request)
            .map_err(|e| SubcastError::QueueUnavailable(format!("Fetch RPC failed: {e}")))?
    }

    pub fn deliver(&self, notice: Notice) -> Result<(), SubcastError> {
        ractor::cast!(self.actor, EventQueueMessage::Deliver(notice))
            .map_err(|e| SubcastError::QueueUnavailable(format!("Deliver cast failed: {e}")))
    }

    pub fn heartbeat(&self, queue_id: &str, waiter_id: u64) {
        let _ = ractor::cast!(
            self.actor,
            EventQueueMessage::Heartbeat {
                queue_id: queue_id.to_string(),
                waiter_id
            }
        );
    }

    pub fn detach(&self, queue_id: &str, waiter_id: u64) {
        let _ = ractor::cast!(
            self.actor,
            EventQueueMessage::Detach {
                queue_id: queue_id.to_string(),
                waiter_id
            }
        );
    }

    pub async fn delete(&self, queue_id: &str, user_id: i64) -> Result<(), SubcastError> {
        ractor::call!(
            self.actor,
            EventQueueMessage::Delete,
            queue_id.to_string(),
            user_id
        )
        .map_err(|e| SubcastError::QueueUnavailable(format!("Delete RPC failed: {e}")))?
    }

    pub fn garbage_collect(&self) {
        let _ = ractor::cast!(self.actor, EventQueueMessage::GarbageCollect);
    }

    pub async fn stats(&self) -> Result<QueueStats, SubcastError> {
        ractor::call!(self.actor, EventQueueMessage::Stats)
            .map_err(|e| SubcastError::QueueUnavailable(format!("Stats RPC failed: {e}")))
    }

    /// Long-poll read: answers immediately when possible, otherwise holds
    /// until a delivery or the heartbeat interval. Dropping the returned
    /// future detaches the parked waiter.
    pub async fn get_events(
        &self,
        request: FetchRequest,
        heartbeat: Duration,
    ) -> Result<Vec<QueuedEvent>, SubcastError> {
        let queue_id = request.queue_id.clone();
        let (waiter_id, mut receiver) = match self.fetch(request).await? {
            FetchOutcome::Ready(events) => return Ok(events),
            FetchOutcome::Async {
                waiter_id,
                receiver,
            } => (waiter_id, receiver),
        };

        let mut guard = WaiterGuard {
            handle: self.clone(),
            queue_id: queue_id.clone(),
            waiter_id,
            armed: true,
        };

        let timer = tokio::time::sleep(heartbeat);
        tokio::pin!(timer);
        let mut heartbeat_sent = false;
        let received = loop {
            tokio::select! {
                res = &mut receiver => break res,
                _ = &mut timer, if !heartbeat_sent => {
                    heartbeat_sent = true;
                    debug!(queue_id = %queue_id, waiter_id, "long-poll heartbeat");
                    self.heartbeat(&queue_id, waiter_id);
                }
            }
        };
        guard.armed = false;

        // A closed channel means the queue went away while we were parked.
        received.map_err(|_| SubcastError::BadEventQueueId(queue_id))
    }
}

/// Detaches a parked waiter when the long-poll future is dropped early.
struct WaiterGuard {
    handle: EventQueueHandle,
    queue_id: String,
    waiter_id: u64,
    armed: bool,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!(queue_id = %self.queue_id, waiter_id = self.waiter_id, "long-poll client went away");
            self.handle.detach(&self.queue_id, self.waiter_id);
        }
    }
}

struct EventQueueState {
    shard: usize,
    cfg: EventQueueConfig,
    clients: AHashMap<String, ClientDescriptor>,
    by_user: AHashMap<i64, Vec<String>>,
    next_waiter_id: u64,
    gc_ticker: Option<JoinHandle<()>>,
}

impl EventQueueState {
    fn remove_client(&mut self, queue_id: &str) -> Option<ClientDescriptor> {
        let client = self.clients.remove(queue_id)?;
        if let Some(ids) = self.by_user.get_mut(&client.user_id) {
            ids.retain(|id| id != queue_id);
            if ids.is_empty() {
                self.by_user.remove(&client.user_id);
            }
        }
        Some(client)
    }

    fn register(&mut self, register: RegisterClient) -> String {
        let queue_id = Uuid::new_v4().to_string();
        let lifespan = self.cfg.lifespan_for(register.lifespan_secs);
        let client = ClientDescriptor::new(
            queue_id.clone(),
            register.user_id,
            register.realm_id,
            register.event_types,
            lifespan,
            self.cfg.max_queue_len,
        );
        self.by_user
            .entry(register.user_id)
            .or_default()
            .push(queue_id.clone());
        self.clients.insert(queue_id.clone(), client);
        info!(
            shard = self.shard,
            queue_id = %queue_id,
            user_id = register.user_id,
            lifespan_secs = lifespan.as_secs(),
            "event queue registered"
        );
        queue_id
    }

    fn fetch(&mut self, request: FetchRequest) -> Result<FetchOutcome, SubcastError> {
        self.next_waiter_id += 1;
        let waiter_id = self.next_waiter_id;
        match self.clients.get_mut(&request.queue_id) {
            Some(client) if client.user_id == request.user_id => Ok(client.fetch(
                request.last_event_id,
                request.dont_block,
                waiter_id,
            )),
            _ => Err(SubcastError::BadEventQueueId(request.queue_id)),
        }
    }

    fn deliver(&mut self, notice: Notice) {
        debug!(
            shard = self.shard,
            realm_id = notice.realm_id,
            kind = notice.event.kind(),
            op = notice.event.op().unwrap_or("-"),
            users = notice.users.len(),
            "delivering notice"
        );
        let mut overflowed = Vec::new();
        let users: AHashSet<i64> = notice.users.iter().copied().collect();
        for user_id in users {
            let Some(queue_ids) = self.by_user.get(&user_id) else {
                continue;
            };
            for queue_id in queue_ids {
                let Some(client) = self.clients.get_mut(queue_id) else {
                    continue;
                };
                if client.realm_id != notice.realm_id {
                    continue;
                }
                if client.deliver(notice.event.clone()) == Delivery::Overflowed {
                    overflowed.push(queue_id.clone());
                }
            }
        }
        for queue_id in overflowed {
            warn!(shard = self.shard, queue_id = %queue_id, "event queue overflowed, dropping it");
            self.remove_client(&queue_id);
        }
    }

    fn heartbeat(&mut self, queue_id: &str, waiter_id: u64) {
        let overflowed = match self.clients.get_mut(queue_id) {
            Some(client) => client.heartbeat(waiter_id) == Delivery::Overflowed,
            None => false,
        };
        if overflowed {
            warn!(shard = self.shard, queue_id = %queue_id, "event queue overflowed, dropping it");
            self.remove_client(queue_id);
        }
    }

    fn garbage_collect(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .clients
            .values()
            .filter(|client| client.is_expired(now))
            .map(|client| client.queue_id.clone())
            .collect();
        for queue_id in &expired {
            self.remove_client(queue_id);
        }
        if !expired.is_empty() {
            info!(
                shard = self.shard,
                removed = expired.len(),
                remaining = self.clients.len(),
                "garbage collected idle event queues"
            );
        }
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            clients: self.clients.len(),
            waiting: self.clients.values().filter(|c| c.has_waiter()).count(),
            queued_events: self.clients.values().map(|c| c.queue().len()).sum(),
        }
    }
}

struct EventQueueActor;

#[ractor::async_trait]
impl Actor for EventQueueActor {
    type Msg = EventQueueMessage;
    type State = EventQueueState;
    type Arguments = (usize, EventQueueConfig);

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        (shard, cfg): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let period = cfg.gc_interval();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if myself.cast(EventQueueMessage::GarbageCollect).is_err() {
                    break;
                }
            }
        });

        info!(
            shard,
            heartbeat_secs = cfg.heartbeat_secs,
            gc_interval_secs = cfg.gc_interval_secs,
            "EventQueueActor initialized"
        );
        Ok(EventQueueState {
            shard,
            cfg,
            clients: AHashMap::new(),
            by_user: AHashMap::new(),
            next_waiter_id: 0,
            gc_ticker: Some(ticker),
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.gc_ticker.take() {
            ticker.abort();
        }
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            EventQueueMessage::Register(register, reply) => {
                let _ = reply.send(state.register(register));
            }
            EventQueueMessage::Fetch(request, reply) => {
                let _ = reply.send(state.fetch(request));
            }
            EventQueueMessage::Deliver(notice) => state.deliver(notice),
            EventQueueMessage::Heartbeat {
                queue_id,
                waiter_id,
            } => state.heartbeat(&queue_id, waiter_id),
            EventQueueMessage::Detach {
                queue_id,
                waiter_id,
            } => {
                if let Some(client) = state.clients.get_mut(&queue_id) {
                    client.detach(waiter_id);
                }
            }
            EventQueueMessage::Delete(queue_id, user_id, reply) => {
                let owned = state
                    .clients
                    .get(&queue_id)
                    .is_some_and(|client| client.user_id == user_id);
                let res = if owned {
                    state.remove_client(&queue_id);
                    info!(shard = state.shard, queue_id = %queue_id, "event queue deleted");
                    Ok(())
                } else {
                    Err(SubcastError::BadEventQueueId(queue_id))
                };
                let _ = reply.send(res);
            }
            EventQueueMessage::GarbageCollect => state.garbage_collect(),
            EventQueueMessage::Stats(reply) => {
                let _ = reply.send(state.stats());
            }
        }
        Ok(())
    }
}

/// Spawn one queue shard and return a cloneable handle.
pub async fn spawn(shard: usize, cfg: EventQueueConfig) -> Result<EventQueueHandle, SubcastError> {
    let (actor, _jh) = Actor::spawn(None, EventQueueActor, (shard, cfg))
        .await
        .map_err(|e| SubcastError::RactorError(format!("failed to spawn EventQueueActor: {e}")))?;
    Ok(EventQueueHandle { actor })
}
