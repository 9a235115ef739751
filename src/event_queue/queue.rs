use ahash::AHashSet;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use subcast_schema::{Event, QueuedEvent};
use tokio::sync::oneshot;

/// Ordered, prunable list of pending events for one client.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<QueuedEvent>,
    next_event_id: i64,
    max_len: usize,
}

/// Returned by [`EventQueue::push`] when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl EventQueue {
    pub fn new(max_len: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_event_id: 0,
            max_len: max_len.max(1),
        }
    }

    pub fn push(&mut self, event: Event) -> Result<i64, QueueFull> {
        if self.events.len() >= self.max_len {
            return Err(QueueFull);
        }
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.events.push_back(QueuedEvent { id, event });
        Ok(id)
    }

    /// Drops every event with `id <= through_id`.
    pub fn prune(&mut self, through_id: i64) {
        while self
            .events
            .front()
            .is_some_and(|queued| queued.id <= through_id)
        {
            self.events.pop_front();
        }
    }

    pub fn contents(&self) -> Vec<QueuedEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// A parked long-poll request.
#[derive(Debug)]
pub struct Waiter {
    pub id: u64,
    sender: oneshot::Sender<Vec<QueuedEvent>>,
}

impl Waiter {
    /// Hands `events` to the parked request. Returns false if it already hung up.
    fn finish(self, events: Vec<QueuedEvent>) -> bool {
        self.sender.send(events).is_ok()
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Ready(Vec<QueuedEvent>),
    Async {
        waiter_id: u64,
        receiver: oneshot::Receiver<Vec<QueuedEvent>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Filtered,
    Queued,
    Woke,
    Overflowed,
}

/// One registered client: its queue plus the bookkeeping for GC and long-polls.
#[derive(Debug)]
pub struct ClientDescriptor {
    pub queue_id: String,
    pub user_id: i64,
    pub realm_id: i64,
    event_types: Option<AHashSet<String>>,
    pub lifespan: Duration,
    pub last_connection: Instant,
    queue: EventQueue,
    waiter: Option<Waiter>,
}

impl ClientDescriptor {
    pub fn new(
        queue_id: String,
        user_id: i64,
        realm_id: i64,
        event_types: Option<Vec<String>>,
        lifespan: Duration,
        max_queue_len: usize,
    ) -> Self {
        Self {
            queue_id,
            user_id,
            realm_id,
            event_types: event_types.map(|types| types.into_iter().collect()),
            lifespan,
            last_connection: Instant::now(),
            queue: EventQueue::new(max_queue_len),
            waiter: None,
        }
    }

    pub fn accepts(&self, event: &Event) -> bool {
        match (&self.event_types, event) {
            (_, Event::Heartbeat) => true,
            (None, _) => true,
            (Some(types), event) => types.contains(event.kind()),
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn has_waiter(&self) -> bool {
        self.waiter.is_some()
    }

    /// Queues `event` and wakes the parked request, if any.
    pub fn deliver(&mut self, event: Event) -> Delivery {
        if !self.accepts(&event) {
            return Delivery::Filtered;
        }
        if self.queue.push(event).is_err() {
            // Dropping the waiter fails the parked request with a closed channel.
            self.waiter = None;
            return Delivery::Overflowed;
        }
        match self.waiter.take() {
            Some(waiter) => {
                self.last_connection = Instant::now();
                if waiter.finish(self.queue.contents()) {
                    Delivery::Woke
                } else {
                    Delivery::Queued
                }
            }
            None => Delivery::Queued,
        }
    }

    /// Acknowledges through `last_event_id`, then answers now or parks a waiter.
    /// A previously parked request is finished with an empty list.
    pub fn fetch(
        &mut self,
        last_event_id: Option<i64>,
        dont_block: bool,
        waiter_id: u64,
    ) -> FetchOutcome {
        if let Some(through) = last_event_id {
            self.queue.prune(through);
        }
        self.last_connection = Instant::now();
        if let Some(previous) = self.waiter.take() {
            previous.finish(Vec::new());
        }

        if dont_block || !self.queue.is_empty() {
            return FetchOutcome::Ready(self.queue.contents());
        }

        let (sender, receiver) = oneshot::channel();
        self.waiter = Some(Waiter {
            id: waiter_id,
            sender,
        });
        FetchOutcome::Async {
            waiter_id,
            receiver,
        }
    }

    /// Pushes a heartbeat if `waiter_id` is still the parked request.
    pub fn heartbeat(&mut self, waiter_id: u64) -> Delivery {
        if self.waiter.as_ref().map(|w| w.id) != Some(waiter_id) {
            return Delivery::Filtered;
        }
        self.deliver(Event::Heartbeat)
    }

    /// Forgets the parked request `waiter_id` after its client went away.
    pub fn detach(&mut self, waiter_id: u64) -> bool {
        if self.waiter.as_ref().map(|w| w.id) == Some(waiter_id) {
            self.waiter = None;
            self.last_connection = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.waiter.is_none() && now.saturating_duration_since(self.last_connection) > self.lifespan
    }
}
