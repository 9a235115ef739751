//! Wire shapes of the events delivered through long-poll queues.
//!
//! Every event serializes as a flat JSON object tagged with `type` and, for
//! categories with several operations, `op`:
//!
//! ```json
//! {"type": "subscription", "op": "peer_add", "stream_ids": [3], "user_ids": [9]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Subscription(SubscriptionEvent),
    Stream(StreamEvent),
    RealmUser(RealmUserEvent),
    Heartbeat,
}

impl Event {
    /// The `type` tag, used for per-queue event type filters.
    pub const fn kind(&self) -> &'static str {
        match self {
            Event::Subscription(_) => "subscription",
            Event::Stream(_) => "stream",
            Event::RealmUser(_) => "realm_user",
            Event::Heartbeat => "heartbeat",
        }
    }

    /// The `op` tag, if the category has one.
    pub const fn op(&self) -> Option<&'static str> {
        match self {
            Event::Subscription(SubscriptionEvent::Add { .. }) => Some("add"),
            Event::Subscription(SubscriptionEvent::Remove { .. }) => Some("remove"),
            Event::Subscription(SubscriptionEvent::PeerAdd { .. }) => Some("peer_add"),
            Event::Subscription(SubscriptionEvent::PeerRemove { .. }) => Some("peer_remove"),
            Event::Subscription(SubscriptionEvent::Update { .. }) => Some("update"),
            Event::Stream(StreamEvent::Create { .. }) => Some("create"),
            Event::Stream(StreamEvent::Delete { .. }) => Some("delete"),
            Event::RealmUser(RealmUserEvent::Add { .. }) => Some("add"),
            Event::RealmUser(RealmUserEvent::Remove { .. }) => Some("remove"),
            Event::Heartbeat => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Add {
        subscriptions: Vec<SubscriptionInfo>,
    },
    Remove {
        subscriptions: Vec<RemovedSubscription>,
    },
    PeerAdd {
        stream_ids: Vec<i64>,
        user_ids: Vec<i64>,
    },
    PeerRemove {
        stream_ids: Vec<i64>,
        user_ids: Vec<i64>,
    },
    Update {
        stream_id: i64,
        property: String,
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StreamEvent {
    Create {
        streams: Vec<StreamInfo>,
    },
    Delete {
        streams: Vec<StreamInfo>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RealmUserEvent {
    Add { person: PersonInfo },
    Remove { person: RemovedPerson },
}

/// Stream fields shared by stream events and subscription objects.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamInfo {
    pub stream_id: i64,
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: i32,
    pub message_retention_days: Option<i32>,
    /// Unix timestamp, seconds.
    pub date_created: i64,
}

/// A subscription as seen by its owner.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionInfo {
    #[serde(flatten)]
    pub stream: StreamInfo,
    pub color: String,
    pub is_muted: bool,
    pub pin_to_top: bool,
    pub desktop_notifications: Option<bool>,
    pub audible_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub email_notifications: Option<bool>,
    pub wildcard_mentions_notify: Option<bool>,
    pub subscribers: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemovedSubscription {
    pub name: String,
    pub stream_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersonInfo {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub role: i32,
    pub is_admin: bool,
    pub is_guest: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemovedPerson {
    pub user_id: i64,
    pub full_name: String,
}

/// An event as stored in a client queue, carrying its queue-local id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueuedEvent {
    pub id: i64,
    #[serde(flatten)]
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn peer_add_serializes_flat_with_type_and_op() {
        let event = Event::Subscription(SubscriptionEvent::PeerAdd {
            stream_ids: vec![3],
            user_ids: vec![7, 9],
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "subscription", "op": "peer_add", "stream_ids": [3], "user_ids": [7, 9]})
        );
        assert_eq!(event.kind(), "subscription");
        assert_eq!(event.op(), Some("peer_add"));
    }

    #[test]
    fn heartbeat_has_no_op() {
        let value = serde_json::to_value(Event::Heartbeat).unwrap();
        assert_eq!(value, json!({"type": "heartbeat"}));
        assert_eq!(Event::Heartbeat.op(), None);
    }

    #[test]
    fn queued_event_carries_id_next_to_tags() {
        let queued = QueuedEvent {
            id: 4,
            event: Event::RealmUser(RealmUserEvent::Remove {
                person: RemovedPerson {
                    user_id: 2,
                    full_name: "Iago".to_string(),
                },
            }),
        };

        let value = serde_json::to_value(&queued).unwrap();
        assert_eq!(value["id"], 4);
        assert_eq!(value["type"], "realm_user");
        assert_eq!(value["op"], "remove");
        assert_eq!(value["person"]["full_name"], "Iago");

        let parsed: QueuedEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, queued);
    }
}
