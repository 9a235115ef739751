//! Request and response bodies of the HTTP API.

use crate::events::{QueuedEvent, SubscriptionInfo};
use crate::role::UserRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Success envelope: `{"result": "success", "msg": "", ...data}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Success<T> {
    pub result: String,
    pub msg: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Self {
            result: "success".to_string(),
            msg: String::new(),
            data,
        }
    }
}

/// Error envelope: `{"result": "error", "msg": "...", "code": "..."}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub result: String,
    pub msg: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            result: "error".to_string(),
            msg: msg.into(),
            code: code.into(),
            queue_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscribeRequest {
    pub subscriptions: Vec<StreamSpec>,
    /// User ids to subscribe; defaults to the caller.
    #[serde(default)]
    pub principals: Option<Vec<i64>>,
    /// Privacy of streams created by this request.
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub is_web_public: bool,
    #[serde(default)]
    pub history_public_to_subscribers: Option<bool>,
}

/// Stream names keyed by the (stringified) user id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SubscribeResponse {
    pub subscribed: BTreeMap<String, Vec<String>>,
    pub already_subscribed: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnsubscribeRequest {
    pub subscriptions: Vec<String>,
    #[serde(default)]
    pub principals: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UnsubscribeResponse {
    pub removed: Vec<String>,
    pub not_removed: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyChange {
    pub stream_id: i64,
    pub property: String,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyChangeRequest {
    pub subscription_data: Vec<PropertyChange>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<SubscriptionInfo>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscribersResponse {
    pub subscribers: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReactivateStreamRequest {
    pub new_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegisterRequest {
    /// Restrict the queue to these event `type`s; `None` accepts everything.
    #[serde(default)]
    pub event_types: Option<Vec<String>>,
    /// Idle lifespan of the queue; 0 or absent selects the server default.
    #[serde(default)]
    pub lifespan_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterResponse {
    pub queue_id: String,
    pub last_event_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<Vec<SubscriptionInfo>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetEventsQuery {
    pub queue_id: String,
    #[serde(default)]
    pub last_event_id: Option<i64>,
    #[serde(default)]
    pub dont_block: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetEventsResponse {
    pub events: Vec<QueuedEvent>,
    pub queue_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealmCreateRequest {
    pub string_id: String,
    pub name: String,
    #[serde(default)]
    pub guests_can_access_all_users: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealmInfo {
    pub realm_id: i64,
    pub string_id: String,
    pub name: String,
    pub guests_can_access_all_users: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserCreateRequest {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserCreated {
    pub user_id: i64,
    pub api_key: String,
}
