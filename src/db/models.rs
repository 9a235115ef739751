use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeSet;
use subcast_schema::{PersonInfo, RemovedPerson, StreamInfo, SubscriptionInfo, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbRealm {
    pub id: i64,
    pub string_id: String,
    pub name: String,
    pub guests_can_access_all_users: bool,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub realm_id: i64,
    pub email: String,
    pub full_name: String,
    /// Stored `UserRole` value; unknown values are treated as guests.
    pub role: i32,
    pub is_active: bool,
    pub api_key: String,
    pub date_joined: DateTime<Utc>,
}

impl DbUser {
    pub fn role(&self) -> UserRole {
        UserRole::from_i32(self.role).unwrap_or(UserRole::Guest)
    }

    pub fn is_guest(&self) -> bool {
        self.role().is_guest()
    }

    pub fn is_realm_admin(&self) -> bool {
        self.role().is_realm_admin()
    }

    pub fn person(&self) -> PersonInfo {
        PersonInfo {
            user_id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            is_admin: self.is_realm_admin(),
            is_guest: self.is_guest(),
            is_active: self.is_active,
        }
    }

    pub fn removed_person(&self) -> RemovedPerson {
        RemovedPerson {
            user_id: self.id,
            full_name: self.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbStream {
    pub id: i64,
    pub realm_id: i64,
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: i32,
    pub message_retention_days: Option<i32>,
    pub recipient_id: Option<i64>,
    pub deactivated: bool,
    pub date_created: DateTime<Utc>,
}

impl DbStream {
    /// Public and web-public streams share one visibility policy.
    pub fn is_public(&self) -> bool {
        !self.invite_only
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            stream_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            invite_only: self.invite_only,
            is_web_public: self.is_web_public,
            history_public_to_subscribers: self.history_public_to_subscribers,
            stream_post_policy: self.stream_post_policy,
            message_retention_days: self.message_retention_days,
            date_created: self.date_created.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbSubscription {
    pub id: i64,
    pub user_id: i64,
    pub recipient_id: i64,
    pub active: bool,
    pub color: String,
    pub is_muted: bool,
    pub pin_to_top: bool,
    pub desktop_notifications: Option<bool>,
    pub audible_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub email_notifications: Option<bool>,
    pub wildcard_mentions_notify: Option<bool>,
}

impl DbSubscription {
    /// The subscription as its owner sees it.
    pub fn info(&self, stream: &DbStream, subscribers: &BTreeSet<i64>) -> SubscriptionInfo {
        SubscriptionInfo {
            stream: stream.info(),
            color: self.color.clone(),
            is_muted: self.is_muted,
            pin_to_top: self.pin_to_top,
            desktop_notifications: self.desktop_notifications,
            audible_notifications: self.audible_notifications,
            push_notifications: self.push_notifications,
            email_notifications: self.email_notifications,
            wildcard_mentions_notify: self.wildcard_mentions_notify,
            subscribers: subscribers.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbRealmAuditLog {
    pub id: i64,
    pub realm_id: i64,
    pub acting_user_id: Option<i64>,
    pub modified_user_id: Option<i64>,
    pub modified_stream_id: Option<i64>,
    pub event_type: i32,
    pub event_time: DateTime<Utc>,
    /// JSON object text.
    pub extra_data: String,
}

impl DbRealmAuditLog {
    pub fn kind(&self) -> Option<AuditEventType> {
        AuditEventType::from_i32(self.event_type)
    }

    pub fn extra(&self) -> Value {
        serde_json::from_str(&self.extra_data).unwrap_or(Value::Null)
    }
}

/// `recipients.type` of a stream's recipient row.
pub const STREAM_RECIPIENT_TYPE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    UserCreated,
    RealmCreated,
    SubscriptionCreated,
    SubscriptionActivated,
    SubscriptionDeactivated,
    SubscriptionPropertyChanged,
    StreamCreated,
    StreamDeactivated,
    StreamReactivated,
}

impl AuditEventType {
    pub const fn as_i32(self) -> i32 {
        match self {
            AuditEventType::UserCreated => 101,
            AuditEventType::RealmCreated => 215,
            AuditEventType::SubscriptionCreated => 301,
            AuditEventType::SubscriptionActivated => 302,
            AuditEventType::SubscriptionDeactivated => 303,
            AuditEventType::SubscriptionPropertyChanged => 304,
            AuditEventType::StreamCreated => 601,
            AuditEventType::StreamDeactivated => 602,
            AuditEventType::StreamReactivated => 604,
        }
    }

    pub const fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            101 => AuditEventType::UserCreated,
            215 => AuditEventType::RealmCreated,
            301 => AuditEventType::SubscriptionCreated,
            302 => AuditEventType::SubscriptionActivated,
            303 => AuditEventType::SubscriptionDeactivated,
            304 => AuditEventType::SubscriptionPropertyChanged,
            601 => AuditEventType::StreamCreated,
            602 => AuditEventType::StreamDeactivated,
            604 => AuditEventType::StreamReactivated,
            _ => return None,
        })
    }
}
