//! State-changing operations. Each runs inside a caller-owned
//! [`UnitOfWork`](crate::db::UnitOfWork) and defers its events to commit.

pub mod colors;
pub mod streams;
pub mod subscriptions;

pub use colors::{STREAM_ASSIGNMENT_COLORS, pick_colors};
pub use streams::{
    check_stream_name, create_stream, deactivate_stream, deactivated_stream_name,
    reactivate_stream,
};
pub use subscriptions::{
    BulkAddResult, PropertyValue, RemovalOutcome, SubscriptionPair, SubscriptionProperty,
    bulk_add_subscriptions, bulk_remove_subscriptions, change_subscription_property,
    subscription_infos,
};

use crate::db::queries::NewAuditRow;
use crate::db::{AuditEventType, DbUser};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub(crate) fn audit_row(
    realm_id: i64,
    acting_user: Option<&DbUser>,
    modified_user_id: Option<i64>,
    modified_stream_id: Option<i64>,
    event_type: AuditEventType,
    event_time: DateTime<Utc>,
    extra_data: Value,
) -> NewAuditRow {
    NewAuditRow {
        realm_id,
        acting_user_id: acting_user.map(|user| user.id),
        modified_user_id,
        modified_stream_id,
        event_type,
        event_time,
        extra_data,
    }
}
