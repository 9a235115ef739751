use super::audit_row;
use crate::db::queries::{self, NewStream};
use crate::db::{AuditEventType, DbRealm, DbStream, DbUser, UnitOfWork};
use crate::error::SubcastError;
use crate::events::EventDispatcher;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;
use subcast_schema::{Event, StreamEvent};
use tracing::info;

pub const MAX_STREAM_NAME_LENGTH: usize = 60;
const DEACTIVATED_MARKER: &str = "!DEACTIVATED:";

/// Validates a channel name and returns it trimmed.
pub fn check_stream_name(name: &str) -> Result<String, SubcastError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SubcastError::bad_request("Channel name can't be empty."));
    }
    if trimmed.chars().count() > MAX_STREAM_NAME_LENGTH {
        return Err(SubcastError::bad_request(format!(
            "Channel name too long (limit: {MAX_STREAM_NAME_LENGTH} characters)."
        )));
    }
    if let Some(position) = trimmed.chars().position(|c| c == '\0' || c.is_control()) {
        return Err(SubcastError::bad_request(format!(
            "Invalid character in channel name, at position {}.",
            position + 1
        )));
    }
    Ok(trimmed.to_string())
}

/// `<7 hex of sha512(id)>!DEACTIVATED:<old name>`, cut to the name limit.
pub fn deactivated_stream_name(stream_id: i64, old_name: &str) -> String {
    use sha2::Digest as _;
    let mut h = sha2::Sha512::new();
    h.update(stream_id.to_string().as_bytes());
    let digest = hex::encode(h.finalize());
    let full = format!("{}{DEACTIVATED_MARKER}{old_name}", &digest[..7]);
    full.chars().take(MAX_STREAM_NAME_LENGTH).collect()
}

/// Active users allowed to know `stream` exists: everyone for web-public
/// streams, everyone but guests for other public streams, admins for private
/// ones, plus the given subscribers.
pub(crate) fn users_with_access(
    stream: &DbStream,
    members: &[DbUser],
    subscribers: &BTreeSet<i64>,
) -> Vec<i64> {
    members
        .iter()
        .filter(|user| user.is_active)
        .filter(|user| {
            subscribers.contains(&user.id)
                || if stream.is_public() {
                    !user.is_guest() || stream.is_web_public
                } else {
                    user.is_realm_admin()
                }
        })
        .map(|user| user.id)
        .collect()
}

pub async fn create_stream(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    realm: &DbRealm,
    stream: NewStream,
    acting_user: Option<&DbUser>,
) -> Result<DbStream, SubcastError> {
    let name = check_stream_name(&stream.name)?;
    if queries::stream_name_taken(uow.conn(), realm.id, &name).await? {
        return Err(SubcastError::bad_request(format!(
            "Channel name '{name}' is already taken."
        )));
    }
    let now = Utc::now();
    let created = queries::insert_stream(
        uow.conn(),
        realm.id,
        &NewStream { name, ..stream },
        now,
    )
    .await?;

    queries::insert_audit_rows(
        uow.conn(),
        &[audit_row(
            realm.id,
            acting_user,
            None,
            Some(created.id),
            AuditEventType::StreamCreated,
            now,
            json!({}),
        )],
    )
    .await?;

    let members = queries::active_realm_users(uow.conn(), realm.id).await?;
    let recipients = users_with_access(&created, &members, &BTreeSet::new());
    dispatcher.send_event_on_commit(
        uow,
        realm.id,
        Event::Stream(StreamEvent::Create {
            streams: vec![created.info()],
        }),
        recipients,
    );

    info!(
        realm_id = realm.id,
        stream_id = created.id,
        invite_only = created.invite_only,
        "stream created"
    );
    Ok(created)
}

/// Soft-deletes `stream`: unsubscribes everyone, hides it behind a hashed
/// name and tells everyone who could see it.
pub async fn deactivate_stream(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    stream: &DbStream,
    acting_user: Option<&DbUser>,
) -> Result<DbStream, SubcastError> {
    if stream.deactivated {
        return Err(SubcastError::bad_request("Channel is already deactivated."));
    }
    let recipient_id = stream.recipient_id.ok_or_else(|| {
        SubcastError::ContractViolation(format!("stream {} has no recipient", stream.id))
    })?;
    let now = Utc::now();

    let members = queries::active_realm_users(uow.conn(), stream.realm_id).await?;
    let subscribers = queries::active_subscriber_map(uow.conn(), &[recipient_id])
        .await?
        .remove(&recipient_id)
        .unwrap_or_default();
    let could_access = users_with_access(stream, &members, &subscribers);

    let mut audit = Vec::new();
    if !subscribers.is_empty() {
        let user_ids: Vec<i64> = subscribers.iter().copied().collect();
        let sub_ids: Vec<i64> = queries::subscriptions_for_users(uow.conn(), &user_ids)
            .await?
            .into_iter()
            .filter(|row| row.active && row.recipient_id == recipient_id)
            .map(|row| row.id)
            .collect();
        for user_id in &subscribers {
            audit.push(audit_row(
                stream.realm_id,
                acting_user,
                Some(*user_id),
                Some(stream.id),
                AuditEventType::SubscriptionDeactivated,
                now,
                json!({}),
            ));
        }
        queries::set_subscriptions_active(uow.conn(), &sub_ids, false).await?;
    }

    let new_name = deactivated_stream_name(stream.id, &stream.name);
    queries::mark_stream_deactivated(uow.conn(), stream.id, &new_name).await?;
    audit.push(audit_row(
        stream.realm_id,
        acting_user,
        None,
        Some(stream.id),
        AuditEventType::StreamDeactivated,
        now,
        json!({ "old_name": stream.name }),
    ));
    queries::insert_audit_rows(uow.conn(), &audit).await?;

    dispatcher.send_event_on_commit(
        uow,
        stream.realm_id,
        Event::Stream(StreamEvent::Delete {
            streams: vec![stream.info()],
        }),
        could_access,
    );

    info!(
        realm_id = stream.realm_id,
        stream_id = stream.id,
        unsubscribed = subscribers.len(),
        "stream deactivated"
    );
    queries::stream_by_id(uow.conn(), stream.id)
        .await?
        .ok_or_else(|| SubcastError::UnexpectedError(format!("stream {} vanished", stream.id)))
}

/// Brings a deactivated stream back under `new_name`. It stays private with
/// no subscribers, so only admins hear about it.
pub async fn reactivate_stream(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    stream: &DbStream,
    new_name: &str,
    acting_user: Option<&DbUser>,
) -> Result<DbStream, SubcastError> {
    if !stream.deactivated {
        return Err(SubcastError::bad_request("Channel is not currently deactivated."));
    }
    let new_name = check_stream_name(new_name)?;
    if queries::stream_name_taken(uow.conn(), stream.realm_id, &new_name).await? {
        return Err(SubcastError::bad_request(format!(
            "Channel name '{new_name}' is already taken."
        )));
    }
    let now = Utc::now();
    queries::mark_stream_reactivated(uow.conn(), stream.id, &new_name).await?;
    queries::insert_audit_rows(
        uow.conn(),
        &[audit_row(
            stream.realm_id,
            acting_user,
            None,
            Some(stream.id),
            AuditEventType::StreamReactivated,
            now,
            json!({ "old_name": stream.name, "new_name": new_name }),
        )],
    )
    .await?;

    let reactivated = queries::stream_by_id(uow.conn(), stream.id)
        .await?
        .ok_or_else(|| SubcastError::UnexpectedError(format!("stream {} vanished", stream.id)))?;
    let members = queries::active_realm_users(uow.conn(), stream.realm_id).await?;
    let admins = users_with_access(&reactivated, &members, &BTreeSet::new());
    dispatcher.send_event_on_commit(
        uow,
        stream.realm_id,
        Event::Stream(StreamEvent::Create {
            streams: vec![reactivated.info()],
        }),
        admins,
    );

    info!(
        realm_id = stream.realm_id,
        stream_id = stream.id,
        name = %reactivated.name,
        "stream reactivated"
    );
    Ok(reactivated)
}
