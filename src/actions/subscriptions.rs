use super::colors::{is_valid_color, pick_colors};
use super::{audit_row, streams};
use crate::db::queries::{self, NewSubscription};
use crate::db::{AuditEventType, DbRealm, DbStream, DbSubscription, DbUser, UnitOfWork};
use crate::error::SubcastError;
use crate::events::{EventDispatcher, Notice};
use crate::peers::{self, PeerOp, StreamChange};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use subcast_schema::{
    Event, RemovedSubscription, StreamEvent, SubscriptionEvent, SubscriptionInfo,
};
use tracing::{debug, info};

/// A (user, stream) pair touched by a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPair {
    pub user_id: i64,
    pub stream_id: i64,
    pub stream_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkAddResult {
    /// Pairs that had no row and got a new one.
    pub subs_to_add: Vec<SubscriptionPair>,
    /// Pairs whose inactive row was switched back on.
    pub subs_to_activate: Vec<SubscriptionPair>,
    pub already_subscribed: Vec<SubscriptionPair>,
}

impl BulkAddResult {
    pub fn subscribed(&self) -> impl Iterator<Item = &SubscriptionPair> {
        self.subs_to_add.iter().chain(self.subs_to_activate.iter())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemovalOutcome {
    pub removed: Vec<SubscriptionPair>,
    pub not_subscribed: Vec<SubscriptionPair>,
}

/// Streams and users of a bulk call, deduplicated and ordered by id, with
/// every stream's recipient resolved. Fails before anything is written when
/// an object belongs to another realm.
struct Targets<'a> {
    streams: Vec<(&'a DbStream, i64)>,
    users: Vec<&'a DbUser>,
}

fn check_targets<'a>(
    realm: &DbRealm,
    streams: &'a [DbStream],
    users: &'a [DbUser],
) -> Result<Targets<'a>, SubcastError> {
    let mut by_stream = BTreeMap::new();
    for stream in streams {
        if stream.realm_id != realm.id {
            return Err(SubcastError::ContractViolation(format!(
                "stream {} is not in realm {}",
                stream.id, realm.id
            )));
        }
        if stream.deactivated {
            return Err(SubcastError::ContractViolation(format!(
                "stream {} is deactivated",
                stream.id
            )));
        }
        let recipient_id = stream.recipient_id.ok_or_else(|| {
            SubcastError::ContractViolation(format!("stream {} has no recipient", stream.id))
        })?;
        by_stream.insert(stream.id, (stream, recipient_id));
    }

    let mut by_user = BTreeMap::new();
    for user in users {
        if user.realm_id != realm.id {
            return Err(SubcastError::ContractViolation(format!(
                "user {} is not in realm {}",
                user.id, realm.id
            )));
        }
        by_user.insert(user.id, user);
    }

    Ok(Targets {
        streams: by_stream.into_values().collect(),
        users: by_user.into_values().collect(),
    })
}

/// Guests whose set of visible users may change: the altered guests and
/// guests subscribed to an affected stream. Empty when guests see everyone.
fn relevant_guests(
    realm: &DbRealm,
    members: &[DbUser],
    altered_users: &BTreeSet<i64>,
    subscribers: &HashMap<i64, BTreeSet<i64>>,
) -> Vec<i64> {
    if realm.guests_can_access_all_users {
        return Vec::new();
    }
    members
        .iter()
        .filter(|user| user.is_guest())
        .filter(|user| {
            altered_users.contains(&user.id)
                || subscribers.values().any(|subs| subs.contains(&user.id))
        })
        .map(|user| user.id)
        .collect()
}

async fn snapshot_access(
    conn: &mut SqliteConnection,
    guests: &[i64],
) -> Result<HashMap<i64, BTreeSet<i64>>, SubcastError> {
    let mut access = HashMap::with_capacity(guests.len());
    for guest_id in guests {
        access.insert(
            *guest_id,
            queries::users_sharing_subscriptions(conn, *guest_id).await?,
        );
    }
    Ok(access)
}

fn visibility_notices(
    realm_id: i64,
    members: &[DbUser],
    before: &HashMap<i64, BTreeSet<i64>>,
    after: &HashMap<i64, BTreeSet<i64>>,
) -> Vec<Notice> {
    if before.is_empty() {
        return Vec::new();
    }
    let by_id: HashMap<i64, DbUser> = members.iter().map(|u| (u.id, u.clone())).collect();
    let empty = BTreeSet::new();
    let mut guests: Vec<&i64> = before.keys().collect();
    guests.sort_unstable();
    guests
        .into_iter()
        .flat_map(|guest_id| {
            peers::visibility_changes(
                realm_id,
                *guest_id,
                &by_id,
                before.get(guest_id).unwrap_or(&empty),
                after.get(guest_id).unwrap_or(&empty),
            )
        })
        .collect()
}

fn queue_notices(uow: &mut UnitOfWork, dispatcher: &EventDispatcher, notices: Vec<Notice>) {
    for notice in notices {
        dispatcher.send_event_on_commit(uow, notice.realm_id, notice.event, notice.users);
    }
}

/// Active subscriptions of `user_id` as the owner sees them, optionally
/// limited to `recipient_ids`. Deactivated streams are skipped.
pub async fn subscription_infos(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipient_ids: Option<&[i64]>,
) -> Result<Vec<SubscriptionInfo>, SubcastError> {
    let rows = queries::active_subscriptions_of_user(conn, user_id, recipient_ids).await?;
    let recipients: Vec<i64> = rows.iter().map(|row| row.recipient_id).collect();
    let streams: HashMap<i64, DbStream> = queries::streams_by_recipient_ids(conn, &recipients)
        .await?
        .into_iter()
        .filter_map(|stream| stream.recipient_id.map(|rid| (rid, stream)))
        .collect();
    let subscribers = queries::active_subscriber_map(conn, &recipients).await?;

    let empty = BTreeSet::new();
    let mut infos: Vec<SubscriptionInfo> = rows
        .iter()
        .filter_map(|row| {
            let stream = streams.get(&row.recipient_id)?;
            if stream.deactivated {
                return None;
            }
            Some(row.info(
                stream,
                subscribers.get(&row.recipient_id).unwrap_or(&empty),
            ))
        })
        .collect();
    infos.sort_by_key(|info| info.stream.stream_id);
    Ok(infos)
}

/// Subscribes every user to every stream.
///
/// Existing inactive rows are reactivated, missing rows are inserted with a
/// per-user color, already active pairs are reported and left alone. Writes
/// one audit row per transition; events are sent after commit.
pub async fn bulk_add_subscriptions(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    realm: &DbRealm,
    streams: &[DbStream],
    users: &[DbUser],
    acting_user: Option<&DbUser>,
) -> Result<BulkAddResult, SubcastError> {
    let targets = check_targets(realm, streams, users)?;
    let mut result = BulkAddResult::default();
    if targets.streams.is_empty() || targets.users.is_empty() {
        return Ok(result);
    }

    let user_ids: Vec<i64> = targets.users.iter().map(|u| u.id).collect();
    let recipient_ids: Vec<i64> = targets.streams.iter().map(|(_, rid)| *rid).collect();
    let existing = queries::subscriptions_for_users(uow.conn(), &user_ids).await?;

    let mut by_pair: HashMap<(i64, i64), &DbSubscription> = HashMap::new();
    let mut used_colors: HashMap<i64, HashSet<String>> = HashMap::new();
    let mut color_maps: HashMap<i64, HashMap<i64, String>> = HashMap::new();
    for row in &existing {
        by_pair.insert((row.user_id, row.recipient_id), row);
        used_colors
            .entry(row.user_id)
            .or_default()
            .insert(row.color.clone());
        color_maps
            .entry(row.user_id)
            .or_default()
            .insert(row.recipient_id, row.color.clone());
    }

    let mut new_recipients: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let mut activate_ids = Vec::new();
    let mut altered_by_stream: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    let mut altered_by_user: BTreeMap<i64, Vec<(&DbStream, i64)>> = BTreeMap::new();
    for user in &targets.users {
        for (stream, recipient_id) in &targets.streams {
            let pair = SubscriptionPair {
                user_id: user.id,
                stream_id: stream.id,
                stream_name: stream.name.clone(),
            };
            match by_pair.get(&(user.id, *recipient_id)) {
                Some(row) if row.active => {
                    result.already_subscribed.push(pair);
                    continue;
                }
                Some(row) => {
                    activate_ids.push(row.id);
                    result.subs_to_activate.push(pair);
                }
                None => {
                    new_recipients
                        .entry(user.id)
                        .or_default()
                        .push(*recipient_id);
                    result.subs_to_add.push(pair);
                }
            }
            altered_by_stream
                .entry(stream.id)
                .or_default()
                .insert(user.id);
            altered_by_user
                .entry(user.id)
                .or_default()
                .push((*stream, *recipient_id));
        }
    }

    if altered_by_user.is_empty() {
        debug!(
            realm_id = realm.id,
            already = result.already_subscribed.len(),
            "bulk add is a no-op"
        );
        return Ok(result);
    }

    let subscribers_before = queries::active_subscriber_map(uow.conn(), &recipient_ids).await?;
    let members = queries::active_realm_users(uow.conn(), realm.id).await?;
    let altered_users: BTreeSet<i64> = altered_by_user.keys().copied().collect();
    let guests = relevant_guests(realm, &members, &altered_users, &subscribers_before);
    let access_before = snapshot_access(uow.conn(), &guests).await?;

    let empty_used = HashSet::new();
    let empty_map = HashMap::new();
    let mut new_rows = Vec::new();
    for (user_id, recipients) in &new_recipients {
        let mut colors = pick_colors(
            used_colors.get(user_id).unwrap_or(&empty_used),
            color_maps.get(user_id).unwrap_or(&empty_map),
            recipients,
        );
        for recipient_id in recipients {
            new_rows.push(NewSubscription {
                user_id: *user_id,
                recipient_id: *recipient_id,
                color: colors.remove(recipient_id).unwrap_or_default(),
            });
        }
    }
    queries::insert_subscriptions(uow.conn(), &new_rows).await?;
    queries::set_subscriptions_active(uow.conn(), &activate_ids, true).await?;

    let now = Utc::now();
    let audit: Vec<_> = result
        .subs_to_add
        .iter()
        .map(|pair| (pair, AuditEventType::SubscriptionCreated))
        .chain(
            result
                .subs_to_activate
                .iter()
                .map(|pair| (pair, AuditEventType::SubscriptionActivated)),
        )
        .map(|(pair, event_type)| {
            audit_row(
                realm.id,
                acting_user,
                Some(pair.user_id),
                Some(pair.stream_id),
                event_type,
                now,
                json!({}),
            )
        })
        .collect();
    queries::insert_audit_rows(uow.conn(), &audit).await?;

    let mut notices = Vec::new();

    // Users learn about the people they can newly see before any event
    // names them.
    let access_after = snapshot_access(uow.conn(), &guests).await?;
    notices.extend(visibility_notices(realm.id, &members, &access_before, &access_after));

    // Private streams were invisible to non-admins until now; public ones
    // that are not web-public were invisible to guests.
    for user in &targets.users {
        let Some(joined) = altered_by_user.get(&user.id) else {
            continue;
        };
        if user.is_realm_admin() {
            continue;
        }
        let newly_visible: Vec<_> = joined
            .iter()
            .filter(|(stream, _)| {
                !stream.is_public() || (user.is_guest() && !stream.is_web_public)
            })
            .map(|(stream, _)| stream.info())
            .collect();
        if !newly_visible.is_empty() {
            notices.push(Notice {
                realm_id: realm.id,
                event: Event::Stream(StreamEvent::Create {
                    streams: newly_visible,
                }),
                users: vec![user.id],
            });
        }
    }

    for (user_id, joined) in &altered_by_user {
        let recipients: Vec<i64> = joined.iter().map(|(_, rid)| *rid).collect();
        let subscriptions = subscription_infos(uow.conn(), *user_id, Some(&recipients)).await?;
        notices.push(Notice {
            realm_id: realm.id,
            event: Event::Subscription(SubscriptionEvent::Add { subscriptions }),
            users: vec![*user_id],
        });
    }

    let changes: Vec<StreamChange> = targets
        .streams
        .iter()
        .filter_map(|(stream, recipient_id)| {
            let altered = altered_by_stream.get(&stream.id)?;
            Some(StreamChange {
                stream_id: stream.id,
                is_public: stream.is_public(),
                altered: altered.clone(),
                subscribers_before: subscribers_before
                    .get(recipient_id)
                    .cloned()
                    .unwrap_or_default(),
            })
        })
        .collect();
    notices.extend(peers::peer_events(realm.id, PeerOp::Add, &members, &changes));

    queue_notices(uow, dispatcher, notices);

    info!(
        realm_id = realm.id,
        added = result.subs_to_add.len(),
        activated = result.subs_to_activate.len(),
        already = result.already_subscribed.len(),
        "bulk add subscriptions"
    );
    Ok(result)
}

/// Unsubscribes every user from every stream they are actively subscribed
/// to. Private streams left without subscribers are deactivated in the same
/// unit of work.
pub async fn bulk_remove_subscriptions(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    realm: &DbRealm,
    users: &[DbUser],
    streams: &[DbStream],
    acting_user: Option<&DbUser>,
) -> Result<RemovalOutcome, SubcastError> {
    let targets = check_targets(realm, streams, users)?;
    let mut outcome = RemovalOutcome::default();
    if targets.streams.is_empty() || targets.users.is_empty() {
        return Ok(outcome);
    }

    let user_ids: Vec<i64> = targets.users.iter().map(|u| u.id).collect();
    let recipient_ids: Vec<i64> = targets.streams.iter().map(|(_, rid)| *rid).collect();
    let existing = queries::subscriptions_for_users(uow.conn(), &user_ids).await?;
    let active: HashMap<(i64, i64), i64> = existing
        .iter()
        .filter(|row| row.active)
        .map(|row| ((row.user_id, row.recipient_id), row.id))
        .collect();

    let mut deactivate_ids = Vec::new();
    let mut altered_by_stream: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    let mut removed_by_user: BTreeMap<i64, Vec<RemovedSubscription>> = BTreeMap::new();
    for user in &targets.users {
        for (stream, recipient_id) in &targets.streams {
            let pair = SubscriptionPair {
                user_id: user.id,
                stream_id: stream.id,
                stream_name: stream.name.clone(),
            };
            match active.get(&(user.id, *recipient_id)) {
                Some(sub_id) => {
                    deactivate_ids.push(*sub_id);
                    altered_by_stream
                        .entry(stream.id)
                        .or_default()
                        .insert(user.id);
                    removed_by_user
                        .entry(user.id)
                        .or_default()
                        .push(RemovedSubscription {
                            name: stream.name.clone(),
                            stream_id: stream.id,
                        });
                    outcome.removed.push(pair);
                }
                None => outcome.not_subscribed.push(pair),
            }
        }
    }

    if outcome.removed.is_empty() {
        return Ok(outcome);
    }

    let subscribers_before = queries::active_subscriber_map(uow.conn(), &recipient_ids).await?;
    let members = queries::active_realm_users(uow.conn(), realm.id).await?;
    let altered_users: BTreeSet<i64> = removed_by_user.keys().copied().collect();
    let guests = relevant_guests(realm, &members, &altered_users, &subscribers_before);
    let access_before = snapshot_access(uow.conn(), &guests).await?;

    queries::set_subscriptions_active(uow.conn(), &deactivate_ids, false).await?;
    let now = Utc::now();
    let audit: Vec<_> = outcome
        .removed
        .iter()
        .map(|pair| {
            audit_row(
                realm.id,
                acting_user,
                Some(pair.user_id),
                Some(pair.stream_id),
                AuditEventType::SubscriptionDeactivated,
                now,
                json!({}),
            )
        })
        .collect();
    queries::insert_audit_rows(uow.conn(), &audit).await?;

    let mut notices: Vec<Notice> = removed_by_user
        .into_iter()
        .map(|(user_id, subscriptions)| Notice {
            realm_id: realm.id,
            event: Event::Subscription(SubscriptionEvent::Remove { subscriptions }),
            users: vec![user_id],
        })
        .collect();

    let changes: Vec<StreamChange> = targets
        .streams
        .iter()
        .filter_map(|(stream, recipient_id)| {
            let altered = altered_by_stream.get(&stream.id)?;
            Some(StreamChange {
                stream_id: stream.id,
                is_public: stream.is_public(),
                altered: altered.clone(),
                subscribers_before: subscribers_before
                    .get(recipient_id)
                    .cloned()
                    .unwrap_or_default(),
            })
        })
        .collect();
    notices.extend(peers::peer_events(realm.id, PeerOp::Remove, &members, &changes));

    let access_after = snapshot_access(uow.conn(), &guests).await?;
    notices.extend(visibility_notices(realm.id, &members, &access_before, &access_after));
    queue_notices(uow, dispatcher, notices);

    info!(
        realm_id = realm.id,
        removed = outcome.removed.len(),
        not_subscribed = outcome.not_subscribed.len(),
        "bulk remove subscriptions"
    );

    for change in &changes {
        if change.is_public {
            continue;
        }
        if change.subscribers_before.difference(&change.altered).next().is_some() {
            continue;
        }
        if let Some((stream, _)) = targets.streams.iter().find(|(s, _)| s.id == change.stream_id) {
            streams::deactivate_stream(uow, dispatcher, stream, acting_user).await?;
        }
    }

    Ok(outcome)
}

/// Per-subscription settings a user may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionProperty {
    Color,
    IsMuted,
    PinToTop,
    DesktopNotifications,
    AudibleNotifications,
    PushNotifications,
    EmailNotifications,
    WildcardMentionsNotify,
}

/// A validated property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Color(String),
    Flag(bool),
    /// `None` falls back to the user's global setting.
    OptionalFlag(Option<bool>),
}

impl PropertyValue {
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Color(color) => Value::String(color.clone()),
            PropertyValue::Flag(flag) => Value::Bool(*flag),
            PropertyValue::OptionalFlag(flag) => flag.map(Value::Bool).unwrap_or(Value::Null),
        }
    }
}

impl SubscriptionProperty {
    pub fn parse(name: &str) -> Result<Self, SubcastError> {
        Ok(match name {
            "color" => SubscriptionProperty::Color,
            "is_muted" => SubscriptionProperty::IsMuted,
            "pin_to_top" => SubscriptionProperty::PinToTop,
            "desktop_notifications" => SubscriptionProperty::DesktopNotifications,
            "audible_notifications" => SubscriptionProperty::AudibleNotifications,
            "push_notifications" => SubscriptionProperty::PushNotifications,
            "email_notifications" => SubscriptionProperty::EmailNotifications,
            "wildcard_mentions_notify" => SubscriptionProperty::WildcardMentionsNotify,
            other => {
                return Err(SubcastError::bad_request(format!(
                    "Unknown subscription property: {other}"
                )));
            }
        })
    }

    /// Wire name, also the column name.
    pub const fn as_str(self) -> &'static str {
        match self {
            SubscriptionProperty::Color => "color",
            SubscriptionProperty::IsMuted => "is_muted",
            SubscriptionProperty::PinToTop => "pin_to_top",
            SubscriptionProperty::DesktopNotifications => "desktop_notifications",
            SubscriptionProperty::AudibleNotifications => "audible_notifications",
            SubscriptionProperty::PushNotifications => "push_notifications",
            SubscriptionProperty::EmailNotifications => "email_notifications",
            SubscriptionProperty::WildcardMentionsNotify => "wildcard_mentions_notify",
        }
    }

    pub fn parse_value(self, value: &Value) -> Result<PropertyValue, SubcastError> {
        let name = self.as_str();
        match self {
            SubscriptionProperty::Color => match value.as_str() {
                Some(color) if is_valid_color(color) => {
                    Ok(PropertyValue::Color(color.to_ascii_lowercase()))
                }
                _ => Err(SubcastError::bad_request(format!(
                    "{name} is not a valid hex color code"
                ))),
            },
            SubscriptionProperty::IsMuted | SubscriptionProperty::PinToTop => value
                .as_bool()
                .map(PropertyValue::Flag)
                .ok_or_else(|| SubcastError::bad_request(format!("{name} is not a boolean"))),
            _ => match value {
                Value::Null => Ok(PropertyValue::OptionalFlag(None)),
                Value::Bool(flag) => Ok(PropertyValue::OptionalFlag(Some(*flag))),
                _ => Err(SubcastError::bad_request(format!(
                    "{name} is not a boolean or null"
                ))),
            },
        }
    }

    fn current(self, row: &DbSubscription) -> Value {
        let optional = |flag: Option<bool>| flag.map(Value::Bool).unwrap_or(Value::Null);
        match self {
            SubscriptionProperty::Color => Value::String(row.color.clone()),
            SubscriptionProperty::IsMuted => Value::Bool(row.is_muted),
            SubscriptionProperty::PinToTop => Value::Bool(row.pin_to_top),
            SubscriptionProperty::DesktopNotifications => optional(row.desktop_notifications),
            SubscriptionProperty::AudibleNotifications => optional(row.audible_notifications),
            SubscriptionProperty::PushNotifications => optional(row.push_notifications),
            SubscriptionProperty::EmailNotifications => optional(row.email_notifications),
            SubscriptionProperty::WildcardMentionsNotify => {
                optional(row.wildcard_mentions_notify)
            }
        }
    }
}

/// Sets one property on `user`'s active subscription to `stream`.
pub async fn change_subscription_property(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    user: &DbUser,
    stream: &DbStream,
    property: SubscriptionProperty,
    value: PropertyValue,
    acting_user: Option<&DbUser>,
) -> Result<(), SubcastError> {
    let not_subscribed =
        || SubcastError::bad_request(format!("Not subscribed to channel ID {}", stream.id));
    let recipient_id = stream.recipient_id.ok_or_else(not_subscribed)?;
    let row = queries::subscription_row(uow.conn(), user.id, recipient_id)
        .await?
        .filter(|row| row.active)
        .ok_or_else(not_subscribed)?;

    let old_value = property.current(&row);
    let new_value = value.to_json();
    queries::update_subscription_column(uow.conn(), row.id, property.as_str(), new_value.clone())
        .await?;
    queries::insert_audit_rows(
        uow.conn(),
        &[audit_row(
            user.realm_id,
            acting_user,
            Some(user.id),
            Some(stream.id),
            AuditEventType::SubscriptionPropertyChanged,
            Utc::now(),
            json!({
                "property": property.as_str(),
                "old_value": old_value,
                "new_value": new_value,
            }),
        )],
    )
    .await?;

    dispatcher.send_event_on_commit(
        uow,
        user.realm_id,
        Event::Subscription(SubscriptionEvent::Update {
            stream_id: stream.id,
            property: property.as_str().to_string(),
            value: new_value,
        }),
        vec![user.id],
    );
    debug!(
        user_id = user.id,
        stream_id = stream.id,
        property = property.as_str(),
        "subscription property changed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_names_round_trip_and_unknown_fails() {
        for name in [
            "color",
            "is_muted",
            "pin_to_top",
            "desktop_notifications",
            "audible_notifications",
            "push_notifications",
            "email_notifications",
            "wildcard_mentions_notify",
        ] {
            assert_eq!(SubscriptionProperty::parse(name).unwrap().as_str(), name);
        }
        assert!(SubscriptionProperty::parse("in_home_view").is_err());
    }

    #[test]
    fn values_are_type_checked() {
        let color = SubscriptionProperty::Color;
        assert_eq!(
            color.parse_value(&json!("#ABCDEF")).unwrap(),
            PropertyValue::Color("#abcdef".to_string())
        );
        assert!(color.parse_value(&json!("red")).is_err());

        let muted = SubscriptionProperty::IsMuted;
        assert_eq!(
            muted.parse_value(&json!(true)).unwrap(),
            PropertyValue::Flag(true)
        );
        assert!(muted.parse_value(&Value::Null).is_err());

        let push = SubscriptionProperty::PushNotifications;
        assert_eq!(
            push.parse_value(&Value::Null).unwrap(),
            PropertyValue::OptionalFlag(None)
        );
        assert_eq!(push.parse_value(&Value::Null).unwrap().to_json(), Value::Null);
        assert!(push.parse_value(&json!("yes")).is_err());
    }
}
