use super::{load_realm, load_stream, resolve_principals};
use crate::actions::{
    self, PropertyValue, SubscriptionPair, SubscriptionProperty, check_stream_name,
};
use crate::context::RequestContext;
use crate::db::queries::{self, NewStream};
use crate::db::{DbStream, UnitOfWork};
use crate::error::SubcastError;
use crate::events::EventDispatcher;
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use subcast_schema::{
    PropertyChangeRequest, SubscribeRequest, SubscribeResponse, SubscriptionInfo,
    UnsubscribeRequest, UnsubscribeResponse,
};
use tracing::info;

/// Trimmed, validated names with case-insensitive duplicates dropped.
fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>, SubcastError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let name = check_stream_name(name)?;
        if seen.insert(name.to_lowercase()) {
            out.push(name);
        }
    }
    Ok(out)
}

fn group_by_user<'a>(pairs: impl Iterator<Item = &'a SubscriptionPair>) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in pairs {
        grouped
            .entry(pair.user_id.to_string())
            .or_default()
            .push(pair.stream_name.clone());
    }
    grouped
}

fn unique_stream_names<'a>(pairs: impl Iterator<Item = &'a SubscriptionPair>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    pairs
        .filter(|pair| seen.insert(pair.stream_id))
        .map(|pair| pair.stream_name.clone())
        .collect()
}

/// `POST /users/me/subscriptions`: subscribe the principals, creating
/// missing streams on the way.
pub async fn subscribe(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    ctx: &RequestContext,
    request: SubscribeRequest,
) -> Result<SubscribeResponse, SubcastError> {
    if request.subscriptions.is_empty() {
        return Err(SubcastError::bad_request("No channels specified."));
    }
    let names = unique_names(request.subscriptions.iter().map(|s| s.name.as_str()))?;
    if request.invite_only && request.is_web_public {
        return Err(SubcastError::bad_request(
            "A web-public channel cannot be private.",
        ));
    }

    let realm = load_realm(uow.conn(), ctx.realm_id()).await?;
    let users = resolve_principals(uow.conn(), ctx, request.principals.as_deref()).await?;
    if ctx.user.is_guest() && users.iter().any(|user| user.id != ctx.user.id) {
        return Err(SubcastError::insufficient_permission());
    }

    let mut existing = Vec::new();
    let mut missing = Vec::new();
    for name in &names {
        match queries::active_stream_by_name(uow.conn(), realm.id, name).await? {
            Some(stream) => existing.push(stream),
            None => missing.push(name.clone()),
        }
    }

    // Callers may only add people to streams they can see themselves.
    if !existing.is_empty() && !ctx.user.is_realm_admin() {
        let recipients: Vec<i64> = existing.iter().filter_map(|s| s.recipient_id).collect();
        let own: HashSet<i64> =
            queries::active_subscriptions_of_user(uow.conn(), ctx.user.id, Some(&recipients))
                .await?
                .into_iter()
                .map(|row| row.recipient_id)
                .collect();
        for stream in &existing {
            let subscribed = stream.recipient_id.is_some_and(|rid| own.contains(&rid));
            let visible = stream.is_public() && !ctx.user.is_guest();
            if !subscribed && !visible {
                return Err(SubcastError::bad_request(format!(
                    "Unable to access channel ({}).",
                    stream.name
                )));
            }
        }
    }

    if !missing.is_empty() {
        if ctx.user.is_guest() || (request.is_web_public && !ctx.user.is_realm_admin()) {
            return Err(SubcastError::insufficient_permission());
        }
        for name in missing {
            let description = request
                .subscriptions
                .iter()
                .find(|spec| spec.name.trim().eq_ignore_ascii_case(&name))
                .map(|spec| spec.description.clone())
                .unwrap_or_default();
            let created = actions::create_stream(
                uow,
                dispatcher,
                &realm,
                NewStream {
                    name,
                    description,
                    invite_only: request.invite_only,
                    is_web_public: request.is_web_public,
                    history_public_to_subscribers: request
                        .history_public_to_subscribers
                        .unwrap_or(true),
                    stream_post_policy: 1,
                    message_retention_days: None,
                },
                Some(&ctx.user),
            )
            .await?;
            existing.push(created);
        }
    }

    let result = actions::bulk_add_subscriptions(
        uow,
        dispatcher,
        &realm,
        &existing,
        &users,
        Some(&ctx.user),
    )
    .await?;

    info!(
        request_id = %ctx.request_id,
        user_id = ctx.user.id,
        streams = existing.len(),
        principals = users.len(),
        "subscribe request handled"
    );
    Ok(SubscribeResponse {
        subscribed: group_by_user(result.subscribed()),
        already_subscribed: group_by_user(result.already_subscribed.iter()),
    })
}

/// `DELETE /users/me/subscriptions`.
pub async fn unsubscribe(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    ctx: &RequestContext,
    request: UnsubscribeRequest,
) -> Result<UnsubscribeResponse, SubcastError> {
    if request.subscriptions.is_empty() {
        return Err(SubcastError::bad_request("No channels specified."));
    }
    let names = unique_names(request.subscriptions.iter().map(String::as_str))?;
    let realm = load_realm(uow.conn(), ctx.realm_id()).await?;
    let users = resolve_principals(uow.conn(), ctx, request.principals.as_deref()).await?;
    if users.iter().any(|user| user.id != ctx.user.id) && !ctx.user.is_realm_admin() {
        return Err(SubcastError::insufficient_permission());
    }

    let mut streams: Vec<DbStream> = Vec::new();
    let mut missing = Vec::new();
    for name in &names {
        match queries::active_stream_by_name(uow.conn(), realm.id, name).await? {
            Some(stream) => streams.push(stream),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(SubcastError::bad_request(format!(
            "Channel(s) ({}) do not exist",
            missing.join(", ")
        )));
    }

    let outcome = actions::bulk_remove_subscriptions(
        uow,
        dispatcher,
        &realm,
        &users,
        &streams,
        Some(&ctx.user),
    )
    .await?;

    info!(
        request_id = %ctx.request_id,
        user_id = ctx.user.id,
        removed = outcome.removed.len(),
        "unsubscribe request handled"
    );
    Ok(UnsubscribeResponse {
        removed: unique_stream_names(outcome.removed.iter()),
        not_removed: unique_stream_names(outcome.not_subscribed.iter()),
    })
}

/// `POST /users/me/subscriptions/properties`. Every change is validated
/// before the first one is written.
pub async fn change_properties(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    ctx: &RequestContext,
    request: PropertyChangeRequest,
) -> Result<(), SubcastError> {
    if request.subscription_data.is_empty() {
        return Err(SubcastError::bad_request("No subscription properties specified."));
    }

    let mut parsed: Vec<(DbStream, SubscriptionProperty, PropertyValue)> = Vec::new();
    for change in &request.subscription_data {
        let property = SubscriptionProperty::parse(&change.property)?;
        let value = property.parse_value(&change.value)?;
        let stream = load_stream(uow.conn(), ctx, change.stream_id, false).await?;
        parsed.push((stream, property, value));
    }

    for (stream, property, value) in parsed {
        actions::change_subscription_property(
            uow,
            dispatcher,
            &ctx.user,
            &stream,
            property,
            value,
            Some(&ctx.user),
        )
        .await?;
    }
    Ok(())
}

/// `GET /users/me/subscriptions`.
pub async fn list_subscriptions(
    conn: &mut SqliteConnection,
    ctx: &RequestContext,
) -> Result<Vec<SubscriptionInfo>, SubcastError> {
    actions::subscription_infos(conn, ctx.user.id, None).await
}

/// `GET /streams/{id}/members`. Streams the caller may not see answer like
/// missing ones.
pub async fn stream_subscribers(
    conn: &mut SqliteConnection,
    ctx: &RequestContext,
    stream_id: i64,
) -> Result<Vec<i64>, SubcastError> {
    let stream = load_stream(conn, ctx, stream_id, false).await?;
    let Some(recipient_id) = stream.recipient_id else {
        return Ok(Vec::new());
    };
    let subscribers = queries::active_subscriber_map(conn, &[recipient_id])
        .await?
        .remove(&recipient_id)
        .unwrap_or_default();

    let is_subscribed = subscribers.contains(&ctx.user.id);
    let allowed = if ctx.user.is_guest() {
        is_subscribed
    } else if stream.is_public() {
        true
    } else {
        is_subscribed || ctx.user.is_realm_admin()
    };
    if !allowed {
        return Err(SubcastError::bad_request("Invalid channel ID"));
    }
    Ok(subscribers.into_iter().collect())
}
