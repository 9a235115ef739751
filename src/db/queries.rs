//! SQL used by the actions. Every function runs on a borrowed connection so
//! the same code works inside a `UnitOfWork` and on a plain pooled connection.

use crate::db::models::{
    AuditEventType, DbRealm, DbRealmAuditLog, DbStream, DbSubscription, DbUser, STREAM_RECIPIENT_TYPE,
};
use crate::error::SubcastError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeSet, HashMap};
use subcast_schema::UserRole;

/// A subscription row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub recipient_id: i64,
    pub color: String,
}

/// An audit row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewAuditRow {
    pub realm_id: i64,
    pub acting_user_id: Option<i64>,
    pub modified_user_id: Option<i64>,
    pub modified_stream_id: Option<i64>,
    pub event_type: AuditEventType,
    pub event_time: DateTime<Utc>,
    pub extra_data: Value,
}

#[derive(Debug, Clone)]
pub struct NewStream {
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: i32,
    pub message_retention_days: Option<i32>,
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

// ---------------------------------------------------------------------------
// Realms and users
// ---------------------------------------------------------------------------

pub async fn insert_realm(
    conn: &mut SqliteConnection,
    string_id: &str,
    name: &str,
    guests_can_access_all_users: bool,
    now: DateTime<Utc>,
) -> Result<DbRealm, SubcastError> {
    let realm = sqlx::query_as::<_, DbRealm>(
        r#"
        INSERT INTO realms (string_id, name, guests_can_access_all_users, date_created)
        VALUES (?, ?, ?, ?)
        RETURNING id, string_id, name, guests_can_access_all_users, date_created
        "#,
    )
    .bind(string_id)
    .bind(name)
    .bind(guests_can_access_all_users)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(realm)
}

pub async fn realm_by_id(
    conn: &mut SqliteConnection,
    realm_id: i64,
) -> Result<Option<DbRealm>, SubcastError> {
    let realm = sqlx::query_as::<_, DbRealm>(
        r#"
        SELECT id, string_id, name, guests_can_access_all_users, date_created
        FROM realms
        WHERE id = ?
        "#,
    )
    .bind(realm_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(realm)
}

pub async fn realm_string_id_taken(
    conn: &mut SqliteConnection,
    string_id: &str,
) -> Result<bool, SubcastError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM realms WHERE string_id = ?")
        .bind(string_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    realm_id: i64,
    email: &str,
    full_name: &str,
    role: UserRole,
    api_key: &str,
    now: DateTime<Utc>,
) -> Result<DbUser, SubcastError> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        INSERT INTO users (realm_id, email, full_name, role, is_active, api_key, date_joined)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        RETURNING id, realm_id, email, full_name, role, is_active, api_key, date_joined
        "#,
    )
    .bind(realm_id)
    .bind(email)
    .bind(full_name)
    .bind(role.as_i32())
    .bind(api_key)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(user)
}

pub async fn user_email_taken(
    conn: &mut SqliteConnection,
    realm_id: i64,
    email: &str,
) -> Result<bool, SubcastError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE realm_id = ? AND email = ? COLLATE NOCASE",
    )
    .bind(realm_id)
    .bind(email)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

pub async fn user_by_api_key(
    conn: &mut SqliteConnection,
    api_key: &str,
) -> Result<Option<DbUser>, SubcastError> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, realm_id, email, full_name, role, is_active, api_key, date_joined
        FROM users
        WHERE api_key = ?
        "#,
    )
    .bind(api_key)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

pub async fn users_by_ids(
    conn: &mut SqliteConnection,
    user_ids: &[i64],
) -> Result<Vec<DbUser>, SubcastError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, realm_id, email, full_name, role, is_active, api_key, date_joined FROM users WHERE id IN ",
    );
    push_id_list(&mut qb, user_ids);
    qb.push(" ORDER BY id");
    let users = qb.build_query_as::<DbUser>().fetch_all(&mut *conn).await?;
    Ok(users)
}

pub async fn active_realm_users(
    conn: &mut SqliteConnection,
    realm_id: i64,
) -> Result<Vec<DbUser>, SubcastError> {
    let users = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, realm_id, email, full_name, role, is_active, api_key, date_joined
        FROM users
        WHERE realm_id = ? AND is_active = 1
        ORDER BY id
        "#,
    )
    .bind(realm_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(users)
}

// ---------------------------------------------------------------------------
// Streams and recipients
// ---------------------------------------------------------------------------

const STREAM_COLUMNS: &str = "id, realm_id, name, description, invite_only, is_web_public, \
     history_public_to_subscribers, stream_post_policy, message_retention_days, recipient_id, \
     deactivated, date_created";

/// Inserts the stream and its recipient row, returning the linked stream.
pub async fn insert_stream(
    conn: &mut SqliteConnection,
    realm_id: i64,
    stream: &NewStream,
    now: DateTime<Utc>,
) -> Result<DbStream, SubcastError> {
    let stream_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO streams (
            realm_id, name, description, invite_only, is_web_public,
            history_public_to_subscribers, stream_post_policy, message_retention_days,
            deactivated, date_created
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        RETURNING id
        "#,
    )
    .bind(realm_id)
    .bind(&stream.name)
    .bind(&stream.description)
    .bind(stream.invite_only)
    .bind(stream.is_web_public)
    .bind(stream.history_public_to_subscribers)
    .bind(stream.stream_post_policy)
    .bind(stream.message_retention_days)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let recipient_id: i64 = sqlx::query_scalar(
        "INSERT INTO recipients (type, type_id) VALUES (?, ?) RETURNING id",
    )
    .bind(STREAM_RECIPIENT_TYPE)
    .bind(stream_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE streams SET recipient_id = ? WHERE id = ?")
        .bind(recipient_id)
        .bind(stream_id)
        .execute(&mut *conn)
        .await?;

    stream_by_id(conn, stream_id).await?.ok_or_else(|| {
        SubcastError::UnexpectedError(format!("stream {stream_id} vanished after insert"))
    })
}

pub async fn stream_by_id(
    conn: &mut SqliteConnection,
    stream_id: i64,
) -> Result<Option<DbStream>, SubcastError> {
    let sql = format!("SELECT {STREAM_COLUMNS} FROM streams WHERE id = ?");
    let stream = sqlx::query_as::<_, DbStream>(&sql)
        .bind(stream_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(stream)
}

pub async fn streams_by_recipient_ids(
    conn: &mut SqliteConnection,
    recipient_ids: &[i64],
) -> Result<Vec<DbStream>, SubcastError> {
    if recipient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {STREAM_COLUMNS} FROM streams WHERE recipient_id IN "
    ));
    push_id_list(&mut qb, recipient_ids);
    qb.push(" ORDER BY id");
    let streams = qb.build_query_as::<DbStream>().fetch_all(&mut *conn).await?;
    Ok(streams)
}

/// Case-insensitive lookup among the realm's live streams.
pub async fn active_stream_by_name(
    conn: &mut SqliteConnection,
    realm_id: i64,
    name: &str,
) -> Result<Option<DbStream>, SubcastError> {
    let sql = format!(
        "SELECT {STREAM_COLUMNS} FROM streams \
         WHERE realm_id = ? AND name = ? COLLATE NOCASE AND deactivated = 0"
    );
    let stream = sqlx::query_as::<_, DbStream>(&sql)
        .bind(realm_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(stream)
}

/// Whether any stream of the realm (deactivated ones included) uses `name`.
pub async fn stream_name_taken(
    conn: &mut SqliteConnection,
    realm_id: i64,
    name: &str,
) -> Result<bool, SubcastError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM streams WHERE realm_id = ? AND name = ? COLLATE NOCASE",
    )
    .bind(realm_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

pub async fn mark_stream_deactivated(
    conn: &mut SqliteConnection,
    stream_id: i64,
    new_name: &str,
) -> Result<(), SubcastError> {
    sqlx::query(
        r#"
        UPDATE streams
        SET name = ?, deactivated = 1, invite_only = 1, history_public_to_subscribers = 1
        WHERE id = ?
        "#,
    )
    .bind(new_name)
    .bind(stream_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_stream_reactivated(
    conn: &mut SqliteConnection,
    stream_id: i64,
    new_name: &str,
) -> Result<(), SubcastError> {
    sqlx::query("UPDATE streams SET name = ?, deactivated = 0 WHERE id = ?")
        .bind(new_name)
        .bind(stream_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, recipient_id, active, color, is_muted, \
     pin_to_top, desktop_notifications, audible_notifications, push_notifications, \
     email_notifications, wildcard_mentions_notify";

/// All subscription rows (any `active`) of the given users.
pub async fn subscriptions_for_users(
    conn: &mut SqliteConnection,
    user_ids: &[i64],
) -> Result<Vec<DbSubscription>, SubcastError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id IN "
    ));
    push_id_list(&mut qb, user_ids);
    qb.push(" ORDER BY id");
    let rows = qb
        .build_query_as::<DbSubscription>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Active subscription rows of one user, optionally limited to `recipient_ids`.
pub async fn active_subscriptions_of_user(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipient_ids: Option<&[i64]>,
) -> Result<Vec<DbSubscription>, SubcastError> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE active = 1 AND user_id = "
    ));
    qb.push_bind(user_id);
    if let Some(ids) = recipient_ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        qb.push(" AND recipient_id IN ");
        push_id_list(&mut qb, ids);
    }
    qb.push(" ORDER BY recipient_id");
    let rows = qb
        .build_query_as::<DbSubscription>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

pub async fn subscription_row(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipient_id: i64,
) -> Result<Option<DbSubscription>, SubcastError> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ? AND recipient_id = ?"
    );
    let row = sqlx::query_as::<_, DbSubscription>(&sql)
        .bind(user_id)
        .bind(recipient_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// recipient_id -> active subscriber user ids. Every requested recipient is present.
pub async fn active_subscriber_map(
    conn: &mut SqliteConnection,
    recipient_ids: &[i64],
) -> Result<HashMap<i64, BTreeSet<i64>>, SubcastError> {
    let mut map: HashMap<i64, BTreeSet<i64>> = recipient_ids
        .iter()
        .map(|id| (*id, BTreeSet::new()))
        .collect();
    if recipient_ids.is_empty() {
        return Ok(map);
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT recipient_id, user_id FROM subscriptions WHERE active = 1 AND recipient_id IN ",
    );
    push_id_list(&mut qb, recipient_ids);
    let rows: Vec<(i64, i64)> = qb.build_query_as().fetch_all(&mut *conn).await?;
    for (recipient_id, user_id) in rows {
        map.entry(recipient_id).or_default().insert(user_id);
    }
    Ok(map)
}

pub async fn insert_subscriptions(
    conn: &mut SqliteConnection,
    rows: &[NewSubscription],
) -> Result<u64, SubcastError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut qb =
        QueryBuilder::<Sqlite>::new("INSERT INTO subscriptions (user_id, recipient_id, active, color) ");
    qb.push_values(rows.iter(), |mut b, row| {
        b.push_bind(row.user_id)
            .push_bind(row.recipient_id)
            .push_bind(true)
            .push_bind(row.color.clone());
    });
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

pub async fn set_subscriptions_active(
    conn: &mut SqliteConnection,
    subscription_ids: &[i64],
    active: bool,
) -> Result<u64, SubcastError> {
    if subscription_ids.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE subscriptions SET active = ");
    qb.push_bind(active);
    qb.push(" WHERE id IN ");
    push_id_list(&mut qb, subscription_ids);
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

/// Writes one property column. `column` must come from a fixed allowlist.
pub async fn update_subscription_column(
    conn: &mut SqliteConnection,
    subscription_id: i64,
    column: &'static str,
    value: Value,
) -> Result<(), SubcastError> {
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE subscriptions SET ");
    qb.push(column);
    qb.push(" = ");
    match value {
        Value::String(s) => {
            qb.push_bind(s);
        }
        Value::Bool(b) => {
            qb.push_bind(b);
        }
        Value::Null => {
            qb.push("NULL");
        }
        other => {
            return Err(SubcastError::UnexpectedError(format!(
                "unsupported value for {column}: {other}"
            )));
        }
    }
    qb.push(" WHERE id = ");
    qb.push_bind(subscription_id);
    qb.build().execute(&mut *conn).await?;
    Ok(())
}

/// Users sharing at least one active subscription with `user_id` (the user included).
pub async fn users_sharing_subscriptions(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<BTreeSet<i64>, SubcastError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT peer.user_id
        FROM subscriptions mine
        JOIN subscriptions peer ON peer.recipient_id = mine.recipient_id
        WHERE mine.user_id = ? AND mine.active = 1 AND peer.active = 1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    let mut set: BTreeSet<i64> = ids.into_iter().collect();
    set.insert(user_id);
    Ok(set)
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

pub async fn insert_audit_rows(
    conn: &mut SqliteConnection,
    rows: &[NewAuditRow],
) -> Result<u64, SubcastError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "INSERT INTO realm_audit_log (realm_id, acting_user_id, modified_user_id, \
         modified_stream_id, event_type, event_time, extra_data) ",
    );
    qb.push_values(rows.iter(), |mut b, row| {
        b.push_bind(row.realm_id)
            .push_bind(row.acting_user_id)
            .push_bind(row.modified_user_id)
            .push_bind(row.modified_stream_id)
            .push_bind(row.event_type.as_i32())
            .push_bind(row.event_time)
            .push_bind(row.extra_data.to_string());
    });
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

pub async fn audit_log_for_realm(
    conn: &mut SqliteConnection,
    realm_id: i64,
) -> Result<Vec<DbRealmAuditLog>, SubcastError> {
    let rows = sqlx::query_as::<_, DbRealmAuditLog>(
        r#"
        SELECT id, realm_id, acting_user_id, modified_user_id, modified_stream_id,
               event_type, event_time, extra_data
        FROM realm_audit_log
        WHERE realm_id = ?
        ORDER BY id
        "#,
    )
    .bind(realm_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
