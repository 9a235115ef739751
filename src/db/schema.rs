//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `realms` and `users` (tenants and their members)
/// - `recipients` (indirection a subscription points to, one per stream)
/// - `streams` (soft-deleted via `deactivated`, never removed)
/// - `subscriptions` (one (user_id, recipient_id) per row, toggled via `active`)
/// - `realm_audit_log` (append-only state transitions)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Realms and users
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS realms (
    id INTEGER PRIMARY KEY NOT NULL,
    string_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    guests_can_access_all_users INTEGER NOT NULL DEFAULT 1,
    date_created TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY NOT NULL,
    realm_id INTEGER NOT NULL REFERENCES realms(id),
    email TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role INTEGER NOT NULL DEFAULT 400,
    is_active INTEGER NOT NULL DEFAULT 1,
    api_key TEXT NOT NULL UNIQUE,
    date_joined TEXT NOT NULL, -- RFC3339
    UNIQUE(realm_id, email)
);

CREATE INDEX IF NOT EXISTS idx_users_realm ON users(realm_id, is_active);

-- ---------------------------------------------------------------------------
-- Recipients (type 1 = personal, 2 = stream, 3 = direct message group)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS recipients (
    id INTEGER PRIMARY KEY NOT NULL,
    type INTEGER NOT NULL,
    type_id INTEGER NOT NULL,
    UNIQUE(type, type_id)
);

-- ---------------------------------------------------------------------------
-- Streams (recipient_id is filled right after the recipient row exists)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS streams (
    id INTEGER PRIMARY KEY NOT NULL,
    realm_id INTEGER NOT NULL REFERENCES realms(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    invite_only INTEGER NOT NULL DEFAULT 0,
    is_web_public INTEGER NOT NULL DEFAULT 0,
    history_public_to_subscribers INTEGER NOT NULL DEFAULT 1,
    stream_post_policy INTEGER NOT NULL DEFAULT 1,
    message_retention_days INTEGER NULL,
    recipient_id INTEGER NULL REFERENCES recipients(id),
    deactivated INTEGER NOT NULL DEFAULT 0,
    date_created TEXT NOT NULL -- RFC3339
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_streams_realm_name ON streams(realm_id, name COLLATE NOCASE);

-- ---------------------------------------------------------------------------
-- Subscriptions (nullable notification flags fall back to user defaults)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    recipient_id INTEGER NOT NULL REFERENCES recipients(id),
    active INTEGER NOT NULL DEFAULT 1,
    color TEXT NOT NULL,
    is_muted INTEGER NOT NULL DEFAULT 0,
    pin_to_top INTEGER NOT NULL DEFAULT 0,
    desktop_notifications INTEGER NULL,
    audible_notifications INTEGER NULL,
    push_notifications INTEGER NULL,
    email_notifications INTEGER NULL,
    wildcard_mentions_notify INTEGER NULL,
    UNIQUE(user_id, recipient_id)
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_recipient_active ON subscriptions(recipient_id, active);

-- ---------------------------------------------------------------------------
-- Audit log (append-only)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS realm_audit_log (
    id INTEGER PRIMARY KEY NOT NULL,
    realm_id INTEGER NOT NULL REFERENCES realms(id),
    acting_user_id INTEGER NULL,
    modified_user_id INTEGER NULL,
    modified_stream_id INTEGER NULL,
    event_type INTEGER NOT NULL,
    event_time TEXT NOT NULL, -- RFC3339
    extra_data TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_realm_audit_log_realm ON realm_audit_log(realm_id, event_type);
"#;
