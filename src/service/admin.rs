//! Provisioning of realms and users, reached through the admin key routes.

use crate::actions::audit_row;
use crate::db::queries;
use crate::db::{AuditEventType, DbRealm, DbUser, UnitOfWork};
use crate::error::SubcastError;
use crate::events::EventDispatcher;
use chrono::Utc;
use rand::Rng as _;
use serde_json::json;
use subcast_schema::{Event, RealmCreateRequest, RealmUserEvent, UserCreateRequest};
use tracing::info;

const API_KEY_LENGTH: usize = 32;
const MAX_STRING_ID_LENGTH: usize = 40;

fn generate_api_key() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

fn check_string_id(string_id: &str) -> Result<(), SubcastError> {
    let valid = !string_id.is_empty()
        && string_id.len() <= MAX_STRING_ID_LENGTH
        && string_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !string_id.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(SubcastError::bad_request(format!(
            "Invalid realm string id: '{string_id}'"
        )))
    }
}

fn check_email(email: &str) -> Result<(), SubcastError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(SubcastError::bad_request(format!(
            "Invalid email address: '{email}'"
        ))),
    }
}

pub async fn create_realm(
    uow: &mut UnitOfWork,
    request: RealmCreateRequest,
) -> Result<DbRealm, SubcastError> {
    let string_id = request.string_id.trim().to_string();
    check_string_id(&string_id)?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(SubcastError::bad_request("Realm name can't be empty."));
    }
    if queries::realm_string_id_taken(uow.conn(), &string_id).await? {
        return Err(SubcastError::bad_request(format!(
            "Realm string id '{string_id}' is already taken."
        )));
    }

    let now = Utc::now();
    let realm = queries::insert_realm(
        uow.conn(),
        &string_id,
        name,
        request.guests_can_access_all_users.unwrap_or(true),
        now,
    )
    .await?;
    queries::insert_audit_rows(
        uow.conn(),
        &[audit_row(
            realm.id,
            None,
            None,
            None,
            AuditEventType::RealmCreated,
            now,
            json!({}),
        )],
    )
    .await?;

    info!(realm_id = realm.id, string_id = %realm.string_id, "realm created");
    Ok(realm)
}

/// Creates an active user with a fresh API key and announces them to the
/// users of the realm who may see them.
pub async fn create_user(
    uow: &mut UnitOfWork,
    dispatcher: &EventDispatcher,
    realm_id: i64,
    request: UserCreateRequest,
) -> Result<DbUser, SubcastError> {
    let realm = super::load_realm(uow.conn(), realm_id).await?;
    let email = request.email.trim().to_lowercase();
    check_email(&email)?;
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(SubcastError::bad_request("Name can't be empty."));
    }
    if queries::user_email_taken(uow.conn(), realm.id, &email).await? {
        return Err(SubcastError::bad_request(format!(
            "Email '{email}' already in use in this organization."
        )));
    }

    let now = Utc::now();
    let user = queries::insert_user(
        uow.conn(),
        realm.id,
        &email,
        full_name,
        request.role,
        &generate_api_key(),
        now,
    )
    .await?;
    queries::insert_audit_rows(
        uow.conn(),
        &[audit_row(
            realm.id,
            None,
            Some(user.id),
            None,
            AuditEventType::UserCreated,
            now,
            json!({ "role": user.role }),
        )],
    )
    .await?;

    // A brand-new user shares no subscriptions, so restricted guests can't
    // see them yet.
    let audience: Vec<i64> = queries::active_realm_users(uow.conn(), realm.id)
        .await?
        .into_iter()
        .filter(|member| member.id != user.id)
        .filter(|member| realm.guests_can_access_all_users || !member.is_guest())
        .map(|member| member.id)
        .collect();
    dispatcher.send_event_on_commit(
        uow,
        realm.id,
        Event::RealmUser(RealmUserEvent::Add {
            person: user.person(),
        }),
        audience,
    );

    info!(realm_id = realm.id, user_id = user.id, role = user.role, "user created");
    Ok(user)
}
