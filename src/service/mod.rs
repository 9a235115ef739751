//! Request-level operations: resolve the caller's input against the store,
//! check permissions, then hand off to the actions. Each function runs in the
//! database actor inside one unit of work.

pub mod admin;
pub mod streams;
pub mod subscriptions;

use crate::context::RequestContext;
use crate::db::queries;
use crate::db::{DbRealm, DbStream, DbUser};
use crate::error::SubcastError;
use sqlx::SqliteConnection;

pub(crate) async fn load_realm(
    conn: &mut SqliteConnection,
    realm_id: i64,
) -> Result<DbRealm, SubcastError> {
    queries::realm_by_id(conn, realm_id)
        .await?
        .ok_or_else(|| SubcastError::NotFound(format!("Realm {realm_id} not found")))
}

/// The stream `stream_id` if it belongs to the caller's realm; deactivated
/// streams only when `include_deactivated`.
pub(crate) async fn load_stream(
    conn: &mut SqliteConnection,
    ctx: &RequestContext,
    stream_id: i64,
    include_deactivated: bool,
) -> Result<DbStream, SubcastError> {
    match queries::stream_by_id(conn, stream_id).await? {
        Some(stream)
            if stream.realm_id == ctx.realm_id()
                && (include_deactivated || !stream.deactivated) =>
        {
            Ok(stream)
        }
        _ => Err(SubcastError::bad_request("Invalid channel ID")),
    }
}

/// Users named by `principals`, or the caller when none are given. Every id
/// must be an active user of the caller's realm.
pub(crate) async fn resolve_principals(
    conn: &mut SqliteConnection,
    ctx: &RequestContext,
    principals: Option<&[i64]>,
) -> Result<Vec<DbUser>, SubcastError> {
    let ids = match principals {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Ok(vec![ctx.user.clone()]),
    };
    let found = queries::users_by_ids(conn, ids).await?;
    for id in ids {
        let valid = found
            .iter()
            .any(|user| user.id == *id && user.realm_id == ctx.realm_id() && user.is_active);
        if !valid {
            return Err(SubcastError::bad_request(format!("No such user: {id}")));
        }
    }
    Ok(found)
}

pub(crate) fn require_admin(ctx: &RequestContext) -> Result<(), SubcastError> {
    if ctx.user.is_realm_admin() {
        Ok(())
    } else {
        Err(SubcastError::admin_required())
    }
}
