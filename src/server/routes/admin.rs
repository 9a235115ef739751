use crate::error::SubcastError;
use crate::server::router::SubcastState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use subcast_schema::{RealmCreateRequest, RealmInfo, Success, UserCreateRequest, UserCreated};

/// Provisioning routes; the caller layers the admin key guard on top.
pub fn router() -> Router<SubcastState> {
    Router::new()
        .route("/api/v1/admin/realms", post(create_realm))
        .route("/api/v1/admin/realms/{realm_id}/users", post(create_user))
}

/// POST /api/v1/admin/realms
pub async fn create_realm(
    State(state): State<SubcastState>,
    payload: Result<Json<RealmCreateRequest>, JsonRejection>,
) -> Result<Json<Success<RealmInfo>>, SubcastError> {
    let Json(request) = payload?;
    let realm = state.db.create_realm(request).await?;
    Ok(Json(Success::new(RealmInfo {
        realm_id: realm.id,
        string_id: realm.string_id,
        name: realm.name,
        guests_can_access_all_users: realm.guests_can_access_all_users,
    })))
}

/// POST /api/v1/admin/realms/{realm_id}/users
pub async fn create_user(
    State(state): State<SubcastState>,
    realm_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UserCreateRequest>, JsonRejection>,
) -> Result<Json<Success<UserCreated>>, SubcastError> {
    let Path(realm_id) = realm_id?;
    let Json(request) = payload?;
    let user = state.db.create_user(realm_id, request).await?;
    Ok(Json(Success::new(UserCreated {
        user_id: user.id,
        api_key: user.api_key,
    })))
}
