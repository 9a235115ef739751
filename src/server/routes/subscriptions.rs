use crate::context::RequestContext;
use crate::error::SubcastError;
use crate::server::router::SubcastState;
use axum::extract::rejection::JsonRejection;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde_json::{Map, Value};
use subcast_schema::{
    PropertyChangeRequest, SubscribeRequest, SubscribeResponse, SubscriptionsResponse, Success,
    UnsubscribeRequest, UnsubscribeResponse,
};

pub fn router() -> Router<SubcastState> {
    Router::new()
        .route(
            "/api/v1/users/me/subscriptions",
            get(list_subscriptions)
                .post(subscribe)
                .delete(unsubscribe),
        )
        .route(
            "/api/v1/users/me/subscriptions/properties",
            post(change_properties),
        )
}

/// POST /api/v1/users/me/subscriptions
pub async fn subscribe(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Success<SubscribeResponse>>, SubcastError> {
    let Json(request) = payload?;
    let response = state.db.subscribe(ctx, request).await?;
    Ok(Json(Success::new(response)))
}

/// DELETE /api/v1/users/me/subscriptions
pub async fn unsubscribe(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<Success<UnsubscribeResponse>>, SubcastError> {
    let Json(request) = payload?;
    let response = state.db.unsubscribe(ctx, request).await?;
    Ok(Json(Success::new(response)))
}

/// GET /api/v1/users/me/subscriptions
pub async fn list_subscriptions(
    State(state): State<SubcastState>,
    ctx: RequestContext,
) -> Result<Json<Success<SubscriptionsResponse>>, SubcastError> {
    let subscriptions = state.db.list_subscriptions(ctx).await?;
    Ok(Json(Success::new(SubscriptionsResponse { subscriptions })))
}

/// POST /api/v1/users/me/subscriptions/properties
pub async fn change_properties(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    payload: Result<Json<PropertyChangeRequest>, JsonRejection>,
) -> Result<Json<Success<Map<String, Value>>>, SubcastError> {
    let Json(request) = payload?;
    state.db.change_properties(ctx, request).await?;
    Ok(Json(Success::new(Map::new())))
}
