use crate::context::RequestContext;
use crate::error::SubcastError;
use crate::event_queue::{FetchRequest, RegisterClient};
use crate::server::router::SubcastState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use subcast_schema::{GetEventsQuery, GetEventsResponse, RegisterRequest, RegisterResponse, Success};
use tracing::info;

pub fn router() -> Router<SubcastState> {
    Router::new()
        .route("/api/v1/register", post(register))
        .route("/api/v1/events", get(get_events).delete(delete_queue))
}

#[derive(Debug, Deserialize)]
pub struct QueueIdQuery {
    pub queue_id: String,
}

/// POST /api/v1/register
///
/// The queue exists before the subscription snapshot is read, so a change
/// racing with registration shows up in the queue.
pub async fn register(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Success<RegisterResponse>>, SubcastError> {
    let Json(request) = payload?;
    let wants_subscriptions = request
        .event_types
        .as_ref()
        .is_none_or(|types| types.iter().any(|t| t == "subscription"));

    let shard = state.dispatcher.shard_for_realm(ctx.realm_id())?;
    let queue_id = shard
        .register(RegisterClient {
            user_id: ctx.user.id,
            realm_id: ctx.realm_id(),
            event_types: request.event_types,
            lifespan_secs: request.lifespan_secs,
        })
        .await?;
    info!(request_id = %ctx.request_id, user_id = ctx.user.id, queue_id = %queue_id, "event queue registered");

    let subscriptions = if wants_subscriptions {
        Some(state.db.list_subscriptions(ctx).await?)
    } else {
        None
    };
    Ok(Json(Success::new(RegisterResponse {
        queue_id,
        last_event_id: -1,
        subscriptions,
    })))
}

/// GET /api/v1/events
pub async fn get_events(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    query: Result<Query<GetEventsQuery>, QueryRejection>,
) -> Result<Json<Success<GetEventsResponse>>, SubcastError> {
    let Query(query) = query?;
    let shard = state.dispatcher.shard_for_realm(ctx.realm_id())?;
    let events = shard
        .get_events(
            FetchRequest {
                queue_id: query.queue_id.clone(),
                user_id: ctx.user.id,
                last_event_id: query.last_event_id,
                dont_block: query.dont_block,
            },
            state.event_queue.heartbeat(),
        )
        .await?;
    Ok(Json(Success::new(GetEventsResponse {
        events,
        queue_id: query.queue_id,
    })))
}

/// DELETE /api/v1/events
pub async fn delete_queue(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    query: Result<Query<QueueIdQuery>, QueryRejection>,
) -> Result<Json<Success<Map<String, Value>>>, SubcastError> {
    let Query(query) = query?;
    let shard = state.dispatcher.shard_for_realm(ctx.realm_id())?;
    shard.delete(&query.queue_id, ctx.user.id).await?;
    Ok(Json(Success::new(Map::new())))
}
