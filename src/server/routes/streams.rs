use crate::context::RequestContext;
use crate::error::SubcastError;
use crate::server::router::SubcastState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde_json::{Map, Value};
use subcast_schema::{ReactivateStreamRequest, StreamInfo, SubscribersResponse, Success};

pub fn router() -> Router<SubcastState> {
    Router::new()
        .route("/api/v1/streams/{stream_id}/members", get(stream_members))
        .route("/api/v1/streams/{stream_id}", delete(deactivate_stream))
        .route(
            "/api/v1/streams/{stream_id}/reactivate",
            post(reactivate_stream),
        )
}

/// GET /api/v1/streams/{stream_id}/members
pub async fn stream_members(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    stream_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Success<SubscribersResponse>>, SubcastError> {
    let Path(stream_id) = stream_id?;
    let subscribers = state.db.stream_subscribers(ctx, stream_id).await?;
    Ok(Json(Success::new(SubscribersResponse { subscribers })))
}

/// DELETE /api/v1/streams/{stream_id}
pub async fn deactivate_stream(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    stream_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Success<Map<String, Value>>>, SubcastError> {
    let Path(stream_id) = stream_id?;
    state.db.deactivate_stream(ctx, stream_id).await?;
    Ok(Json(Success::new(Map::new())))
}

/// POST /api/v1/streams/{stream_id}/reactivate
pub async fn reactivate_stream(
    State(state): State<SubcastState>,
    ctx: RequestContext,
    stream_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ReactivateStreamRequest>, JsonRejection>,
) -> Result<Json<Success<StreamInfo>>, SubcastError> {
    let Path(stream_id) = stream_id?;
    let Json(request) = payload?;
    let stream = state
        .db
        .reactivate_stream(ctx, stream_id, request.new_name)
        .await?;
    Ok(Json(Success::new(stream.info())))
}
