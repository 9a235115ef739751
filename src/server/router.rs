use crate::config::{AuthConfig, EventQueueConfig};
use crate::db::{DbActorHandle, DbUser};
use crate::error::SubcastError;
use crate::events::EventDispatcher;
use crate::server::guards::auth::RequireAdminKey;
use crate::server::routes::{admin, events, streams, subscriptions};

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Uri, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use base64::Engine as _;
use moka::sync::Cache;
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id assigned by the access log, read by the context extractor.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct SubcastState {
    pub db: DbActorHandle,
    pub dispatcher: EventDispatcher,
    pub admin_key: Arc<str>,
    pub event_queue: Arc<EventQueueConfig>,
    /// Resolved API keys. Only hits are cached.
    pub api_keys: Cache<String, DbUser>,
}

impl SubcastState {
    pub fn new(
        db: DbActorHandle,
        dispatcher: EventDispatcher,
        admin_key: Arc<str>,
        event_queue: EventQueueConfig,
        auth: &AuthConfig,
    ) -> Self {
        let api_keys = Cache::builder()
            .max_capacity(auth.api_key_cache_capacity)
            .time_to_live(auth.ttl())
            .build();
        Self {
            db,
            dispatcher,
            admin_key,
            event_queue: Arc::new(event_queue),
            api_keys,
        }
    }
}

async fn not_found_handler(uri: Uri) -> SubcastError {
    SubcastError::NotFound(format!("No route for {}", uri.path()))
}

async fn access_log(mut req: Request, next: Next) -> Response {
    // Capture request metadata before moving `req` into the handler stack.
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);

    // Held long-polls report the time until the queue answered.
    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn subcast_router(state: SubcastState) -> Router {
    let admin = admin::router().layer(middleware::from_extractor_with_state::<
        RequireAdminKey,
        _,
    >(state.clone()));

    Router::new()
        .merge(subscriptions::router())
        .merge(streams::router())
        .merge(events::router())
        .merge(admin)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
