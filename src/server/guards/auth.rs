use crate::context::RequestContext;
use crate::error::SubcastError;
use crate::server::router::{RequestId, SubcastState};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use subtle::ConstantTimeEq;
use tracing::debug;

fn extract_header_token(headers: &HeaderMap) -> Option<String> {
    if let Some(k) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(k.to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Authenticates the caller by API key and pairs them with the request id.
impl FromRequestParts<SubcastState> for RequestContext {
    type Rejection = SubcastError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SubcastState,
    ) -> Result<Self, Self::Rejection> {
        let key = extract_header_token(&parts.headers)
            .filter(|key| !key.is_empty())
            .ok_or(SubcastError::Unauthorized("Missing API key"))?;
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        if let Some(user) = state.api_keys.get(&key) {
            return Ok(RequestContext::new(request_id, user));
        }

        let user = state
            .db
            .user_by_api_key(key.clone())
            .await?
            .filter(|user| user.is_active)
            .ok_or(SubcastError::Unauthorized("Invalid API key"))?;
        debug!(user_id = user.id, realm_id = user.realm_id, "api key resolved");
        state.api_keys.insert(key, user.clone());
        Ok(RequestContext::new(request_id, user))
    }
}

/// Guards the provisioning routes with the configured admin key.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdminKey;

impl FromRequestParts<SubcastState> for RequireAdminKey {
    type Rejection = SubcastError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SubcastState,
    ) -> Result<Self, Self::Rejection> {
        match extract_header_token(&parts.headers) {
            Some(key) => {
                let expected = state.admin_key.as_ref();
                if key.as_bytes().ct_eq(expected.as_bytes()).into() {
                    Ok(RequireAdminKey)
                } else {
                    Err(SubcastError::Unauthorized("Invalid admin key"))
                }
            }
            None => Err(SubcastError::Unauthorized("Missing admin key")),
        }
    }
}
