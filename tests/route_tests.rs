mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::Harness;
use serde_json::{Value, json};
use std::sync::Arc;
use subcast::config::{AuthConfig, EventQueueConfig};
use subcast::server::{SubcastState, subcast_router};
use tower::ServiceExt;

const ADMIN_KEY: &str = "admin-secret";

fn build_app(h: &Harness) -> Router {
    let state = SubcastState::new(
        h.db.clone(),
        h.dispatcher.clone(),
        Arc::from(ADMIN_KEY),
        EventQueueConfig {
            heartbeat_secs: 1,
            ..Default::default()
        },
        &AuthConfig::default(),
    );
    subcast_router(state)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

/// Creates a realm plus an admin, a member and a guest; returns their
/// (user id, api key) pairs.
async fn bootstrap(app: &Router) -> [(i64, String); 3] {
    let (status, realm) = call(
        app,
        Method::POST,
        "/api/v1/admin/realms",
        Some(ADMIN_KEY),
        Some(json!({"string_id": "zulip", "name": "Zulip Dev"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{realm}");
    let realm_id = realm["realm_id"].as_i64().expect("realm id");

    let mut users = Vec::new();
    for (name, role) in [("iago", "admin"), ("hamlet", "member"), ("polonius", "guest")] {
        let (status, created) = call(
            app,
            Method::POST,
            &format!("/api/v1/admin/realms/{realm_id}/users"),
            Some(ADMIN_KEY),
            Some(json!({
                "email": format!("{name}@zulip.com"),
                "full_name": name,
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{created}");
        users.push((
            created["user_id"].as_i64().expect("user id"),
            created["api_key"].as_str().expect("api key").to_string(),
        ));
    }
    users.try_into().expect("three users")
}

#[tokio::test]
async fn admin_routes_require_the_admin_key() {
    let h = Harness::new("route-admin").await;
    let app = build_app(&h);

    let body = json!({"string_id": "zulip", "name": "Zulip"});
    let (status, _) = call(&app, Method::POST, "/api/v1/admin/realms", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, resp) =
        call(&app, Method::POST, "/api/v1/admin/realms", Some("wrong"), Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["result"], "error");

    h.cleanup().await;
}

#[tokio::test]
async fn subscribe_list_and_members_flow() {
    let h = Harness::new("route-flow").await;
    let app = build_app(&h);
    let [(_, iago_key), (hamlet_id, hamlet_key), _] = bootstrap(&app).await;

    let (status, registered) = call(
        &app,
        Method::POST,
        "/api/v1/register",
        Some(&hamlet_key),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["last_event_id"], -1);
    assert_eq!(registered["subscriptions"], json!([]));
    let queue_id = registered["queue_id"].as_str().expect("queue id").to_string();

    let (status, subscribed) = call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": [{"name": "Denmark"}, {"name": "denmark "}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{subscribed}");
    assert_eq!(subscribed["result"], "success");
    assert_eq!(subscribed["subscribed"][hamlet_id.to_string()], json!(["Denmark"]));

    let (status, again) = call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": [{"name": "Denmark"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["already_subscribed"][hamlet_id.to_string()], json!(["Denmark"]));

    let (status, listed) = call(
        &app,
        Method::GET,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let subs = listed["subscriptions"].as_array().expect("array");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["name"], "Denmark");
    let stream_id = subs[0]["stream_id"].as_i64().expect("stream id");

    let (status, members) = call(
        &app,
        Method::GET,
        &format!("/api/v1/streams/{stream_id}/members"),
        Some(&iago_key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members["subscribers"], json!([hamlet_id]));

    let (status, events) = call(
        &app,
        Method::GET,
        &format!("/api/v1/events?queue_id={queue_id}&dont_block=true"),
        Some(&hamlet_key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events["queue_id"], queue_id.as_str());
    let added = events["events"]
        .as_array()
        .expect("events")
        .iter()
        .any(|e| e["type"] == "subscription" && e["op"] == "add");
    assert!(added, "{events}");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions/properties",
        Some(&hamlet_key),
        Some(json!({"subscription_data": [
            {"stream_id": stream_id, "property": "is_muted", "value": true}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, removed) = call(
        &app,
        Method::DELETE,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": ["Denmark", "Denmark"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["removed"], json!(["Denmark"]));
    assert_eq!(removed["not_removed"], json!([]));

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/v1/events?queue_id={queue_id}"),
        Some(&hamlet_key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, gone) = call(
        &app,
        Method::GET,
        &format!("/api/v1/events?queue_id={queue_id}&dont_block=true"),
        Some(&hamlet_key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gone["code"], "BAD_EVENT_QUEUE_ID");

    h.cleanup().await;
}

#[tokio::test]
async fn permission_failures_are_reported() {
    let h = Harness::new("route-perms").await;
    let app = build_app(&h);
    let [(_, iago_key), (hamlet_id, hamlet_key), (_, polonius_key)] = bootstrap(&app).await;

    let (status, _) = call(&app, Method::GET, "/api/v1/users/me/subscriptions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(
        &app,
        Method::GET,
        "/api/v1/users/me/subscriptions",
        Some("not-a-key"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, err) = call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions",
        Some(&polonius_key),
        Some(json!({"subscriptions": [{"name": "Elsinore"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "UNAUTHORIZED_PRINCIPAL");

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions",
        Some(&iago_key),
        Some(json!({"subscriptions": [{"name": "staff"}], "invite_only": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{created}");

    let (status, err) = call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": [{"name": "staff"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["msg"], "Unable to access channel (staff).");

    let (status, err) = call(
        &app,
        Method::DELETE,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": ["nowhere"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["msg"], "Channel(s) (nowhere) do not exist");

    let (status, err) = call(
        &app,
        Method::DELETE,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": ["staff"], "principals": [hamlet_id + 100]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{err}");

    let (status, missing) = call(&app, Method::GET, "/api/v1/nope", Some(&hamlet_key), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["code"], "NOT_FOUND");
    assert_eq!(missing["msg"], "No route for /api/v1/nope");

    h.cleanup().await;
}

#[tokio::test]
async fn stream_deactivation_is_admin_only() {
    let h = Harness::new("route-deactivate").await;
    let app = build_app(&h);
    let [(_, iago_key), (_, hamlet_key), _] = bootstrap(&app).await;

    call(
        &app,
        Method::POST,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        Some(json!({"subscriptions": [{"name": "Verona"}]})),
    )
    .await;
    let (_, listed) = call(
        &app,
        Method::GET,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        None,
    )
    .await;
    let stream_id = listed["subscriptions"][0]["stream_id"].as_i64().expect("id");

    let uri = format!("/api/v1/streams/{stream_id}");
    let (status, err) = call(&app, Method::DELETE, &uri, Some(&hamlet_key), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["msg"], "Must be an organization administrator");

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&iago_key), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, again) = call(&app, Method::DELETE, &uri, Some(&iago_key), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["msg"], "Channel is already deactivated.");

    let (_, listed) = call(
        &app,
        Method::GET,
        "/api/v1/users/me/subscriptions",
        Some(&hamlet_key),
        None,
    )
    .await;
    assert_eq!(listed["subscriptions"], json!([]));

    let (status, reactivated) = call(
        &app,
        Method::POST,
        &format!("/api/v1/streams/{stream_id}/reactivate"),
        Some(&iago_key),
        Some(json!({"new_name": "Verona again"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reactivated}");
    assert_eq!(reactivated["name"], "Verona again");
    assert_eq!(reactivated["invite_only"], true);

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/v1/streams/not-a-number/members",
        Some(&iago_key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    h.cleanup().await;
}
