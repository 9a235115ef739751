#![allow(dead_code)]

use chrono::Utc;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use subcast::config::EventQueueConfig;
use subcast::db::queries::{self, NewStream};
use subcast::db::{DbActorHandle, DbRealm, DbStream, DbUser, UnitOfWork};
use subcast::event_queue::{EventQueueHandle, FetchRequest, RegisterClient};
use subcast::events::EventDispatcher;
use sqlx::SqlitePool;
use subcast_schema::{QueuedEvent, UserRole};

pub fn unique_sqlite_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "subcast-{prefix}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    temp_path
}

/// A fresh database file, one queue shard and the database actor.
pub struct Harness {
    pub path: PathBuf,
    pub pool: SqlitePool,
    pub dispatcher: EventDispatcher,
    pub shard: EventQueueHandle,
    pub db: DbActorHandle,
}

impl Harness {
    pub async fn new(prefix: &str) -> Self {
        Self::with_queue_config(prefix, EventQueueConfig::default()).await
    }

    pub async fn with_queue_config(prefix: &str, cfg: EventQueueConfig) -> Self {
        let path = unique_sqlite_path(prefix);
        let database_url = format!("sqlite:{}", path.display());
        let pool = subcast::db::connect(&database_url)
            .await
            .expect("connect database");
        let shard = subcast::event_queue::spawn(0, cfg)
            .await
            .expect("spawn queue shard");
        let dispatcher = EventDispatcher::new(vec![shard.clone()]);
        let db = subcast::db::spawn(pool.clone(), dispatcher.clone())
            .await
            .expect("spawn db actor");
        Self {
            path,
            pool,
            dispatcher,
            shard,
            db,
        }
    }

    pub async fn realm(&self, string_id: &str, guests_can_access_all_users: bool) -> DbRealm {
        let mut conn = self.pool.acquire().await.expect("acquire");
        queries::insert_realm(
            &mut conn,
            string_id,
            string_id,
            guests_can_access_all_users,
            Utc::now(),
        )
        .await
        .expect("insert realm")
    }

    pub async fn user(&self, realm: &DbRealm, name: &str, role: UserRole) -> DbUser {
        let mut conn = self.pool.acquire().await.expect("acquire");
        queries::insert_user(
            &mut conn,
            realm.id,
            &format!("{name}@{}.example", realm.string_id),
            name,
            role,
            &format!("key-{}-{name}", realm.string_id),
            Utc::now(),
        )
        .await
        .expect("insert user")
    }

    pub async fn stream(&self, realm: &DbRealm, name: &str, invite_only: bool) -> DbStream {
        let mut uow = UnitOfWork::begin(&self.pool).await.expect("begin");
        let stream = queries::insert_stream(
            uow.conn(),
            realm.id,
            &NewStream {
                name: name.to_string(),
                description: String::new(),
                invite_only,
                is_web_public: false,
                history_public_to_subscribers: true,
                stream_post_policy: 1,
                message_retention_days: None,
            },
            Utc::now(),
        )
        .await
        .expect("insert stream");
        uow.commit().await.expect("commit");
        stream
    }

    pub async fn reload_stream(&self, stream_id: i64) -> DbStream {
        self.db
            .get_stream(stream_id)
            .await
            .expect("get stream")
            .expect("stream exists")
    }

    /// Registers an unfiltered queue for `user`.
    pub async fn register(&self, user: &DbUser) -> String {
        self.shard
            .register(RegisterClient {
                user_id: user.id,
                realm_id: user.realm_id,
                event_types: None,
                lifespan_secs: None,
            })
            .await
            .expect("register queue")
    }

    /// Everything currently queued, without blocking.
    pub async fn drain(&self, user: &DbUser, queue_id: &str) -> Vec<QueuedEvent> {
        self.shard
            .get_events(
                FetchRequest {
                    queue_id: queue_id.to_string(),
                    user_id: user.id,
                    last_event_id: None,
                    dont_block: true,
                },
                std::time::Duration::from_secs(1),
            )
            .await
            .expect("fetch events")
    }

    pub async fn cleanup(self) {
        self.pool.close().await;
        let _ = tokio::fs::remove_file(&self.path).await;
    }
}
