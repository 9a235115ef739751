use crate::context::RequestContext;
use crate::db::models::{DbRealm, DbRealmAuditLog, DbStream, DbSubscription, DbUser};
use crate::db::queries;
use crate::db::schema::SQLITE_INIT;
use crate::db::uow::UnitOfWork;
use crate::error::SubcastError;
use crate::events::EventDispatcher;
use crate::service;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use subcast_schema::{
    PropertyChangeRequest, RealmCreateRequest, SubscribeRequest, SubscribeResponse,
    SubscriptionInfo, UnsubscribeRequest, UnsubscribeResponse, UserCreateRequest,
};
use tracing::{info, warn};

type Reply<T> = RpcReplyPort<Result<T, SubcastError>>;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Create a realm (admin bootstrap).
    CreateRealm(RealmCreateRequest, Reply<DbRealm>),

    /// Create a user in a realm and announce them.
    CreateUser(i64, UserCreateRequest, Reply<DbUser>),

    /// Resolve an API key to an active user.
    UserByApiKey(String, Reply<Option<DbUser>>),

    Subscribe(RequestContext, SubscribeRequest, Reply<SubscribeResponse>),
    Unsubscribe(RequestContext, UnsubscribeRequest, Reply<UnsubscribeResponse>),
    ChangeProperties(RequestContext, PropertyChangeRequest, Reply<()>),
    ListSubscriptions(RequestContext, Reply<Vec<SubscriptionInfo>>),
    StreamSubscribers(RequestContext, i64, Reply<Vec<i64>>),

    /// Soft-delete a stream by id (admins).
    DeactivateStream(RequestContext, i64, Reply<DbStream>),

    /// Bring back a deactivated stream under a new name (admins).
    ReactivateStream(RequestContext, i64, String, Reply<DbStream>),

    /// Full audit log of a realm, oldest first.
    AuditLog(i64, Reply<Vec<DbRealmAuditLog>>),

    GetStream(i64, Reply<Option<DbStream>>),

    /// The (user, recipient) row regardless of `active`.
    SubscriptionRow(i64, i64, Reply<Option<DbSubscription>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

fn rpc_failed(op: &str, e: impl std::fmt::Display) -> SubcastError {
    SubcastError::RactorError(format!("DbActor {op} RPC failed: {e}"))
}

impl DbActorHandle {
    pub async fn create_realm(&self, request: RealmCreateRequest) -> Result<DbRealm, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::CreateRealm, request)
            .map_err(|e| rpc_failed("CreateRealm", e))?
    }

    pub async fn create_user(
        &self,
        realm_id: i64,
        request: UserCreateRequest,
    ) -> Result<DbUser, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::CreateUser, realm_id, request)
            .map_err(|e| rpc_failed("CreateUser", e))?
    }

    pub async fn user_by_api_key(&self, api_key: String) -> Result<Option<DbUser>, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::UserByApiKey, api_key)
            .map_err(|e| rpc_failed("UserByApiKey", e))?
    }

    pub async fn subscribe(
        &self,
        ctx: RequestContext,
        request: SubscribeRequest,
    ) -> Result<SubscribeResponse, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::Subscribe, ctx, request)
            .map_err(|e| rpc_failed("Subscribe", e))?
    }

    pub async fn unsubscribe(
        &self,
        ctx: RequestContext,
        request: UnsubscribeRequest,
    ) -> Result<UnsubscribeResponse, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::Unsubscribe, ctx, request)
            .map_err(|e| rpc_failed("Unsubscribe", e))?
    }

    pub async fn change_properties(
        &self,
        ctx: RequestContext,
        request: PropertyChangeRequest,
    ) -> Result<(), SubcastError> {
        ractor::call!(self.actor, DbActorMessage::ChangeProperties, ctx, request)
            .map_err(|e| rpc_failed("ChangeProperties", e))?
    }

    pub async fn list_subscriptions(
        &self,
        ctx: RequestContext,
    ) -> Result<Vec<SubscriptionInfo>, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::ListSubscriptions, ctx)
            .map_err(|e| rpc_failed("ListSubscriptions", e))?
    }

    pub async fn stream_subscribers(
        &self,
        ctx: RequestContext,
        stream_id: i64,
    ) -> Result<Vec<i64>, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::StreamSubscribers, ctx, stream_id)
            .map_err(|e| rpc_failed("StreamSubscribers", e))?
    }

    pub async fn deactivate_stream(
        &self,
        ctx: RequestContext,
        stream_id: i64,
    ) -> Result<DbStream, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::DeactivateStream, ctx, stream_id)
            .map_err(|e| rpc_failed("DeactivateStream", e))?
    }

    pub async fn reactivate_stream(
        &self,
        ctx: RequestContext,
        stream_id: i64,
        new_name: String,
    ) -> Result<DbStream, SubcastError> {
        ractor::call!(
            self.actor,
            DbActorMessage::ReactivateStream,
            ctx,
            stream_id,
            new_name
        )
        .map_err(|e| rpc_failed("ReactivateStream", e))?
    }

    pub async fn audit_log(&self, realm_id: i64) -> Result<Vec<DbRealmAuditLog>, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::AuditLog, realm_id)
            .map_err(|e| rpc_failed("AuditLog", e))?
    }

    pub async fn get_stream(&self, stream_id: i64) -> Result<Option<DbStream>, SubcastError> {
        ractor::call!(self.actor, DbActorMessage::GetStream, stream_id)
            .map_err(|e| rpc_failed("GetStream", e))?
    }

    pub async fn subscription_row(
        &self,
        user_id: i64,
        recipient_id: i64,
    ) -> Result<Option<DbSubscription>, SubcastError> {
        ractor::call!(
            self.actor,
            DbActorMessage::SubscriptionRow,
            user_id,
            recipient_id
        )
        .map_err(|e| rpc_failed("SubscriptionRow", e))?
    }
}

struct DbActorState {
    pool: SqlitePool,
    dispatcher: EventDispatcher,
}

struct DbActor;

/// Commits on success, rolls back on error. Post-commit hooks run only in the
/// first case.
async fn finish<T>(uow: UnitOfWork, result: Result<T, SubcastError>) -> Result<T, SubcastError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Runs `$body` against a fresh unit of work bound to `$uow`.
macro_rules! in_unit_of_work {
    ($pool:expr, |$uow:ident| $body:expr) => {
        async {
            let mut $uow = UnitOfWork::begin($pool).await?;
            let result = $body;
            finish($uow, result).await
        }
        .await
    };
}

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = (SqlitePool, EventDispatcher);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (pool, dispatcher): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(shards = dispatcher.shard_count(), "DbActor initialized");
        Ok(DbActorState { pool, dispatcher })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        let dispatcher = &state.dispatcher;
        match message {
            DbActorMessage::CreateRealm(request, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::admin::create_realm(&mut uow, request).await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::CreateUser(realm_id, request, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::admin::create_user(&mut uow, dispatcher, realm_id, request).await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::UserByApiKey(api_key, reply) => {
                let res = async {
                    let mut conn = pool.acquire().await?;
                    queries::user_by_api_key(&mut conn, &api_key).await
                }
                .await;
                let _ = reply.send(res);
            }
            DbActorMessage::Subscribe(ctx, request, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::subscriptions::subscribe(&mut uow, dispatcher, &ctx, request).await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::Unsubscribe(ctx, request, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::subscriptions::unsubscribe(&mut uow, dispatcher, &ctx, request).await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::ChangeProperties(ctx, request, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::subscriptions::change_properties(&mut uow, dispatcher, &ctx, request)
                        .await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::ListSubscriptions(ctx, reply) => {
                let res = async {
                    let mut conn = pool.acquire().await?;
                    service::subscriptions::list_subscriptions(&mut conn, &ctx).await
                }
                .await;
                let _ = reply.send(res);
            }
            DbActorMessage::StreamSubscribers(ctx, stream_id, reply) => {
                let res = async {
                    let mut conn = pool.acquire().await?;
                    service::subscriptions::stream_subscribers(&mut conn, &ctx, stream_id).await
                }
                .await;
                let _ = reply.send(res);
            }
            DbActorMessage::DeactivateStream(ctx, stream_id, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::streams::deactivate(&mut uow, dispatcher, &ctx, stream_id).await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::ReactivateStream(ctx, stream_id, new_name, reply) => {
                let res = in_unit_of_work!(pool, |uow| {
                    service::streams::reactivate(&mut uow, dispatcher, &ctx, stream_id, &new_name)
                        .await
                });
                let _ = reply.send(res);
            }
            DbActorMessage::AuditLog(realm_id, reply) => {
                let res = async {
                    let mut conn = pool.acquire().await?;
                    queries::audit_log_for_realm(&mut conn, realm_id).await
                }
                .await;
                let _ = reply.send(res);
            }
            DbActorMessage::GetStream(stream_id, reply) => {
                let res = async {
                    let mut conn = pool.acquire().await?;
                    queries::stream_by_id(&mut conn, stream_id).await
                }
                .await;
                let _ = reply.send(res);
            }
            DbActorMessage::SubscriptionRow(user_id, recipient_id, reply) => {
                let res = async {
                    let mut conn = pool.acquire().await?;
                    queries::subscription_row(&mut conn, user_id, recipient_id).await
                }
                .await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

/// Opens the SQLite pool (WAL, busy timeout) and applies the schema.
pub async fn connect(database_url: &str) -> Result<SqlitePool, SubcastError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
    apply_schema(&pool).await?;
    info!(database_url, "database ready");
    Ok(pool)
}

pub async fn spawn(
    pool: SqlitePool,
    dispatcher: EventDispatcher,
) -> Result<DbActorHandle, SubcastError> {
    let (actor, _jh) = Actor::spawn(None, DbActor, (pool, dispatcher))
        .await
        .map_err(|e| SubcastError::RactorError(format!("DbActor spawn failed: {e}")))?;
    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), SubcastError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
