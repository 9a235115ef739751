use mimalloc::MiMalloc;
use subcast::config::Config;
use subcast::events::EventDispatcher;
use subcast::server::{SubcastState, subcast_router};
use subcast::utils::logging::init_tracing;
use tokio::{net::TcpListener, signal};
use tracing::info;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_toml();
    init_tracing(&cfg.basic.loglevel);

    info!(
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        listen = %cfg.basic.listen_socket(),
        shards = cfg.event_queue.shards,
        heartbeat_secs = cfg.event_queue.heartbeat_secs,
        default_lifespan_secs = cfg.event_queue.default_lifespan_secs,
        max_lifespan_secs = cfg.event_queue.max_lifespan_secs,
        gc_interval_secs = cfg.event_queue.gc_interval_secs,
        max_queue_len = cfg.event_queue.max_queue_len,
        "configuration loaded"
    );

    let shards = subcast::event_queue::spawn_shards(&cfg.event_queue).await?;
    let dispatcher = EventDispatcher::new(shards);
    let pool = subcast::db::connect(&cfg.basic.database_url).await?;
    let db = subcast::db::spawn(pool, dispatcher.clone()).await?;

    let state = SubcastState::new(
        db,
        dispatcher,
        cfg.basic.admin_key.shared(),
        cfg.event_queue.clone(),
        &cfg.auth,
    );
    let app = subcast_router(state);

    let addr = cfg.basic.listen_socket();
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
