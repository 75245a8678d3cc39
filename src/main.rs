use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::{error, info};

use procurement_api as api;
use api::repositories::{
    InMemoryRequirementRepository, RequirementRepository, SqlRequirementRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init store
    let (db, repository): (_, Arc<dyn RequirementRepository>) = if cfg.uses_memory_store() {
        info!("Using the in-memory requirement store; data is lost on shutdown");
        (None, Arc::new(InMemoryRequirementRepository::new()))
    } else {
        let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
        if cfg.auto_migrate {
            api::db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        let db_arc = Arc::new(db_pool);
        (
            Some(db_arc.clone()),
            Arc::new(SqlRequirementRepository::new(db_arc)),
        )
    };

    // Init events
    let (event_sender, event_rx) = api::events::EventSender::channel(cfg.event_channel_capacity);
    tokio::spawn(api::events::process_events(event_rx));

    let auth_service = Arc::new(api::auth::AuthService::new(
        api::auth::AuthConfig::from(&cfg),
    ));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let app_state = api::AppState::new(cfg, db, repository, event_sender);
    let app = api::build_router(app_state, auth_service);

    // Bind and serve
    info!("procurement-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("procurement-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
