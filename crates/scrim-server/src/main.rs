use std::process;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use scrim_server::build_app;
use scrim_server::config::ServerConfig;
use scrim_server::recorder::{DisabledRecorder, MatchRecorder};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();

    let recorder = build_recorder(&config).await;
    let listen_addr = config.listen_addr.clone();
    let (app, _state) = build_app(config, recorder);

    tracing::info!(addr = %listen_addr, "Scrim server starting");

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind listener");
            process::exit(1);
        },
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        process::exit(1);
    }
}

/// Pick the match recorder: Postgres when a database URL is configured,
/// otherwise the in-process fallback. A configured but unreachable
/// database is fatal at startup.
#[cfg(feature = "postgres")]
async fn build_recorder(config: &ServerConfig) -> Arc<dyn MatchRecorder> {
    use scrim_server::recorder::PostgresRecorder;

    let Some(url) = config.database.url.as_deref() else {
        tracing::info!("No database configured, match history disabled");
        return Arc::new(DisabledRecorder::new());
    };

    let recorder = match PostgresRecorder::connect(url).await {
        Ok(recorder) => recorder,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to Postgres");
            process::exit(1);
        },
    };
    if let Err(e) = recorder.ensure_schema().await {
        tracing::error!(error = %e, "Failed to prepare match history schema");
        process::exit(1);
    }
    tracing::info!("Connected to Postgres, match history enabled");
    Arc::new(recorder)
}

#[cfg(not(feature = "postgres"))]
async fn build_recorder(_config: &ServerConfig) -> Arc<dyn MatchRecorder> {
    tracing::info!("Built without postgres support, match history disabled");
    Arc::new(DisabledRecorder::new())
}
