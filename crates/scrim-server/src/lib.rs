pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod recorder;
pub mod registry;
pub mod state;
pub mod ticker;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use config::ServerConfig;
use recorder::MatchRecorder;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig, recorder: Arc<dyn MatchRecorder>) -> (Router<()>, AppState) {
    let state = AppState::new(config, recorder);

    let api_routes = Router::new()
        .route("/rooms", axum::routing::get(api::list_rooms))
        .route(
            "/matches/{match_id}/end",
            axum::routing::post(api::end_match),
        );

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .nest("/api/v1", api_routes)
        .with_state(state.clone());

    (app, state)
}
