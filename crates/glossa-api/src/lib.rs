pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// The full daemon surface: JSON routes under `/api`, the notification
/// socket at `/ws`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/sessions", post(handlers::handle_session_register))
        .route("/sessions", get(handlers::handle_session_list))
        .route("/sessions/{id}", get(handlers::handle_session_inspect))
        .route("/sessions/{id}/end", post(handlers::handle_session_end))
        .route(
            "/sessions/{id}/ledger-ended",
            post(handlers::handle_session_ledger_ended),
        )
        .route("/events", post(handlers::handle_event))
        .route("/tutors/{address}", get(handlers::handle_tutor_profile))
        .route("/students/{address}", get(handlers::handle_student_profile))
        .route(
            "/registrations/{address}/invalidate",
            post(handlers::handle_registration_invalidate),
        )
        .route("/cache/flush", post(handlers::handle_cache_flush))
        .route("/daemon/shutdown", post(handlers::handle_shutdown))
        .with_state(state.clone());

    Router::new()
        .route("/ws", get(handlers::handle_channel))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(cors)
}

pub async fn serve(
    state: ApiState,
    bind: String,
    port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!(%bind, port, "API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
