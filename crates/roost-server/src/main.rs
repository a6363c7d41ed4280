use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use roost_api::auth::{self, AppState, AppStateInner};
use roost_api::messages;
use roost_api::middleware::require_auth;
use roost_api::posts;
use roost_api::users;
use roost_types::api::Envelope;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roost=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let mongo_uri =
        std::env::var("ROOST_MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = std::env::var("ROOST_DB_NAME").unwrap_or_else(|_| "roost".into());
    let jwt_secret =
        std::env::var("ROOST_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let host = std::env::var("ROOST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ROOST_PORT")
        .unwrap_or_else(|_| "3001".into())
        .parse()?;

    // Init database
    let db = roost_db::Database::connect(&mongo_uri, &db_name).await?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        started_at: Instant::now(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users/me", get(users::me).patch(users::update_me))
        .route("/api/users/search", get(users::search))
        .route("/api/users/{id}", get(users::by_id))
        .route("/api/users/{id}/posts", get(posts::user_posts))
        .route("/api/posts", post(posts::create))
        .route("/api/posts/feed", get(posts::feed))
        .route("/api/posts/{id}", get(posts::by_id))
        .route("/api/posts/{id}/like", post(posts::like).delete(posts::unlike))
        .route("/api/posts/{id}/comment", post(posts::comment))
        .route(
            "/api/messages/conversations",
            get(messages::list_conversations).post(messages::create_or_get_conversation),
        )
        .route(
            "/api/messages/conversations/{id}",
            get(messages::get_conversation),
        )
        .route(
            "/api/messages/conversations/{id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/api/messages/conversations/{id}/read",
            post(messages::mark_read),
        )
        .route("/api/messages/unread-count", get(messages::unread_count))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Roost server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(Envelope::ok(json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
