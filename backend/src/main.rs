//! DevConnect Backend
//!
//! REST and WebSocket backend for a developer community: profiles, projects,
//! likes, follows, comments, direct messages and image uploads. SQLite
//! persistence, Tantivy full-text search, and an in-process change feed.

mod api;
mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod models;
mod realtime;
mod search;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use realtime::{ChangeFeed, UnreadHub};
use search::SearchIndex;
use storage::Storage;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub storage: Arc<Storage>,
    pub feed: ChangeFeed,
    pub unread: Arc<UnreadHub>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire up shared state and start the unread hub. Needs a Tokio runtime.
    pub fn new(repo: Repository, search: SearchIndex, storage: Storage, config: Config) -> Self {
        let repo = Arc::new(repo);
        let feed = ChangeFeed::default();
        let unread = UnreadHub::new(Arc::clone(&repo));
        unread.start(&feed);

        Self {
            repo,
            search: Arc::new(search),
            storage: Arc::new(storage),
            feed,
            unread,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DevConnect Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!(
            "No API PSK configured (DEVCONNECT_API_PSK). Anyone can open sessions!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    let purged = repo.purge_expired_sessions().await?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    // Initialize search index from database
    let search = SearchIndex::open(&config.index_path)?;
    tracing::info!("Building search index...");
    search.rebuild(&repo.list_projects().await?).await?;

    let storage = Storage::from_config(&config).await?;

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, search, storage, config);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    // Identity-provider back-channel
    let auth_routes = Router::new()
        .route("/auth/sessions", post(api::create_session))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // User routes
    let user_routes = Router::new()
        .route("/auth/sessions/current", delete(api::delete_current_session))
        // Profiles
        .route("/profiles", get(api::list_profiles))
        .route(
            "/profiles/me",
            get(api::get_my_profile).put(api::update_my_profile),
        )
        .route("/profiles/{id}", get(api::get_profile))
        // Social graph
        .route(
            "/users/{id}/follow",
            get(api::follow_status)
                .post(api::follow_user)
                .delete(api::unfollow_user),
        )
        .route("/users/{id}/following", get(api::list_following))
        .route("/users/{id}/followers", get(api::list_followers))
        .route("/users/likes", get(api::list_liked_projects))
        // Projects
        .route("/projects", get(api::list_projects).post(api::create_project))
        .route(
            "/projects/{id}",
            get(api::get_project)
                .put(api::update_project)
                .delete(api::delete_project),
        )
        .route("/projects/{id}/like", post(api::toggle_like))
        .route(
            "/projects/{id}/comments",
            get(api::list_comments).post(api::create_comment),
        )
        // Search
        .route("/search", get(api::search_projects))
        // Uploads
        .route(
            "/upload",
            post(api::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Chat
        .route("/chat/recent", get(api::recent_chats))
        .route(
            "/chat/{user_id}/messages",
            get(api::list_messages).post(api::send_message),
        )
        .route("/chat/{user_id}/read", post(api::mark_read))
        .route("/chat/{user_id}/ws", get(api::conversation_ws))
        // Notifications
        .route("/notifications/unread", get(api::unread_count))
        .route("/notifications/ws", get(api::notifications_ws))
        // Apply session auth middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth_layer,
        ));

    // No auth required
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/storage/{bucket}/{*path}", get(api::serve_object));

    Router::new()
        .nest("/api", auth_routes.merge(user_routes))
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
