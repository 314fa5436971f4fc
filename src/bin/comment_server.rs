// Comment Service Web Server - REST API over the comment application service
// Thin transport layer: routing, request DTOs, identity extraction, wiring

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sqlx::postgres::PgPoolOptions;

use comment_service::config::Config;
use comment_service::error::{AppError, AppResult};
use comment_service::infrastructure::{
    events::{run_entity_deleted_consumer, EventSink, NatsEventSink},
    middleware::{viewer_context_middleware, JwtAuthenticator, Vc},
    postgres::PostgresCommentStore,
    store::{CommentStore, ReactionLedger},
};
use comment_service::models::comment::{EntityType, ReactionKind};
use comment_service::models::views::{CommentPage, CommentView, CreateCommentResponse};
use comment_service::services::{CommentService, CreateComment};

// API request types
#[derive(Serialize, Deserialize)]
struct CreateCommentRequest {
    text: String,
}

#[derive(Deserialize)]
struct CursorQuery {
    cursor: Option<String>,
}

#[derive(Clone)]
struct AppState {
    service: Arc<CommentService>,
}

fn parse_entity_type(raw: &str) -> AppResult<EntityType> {
    EntityType::from_str(raw).map_err(AppError::BadRequest)
}

// API Handlers

async fn list_entity_comments(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Query(query): Query<CursorQuery>,
) -> AppResult<Json<CommentPage>> {
    let entity_type = parse_entity_type(&entity_type)?;

    let page = state
        .service
        .list_comments(entity_id, entity_type, query.cursor.as_deref(), vc.user_id())
        .await?;

    Ok(Json(page))
}

async fn list_comment_children(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, comment_id)): Path<(String, i64)>,
    Query(query): Query<CursorQuery>,
) -> AppResult<Json<CommentPage>> {
    parse_entity_type(&entity_type)?;

    let page = state
        .service
        .list_children(comment_id, query.cursor.as_deref(), vc.user_id())
        .await?;

    Ok(Json(page))
}

async fn create_entity_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Json(request): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CreateCommentResponse>)> {
    let entity_type = parse_entity_type(&entity_type)?;
    let user = vc.require_user()?.clone();

    let comment = state
        .service
        .create_comment(CreateComment {
            entity_id,
            entity_type,
            author_id: user.user_id,
            author_username: user.username,
            author_avatar: user.avatar,
            text: request.text,
            parent_id: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreateCommentResponse { comment })))
}

async fn reply_to_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, comment_id)): Path<(String, i64)>,
    Json(request): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CreateCommentResponse>)> {
    parse_entity_type(&entity_type)?;
    let user = vc.require_user()?.clone();

    // A reply inherits its parent's entity binding; the path kind is only
    // validated, never trusted for the write.
    let parent = state
        .service
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

    let comment = state
        .service
        .create_comment(CreateComment {
            entity_id: parent.entity_id,
            entity_type: parent.entity_type,
            author_id: user.user_id,
            author_username: user.username,
            author_avatar: user.avatar,
            text: request.text,
            parent_id: Some(comment_id),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreateCommentResponse { comment })))
}

async fn like_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, comment_id)): Path<(String, i64)>,
) -> AppResult<Json<CommentView>> {
    parse_entity_type(&entity_type)?;
    let user = vc.require_user()?;

    let view = state
        .service
        .set_reaction(comment_id, user.user_id, Some(ReactionKind::Like))
        .await?;

    Ok(Json(view))
}

async fn dislike_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, comment_id)): Path<(String, i64)>,
) -> AppResult<Json<CommentView>> {
    parse_entity_type(&entity_type)?;
    let user = vc.require_user()?;

    let view = state
        .service
        .set_reaction(comment_id, user.user_id, Some(ReactionKind::Dislike))
        .await?;

    Ok(Json(view))
}

async fn clear_reaction(
    State(state): State<AppState>,
    vc: Vc,
    Path((entity_type, comment_id)): Path<(String, i64)>,
) -> AppResult<Json<CommentView>> {
    parse_entity_type(&entity_type)?;
    let user = vc.require_user()?;

    let view = state
        .service
        .set_reaction(comment_id, user.user_id, None)
        .await?;

    Ok(Json(view))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting comment service...");

    let config = Config::from_env().map_err(|e| AppError::ConfigurationError(e.to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

    let store = Arc::new(PostgresCommentStore::new(pool));
    store.initialize().await?;
    store.health_check().await?;
    info!("✅ Database ready");

    let comment_store: Arc<dyn CommentStore> = store.clone();
    let reaction_ledger: Arc<dyn ReactionLedger> = store;

    let events: Option<Arc<dyn EventSink>> = match &config.events.nats_url {
        Some(url) => {
            let client = async_nats::connect(url.as_str()).await.map_err(|e| {
                AppError::ConfigurationError(format!("Failed to connect to NATS at {}: {}", url, e))
            })?;

            tokio::spawn(run_entity_deleted_consumer(
                client.clone(),
                config.events.entity_deleted_subject.clone(),
                comment_store.clone(),
            ));

            info!("✅ Event transport connected");
            Some(Arc::new(NatsEventSink::new(
                client,
                config.events.comment_created_subject.clone(),
                config.events.comment_count_subject.clone(),
            )))
        }
        None => {
            warn!("NATS_URL not set; running without event publishing");
            None
        }
    };

    let service = Arc::new(CommentService::new(
        comment_store,
        reaction_ledger,
        events,
        config.pagination.page_size,
    ));
    let auth = Arc::new(JwtAuthenticator::new(&config.auth.jwt_secret));

    let app_state = AppState { service };

    let api = Router::new()
        .route("/{entity_type}/comments/{id}", get(list_entity_comments))
        .route(
            "/{entity_type}/comments/{id}/children",
            get(list_comment_children),
        )
        .route("/{entity_type}/comments/{id}/replies", post(reply_to_comment))
        .route("/{entity_type}/comments/{id}/like", post(like_comment))
        .route("/{entity_type}/comments/{id}/dislike", post(dislike_comment))
        .route("/{entity_type}/comments/{id}/reaction", delete(clear_reaction))
        .route("/{entity_type}/{entity_id}/comments", post(create_entity_comment));

    let app = Router::new()
        .nest("/api/v1", api)
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(middleware::from_fn_with_state(
                    auth,
                    viewer_context_middleware,
                )),
        )
        .with_state(app_state);

    let addr = config.server_address();
    info!("🌐 Server starting on http://{}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
