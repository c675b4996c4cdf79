//! Linkstash Server — HTTP API over the shared bookmark library.
//!
//! Thin axum server wrapping the linkstash_lib store. Saving through the
//! API runs the same fetch-and-classify pipeline as the CLI.
//!
//! Usage:
//!   LINKSTASH_DB=/path/to/links.db LINKSTASH_BIND=0.0.0.0:3841 linkstash-server
//!
//! Or with args:
//!   linkstash-server --db /path/to/links.db --bind 0.0.0.0:3841

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use linkstash_lib::{
    actions,
    app_state::{QueryState, SortBy, SortOrder},
    classifier,
    db::{CategoryCount, Database, Note, TagCount},
    settings, tags,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
struct AppState {
    db: Arc<Database>,
}

// ============================================================================
// Error type
// ============================================================================

struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1}))).into_response()
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError(StatusCode::INTERNAL_SERVER_ERROR, s)
    }
}

fn not_found(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::NOT_FOUND, msg.into())
}

fn bad_request(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, msg.into())
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Deserialize)]
struct SaveRequest {
    url: String,
}

#[derive(Deserialize)]
struct NotesQuery {
    search: Option<String>,
    /// Comma-separated category names (ORed)
    categories: Option<String>,
    /// Comma-separated tag names (ANDed)
    tags: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(Deserialize)]
struct SetCategoryRequest {
    category: Option<String>,
}

#[derive(Deserialize)]
struct SetTagsRequest {
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct RenameTagRequest {
    old: String,
    new: String,
}

#[derive(Deserialize)]
struct MergeTagsRequest {
    sources: Vec<String>,
    target: String,
}

#[derive(Serialize)]
struct UpdatedResponse {
    updated: usize,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    version: String,
    notes: usize,
    classifier_available: bool,
}

// ============================================================================
// Handlers
// ============================================================================

// POST /notes
async fn save_note_handler(
    State(state): State<AppState>,
    Json(req): Json<SaveRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let note = actions::save_url(&state.db, &req.url)
        .await
        .map_err(|e| {
            if e.contains("Invalid URL") || e.contains("already saved") {
                bad_request(e)
            } else {
                AppError::from(e)
            }
        })?;

    println!("[POST /notes] Saved '{}' (id: {})", note.title, &note.id[..8]);
    Ok((StatusCode::CREATED, Json(note)))
}

// GET /notes
async fn list_notes_handler(
    State(state): State<AppState>,
    Query(q): Query<NotesQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let mut query = QueryState::new();
    if let Some(search) = q.search {
        query.set_search_query(search);
    }
    query.set_selected_categories(split_csv(q.categories.as_deref()));
    query.set_selected_tags(split_csv(q.tags.as_deref()));

    let sort_by = match q.sort.as_deref() {
        Some(s) => SortBy::from_str(s).ok_or_else(|| bad_request(format!("Unknown sort field: {}", s)))?,
        None => SortBy::CreatedAt,
    };
    let sort_order = match q.order.as_deref() {
        Some(s) => SortOrder::from_str(s).ok_or_else(|| bad_request(format!("Unknown sort order: {}", s)))?,
        None => SortOrder::Desc,
    };
    query.set_sort(sort_by, sort_order);

    let notes = actions::get_notes(&state.db, &query)?;
    Ok(Json(notes))
}

// GET /notes/:id
async fn get_note_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Note>, AppError> {
    actions::get_note(&state.db, &id)
        .map(Json)
        .map_err(not_found)
}

// DELETE /notes/:id
async fn delete_note_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    actions::delete_note(&state.db, &id).map_err(not_found)?;
    println!("[DELETE /notes] Deleted {}", id);
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /notes/:id/category
async fn set_category_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetCategoryRequest>,
) -> Result<Json<Note>, AppError> {
    let note = actions::update_category(&state.db, &id, req.category).map_err(|e| {
        if e.contains("not found") {
            not_found(e)
        } else {
            AppError::from(e)
        }
    })?;
    Ok(Json(note))
}

// PATCH /notes/:id/tags
async fn set_tags_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetTagsRequest>,
) -> Result<Json<Note>, AppError> {
    let note = actions::update_tags(&state.db, &id, req.tags).map_err(|e| {
        if e.contains("not found") {
            not_found(e)
        } else {
            AppError::from(e)
        }
    })?;
    Ok(Json(note))
}

// GET /categories
async fn list_categories_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    Ok(Json(actions::get_categories(&state.db)?))
}

// GET /tags
async fn list_tags_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<TagCount>>, AppError> {
    Ok(Json(actions::get_tags(&state.db)?))
}

// POST /tags/rename
async fn rename_tag_handler(
    State(state): State<AppState>,
    Json(req): Json<RenameTagRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = tags::rename_tag(&state.db, &req.old, &req.new).map_err(bad_request)?;
    Ok(Json(UpdatedResponse { updated }))
}

// POST /tags/merge
async fn merge_tags_handler(
    State(state): State<AppState>,
    Json(req): Json<MergeTagsRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = tags::merge_tags(&state.db, &req.sources, &req.target).map_err(bad_request)?;
    Ok(Json(UpdatedResponse { updated }))
}

// DELETE /tags/:name
async fn delete_tag_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = tags::delete_tag(&state.db, &name).map_err(bad_request)?;
    Ok(Json(UpdatedResponse { updated }))
}

// GET /status
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let notes = actions::get_notes(&state.db, &QueryState::new())?.len();
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        notes,
        classifier_available: classifier::is_available(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn find_database(arg: Option<&str>) -> PathBuf {
    if let Some(path) = arg {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("LINKSTASH_DB") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(custom) = settings::get_custom_db_path() {
        return PathBuf::from(custom);
    }
    dirs::data_dir()
        .map(|p| p.join("linkstash").join("linkstash.db"))
        .unwrap_or_else(|| PathBuf::from("linkstash.db"))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Parse simple args (no clap to keep binary small)
    let args: Vec<String> = std::env::args().collect();
    let mut db_arg: Option<&str> = None;
    let mut bind_arg: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" if i + 1 < args.len() => {
                db_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--bind" if i + 1 < args.len() => {
                bind_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--help" | "-h" => {
                println!("linkstash-server — Bookmark library HTTP API");
                println!();
                println!("Usage: linkstash-server [--db PATH] [--bind ADDR:PORT]");
                println!();
                println!("Environment variables:");
                println!("  LINKSTASH_DB    Database path");
                println!("  LINKSTASH_BIND  Bind address (default: 0.0.0.0:3841)");
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_arg
        .map(|s| s.to_string())
        .or_else(|| std::env::var("LINKSTASH_BIND").ok())
        .unwrap_or_else(|| "0.0.0.0:3841".to_string());

    // Initialize settings (extraction/classifier endpoints, custom db path)
    let app_data_dir = dirs::data_dir()
        .map(|p| p.join("linkstash"))
        .unwrap_or_else(|| PathBuf::from("."));
    settings::init(app_data_dir);

    let db_path = find_database(db_arg);
    println!("[Server] Database: {}", db_path.display());
    println!("[Server] Binding to: {}", bind_addr);

    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("[Server] Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState { db };

    let app = Router::new()
        .route("/notes", post(save_note_handler).get(list_notes_handler))
        .route("/notes/{id}", get(get_note_handler).delete(delete_note_handler))
        .route("/notes/{id}/category", patch(set_category_handler))
        .route("/notes/{id}/tags", patch(set_tags_handler))
        .route("/categories", get(list_categories_handler))
        .route("/tags", get(list_tags_handler))
        .route("/tags/rename", post(rename_tag_handler))
        .route("/tags/merge", post(merge_tags_handler))
        .route("/tags/{name}", delete(delete_tag_handler))
        .route("/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[Server] Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    println!("[Server] Listening on {}", bind_addr);
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("[Server] Server error: {}", e);
        std::process::exit(1);
    }
}
