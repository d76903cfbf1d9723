//! Axum + Askama wiki pages and the development-only admin JSON API.

use std::path::PathBuf;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use grw_core::{
    current_occurrence, is_event_active, predict_future_occurrences, CategoryDefinition,
    EventOccurrence, EventStatus, GameEvent, GameMeta,
};
use grw_storage::{admin_enabled_from_env, sort_entities, DataStore, SortOrder, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::net::TcpListener;
use tracing::info;

pub const CRATE_NAME: &str = "grw-web";

/// Number of future occurrences shown on an event detail page.
const PREDICTED_OCCURRENCES_SHOWN: usize = 5;

/// Fields the admin list endpoint searches when `?search=` is given.
const ADMIN_SEARCH_FIELDS: &[&str] = &["name", "slug", "description"];

#[derive(Clone)]
pub struct AppState {
    pub store: DataStore,
    pub admin_enabled: bool,
    pub assets_dir: PathBuf,
}

impl AppState {
    pub fn new(store: DataStore, admin_enabled: bool, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            admin_enabled,
            assets_dir: assets_dir.into(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/games/{game}", get(game_handler))
        .route("/games/{game}/events", get(events_handler))
        .route("/games/{game}/events/{slug}", get(event_detail_handler))
        .route("/games/{game}/{category}", get(category_handler))
        .route(
            "/games/{game}/{category}/{slug}",
            get(entity_detail_handler),
        )
        .route(
            "/api/admin/{game}/{entity_type}",
            get(admin_list_handler)
                .post(admin_create_handler)
                .put(admin_update_handler)
                .delete(admin_delete_handler),
        )
        .route("/assets/static/app.css", get(app_css_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("GRW_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let data_dir =
        std::env::var("GRW_DATA_DIR").unwrap_or_else(|_| "data/games".to_string());
    let admin_enabled = admin_enabled_from_env();

    let state = AppState::new(DataStore::new(&data_dir), admin_enabled, "assets/static");
    info!(port, data_dir, admin_enabled, "starting wiki server");

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Page templates

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    games: Vec<GameCard>,
}

struct GameCard {
    slug: String,
    name: String,
    description: String,
    category_count: usize,
    entity_count: usize,
}

#[derive(Template)]
#[template(path = "game.html")]
struct GameTemplate {
    game_slug: String,
    game_name: String,
    description: String,
    categories: Vec<CategoryCard>,
    active_events: Vec<EventRow>,
}

struct CategoryCard {
    slug: String,
    name: String,
    description: String,
    count: usize,
}

#[derive(Template)]
#[template(path = "events.html")]
struct EventsTemplate {
    game_slug: String,
    game_name: String,
    events: Vec<EventRow>,
}

struct EventRow {
    slug: String,
    name: String,
    status: String,
    window: String,
    countdown: String,
}

#[derive(Template)]
#[template(path = "event_detail.html")]
struct EventDetailTemplate {
    game_slug: String,
    game_name: String,
    name: String,
    description: String,
    status: String,
    window: String,
    countdown: String,
    predictions: Vec<PredictionRow>,
    stages: Vec<StageRow>,
}

struct PredictionRow {
    cycle_index: u64,
    starts: String,
    ends: String,
    status: String,
}

struct StageRow {
    name: String,
    requirements_text: String,
    rewards_text: String,
}

#[derive(Template)]
#[template(path = "category.html")]
struct CategoryTemplate {
    game_slug: String,
    game_name: String,
    category_slug: String,
    category_name: String,
    search: String,
    headers: Vec<String>,
    rows: Vec<EntityListRow>,
}

struct EntityListRow {
    slug: String,
    name: String,
    cells: Vec<String>,
}

#[derive(Template)]
#[template(path = "entity_detail.html")]
struct EntityDetailTemplate {
    game_slug: String,
    game_name: String,
    category_slug: String,
    category_name: String,
    name: String,
    description: String,
    fields: Vec<FieldRow>,
}

struct FieldRow {
    label: String,
    value: String,
}

#[derive(Template)]
#[template(path = "not_found.html")]
struct NotFoundTemplate {
    message: String,
}

// ---------------------------------------------------------------------------
// Page handlers

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let games = match state.store.list_games().await {
        Ok(games) => games,
        Err(err) => return server_error(err.into()),
    };

    let mut cards = Vec::with_capacity(games.len());
    for meta in games {
        let mut entity_count = 0;
        for category in &meta.categories {
            entity_count += state
                .store
                .entity_count(&meta.slug, &category.entity_type)
                .await;
        }
        cards.push(GameCard {
            slug: meta.slug,
            name: meta.name,
            description: meta.description.unwrap_or_default(),
            category_count: meta.categories.len(),
            entity_count,
        });
    }

    render_html(IndexTemplate { games: cards })
}

async fn game_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(game): AxumPath<String>,
) -> Response {
    let meta = match state.store.load_game_meta(&game).await {
        Ok(meta) => meta,
        Err(err) => return page_error(err),
    };

    let now = Utc::now();
    let active_events = state
        .store
        .load_events(&game)
        .await
        .iter()
        .filter(|e| is_event_active(e, now))
        .map(|e| event_row(e, now))
        .collect();

    let mut categories = Vec::with_capacity(meta.categories.len());
    for category in &meta.categories {
        categories.push(CategoryCard {
            slug: category.slug.clone(),
            name: category.name.clone(),
            description: category.description.clone().unwrap_or_default(),
            count: state.store.entity_count(&game, &category.entity_type).await,
        });
    }

    render_html(GameTemplate {
        game_slug: meta.slug,
        game_name: meta.name,
        description: meta.description.unwrap_or_default(),
        categories,
        active_events,
    })
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(game): AxumPath<String>,
) -> Response {
    let meta = match state.store.load_game_meta(&game).await {
        Ok(meta) => meta,
        Err(err) => return page_error(err),
    };

    let now = Utc::now();
    let mut events: Vec<(EventOccurrence, EventRow)> = state
        .store
        .load_events(&game)
        .await
        .iter()
        .map(|e| (current_occurrence(e, now), event_row(e, now)))
        .collect();
    // Active first, then soonest start.
    events.sort_by_key(|(occurrence, _)| {
        let rank = match occurrence.status {
            EventStatus::Active => 0,
            EventStatus::Upcoming => 1,
            EventStatus::Ended => 2,
        };
        (rank, occurrence.start_date)
    });

    render_html(EventsTemplate {
        game_slug: meta.slug,
        game_name: meta.name,
        events: events.into_iter().map(|(_, row)| row).collect(),
    })
}

async fn event_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, slug)): AxumPath<(String, String)>,
) -> Response {
    let meta = match state.store.load_game_meta(&game).await {
        Ok(meta) => meta,
        Err(err) => return page_error(err),
    };
    let Some(event) = state.store.event_by_slug(&game, &slug).await else {
        return not_found(format!("No event called {slug} in {game}"));
    };

    let now = Utc::now();
    let occurrence = current_occurrence(&event, now);
    let predictions = predict_future_occurrences(&event, PREDICTED_OCCURRENCES_SHOWN, now)
        .into_iter()
        .map(|p| PredictionRow {
            cycle_index: p.cycle_index,
            starts: format_instant(p.occurrence.start_date),
            ends: format_instant(p.occurrence.end_date),
            status: p.occurrence.status.to_string(),
        })
        .collect();

    let mut stages = event.stages.clone();
    stages.sort_by_key(|s| s.order);
    let stages = stages
        .into_iter()
        .map(|stage| StageRow {
            name: stage.name,
            requirements_text: items_text(
                stage
                    .requirements
                    .iter()
                    .map(|r| (r.item_name.as_str(), r.quantity)),
            ),
            rewards_text: items_text(
                stage
                    .rewards
                    .iter()
                    .map(|r| (r.item_name.as_str(), r.quantity)),
            ),
        })
        .collect();

    render_html(EventDetailTemplate {
        game_slug: meta.slug,
        game_name: meta.name,
        name: event.name.clone(),
        description: event.description.clone().unwrap_or_default(),
        status: occurrence.status.to_string(),
        window: format_window(&occurrence),
        countdown: countdown_text(&occurrence, now),
        predictions,
        stages,
    })
}

#[derive(Debug, Deserialize, Default)]
struct CategoryQuery {
    search: Option<String>,
}

async fn category_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, category)): AxumPath<(String, String)>,
    Query(query): Query<CategoryQuery>,
) -> Response {
    let meta = match state.store.load_game_meta(&game).await {
        Ok(meta) => meta,
        Err(err) => return page_error(err),
    };
    let Some(definition) = category_by_slug(&meta, &category) else {
        return not_found(format!("No category called {category} in {game}"));
    };

    let search = query.search.unwrap_or_default();
    let entities = if search.is_empty() {
        state.store.load_entities(&game, &definition.entity_type).await
    } else {
        let fields: Vec<String> = ADMIN_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect();
        state
            .store
            .search_entities(&game, &definition.entity_type, &search, &fields)
            .await
    };
    let entities = match entities {
        Ok(entities) => entities,
        Err(err) => return page_error(err),
    };

    let headers: Vec<String> = definition
        .display_fields
        .iter()
        .map(|f| f.label.clone())
        .collect();
    let rows = entities
        .iter()
        .map(|entity| EntityListRow {
            slug: string_field(entity, "slug"),
            name: string_field(entity, "name"),
            cells: definition
                .display_fields
                .iter()
                .map(|f| entity.get(&f.key).map(format_value).unwrap_or_default())
                .collect(),
        })
        .collect();

    render_html(CategoryTemplate {
        game_slug: meta.slug.clone(),
        game_name: meta.name.clone(),
        category_slug: definition.slug.clone(),
        category_name: definition.name.clone(),
        search,
        headers,
        rows,
    })
}

async fn entity_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, category, slug)): AxumPath<(String, String, String)>,
) -> Response {
    let meta = match state.store.load_game_meta(&game).await {
        Ok(meta) => meta,
        Err(err) => return page_error(err),
    };
    let Some(definition) = category_by_slug(&meta, &category) else {
        return not_found(format!("No category called {category} in {game}"));
    };
    let entity = match state
        .store
        .entity_by_slug(&game, &definition.entity_type, &slug)
        .await
    {
        Ok(Some(entity)) => entity,
        Ok(None) => return not_found(format!("No {category} entry called {slug}")),
        Err(err) => return page_error(err),
    };

    let fields = definition
        .display_fields
        .iter()
        .filter_map(|f| {
            entity.get(&f.key).map(|value| FieldRow {
                label: f.label.clone(),
                value: format_value(value),
            })
        })
        .collect();

    render_html(EntityDetailTemplate {
        game_slug: meta.slug.clone(),
        game_name: meta.name.clone(),
        category_slug: definition.slug.clone(),
        category_name: definition.name.clone(),
        name: string_field(&entity, "name"),
        description: string_field(&entity, "description"),
        fields,
    })
}

async fn app_css_handler(State(state): State<Arc<AppState>>) -> Response {
    let css_path = state.assets_dir.join("app.css");
    match tokio::fs::read_to_string(&css_path).await {
        Ok(css) => ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Html("/* missing app.css */".to_string()),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Admin JSON API

#[derive(Debug, Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AdminQuery {
    id: Option<String>,
    search: Option<String>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
    #[serde(rename = "sortOrder", default)]
    sort_order: SortOrder,
}

fn admin_gate(state: &AppState) -> Option<Response> {
    if state.admin_enabled {
        None
    } else {
        Some(
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::fail("Admin access is disabled")),
            )
                .into_response(),
        )
    }
}

async fn admin_list_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, entity_type)): AxumPath<(String, String)>,
    Query(query): Query<AdminQuery>,
) -> Response {
    if let Some(denied) = admin_gate(&state) {
        return denied;
    }

    if let Some(id) = &query.id {
        return match state.store.entity_by_id(&game, &entity_type, id).await {
            Ok(Some(entity)) => Json(ApiResponse::ok(entity)).into_response(),
            Ok(None) => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::fail(format!("entity with id {id} not found"))),
            )
                .into_response(),
            Err(err) => admin_error(err, StatusCode::INTERNAL_SERVER_ERROR),
        };
    }

    let result = match &query.search {
        Some(search) if !search.is_empty() => {
            let fields: Vec<String> = ADMIN_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect();
            state
                .store
                .search_entities(&game, &entity_type, search, &fields)
                .await
        }
        _ => state.store.read_entities(&game, &entity_type).await,
    };

    match result {
        Ok(mut entities) => {
            if let Some(field) = &query.sort_by {
                entities = sort_entities(entities, field, query.sort_order);
            }
            Json(ApiResponse::ok(JsonValue::Array(entities))).into_response()
        }
        Err(err) => admin_error(err, StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn admin_create_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, entity_type)): AxumPath<(String, String)>,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(denied) = admin_gate(&state) {
        return denied;
    }

    match state.store.create_entity(&game, &entity_type, body.clone()).await {
        Ok(()) => Json(ApiResponse::ok(body)).into_response(),
        Err(err) => admin_error(err, StatusCode::BAD_REQUEST),
    }
}

async fn admin_update_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, entity_type)): AxumPath<(String, String)>,
    Query(query): Query<AdminQuery>,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(denied) = admin_gate(&state) {
        return denied;
    }
    let Some(id) = query.id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("Entity ID is required")),
        )
            .into_response();
    };

    match state
        .store
        .update_entity(&game, &entity_type, &id, body.clone())
        .await
    {
        Ok(()) => Json(ApiResponse::ok(body)).into_response(),
        Err(err) => admin_error(err, StatusCode::BAD_REQUEST),
    }
}

async fn admin_delete_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((game, entity_type)): AxumPath<(String, String)>,
    Query(query): Query<AdminQuery>,
) -> Response {
    if let Some(denied) = admin_gate(&state) {
        return denied;
    }
    let Some(id) = query.id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("Entity ID is required")),
        )
            .into_response();
    };

    match state.store.delete_entity(&game, &entity_type, &id).await {
        Ok(()) => {
            Json(ApiResponse::ok(serde_json::json!({ "id": id }))).into_response()
        }
        Err(err) => admin_error(err, StatusCode::NOT_FOUND),
    }
}

fn admin_error(err: StoreError, fallback: StatusCode) -> Response {
    let status = match &err {
        StoreError::GameNotFound(_) | StoreError::EntityTypeNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        StoreError::EntityNotFound(_) => fallback,
        StoreError::DuplicateId(_)
        | StoreError::DuplicateSlug(_)
        | StoreError::MissingIdentity
        | StoreError::InvalidEvent(_)
        | StoreError::InvalidRecurrence(_) => StatusCode::BAD_REQUEST,
        StoreError::MalformedJson { .. } | StoreError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ApiResponse::fail(err.to_string()))).into_response()
}

// ---------------------------------------------------------------------------
// Formatting helpers

fn category_by_slug<'a>(meta: &'a GameMeta, slug: &str) -> Option<&'a CategoryDefinition> {
    meta.categories.iter().find(|c| c.slug == slug)
}

fn string_field(entity: &JsonValue, key: &str) -> String {
    entity
        .get(key)
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string()
}

fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Array(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn event_row(event: &GameEvent, now: DateTime<Utc>) -> EventRow {
    let occurrence = current_occurrence(event, now);
    EventRow {
        slug: event.slug.clone(),
        name: event.name.clone(),
        status: occurrence.status.to_string(),
        window: format_window(&occurrence),
        countdown: countdown_text(&occurrence, now),
    }
}

fn items_text<'a>(items: impl Iterator<Item = (&'a str, u32)>) -> String {
    let parts: Vec<String> = items
        .map(|(name, quantity)| format!("{quantity}× {name}"))
        .collect();
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn format_window(occurrence: &EventOccurrence) -> String {
    format!(
        "{} → {}",
        format_instant(occurrence.start_date),
        format_instant(occurrence.end_date)
    )
}

fn countdown_text(occurrence: &EventOccurrence, now: DateTime<Utc>) -> String {
    match occurrence.status {
        EventStatus::Active => format!(
            "ends in {}",
            format_duration_short(occurrence.end_date - now)
        ),
        EventStatus::Upcoming => format!(
            "starts in {}",
            format_duration_short(occurrence.start_date - now)
        ),
        EventStatus::Ended => "ended".to_string(),
    }
}

/// Compact countdown like `3d 4h`, `5h 12m`, or `now`.
fn format_duration_short(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    let days = minutes / (60 * 24);
    let hours = (minutes / 60) % 24;
    let mins = minutes % 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m")
    } else {
        "now".to_string()
    }
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn page_error(err: StoreError) -> Response {
    match err {
        StoreError::GameNotFound(game) => not_found(format!("No game called {game}")),
        StoreError::EntityTypeNotFound { game, entity_type } => {
            not_found(format!("No {entity_type} data in {game}"))
        }
        other => server_error(other.into()),
    }
}

fn not_found(message: String) -> Response {
    let body = match (NotFoundTemplate { message }).render() {
        Ok(html) => html,
        Err(err) => return server_error(anyhow::anyhow!(err.to_string())),
    };
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}
