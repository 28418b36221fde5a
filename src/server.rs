use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::error::{ErrorKind, ImportError};
use crate::importer::RecipeImporter;
use crate::model::{ImportFailure, ImportOutcome, Recipe, NO_RECIPE_FOUND};
use crate::store::{
    get_recipe, get_recipes, save_imported_recipe, DocumentStore, MemoryDocumentStore,
};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    importer: RecipeImporter,
    store: Arc<dyn DocumentStore>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(importer: RecipeImporter, request_timeout: Duration) -> Self {
        AppState {
            importer,
            store: Arc::new(MemoryDocumentStore::new()),
            request_timeout,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = store;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub url: String,
    /// Persist a successful import as a recipe owned by this user
    #[serde(default)]
    pub save_for_user: Option<String>,
}

/// Filters for listing saved recipes
#[derive(Debug, Deserialize)]
pub struct RecipesQuery {
    pub user_id: Option<String>,
    pub has_cooked: Option<bool>,
}

#[derive(Debug, Serialize)]
struct IngredientBody {
    name: String,
    count: String,
}

#[derive(Debug, Serialize)]
struct RecipeBody {
    name: String,
    ingredients: Vec<IngredientBody>,
    instructions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
}

impl RecipeBody {
    fn new(recipe: Recipe, uid: Option<String>) -> Self {
        RecipeBody {
            name: recipe.name,
            ingredients: recipe
                .ingredients
                .into_iter()
                .map(|ingredient| IngredientBody {
                    name: ingredient.name,
                    count: ingredient.amount,
                })
                .collect(),
            instructions: recipe.instructions,
            uid,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/import-recipe", post(import_recipe))
        .route("/recipes", get(list_recipes))
        .route("/recipes/{uid}", get(show_recipe))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: AppConfig) -> Result<(), ImportError> {
    let importer = RecipeImporter::from_config(&config)?;
    let state = AppState::new(
        importer,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| {
            ImportError::BuilderError(format!("Failed to bind {}: {e}", config.server.bind))
        })?;
    info!("Listening on http://{}", config.server.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ImportError::BuilderError(format!("Server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn not_found() -> Response {
    not_found_response("no such route")
}

fn not_found_response(message: &str) -> Response {
    let failure = ImportFailure {
        kind: ErrorKind::InvalidRequest,
        message: message.to_string(),
    };
    let mut response = failure_response(failure);
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

async fn list_recipes(
    State(state): State<AppState>,
    Query(filters): Query<RecipesQuery>,
) -> Response {
    match get_recipes(
        state.store.as_ref(),
        filters.user_id.as_deref(),
        filters.has_cooked,
    )
    .await
    {
        Ok(recipes) => (StatusCode::OK, Json(recipes)).into_response(),
        Err(e) => {
            error!("Failed to list recipes: {e}");
            failure_response(e.into())
        }
    }
}

async fn show_recipe(State(state): State<AppState>, Path(uid): Path<String>) -> Response {
    match get_recipe(state.store.as_ref(), &uid).await {
        Ok(Some(recipe)) => (StatusCode::OK, Json(recipe)).into_response(),
        Ok(None) => not_found_response(&format!("recipe {uid} not found")),
        Err(e) => {
            error!("Failed to load recipe {uid}: {e}");
            failure_response(e.into())
        }
    }
}

async fn import_recipe(
    State(state): State<AppState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return failure_response(ImportError::InvalidRequest(rejection.body_text()).into())
        }
    };
    let url = request.url.trim();
    if url.is_empty() {
        return failure_response(ImportError::InvalidRequest("url is empty".to_string()).into());
    }

    info!("Import requested for {url}");
    // dropping the import future on timeout tears down its render and extraction
    let outcome = match tokio::time::timeout(state.request_timeout, state.importer.import(url)).await
    {
        Ok(outcome) => outcome,
        Err(_) => ImportError::Timeout(state.request_timeout).into(),
    };

    match outcome {
        ImportOutcome::Recipe(recipe) => {
            let uid = match &request.save_for_user {
                Some(user_id) => {
                    match save_imported_recipe(state.store.as_ref(), &recipe, url, user_id).await {
                        Ok(stored) => Some(stored.uid),
                        Err(e) => {
                            error!("Failed to save recipe from {url}: {e}");
                            return failure_response(e.into());
                        }
                    }
                }
                None => None,
            };
            (StatusCode::OK, Json(RecipeBody::new(recipe, uid))).into_response()
        }
        ImportOutcome::NoRecipeFound => (
            StatusCode::OK,
            Json(json!({"no_recipe_found": true, "message": NO_RECIPE_FOUND})),
        )
            .into_response(),
        ImportOutcome::Error(failure) => failure_response(failure),
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::RenderFailed | ErrorKind::ExtractionTransport | ErrorKind::ExtractionParse => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Internal | ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure_response(failure: ImportFailure) -> Response {
    let body = json!({
        "error": format!("{}: {}", failure.kind, failure.message),
        "kind": failure.kind,
    });
    (status_for(failure.kind), Json(body)).into_response()
}
