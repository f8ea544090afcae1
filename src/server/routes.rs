use crate::database::{Annotation, AnnotationUpdate, SheetStatistic, SheetView};
use crate::error::TrackerError;
use crate::server::{ApiError, AppState};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Runs a store operation on the blocking pool.
async fn run_blocking<T, F>(operation: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, TrackerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| ApiError::internal_error(format!("Task failed: {e}")))?
        .map_err(ApiError::from)
}

fn project_id(raw: &str) -> Result<String, ApiError> {
    let project_id = raw.trim();
    if project_id.is_empty() {
        return Err(ApiError::invalid_input("Project id must not be blank"));
    }
    Ok(project_id.to_owned())
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn list_sheets(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.sheet_names()).await?))
}

pub(super) async fn column_filters(
    State(state): State<AppState>,
    Path(sheet): Path<String>,
) -> Result<Json<BTreeMap<String, BTreeSet<String>>>, ApiError> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.column_filters(&sheet)).await?))
}

pub(super) async fn sheet_data(
    State(state): State<AppState>,
    Path(sheet): Path<String>,
    filters: Result<Query<BTreeMap<String, String>>, QueryRejection>,
) -> Result<Json<SheetView>, ApiError> {
    let Query(filters) = filters?;
    debug!(%sheet, ?filters, "querying sheet");
    let store = state.store.clone();
    let options = state.config.query.clone();
    let view = run_blocking(move || store.query_sheet(&sheet, &filters, &options)).await?;
    Ok(Json(view))
}

/// Row position as sent by the page: a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowIndex {
    Number(u64),
    Text(String),
}

impl RowIndex {
    fn ordinal(&self) -> Result<u64, ApiError> {
        match self {
            Self::Number(ordinal) => Ok(*ordinal),
            Self::Text(text) => text.trim().parse().map_err(|_| {
                ApiError::invalid_input(format!("rowIndex '{text}' is not a row number"))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EditRequest {
    sheet_name: String,
    row_index: RowIndex,
    #[serde(default)]
    new_value: Option<String>,
}

pub(super) async fn edit_placeholder(
    State(state): State<AppState>,
    request: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = request?;
    let ordinal = request.row_index.ordinal()?;
    let store = state.store.clone();
    let column = state.config.ingest.placeholder_column.clone();
    let value = request.new_value.unwrap_or_default();
    run_blocking(move || store.edit_cell(&request.sheet_name, &column, ordinal, &value)).await?;
    Ok(Json(json!({ "status": "success" })))
}

pub(super) async fn get_project(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Annotation>, ApiError> {
    let project_id = project_id(&raw)?;
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.annotation(&project_id)).await?))
}

/// Accepts the update as JSON or as an urlencoded form.
pub(super) async fn upsert_project(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    request: Request,
) -> Result<Json<Annotation>, ApiError> {
    let project_id = project_id(&raw)?;
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    let update: AnnotationUpdate = if is_json {
        Json::<AnnotationUpdate>::from_request(request, &()).await?.0
    } else {
        Form::<AnnotationUpdate>::from_request(request, &()).await?.0
    };

    let store = state.store.clone();
    let annotation = run_blocking(move || store.upsert_annotation(&project_id, &update)).await?;
    Ok(Json(annotation))
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckerRequest {
    #[serde(default)]
    checker: Option<String>,
}

pub(super) async fn update_checker(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    request: Result<Json<CheckerRequest>, JsonRejection>,
) -> Result<Json<Annotation>, ApiError> {
    let project_id = project_id(&raw)?;
    let Json(request) = request?;
    let update = AnnotationUpdate {
        checker: request.checker,
        ..AnnotationUpdate::default()
    };
    let store = state.store.clone();
    let annotation = run_blocking(move || store.upsert_annotation(&project_id, &update)).await?;
    Ok(Json(annotation))
}

pub(super) async fn list_checkers(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.checkers()).await?))
}

pub(super) async fn recompute_statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<SheetStatistic>>, ApiError> {
    let store = state.store.clone();
    let config = state.config.statistics.clone();
    Ok(Json(
        run_blocking(move || store.recompute_statistics(&config)).await?,
    ))
}

pub(super) async fn list_statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<SheetStatistic>>, ApiError> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.statistics()).await?))
}
