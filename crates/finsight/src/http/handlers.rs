use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::ApiError;
use super::types::{
    AnalyzeDataParams, DataFolderResponse, HistoryEntry, MessageResponse, QueuedResponse,
    SyncAnalysisResponse, HEALTH_MESSAGE,
};
use super::AppState;
use crate::jobs::{DocumentUpload, Job};

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: HEALTH_MESSAGE.to_string(),
    })
}

#[tracing::instrument(skip(state, params))]
pub async fn analyze_data(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeDataParams>,
) -> Result<Json<DataFolderResponse>, ApiError> {
    let out = state
        .manager
        .analyze_data_folder(params.query.as_deref())
        .await?;
    Ok(Json(out.into()))
}

#[tracing::instrument(skip_all)]
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<QueuedResponse>, ApiError> {
    let (upload, query) = read_upload(multipart).await?;
    let job_id = state.manager.submit(upload, query.as_deref()).await?;
    Ok(Json(QueuedResponse::new(job_id)))
}

#[tracing::instrument(skip_all)]
pub async fn analyze_sync(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SyncAnalysisResponse>, ApiError> {
    let (upload, query) = read_upload(multipart).await?;
    let out = state.manager.analyze_now(upload, query.as_deref()).await?;
    Ok(Json(out.into()))
}

pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.manager.get(&job_id).await?))
}

pub async fn history(State(state): State<AppState>) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let jobs = state.manager.list().await?;
    Ok(Json(jobs.into_iter().map(HistoryEntry::from).collect()))
}

pub async fn delete_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = state.manager.delete(&job_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Job {} deleted.", id),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not Found")
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Pulls the `file` part and the optional `query` part out of a form.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(DocumentUpload, Option<String>), ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
    let mut upload = None;
    let mut query = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error("Malformed form data", e))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| form_error("Could not read upload", e))?;
                upload = Some(DocumentUpload::new(filename, content.to_vec()));
            }
            Some("query") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| form_error("Could not read query", e))?;
                query = Some(text);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded."))?;
    Ok((upload, query))
}

/// Keeps the status axum assigns (413 for an oversized body, 400 otherwise).
fn form_error(context: &str, e: MultipartError) -> ApiError {
    ApiError::new(e.status(), format!("{}: {}", context, e.body_text()))
}
