//! Handlers for CSV import job endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
};
use serde_json::json;

use crate::api::dto::habits::FieldsQuery;
use crate::api::dto::imports::ImportsQuery;
use crate::api::handlers::{Hateoas, created, negotiated};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::bad_request("Malformed multipart body", json!({ "reason": e.body_text() }))
}

/// Uploads a CSV file of entries for background import.
///
/// # Endpoint
///
/// `POST /api/entries/imports` (`multipart/form-data`, field `file`)
///
/// # File Format
///
/// ```text
/// habit_id,date,value,notes
/// h_0190...,2025-01-10,30,Evening run
/// ```
///
/// The job starts `Pending`; poll `GET /api/entries/imports/{id}` for progress.
///
/// # Errors
///
/// Returns 400 if the `file` part is missing, empty, over 10 MiB or not a `.csv`.
pub async fn create_import_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content.to_vec()));
        break;
    }

    let (file_name, content) = upload.ok_or_else(|| {
        AppError::bad_request("A CSV file is required", json!({ "field": FILE_FIELD }))
    })?;

    let job = state
        .import_service
        .create_job(&user_id, &file_name, content)
        .await?;
    let links = hateoas.then(|| state.import_service.job_links(&job.id, None));
    created(&format!("/api/entries/imports/{}", job.id), &job, links)
}

/// Lists the caller's import jobs, newest first.
///
/// # Endpoint
///
/// `GET /api/entries/imports`
pub async fn list_imports_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Query(query): Query<ImportsQuery>,
) -> Result<Response, AppError> {
    let result = state.import_service.list(&user_id, &query, hateoas).await?;
    Ok(negotiated(result, hateoas))
}

/// `GET /api/entries/imports/{id}`
pub async fn get_import_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Path(id): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Response, AppError> {
    let job = state
        .import_service
        .get(&user_id, &id, query.fields.as_deref(), hateoas)
        .await?;
    Ok(negotiated(job, hateoas))
}
