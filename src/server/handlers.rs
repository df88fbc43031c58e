use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use crate::request::ValidationError;
use crate::store::PreviewId;

use super::AppState;
use super::error::ApiError;
use super::models::{
    CacheCheckResponse, CacheClearResponse, CacheDeleteResponse, CacheListResponse, CacheQuery,
    GenerateQuery, GenerateResponse,
};

// ============================================================================
// Generate-or-fetch
// ============================================================================

/// `GET /api/og`
pub async fn generate(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = query.into_request();
    let outcome = state
        .generator
        .get_or_create(&request)
        .await
        .map_err(ApiError::generate)?;

    let generated = outcome
        .generated_at
        .and_then(|at| at.format(&Rfc3339).ok());

    Ok(Json(GenerateResponse {
        success: true,
        url: outcome.url,
        cached: outcome.cached,
        generated,
    }))
}

// ============================================================================
// Cache management
// ============================================================================

/// `GET /api/og-cache`
pub async fn cache_get(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Response, ApiError> {
    let store = state.generator.store();

    match query.action.as_deref() {
        None | Some("") | Some("list") => {
            // Listing degrades to empty; the store logs the failure.
            let entries = store.list().await;
            let body = CacheListResponse::new(&entries, |entry| store.url(&entry.id));
            Ok(Json(body).into_response())
        }
        Some("clear") => {
            let count = store.clear().await.map_err(ApiError::cache)?;
            info!(count, "preview cache cleared");
            Ok(Json(CacheClearResponse {
                success: true,
                message: format!("Cleared {count} cached images"),
                count,
            })
            .into_response())
        }
        Some("check") => {
            let id = required_id(query.id.as_deref())?;
            let exists = store.exists(&id).await;
            Ok(Json(CacheCheckResponse {
                success: true,
                url: exists.then(|| store.url(&id)),
                id: id.to_string(),
                exists,
            })
            .into_response())
        }
        Some(other) => Err(ApiError::bad_request(format!("Unknown action: {other}"))
            .with_message("expected one of: list, check, clear")),
    }
}

/// `DELETE /api/og-cache?id=`
pub async fn cache_delete(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<CacheDeleteResponse>, ApiError> {
    let id = required_id(query.id.as_deref())?;
    let deleted = state
        .generator
        .store()
        .delete(&id)
        .await
        .map_err(ApiError::cache)?;

    let message = if deleted {
        format!("Deleted image: {id}")
    } else {
        format!("Image not found: {id}")
    };
    debug!(id = %id, deleted, "cache delete");

    Ok(Json(CacheDeleteResponse {
        success: deleted,
        message,
        id: id.to_string(),
    }))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

fn required_id(value: Option<&str>) -> Result<PreviewId, ApiError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::invalid(&ValidationError::MissingId));
    }
    PreviewId::parse(value).map_err(|err| ApiError::invalid(&err.into()))
}

// ============================================================================
// Stored previews
// ============================================================================

/// `GET {url_prefix}/{file}`
pub async fn preview(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let id = PreviewId::from_file_name(&file).ok_or_else(ApiError::not_found)?;
    let bytes = state
        .generator
        .store()
        .read(&id)
        .await
        .map_err(ApiError::cache)?
        .ok_or_else(ApiError::not_found)?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=300")),
        ],
        bytes,
    )
        .into_response())
}
