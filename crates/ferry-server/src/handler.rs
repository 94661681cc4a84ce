//! Request handlers.
//!
//! Everything except [`upload_part`] is a single-call delegation to the
//! object store or the dedup index.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use ferry_store::{ContainerInfo, Fingerprint, ObjectInfo};
use ferry_types::{validate_container_name, DedupRecord, Location, SessionStatus};
use ferry_upload::PartSubmission;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let coordinator = &state.coordinator;
    Json(json!({
        "name": "ferry",
        "version": env!("CARGO_PKG_VERSION"),
        "storage_backend": coordinator.store().backend_name(),
        "metadata_backend": coordinator.dedup_index().store().backend_name(),
        "upload": coordinator.config(),
    }))
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
}

pub async fn list_buckets(State(state): State<AppState>) -> ApiResult<Json<Vec<ContainerInfo>>> {
    Ok(Json(state.store().list_containers().await?))
}

pub async fn create_bucket(
    State(state): State<AppState>,
    Json(req): Json<CreateBucketRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_container_name(&req.name).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.store().create_container(&req.name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "name": req.name }))))
}

pub async fn delete_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> ApiResult<StatusCode> {
    state.store().delete_container(&bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Serialize)]
pub struct PutObjectResponse {
    pub location: Location,
    pub fingerprint: Fingerprint,
    pub size: u64,
}

fn location(bucket: String, name: String) -> ApiResult<Location> {
    Location::new(bucket, name).map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub async fn list_objects(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ObjectInfo>>> {
    Ok(Json(state.store().list(&bucket, &query.prefix).await?))
}

pub async fn put_object(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<PutObjectResponse>> {
    let location = location(bucket, name)?;
    let size = body.len() as u64;
    let fingerprint = state
        .store()
        .put(&location.container, &location.name, body)
        .await?;
    Ok(Json(PutObjectResponse {
        location,
        fingerprint,
        size,
    }))
}

pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let data = state.store().get(&bucket, &name).await?;
    let file = name.rsplit('/').next().unwrap_or(&name).replace('"', "");
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file}\""),
            ),
        ],
        data,
    ))
}

pub async fn stat_object(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
) -> ApiResult<Json<ObjectInfo>> {
    state
        .store()
        .stat(&bucket, &name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{bucket}/{name}")))
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

fn number<T: std::str::FromStr>(field: &str, value: &str) -> ApiResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{field} must be a non-negative integer")))
}

/// Accept one part as a multipart form and hand it to the coordinator.
///
/// Form fields: `bucket_name`, `identifier`, `chunk_size`, `chunk_number`,
/// `total_chunks`, `total_size`, `filename` and the part bytes as `file`.
/// Unknown fields are ignored.
pub async fn upload_part(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SessionStatus>> {
    let mut sub = PartSubmission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            sub.data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "bucket_name" => sub.container = Some(value),
            "filename" => sub.name = Some(value),
            "identifier" => sub.identifier = Some(value),
            "chunk_size" => sub.part_size = Some(number(&name, &value)?),
            "chunk_number" => sub.part_index = Some(number(&name, &value)?),
            "total_chunks" => sub.total_parts = Some(number(&name, &value)?),
            "total_size" => sub.total_size = Some(number(&name, &value)?),
            other => debug!(field = other, "ignoring form field"),
        }
    }

    let status = state.coordinator.submit_part(sub).await?;
    Ok(Json(status))
}

// ---------------------------------------------------------------------------
// Dedup lookups
// ---------------------------------------------------------------------------

pub async fn dedup_by_identifier(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<DedupRecord>> {
    state
        .coordinator
        .dedup_by_identifier(&identifier)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no upload with identifier {identifier}")))
}

pub async fn dedup_by_location(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
) -> ApiResult<Json<DedupRecord>> {
    state
        .coordinator
        .dedup_by_location(&bucket, &name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no upload recorded at {bucket}/{name}")))
}
