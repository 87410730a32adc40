//! Blob upload and read handlers.

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::handlers::common::{declared_content_length, request_host, request_scheme};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Query, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use berth_core::{Digest, OCTET_STREAM_MEDIA_TYPE, validate_name};
use berth_storage::ByteStream;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

fn parse_session_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| {
        ApiError::registry(ErrorCode::BlobUploadInvalid, format!("invalid upload id: {e}"))
    })
}

/// Convert a request body into the storage byte stream, counting the
/// bytes that pass through.
fn body_stream(body: Body, counter: Arc<AtomicU64>) -> ByteStream {
    Box::pin(body.into_data_stream().map(move |result| {
        result
            .map(|chunk| {
                counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                chunk
            })
            .map_err(std::io::Error::other)
    }))
}

/// POST /v2/{name}/blobs/uploads/ - Start an upload session.
pub async fn start_upload(state: AppState, name: String, req: Request) -> ApiResult<Response> {
    validate_name(&name)?;

    let id = state.blobs.start_upload().await?;
    let location = format!(
        "{}://{}/v2/{}/blobs/uploads/{}",
        request_scheme(req.headers()),
        request_host(req.headers()),
        name,
        id
    );

    Ok((
        StatusCode::ACCEPTED,
        [
            ("Location", location),
            ("Docker-Upload-UUID", id.to_string()),
            ("Range", "0-0".to_string()),
            ("Content-Length", "0".to_string()),
            ("X-Content-Type-Options", "nosniff".to_string()),
        ],
    )
        .into_response())
}

/// PATCH /v2/{name}/blobs/uploads/{id} - Append a chunk.
pub async fn append_chunk(
    state: AppState,
    name: String,
    id: String,
    req: Request,
) -> ApiResult<Response> {
    validate_name(&name)?;
    let session_id = parse_session_id(&id)?;

    let declared = declared_content_length(req.headers());
    let counter = Arc::new(AtomicU64::new(0));
    let stream = body_stream(req.into_body(), counter.clone());

    let end = state.blobs.append_chunk(session_id, stream).await?;

    let received = counter.load(Ordering::Relaxed);
    if let Some(declared) = declared
        && declared != received
    {
        return Err(ApiError::registry(
            ErrorCode::SizeInvalid,
            format!("declared {declared} bytes, received {received}"),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        [
            ("Location", format!("/v2/{name}/blobs/uploads/{session_id}")),
            ("Range", format!("0-{end}")),
            ("Docker-Upload-UUID", session_id.to_string()),
            ("Content-Length", "0".to_string()),
        ],
    )
        .into_response())
}

/// Query parameters for upload finalization.
#[derive(Debug, Deserialize)]
struct FinalizeQuery {
    digest: Option<String>,
}

/// PUT /v2/{name}/blobs/uploads/{id}?digest=... - Finalize an upload.
///
/// A final chunk may ride along in the request body; it is appended
/// before verification so monolithic and chunked pushes both work.
pub async fn finalize_upload(
    state: AppState,
    name: String,
    id: String,
    req: Request,
) -> ApiResult<Response> {
    validate_name(&name)?;
    let session_id = parse_session_id(&id)?;

    let query: Query<FinalizeQuery> = Query::try_from_uri(req.uri()).map_err(|e| {
        ApiError::registry(ErrorCode::DigestInvalid, format!("invalid query string: {e}"))
    })?;
    let digest = query
        .0
        .digest
        .as_deref()
        .ok_or_else(|| {
            ApiError::registry(ErrorCode::DigestInvalid, "digest query parameter required")
        })
        .and_then(|d| Digest::parse(d).map_err(ApiError::from))?;

    // An empty body appends nothing and leaves the offset untouched.
    let stream = body_stream(req.into_body(), Arc::new(AtomicU64::new(0)));
    state.blobs.append_chunk(session_id, stream).await?;

    let committed = state.blobs.finalize_upload(session_id, &digest).await?;

    Ok((
        StatusCode::CREATED,
        [
            ("Location", format!("/v2/{name}/blobs/{committed}")),
            ("Docker-Content-Digest", committed.qualified()),
            ("Content-Length", "0".to_string()),
        ],
    )
        .into_response())
}

/// GET|HEAD /v2/{name}/blobs/{digest} - Read or stat a blob.
pub async fn get_blob(
    state: AppState,
    name: String,
    digest: String,
    head: bool,
) -> ApiResult<Response> {
    validate_name(&name)?;
    let digest = Digest::parse(&digest)?;

    if head {
        let size = state.blobs.stat_blob(&digest).await?;
        return Ok((
            StatusCode::OK,
            [
                ("Content-Length", size.to_string()),
                ("Content-Type", OCTET_STREAM_MEDIA_TYPE.to_string()),
                ("Docker-Content-Digest", digest.qualified()),
            ],
        )
            .into_response());
    }

    let (stream, size) = state.blobs.open_blob(&digest).await?;
    Ok((
        StatusCode::OK,
        [
            ("Content-Length", size.to_string()),
            ("Content-Type", OCTET_STREAM_MEDIA_TYPE.to_string()),
            ("Docker-Content-Digest", digest.qualified()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
