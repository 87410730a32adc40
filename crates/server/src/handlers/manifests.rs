//! Manifest handlers.

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::handlers::common::MAX_MANIFEST_SIZE;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use berth_core::{
    DIGEST_PREFIX, Digest, ImageManifest, MANIFEST_V2_MEDIA_TYPE, validate_name,
    validate_reference,
};

/// Validate a reference; qualified digests must also be well-formed.
fn check_reference(reference: &str) -> ApiResult<()> {
    validate_reference(reference)?;
    if reference.starts_with(DIGEST_PREFIX) {
        Digest::parse(reference)?;
    }
    Ok(())
}

/// PUT /v2/{name}/manifests/{reference} - Store a manifest.
pub async fn put_manifest(
    state: AppState,
    name: String,
    reference: String,
    req: Request,
) -> ApiResult<Response> {
    validate_name(&name)?;
    check_reference(&reference)?;

    // Echoed back in the response; captured before the body is consumed.
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(MANIFEST_V2_MEDIA_TYPE)
        .to_string();

    let data = axum::body::to_bytes(req.into_body(), MAX_MANIFEST_SIZE)
        .await
        .map_err(|e| {
            ApiError::registry(
                ErrorCode::ManifestInvalid,
                format!("failed to read manifest body: {e}"),
            )
        })?;

    // Validate the schema; the stored bytes stay exactly as received so
    // the digest clients compute matches ours.
    ImageManifest::parse(&data)?;

    let digest = state.manifests.put(&name, &reference, &data).await?;

    Ok((
        StatusCode::CREATED,
        [
            ("Location", format!("/v2/{name}/manifests/{reference}")),
            ("Docker-Content-Digest", digest.qualified()),
            ("Content-Length", "0".to_string()),
            ("Content-Type", content_type),
        ],
    )
        .into_response())
}

/// GET|HEAD /v2/{name}/manifests/{reference} - Read a manifest.
pub async fn get_manifest(
    state: AppState,
    name: String,
    reference: String,
    head: bool,
) -> ApiResult<Response> {
    validate_name(&name)?;
    check_reference(&reference)?;

    let (data, digest) = state.manifests.get(&name, &reference).await?;

    let headers = [
        ("Content-Type", MANIFEST_V2_MEDIA_TYPE.to_string()),
        ("Content-Length", data.len().to_string()),
        ("Docker-Content-Digest", digest.qualified()),
    ];
    let body = if head { Body::empty() } else { Body::from(data) };

    Ok((StatusCode::OK, headers, body).into_response())
}

/// DELETE /v2/{name}/manifests/{reference} - Delete a manifest.
pub async fn delete_manifest(
    state: AppState,
    name: String,
    reference: String,
) -> ApiResult<Response> {
    validate_name(&name)?;
    check_reference(&reference)?;

    state.manifests.delete(&name, &reference).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
