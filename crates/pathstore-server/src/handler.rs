use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use pathstore_links::{redirect_target, LinkError, FORWARDED_PARAMS};
use pathstore_store::StoredDocument;

use crate::error::{ServerError, ServerResult};
use crate::export::export_tree;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoadQuery {
    pub json_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenRequest {
    pub original_url: String,
    pub custom_code: Option<String>,
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> ServerResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "pathstore-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn load_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<LoadQuery>,
) -> ServerResult<Json<Value>> {
    tracing::debug!(%path, json_path = ?query.json_path, "GET document");
    let data = state.store.load(&path, query.json_path.as_deref()).await?;
    Ok(Json(data))
}

/// `HEAD` answers whether the document exists, unlike the tolerant `GET`.
pub async fn document_exists(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ServerResult<StatusCode> {
    Ok(match state.store.fetch(&path).await? {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    })
}

pub async fn save_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> ServerResult<Json<StoredDocument>> {
    tracing::debug!(%path, "POST document");
    let data: Value = parse_json(&body)?;
    Ok(Json(state.store.save(&path, &data).await?))
}

pub async fn combine_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> ServerResult<Json<StoredDocument>> {
    tracing::debug!(%path, "PUT document");
    let partial: Value = parse_json(&body)?;
    Ok(Json(state.store.combine(&path, &partial).await?))
}

pub async fn export_handler(State(state): State<AppState>) -> ServerResult<Response> {
    let report = export_tree(&state.store, &state.export_root).await?;
    let response = if report.is_complete() {
        (
            StatusCode::OK,
            Json(json!({ "message": "Files written successfully.", "written": report.written })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to write files",
                "details": report.details(),
                "written": report.written,
            })),
        )
    };
    Ok(response.into_response())
}

fn shorten_failure(err: ServerError) -> Response {
    let status = err.status();
    tracing::debug!(error = %err, "shorten rejected");
    (status, Json(json!({ "success": false, "error": err.to_string() }))).into_response()
}

pub async fn shorten(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ShortenRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return shorten_failure(e),
    };
    match state
        .links
        .create_with_code(&request.original_url, request.custom_code.as_deref())
        .await
    {
        Ok(link) => Json(json!({
            "success": true,
            "shortCode": link.token,
            "originalUrl": link.url,
            "created": link.created_at,
        }))
        .into_response(),
        Err(e) => shorten_failure(e.into()),
    }
}

pub async fn redirect(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let resolved = match state.links.resolve(&code).await {
        Ok(link) => link,
        Err(LinkError::NotFound(_)) => {
            return (StatusCode::NOT_FOUND, "URL not found").into_response();
        }
        Err(e) => return ServerError::from(e).into_response(),
    };

    let forwarded = FORWARDED_PARAMS
        .iter()
        .filter_map(|name| params.get(*name).map(|v| (*name, v.as_str())));
    match redirect_target(&resolved.url, forwarded) {
        Ok(target) => (
            StatusCode::FOUND,
            [(header::LOCATION, target.clone())],
            format!("Redirecting to {target}"),
        )
            .into_response(),
        Err(e) => ServerError::from(e).into_response(),
    }
}

pub async fn link_stats(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ServerResult<Json<Value>> {
    let link = state.links.stats(&code).await?;
    Ok(Json(json!({
        "shortCode": code,
        "originalUrl": link.url,
        "created": link.created_at,
        "accessCount": link.access_count,
        "lastAccessed": link.last_accessed,
    })))
}
