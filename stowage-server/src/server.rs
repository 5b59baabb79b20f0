use crate::config::Config;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use futures_util::TryStreamExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stowage_core::{
    FileHandle, FileMetadata, S3ClientFactory, StorageError, StorageRequest, StorageService,
    build_service,
};
use thiserror::Error;
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::trace::TraceLayer;

pub const ACCOUNT_URN_HEADER: &str = "x-stowage-account-urn";
pub const USER_URN_HEADER: &str = "x-stowage-user-urn";
pub const FILE_URN_HEADER: &str = "x-stowage-file-urn";
pub const ENTITY_REFERENCE_TYPE_HEADER: &str = "x-stowage-entity-reference-type";
pub const REFERENCE_URN_HEADER: &str = "x-stowage-reference-urn";
pub const RECORDED_TIMESTAMP_HEADER: &str = "x-stowage-recorded-timestamp";

pub struct ServerState {
    pub service: Arc<dyn StorageService>,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct StoreResponse {
    url: String,
    content_hash: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    healthy: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Storage(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn run_server(config: Config) -> stowage_core::Result<()> {
    let service = build_service(&config.storage, &S3ClientFactory::new())?;

    if !service.is_healthy().await {
        tracing::warn!(
            "Bucket {} is not reachable at startup; serving anyway",
            config.storage.bucket
        );
    }

    let state = Arc::new(ServerState {
        service,
        request_timeout: config.request_timeout(),
    });

    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| StorageError::Config(format!("failed to bind {}: {}", config.bind_addr, e)))?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StorageError::Internal(format!("server error: {}", e)))?;

    drop(state);
    tracing::info!("Storage client released");
    Ok(())
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/files/*name",
            put(store_file).get(retrieve_file).delete(delete_file),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn with_timeout<T>(
    timeout: Duration,
    future: impl Future<Output = stowage_core::Result<T>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ApiError::Timeout(timeout)),
    }
}

async fn health(State(state): State<Arc<ServerState>>) -> Response {
    let healthy = matches!(
        tokio::time::timeout(state.request_timeout, state.service.is_healthy()).await,
        Ok(true)
    );
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse { healthy })).into_response()
}

async fn store_file(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<StoreResponse>, ApiError> {
    let metadata = metadata_from_headers(&headers)?;
    let content_length = header_value(&headers, header::CONTENT_LENGTH.as_str())
        .map(|value| {
            value.parse::<u64>().map_err(|_| {
                StorageError::InvalidRequest(format!("invalid content-length: {}", value))
            })
        })
        .transpose()?;

    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let mut request = StorageRequest::new(name, StreamReader::new(stream), metadata);
    request.content_length = content_length;

    let response = with_timeout(state.request_timeout, state.service.store(request)).await?;

    Ok(Json(StoreResponse {
        url: response.url,
        content_hash: response.content_hash,
    }))
}

async fn retrieve_file(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let handle = FileHandle::new(name);
    let reader = with_timeout(state.request_timeout, state.service.retrieve(&handle)).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}

async fn delete_file(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let handle = FileHandle::new(name);
    with_timeout(state.request_timeout, state.service.delete(&handle)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required_header(headers: &HeaderMap, name: &str) -> stowage_core::Result<String> {
    header_value(headers, name)
        .map(str::to_string)
        .ok_or_else(|| StorageError::InvalidRequest(format!("missing header {}", name)))
}

fn metadata_from_headers(headers: &HeaderMap) -> stowage_core::Result<FileMetadata> {
    let recorded_timestamp = match header_value(headers, RECORDED_TIMESTAMP_HEADER) {
        Some(value) => value.parse::<i64>().map_err(|_| {
            StorageError::InvalidRequest(format!("invalid recorded timestamp: {}", value))
        })?,
        None => chrono::Utc::now().timestamp_millis(),
    };

    Ok(FileMetadata {
        account_urn: required_header(headers, ACCOUNT_URN_HEADER)?,
        user_urn: required_header(headers, USER_URN_HEADER)?,
        file_urn: required_header(headers, FILE_URN_HEADER)?,
        entity_reference_type: required_header(headers, ENTITY_REFERENCE_TYPE_HEADER)?,
        reference_urn: required_header(headers, REFERENCE_URN_HEADER)?,
        recorded_timestamp,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
