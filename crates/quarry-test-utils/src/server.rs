//! Loopback catalog server for HTTP integration tests.
//!
//! [`CatalogServer`] exposes any [`CatalogBackend`] over the REST surface
//! that [`quarry_client::HttpBackend`] speaks, so the HTTP client can be
//! exercised end to end without a real catalog:
//!
//! - bound to `127.0.0.1:0`
//! - errors rendered as [`ErrorBody`] with the status the client maps back
//! - shut down when the server handle is dropped

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::oneshot;

use quarry_client::CatalogBackend;
use quarry_client::http::API_PREFIX;
use quarry_client::http::wire::{
    CreateBody, DeleteQuery, ErrorBody, GetQuery, RestoreBody, RestoreResponse, UpdateBody,
};
use quarry_core::{
    Asset, AuditSearchRequest, AuditSearchResponse, ClientConfig, DeleteHandler, Error, Guid,
    MutationResponse, QualifiedName, Result, SearchRequest, SearchResponse,
};

type ServerState = Arc<dyn CatalogBackend>;

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = ErrorBody::from_error(&self.0);
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// A catalog backend served over HTTP on a loopback port.
pub struct CatalogServer {
    base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for CatalogServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogServer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CatalogServer {
    /// Serves `backend` on `127.0.0.1:0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or its address read.
    pub async fn start(backend: Arc<dyn CatalogBackend>) -> Result<Self> {
        let api = Router::new()
            .route(
                "/assets",
                post(create_assets).patch(update_assets).delete(remove_assets),
            )
            .route("/assets/restore", post(restore_asset))
            .route("/assets/by-name/:type_name", get(get_by_name))
            .route("/assets/:guid", get(get_by_guid))
            .route("/search", post(search))
            .route("/audit/search", post(audit_search));
        let app = Router::new().nest(API_PREFIX, api).with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::transport(format!("failed to bind catalog listener: {e}")))?;
        let addr: SocketAddr = listener.local_addr().map_err(|e| Error::Internal {
            message: format!("failed to read listener addr: {e}"),
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        tracing::debug!(%addr, "catalog server listening");
        Ok(Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        })
    }

    /// Server base URL, e.g. `http://127.0.0.1:12345`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fast-retry client configuration pointed at this server.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        crate::fixtures::fast_config().with_base_url(self.base_url.clone())
    }
}

impl Drop for CatalogServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn create_assets(
    State(backend): State<ServerState>,
    Json(body): Json<CreateBody>,
) -> ApiResult<MutationResponse> {
    Ok(Json(backend.create(body.assets).await?))
}

async fn update_assets(
    State(backend): State<ServerState>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<MutationResponse> {
    Ok(Json(backend.update(body.updates).await?))
}

async fn remove_assets(
    State(backend): State<ServerState>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<MutationResponse> {
    let guids = query
        .guid
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Guid>()
                .map_err(|_| Error::invalid_request(format!("invalid guid: {s}")))
        })
        .collect::<Result<Vec<_>>>()?;
    let response = match query.delete_type.as_str() {
        t if t == DeleteHandler::Soft.as_str() => backend.delete(&guids).await?,
        t if t == DeleteHandler::Purge.as_str() => backend.purge(&guids).await?,
        other => {
            return Err(Error::invalid_request(format!("unsupported deleteType: {other}")).into());
        }
    };
    Ok(Json(response))
}

async fn restore_asset(
    State(backend): State<ServerState>,
    Json(body): Json<RestoreBody>,
) -> ApiResult<RestoreResponse> {
    let restored = backend
        .restore(&body.type_name, &body.qualified_name)
        .await?;
    Ok(Json(RestoreResponse { restored }))
}

async fn get_by_guid(
    State(backend): State<ServerState>,
    Path(guid): Path<String>,
    Query(query): Query<GetQuery>,
) -> ApiResult<Asset> {
    let parsed = guid
        .parse::<Guid>()
        .map_err(|_| Error::not_found("Asset", &guid))?;
    Ok(Json(backend.get_by_guid(parsed, query.complete).await?))
}

async fn get_by_name(
    State(backend): State<ServerState>,
    Path(type_name): Path<String>,
    Query(query): Query<GetQuery>,
) -> ApiResult<Asset> {
    let raw = query
        .qualified_name
        .ok_or_else(|| Error::invalid_request("qualifiedName is required"))?;
    let qualified_name = QualifiedName::new(raw)?;
    Ok(Json(
        backend
            .get_by_qualified_name(&type_name, &qualified_name, query.complete)
            .await?,
    ))
}

async fn search(
    State(backend): State<ServerState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    Ok(Json(backend.search(&request).await?))
}

async fn audit_search(
    State(backend): State<ServerState>,
    Json(request): Json<AuditSearchRequest>,
) -> ApiResult<AuditSearchResponse> {
    Ok(Json(backend.audit_search(&request).await?))
}
