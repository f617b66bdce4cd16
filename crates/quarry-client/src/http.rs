//! JSON/REST backend.
//!
//! Speaks the catalog contract over HTTP with bearer authentication. All
//! endpoints live under `{base}/api/catalog/v1`:
//!
//! | operation | request |
//! |---|---|
//! | create | `POST /assets` |
//! | update | `PATCH /assets` |
//! | delete, purge | `DELETE /assets?guid=..&deleteType=SOFT\|PURGE` |
//! | restore | `POST /assets/restore` |
//! | get by guid | `GET /assets/{guid}?complete=` |
//! | get by name | `GET /assets/by-name/{typeName}?qualifiedName=&complete=` |
//! | search | `POST /search` |
//! | audit search | `POST /audit/search` |
//!
//! Failed requests carry an [`wire::ErrorBody`] which is mapped back onto
//! [`quarry_core::Error`] by [`map_error_response`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use quarry_core::{
    Asset, AuditSearchRequest, AuditSearchResponse, ClientConfig, DeleteHandler, Error, Guid,
    MutationResponse, QualifiedName, Result, RetryConfig, SearchRequest, SearchResponse,
};

use crate::backend::{CatalogBackend, UpdateRequest};

/// Path prefix of the catalog API.
pub const API_PREFIX: &str = "/api/catalog/v1";

/// Request and response bodies shared by the client and test servers.
pub mod wire {
    use serde::{Deserialize, Serialize};

    use quarry_core::{Asset, Error, QualifiedName};

    use crate::backend::UpdateRequest;

    /// Body of `POST /assets`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CreateBody {
        /// Definitions to create.
        pub assets: Vec<Asset>,
    }

    /// Body of `PATCH /assets`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UpdateBody {
        /// Updates to apply.
        pub updates: Vec<UpdateRequest>,
    }

    /// Query of `DELETE /assets`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DeleteQuery {
        /// Comma-separated guids.
        pub guid: String,
        /// `SOFT` or `PURGE`.
        pub delete_type: String,
    }

    /// Body of `POST /assets/restore`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RestoreBody {
        /// Type name of the asset.
        pub type_name: String,
        /// Qualified name of the asset.
        pub qualified_name: QualifiedName,
    }

    /// Response of `POST /assets/restore`.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct RestoreResponse {
        /// Whether anything was restored.
        pub restored: bool,
    }

    /// Query of the get endpoints.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetQuery {
        /// Qualified name (get by name only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub qualified_name: Option<String>,
        /// Include relationships and governance fields.
        #[serde(default)]
        pub complete: bool,
    }

    /// Error code for missing assets.
    pub const CODE_NOT_FOUND: &str = "ATLAS-404-00-005";
    /// Error code for conflicting creates.
    pub const CODE_CONFLICT: &str = "ATLAS-409-00-001";
    /// Error code for rejected requests.
    pub const CODE_INVALID: &str = "ATLAS-400-00-001";
    /// Error code for authorization failures.
    pub const CODE_FORBIDDEN: &str = "ATLAS-403-00-000";
    /// Error code for everything else.
    pub const CODE_INTERNAL: &str = "ATLAS-500-00-001";

    /// Body of every failed response.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ErrorBody {
        /// Machine-readable code.
        pub error_code: String,
        /// Human-readable message.
        pub error_message: String,
    }

    impl ErrorBody {
        /// HTTP status and body a server answers with for `err`.
        #[must_use]
        pub fn from_error(err: &Error) -> (u16, Self) {
            let (status, code) = match err {
                Error::NotFound { .. } => (404, CODE_NOT_FOUND.to_string()),
                Error::Conflict { .. } => (409, CODE_CONFLICT.to_string()),
                Error::InvalidRequest { .. } | Error::InvalidInput(_) => {
                    (400, CODE_INVALID.to_string())
                }
                Error::Permission { .. } => (403, CODE_FORBIDDEN.to_string()),
                Error::TransientAuth { code, .. } => (403, code.clone()),
                _ => (500, CODE_INTERNAL.to_string()),
            };
            let message = match err {
                Error::TransientAuth { message, .. } => message.clone(),
                other => other.to_string(),
            };
            (
                status,
                Self {
                    error_code: code,
                    error_message: message,
                },
            )
        }
    }
}

/// Maps a failed HTTP response onto the error taxonomy.
///
/// `resource` and `id` name what was requested, for `NotFound`.
#[must_use]
pub fn map_error_response(
    status: u16,
    body: &str,
    retry: &RetryConfig,
    resource: &str,
    id: &str,
) -> Error {
    let (code, message) = match serde_json::from_str::<wire::ErrorBody>(body) {
        Ok(parsed) => (Some(parsed.error_code), parsed.error_message),
        Err(_) => (None, body.to_string()),
    };
    match status {
        404 => Error::not_found(resource, id),
        409 => Error::conflict(message),
        400 => Error::invalid_request(message),
        401 | 403 => match code {
            Some(code) if retry.is_transient_auth_code(&code) => {
                Error::TransientAuth { code, message }
            }
            _ => Error::Permission { message },
        },
        _ => Error::transport(format!("unexpected status {status}: {message}")),
    }
}

/// Catalog backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    api_url: String,
    token: Option<String>,
    retry: RetryConfig,
}

impl HttpBackend {
    /// Creates a backend from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::transport_with_source("failed to create HTTP client", e))?;

        Ok(Self {
            client,
            api_url: format!("{}{API_PREFIX}", config.trimmed_base_url()),
            token: config.api_token.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Full URL of the API root.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// URL of `path` with `segment` appended as one percent-encoded segment.
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url(path))
            .map_err(|e| Error::invalid_request(format!("invalid catalog URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::invalid_request("catalog URL cannot have path segments"))?
            .push(segment);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
        id: &str,
    ) -> Result<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport_with_source("failed to send request", e))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| Error::Serialization {
                message: format!("failed to parse response: {e}"),
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                tracing::debug!(%error, resource, id, "failed to read error body");
                String::new()
            }
        };
        tracing::debug!(status = status.as_u16(), resource, id, "catalog request failed");
        Err(map_error_response(
            status.as_u16(),
            &body,
            &self.retry,
            resource,
            id,
        ))
    }

    async fn remove(&self, guids: &[Guid], handler: DeleteHandler) -> Result<MutationResponse> {
        if guids.is_empty() {
            return Ok(MutationResponse::default());
        }
        let joined = guids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let query = wire::DeleteQuery {
            guid: joined.clone(),
            delete_type: handler.as_str().to_string(),
        };
        let request = self.client.delete(self.url("/assets")).query(&query);
        self.send(request, "Asset", &joined).await
    }
}

#[async_trait]
impl CatalogBackend for HttpBackend {
    async fn create(&self, assets: Vec<Asset>) -> Result<MutationResponse> {
        let request = self
            .client
            .post(self.url("/assets"))
            .json(&wire::CreateBody { assets });
        self.send(request, "Asset", "batch").await
    }

    async fn update(&self, updates: Vec<UpdateRequest>) -> Result<MutationResponse> {
        let id = updates
            .first()
            .map(|u| u.qualified_name.to_string())
            .unwrap_or_default();
        let request = self
            .client
            .patch(self.url("/assets"))
            .json(&wire::UpdateBody { updates });
        self.send(request, "Asset", &id).await
    }

    async fn delete(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.remove(guids, DeleteHandler::Soft).await
    }

    async fn purge(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.remove(guids, DeleteHandler::Purge).await
    }

    async fn restore(&self, type_name: &str, qualified_name: &QualifiedName) -> Result<bool> {
        let request = self
            .client
            .post(self.url("/assets/restore"))
            .json(&wire::RestoreBody {
                type_name: type_name.to_string(),
                qualified_name: qualified_name.clone(),
            });
        let response: wire::RestoreResponse = self
            .send(request, type_name, qualified_name.as_str())
            .await?;
        Ok(response.restored)
    }

    async fn get_by_guid(&self, guid: Guid, complete: bool) -> Result<Asset> {
        let request = self
            .client
            .get(self.url(&format!("/assets/{guid}")))
            .query(&wire::GetQuery {
                qualified_name: None,
                complete,
            });
        self.send(request, "Asset", &guid.to_string()).await
    }

    async fn get_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        complete: bool,
    ) -> Result<Asset> {
        let request = self
            .client
            .get(self.url_with_segment("/assets/by-name", type_name)?)
            .query(&wire::GetQuery {
                qualified_name: Some(qualified_name.to_string()),
                complete,
            });
        self.send(request, type_name, qualified_name.as_str()).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let http = self.client.post(self.url("/search")).json(request);
        self.send(http, "Search", "").await
    }

    async fn audit_search(&self, request: &AuditSearchRequest) -> Result<AuditSearchResponse> {
        let http = self.client.post(self.url("/audit/search")).json(request);
        self.send(http, "Audit", "").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str) -> String {
        serde_json::to_string(&wire::ErrorBody {
            error_code: code.into(),
            error_message: "nope".into(),
        })
        .unwrap()
    }

    #[test]
    fn maps_status_codes() {
        let retry = RetryConfig::default();
        let err = map_error_response(404, &body(wire::CODE_NOT_FOUND), &retry, "Table", "x");
        assert!(err.is_not_found());
        assert!(matches!(
            map_error_response(409, &body(wire::CODE_CONFLICT), &retry, "Table", "x"),
            Error::Conflict { .. }
        ));
        assert!(matches!(
            map_error_response(400, "not json", &retry, "Table", "x"),
            Error::InvalidRequest { message } if message == "not json"
        ));
        assert!(matches!(
            map_error_response(502, "", &retry, "Table", "x"),
            Error::Transport { .. }
        ));
    }

    #[test]
    fn only_configured_codes_are_transient() {
        let retry = RetryConfig::default();
        let transient = map_error_response(403, &body("ATLAS-403-00-001"), &retry, "Table", "x");
        assert!(transient.is_transient_auth());

        let denied = map_error_response(403, &body(wire::CODE_FORBIDDEN), &retry, "Table", "x");
        assert!(matches!(denied, Error::Permission { .. }));
    }

    #[test]
    fn error_body_round_trips_through_mapping() {
        let retry = RetryConfig::default();
        let original = Error::TransientAuth {
            code: "ATLAS-403-00-001".into(),
            message: "propagating".into(),
        };
        let (status, body) = wire::ErrorBody::from_error(&original);
        let text = serde_json::to_string(&body).unwrap();
        let mapped = map_error_response(status, &text, &retry, "Table", "x");
        assert!(matches!(
            mapped,
            Error::TransientAuth { code, message } if code == "ATLAS-403-00-001" && message == "propagating"
        ));
    }

    #[test]
    fn api_url_has_prefix() {
        let config = ClientConfig::default().with_base_url("http://catalog.local/");
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.api_url(), "http://catalog.local/api/catalog/v1");
    }

    #[test]
    fn type_names_are_encoded_as_one_segment() {
        let config = ClientConfig::default().with_base_url("http://catalog.local");
        let backend = HttpBackend::new(&config).unwrap();
        let url = backend
            .url_with_segment("/assets/by-name", "Custom Type/v2?x")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://catalog.local/api/catalog/v1/assets/by-name/Custom%20Type%2Fv2%3Fx"
        );
    }
}
