//! The catalog client facade.
//!
//! [`CatalogClient`] pairs a [`CatalogBackend`] with the retry configuration
//! and a cancellation token. It adds what backends do not do themselves:
//! transient-auth retry on create, batch splitting by the configured limit,
//! tracing spans around mutations, and consistency waits.

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug};

use quarry_core::observability::mutation_span;
use quarry_core::{
    Asset, AssetUpdate, AuditSearchRequest, AuditSearchResponse, ClientConfig, Error, Guid,
    MutationResponse, QualifiedName, Result, SearchRequest, SearchResponse,
};

use crate::backend::{CatalogBackend, UpdateRequest};
use crate::http::HttpBackend;
use crate::poll::{AuditExpectation, PollOutcome, Poller, SearchExpectation};
use crate::retry::retry_transient_auth;

/// Typed client over a catalog backend.
#[derive(Debug, Clone)]
pub struct CatalogClient<B> {
    backend: B,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl CatalogClient<HttpBackend> {
    /// Connects to the catalog named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let backend = HttpBackend::new(&config)?;
        Ok(Self::new(backend, config))
    }
}

impl<B: CatalogBackend> CatalogClient<B> {
    /// Creates a client over `backend`.
    #[must_use]
    pub fn new(backend: B, config: ClientConfig) -> Self {
        Self {
            backend,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token observed by retries and polls.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Creates one asset.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if it already exists, `NotFound` if a referenced
    /// asset does not, and the transient-auth error if it persists through
    /// the retry budget.
    pub async fn create(&self, asset: Asset) -> Result<MutationResponse> {
        let span = mutation_span("create", asset.type_name(), &asset.qualified_name);
        self.create_batch(vec![asset]).instrument(span).await
    }

    /// Creates assets, splitting them into batches of the configured size.
    ///
    /// Items that reference each other must land in the same batch; keep
    /// dependent definitions within `max_batch_size` of each other.
    ///
    /// # Errors
    ///
    /// Returns the first failing batch's error. Batches before it stay applied.
    pub async fn create_all(&self, assets: Vec<Asset>) -> Result<MutationResponse> {
        let mut merged = MutationResponse::builder();
        let mut remaining = assets;
        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(self.config.max_batch_size));
            let response = self.create_batch(remaining).await?;
            let (created, updated, deleted) = response.into_parts();
            for asset in created {
                merged.created(asset);
            }
            for asset in updated {
                merged.updated(asset);
            }
            for asset in deleted {
                merged.deleted(asset);
            }
            remaining = rest;
        }
        Ok(merged.build())
    }

    async fn create_batch(&self, assets: Vec<Asset>) -> Result<MutationResponse> {
        let response = retry_transient_auth(&self.config.retry, &self.cancel, || {
            self.backend.create(assets.clone())
        })
        .await?;
        debug!(
            created = response.created_assets().len(),
            updated = response.updated_assets().len(),
            "create applied"
        );
        Ok(response)
    }

    /// Updates one asset by type and qualified name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset does not exist or was purged.
    pub async fn update(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        update: AssetUpdate,
    ) -> Result<MutationResponse> {
        let span = mutation_span("update", type_name, qualified_name);
        self.backend
            .update(vec![UpdateRequest::new(
                type_name,
                qualified_name.clone(),
                update,
            )])
            .instrument(span)
            .await
    }

    /// Applies several updates in one call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the batch exceeds the configured size, and
    /// `NotFound` if any target does not resolve.
    pub async fn update_all(&self, updates: Vec<UpdateRequest>) -> Result<MutationResponse> {
        self.check_batch(updates.len())?;
        self.backend.update(updates).await
    }

    /// Soft-deletes assets by guid.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if any guid does not resolve.
    pub async fn delete(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.check_batch(guids.len())?;
        self.backend
            .delete(guids)
            .instrument(tracing::info_span!("mutation", op = "delete", count = guids.len()))
            .await
    }

    /// Permanently removes assets by guid.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if any guid does not resolve.
    pub async fn purge(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.check_batch(guids.len())?;
        self.backend
            .purge(guids)
            .instrument(tracing::info_span!("mutation", op = "purge", count = guids.len()))
            .await
    }

    /// Restores a soft-deleted asset. Returns false if there was nothing to restore.
    ///
    /// # Errors
    ///
    /// Returns transport-level errors only.
    pub async fn restore(&self, type_name: &str, qualified_name: &QualifiedName) -> Result<bool> {
        let span = mutation_span("restore", type_name, qualified_name);
        self.backend
            .restore(type_name, qualified_name)
            .instrument(span)
            .await
    }

    /// Reads an asset by guid.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the guid does not resolve.
    pub async fn get(&self, guid: Guid, complete: bool) -> Result<Asset> {
        self.backend.get_by_guid(guid, complete).await
    }

    /// Reads an asset by type and qualified name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing matches.
    pub async fn get_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        complete: bool,
    ) -> Result<Asset> {
        self.backend
            .get_by_qualified_name(type_name, qualified_name, complete)
            .await
    }

    /// Runs one search against the index.
    ///
    /// # Errors
    ///
    /// Returns transport-level errors.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.backend.search(request).await
    }

    /// Runs one audit search against the index.
    ///
    /// # Errors
    ///
    /// Returns transport-level errors.
    pub async fn audit(&self, request: &AuditSearchRequest) -> Result<AuditSearchResponse> {
        self.backend.audit_search(request).await
    }

    /// Re-runs `request` until the index meets `expectation` or the budget runs out.
    ///
    /// # Errors
    ///
    /// Returns search errors and `Cancelled`. An exhausted budget is reported
    /// through [`PollOutcome::satisfied`].
    pub async fn wait_for_search(
        &self,
        request: &SearchRequest,
        expectation: SearchExpectation,
    ) -> Result<PollOutcome<SearchResponse>> {
        self.poller()
            .poll("search", &expectation, || self.backend.search(request))
            .await
    }

    /// Re-runs an audit search until at least `expected` entries match.
    ///
    /// # Errors
    ///
    /// Returns audit search errors and `Cancelled`.
    pub async fn wait_for_audit(
        &self,
        request: &AuditSearchRequest,
        expected: u64,
    ) -> Result<PollOutcome<AuditSearchResponse>> {
        self.poller()
            .poll("audit", &AuditExpectation(expected), || {
                self.backend.audit_search(request)
            })
            .await
    }

    fn poller(&self) -> Poller {
        Poller::from_config(&self.config.retry, self.cancel.clone())
    }

    fn check_batch(&self, len: usize) -> Result<()> {
        if len > self.config.max_batch_size {
            return Err(Error::invalid_request(format!(
                "batch of {len} items exceeds the limit of {}",
                self.config.max_batch_size
            )));
        }
        Ok(())
    }
}
