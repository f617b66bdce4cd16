//! The catalog backend contract.
//!
//! [`CatalogBackend`] is the seam between the client facade and a concrete
//! catalog: [`crate::memory::MemoryCatalog`] for local simulation and tests,
//! [`crate::http::HttpBackend`] for a remote catalog. Implementations share
//! one behavioral contract:
//!
//! - every mutation returns a [`MutationResponse`] whose three collections are
//!   disjoint;
//! - a batch is validated in full before any of it is applied;
//! - reads by guid or qualified name hit the authoritative store, while
//!   [`CatalogBackend::search`] and [`CatalogBackend::audit_search`] read an
//!   eventually consistent index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quarry_core::{
    Asset, AssetUpdate, AuditSearchRequest, AuditSearchResponse, Guid, MutationResponse,
    QualifiedName, Result, SearchRequest, SearchResponse,
};

/// An update addressed by type and qualified name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Type name of the asset to update.
    pub type_name: String,
    /// Qualified name of the asset to update.
    pub qualified_name: QualifiedName,
    /// Fields to change.
    #[serde(flatten)]
    pub update: AssetUpdate,
}

impl UpdateRequest {
    /// Creates an update request.
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        qualified_name: QualifiedName,
        update: AssetUpdate,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            qualified_name,
            update,
        }
    }
}

/// A catalog that assets can be written to and searched in.
#[async_trait]
pub trait CatalogBackend: Send + Sync + 'static {
    /// Creates a batch of asset definitions.
    ///
    /// Items may reference each other (as parent or related) in any order.
    /// Returns `Conflict` if any item collides with an existing active or
    /// soft-deleted asset; nothing is created in that case.
    async fn create(&self, assets: Vec<Asset>) -> Result<MutationResponse>;

    /// Updates a batch of existing assets by qualified name.
    ///
    /// Returns `NotFound` if any target does not resolve to a non-purged asset.
    async fn update(&self, updates: Vec<UpdateRequest>) -> Result<MutationResponse>;

    /// Soft-deletes assets by guid.
    ///
    /// Already deleted assets contribute nothing to the response.
    async fn delete(&self, guids: &[Guid]) -> Result<MutationResponse>;

    /// Permanently removes assets by guid.
    ///
    /// Returns `Conflict` if an asset outside the batch still names one of
    /// the targets as its parent; children are purged first or alongside.
    async fn purge(&self, guids: &[Guid]) -> Result<MutationResponse>;

    /// Restores a soft-deleted asset. Returns false if there was nothing to restore.
    async fn restore(&self, type_name: &str, qualified_name: &QualifiedName) -> Result<bool>;

    /// Reads an asset by guid from the authoritative store.
    ///
    /// `complete` includes relationships and governance fields.
    async fn get_by_guid(&self, guid: Guid, complete: bool) -> Result<Asset>;

    /// Reads an asset by type and qualified name from the authoritative store.
    async fn get_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        complete: bool,
    ) -> Result<Asset>;

    /// Searches the asset index.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;

    /// Searches the audit index.
    async fn audit_search(&self, request: &AuditSearchRequest) -> Result<AuditSearchResponse>;
}

#[async_trait]
impl<B: CatalogBackend + ?Sized> CatalogBackend for std::sync::Arc<B> {
    async fn create(&self, assets: Vec<Asset>) -> Result<MutationResponse> {
        (**self).create(assets).await
    }

    async fn update(&self, updates: Vec<UpdateRequest>) -> Result<MutationResponse> {
        (**self).update(updates).await
    }

    async fn delete(&self, guids: &[Guid]) -> Result<MutationResponse> {
        (**self).delete(guids).await
    }

    async fn purge(&self, guids: &[Guid]) -> Result<MutationResponse> {
        (**self).purge(guids).await
    }

    async fn restore(&self, type_name: &str, qualified_name: &QualifiedName) -> Result<bool> {
        (**self).restore(type_name, qualified_name).await
    }

    async fn get_by_guid(&self, guid: Guid, complete: bool) -> Result<Asset> {
        (**self).get_by_guid(guid, complete).await
    }

    async fn get_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        complete: bool,
    ) -> Result<Asset> {
        (**self)
            .get_by_qualified_name(type_name, qualified_name, complete)
            .await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        (**self).search(request).await
    }

    async fn audit_search(&self, request: &AuditSearchRequest) -> Result<AuditSearchResponse> {
        (**self).audit_search(request).await
    }
}
