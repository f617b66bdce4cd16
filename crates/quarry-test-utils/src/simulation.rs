//! Deterministic fault injection for catalog backends.
//!
//! [`FlakyBackend`] wraps another [`CatalogBackend`] and injects the
//! failures real catalogs produce under load: the transient authorization
//! error on freshly created scopes, and failed searches. Randomized faults
//! use a seeded RNG so a failing test reproduces with the same seed.
//!
//! # Example
//!
//! ```rust
//! use quarry_client::MemoryCatalog;
//! use quarry_test_utils::simulation::{FaultConfig, FlakyBackend, Operation};
//!
//! let backend = FlakyBackend::with_seed(
//!     MemoryCatalog::new(),
//!     FaultConfig {
//!         transient_auth_failures: 2,
//!         ..Default::default()
//!     },
//!     7,
//! );
//! assert_eq!(backend.count(Operation::Create), 0);
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quarry_client::{CatalogBackend, UpdateRequest};
use quarry_core::config::DEFAULT_TRANSIENT_AUTH_CODE;
use quarry_core::{
    Asset, AuditSearchRequest, AuditSearchResponse, Error, Guid, MutationResponse, QualifiedName,
    Result, SearchRequest, SearchResponse,
};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Number of leading create calls that fail with the transient auth error.
    pub transient_auth_failures: u32,

    /// Probability of a create failing with the transient auth error after
    /// the leading failures are spent (0.0 - 1.0).
    pub transient_auth_rate: f64,

    /// Probability of a search or audit search failing (0.0 - 1.0).
    pub search_failure_rate: f64,

    /// Code carried by injected transient auth errors.
    /// Defaults to [`DEFAULT_TRANSIENT_AUTH_CODE`].
    pub transient_auth_code: Option<String>,
}

impl FaultConfig {
    fn code(&self) -> String {
        self.transient_auth_code
            .clone()
            .unwrap_or_else(|| DEFAULT_TRANSIENT_AUTH_CODE.to_string())
    }
}

/// Backend operations, as recorded by [`FlakyBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `purge`
    Purge,
    /// `restore`
    Restore,
    /// Either get.
    Get,
    /// `search`
    Search,
    /// `audit_search`
    AuditSearch,
}

/// One call seen by a [`FlakyBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Which operation was called.
    pub operation: Operation,
    /// Whether a fault was injected instead of delegating.
    pub injected: bool,
}

#[derive(Debug)]
struct FaultState {
    rng: StdRng,
    remaining_auth_failures: u32,
    calls: Vec<RecordedCall>,
}

/// A backend wrapper that injects configured faults.
#[derive(Debug)]
pub struct FlakyBackend<B> {
    inner: B,
    config: FaultConfig,
    state: Mutex<FaultState>,
}

impl<B: CatalogBackend> FlakyBackend<B> {
    /// Wraps `inner` with seed 0.
    #[must_use]
    pub fn new(inner: B, config: FaultConfig) -> Self {
        Self::with_seed(inner, config, 0)
    }

    /// Wraps `inner` with a specific RNG seed.
    #[must_use]
    pub fn with_seed(inner: B, config: FaultConfig, seed: u64) -> Self {
        let state = FaultState {
            rng: StdRng::seed_from_u64(seed),
            remaining_auth_failures: config.transient_auth_failures,
            calls: Vec::new(),
        };
        Self {
            inner,
            config,
            state: Mutex::new(state),
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Every call seen so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().expect("fault state poisoned").calls.clone()
    }

    /// Number of calls to `operation`, injected or not.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .expect("fault state poisoned")
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Number of calls to `operation` that received an injected fault.
    #[must_use]
    pub fn injected(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .expect("fault state poisoned")
            .calls
            .iter()
            .filter(|c| c.operation == operation && c.injected)
            .count()
    }

    fn record(&self, operation: Operation) -> bool {
        let mut state = self.state.lock().expect("fault state poisoned");
        let injected = match operation {
            Operation::Create => {
                if state.remaining_auth_failures > 0 {
                    state.remaining_auth_failures -= 1;
                    true
                } else {
                    roll(&mut state.rng, self.config.transient_auth_rate)
                }
            }
            Operation::Search | Operation::AuditSearch => {
                roll(&mut state.rng, self.config.search_failure_rate)
            }
            _ => false,
        };
        state.calls.push(RecordedCall {
            operation,
            injected,
        });
        injected
    }

    fn transient_auth(&self) -> Error {
        Error::TransientAuth {
            code: self.config.code(),
            message: "authorization policy not yet propagated".to_string(),
        }
    }
}

fn roll(rng: &mut StdRng, rate: f64) -> bool {
    rate > 0.0 && rng.gen::<f64>() < rate
}

#[async_trait]
impl<B: CatalogBackend> CatalogBackend for FlakyBackend<B> {
    async fn create(&self, assets: Vec<Asset>) -> Result<MutationResponse> {
        if self.record(Operation::Create) {
            tracing::debug!("injecting transient auth failure on create");
            return Err(self.transient_auth());
        }
        self.inner.create(assets).await
    }

    async fn update(&self, updates: Vec<UpdateRequest>) -> Result<MutationResponse> {
        self.record(Operation::Update);
        self.inner.update(updates).await
    }

    async fn delete(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.record(Operation::Delete);
        self.inner.delete(guids).await
    }

    async fn purge(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.record(Operation::Purge);
        self.inner.purge(guids).await
    }

    async fn restore(&self, type_name: &str, qualified_name: &QualifiedName) -> Result<bool> {
        self.record(Operation::Restore);
        self.inner.restore(type_name, qualified_name).await
    }

    async fn get_by_guid(&self, guid: Guid, complete: bool) -> Result<Asset> {
        self.record(Operation::Get);
        self.inner.get_by_guid(guid, complete).await
    }

    async fn get_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        complete: bool,
    ) -> Result<Asset> {
        self.record(Operation::Get);
        self.inner
            .get_by_qualified_name(type_name, qualified_name, complete)
            .await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if self.record(Operation::Search) {
            return Err(Error::transport("injected search failure"));
        }
        self.inner.search(request).await
    }

    async fn audit_search(&self, request: &AuditSearchRequest) -> Result<AuditSearchResponse> {
        if self.record(Operation::AuditSearch) {
            return Err(Error::transport("injected audit search failure"));
        }
        self.inner.audit_search(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_client::MemoryCatalog;

    #[tokio::test]
    async fn leading_failures_are_spent_in_order() {
        let backend = FlakyBackend::new(
            MemoryCatalog::new(),
            FaultConfig {
                transient_auth_failures: 2,
                ..Default::default()
            },
        );
        let glossary = Asset::glossary("g").unwrap();

        for _ in 0..2 {
            let err = backend.create(vec![glossary.clone()]).await.unwrap_err();
            assert!(err.is_transient_auth());
        }
        let response = backend.create(vec![glossary]).await.unwrap();
        assert_eq!(response.created_assets().len(), 1);
        assert_eq!(backend.count(Operation::Create), 3);
        assert_eq!(backend.injected(Operation::Create), 2);
    }

    #[tokio::test]
    async fn same_seed_injects_same_faults() {
        let config = FaultConfig {
            search_failure_rate: 0.5,
            ..Default::default()
        };
        let a = FlakyBackend::with_seed(MemoryCatalog::new(), config.clone(), 42);
        let b = FlakyBackend::with_seed(MemoryCatalog::new(), config, 42);
        let request = SearchRequest::new();
        for _ in 0..20 {
            let _ = a.search(&request).await;
            let _ = b.search(&request).await;
        }
        assert_eq!(a.calls(), b.calls());
    }

    #[tokio::test]
    async fn custom_code_is_carried() {
        let backend = FlakyBackend::new(
            MemoryCatalog::new(),
            FaultConfig {
                transient_auth_failures: 1,
                transient_auth_code: Some("CUSTOM-1".into()),
                ..Default::default()
            },
        );
        let err = backend
            .create(vec![Asset::glossary("g").unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransientAuth { code, .. } if code == "CUSTOM-1"));
    }
}
