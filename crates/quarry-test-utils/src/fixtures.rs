//! Pre-built test fixtures for common test scenarios.
//!
//! Names are suffixed with a per-context ULID so tests sharing a catalog
//! never collide.

use std::time::Duration;

use quarry_client::{CatalogClient, MemoryCatalog};
use quarry_core::{
    Asset, AssetKind, AssetRef, BackoffPolicy, ClientConfig, MutationResponse, RetryBudget,
    RetryConfig,
};

/// Client configuration with a small budget and millisecond backoff.
#[must_use]
pub fn fast_config() -> ClientConfig {
    ClientConfig::default().with_retry(
        RetryConfig::default()
            .with_budget(RetryBudget::new(10))
            .with_backoff(BackoffPolicy::new(
                Duration::from_millis(1),
                Duration::from_millis(20),
            )),
    )
}

/// Test context with a fresh in-memory catalog.
pub struct TestContext {
    /// The catalog, sharing state with `client`.
    pub catalog: MemoryCatalog,
    /// A client over `catalog`.
    pub client: CatalogClient<MemoryCatalog>,
    /// Unique suffix for names created by this context.
    pub run_id: String,
}

impl TestContext {
    /// Creates a context whose index lags by one read.
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(MemoryCatalog::new())
    }

    /// Creates a context whose index lags by `index_lag` reads.
    #[must_use]
    pub fn with_index_lag(index_lag: u32) -> Self {
        Self::with_catalog(MemoryCatalog::new().with_index_lag(index_lag))
    }

    /// Creates a context over an existing catalog.
    #[must_use]
    pub fn with_catalog(catalog: MemoryCatalog) -> Self {
        Self {
            client: CatalogClient::new(catalog.clone(), fast_config()),
            catalog,
            run_id: ulid::Ulid::new().to_string().to_lowercase(),
        }
    }

    /// Returns `base` made unique to this context.
    #[must_use]
    pub fn name(&self, base: &str) -> String {
        format!("{base}-{}", self.run_id)
    }

    /// A connection definition unique to this context.
    #[must_use]
    pub fn connection(&self) -> Asset {
        Asset::connection(self.name("conn"), "postgres").expect("valid connection")
    }

    /// A glossary definition unique to this context.
    #[must_use]
    pub fn glossary(&self) -> Asset {
        Asset::glossary(self.name("glossary")).expect("valid glossary")
    }

    /// Creates connection, database and schema; returns the stored schema.
    pub async fn schema_scope(&self) -> Asset {
        let connection = created(
            self.client
                .create(self.connection())
                .await
                .expect("create connection"),
        );
        let database = created(
            self.client
                .create(
                    Asset::child(AssetKind::Database, "analytics", &connection.to_ref())
                        .expect("valid database"),
                )
                .await
                .expect("create database"),
        );
        created(
            self.client
                .create(
                    Asset::child(AssetKind::Schema, "public", &database.to_ref())
                        .expect("valid schema"),
                )
                .await
                .expect("create schema"),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory for asset definitions under an existing scope.
pub struct AssetFactory;

impl AssetFactory {
    /// A table under `schema`.
    #[must_use]
    pub fn table(schema: &AssetRef, name: &str) -> Asset {
        Asset::child(AssetKind::Table { row_count: None }, name, schema).expect("valid table")
    }

    /// A view under `schema`.
    #[must_use]
    pub fn view(schema: &AssetRef, name: &str, definition: &str) -> Asset {
        Asset::child(
            AssetKind::View {
                definition: Some(definition.to_string()),
            },
            name,
            schema,
        )
        .expect("valid view")
    }

    /// A column under a table or view.
    #[must_use]
    pub fn column(container: &AssetRef, name: &str, data_type: &str, order: u32) -> Asset {
        Asset::child(
            AssetKind::Column {
                data_type: data_type.to_string(),
                order,
            },
            name,
            container,
        )
        .expect("valid column")
    }
}

/// The single created asset of `response`.
///
/// # Panics
///
/// Panics unless exactly one asset was created.
#[must_use]
pub fn created(response: MutationResponse) -> Asset {
    let (mut created, _, _) = response.into_parts();
    assert_eq!(created.len(), 1, "expected exactly one created asset");
    created.remove(0)
}
