//! # quarry-client
//!
//! Catalog client for Quarry.
//!
//! This crate implements the mutation lifecycle contract and the
//! consistency-aware reads layered on top of it:
//!
//! - **Backends**: the [`CatalogBackend`] trait, an HTTP implementation and an
//!   in-memory catalog whose search index lags the store
//! - **Lifecycle**: the create / update / delete / restore / purge state machine
//! - **Retry**: re-issuing creates that hit the transient authorization error
//! - **Polling**: waiting for search or audit search to reflect a mutation
//!
//! ## Example
//!
//! ```rust
//! use quarry_client::{CatalogClient, MemoryCatalog};
//! use quarry_client::poll::SearchExpectation;
//! use quarry_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> quarry_core::Result<()> {
//! let client = CatalogClient::new(MemoryCatalog::new(), ClientConfig::default());
//!
//! let response = client.create(Asset::glossary("finance")?).await?;
//! assert_eq!(response.created_assets().len(), 1);
//!
//! let request = SearchRequest::new().with_filter(Filter::TypeName("Glossary".into()));
//! let found = client
//!     .wait_for_search(&request, SearchExpectation::at_least(1))
//!     .await?
//!     .ensure_satisfied()?;
//! assert_eq!(found.approximate_count, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod client;
pub mod http;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod poll;
pub mod retry;

pub use backend::{CatalogBackend, UpdateRequest};
pub use client::CatalogClient;
pub use http::HttpBackend;
pub use lifecycle::LifecycleState;
pub use memory::MemoryCatalog;
pub use poll::{PollOutcome, Poller, SearchExpectation};
