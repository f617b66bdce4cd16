//! Shared test utilities for Quarry.
//!
//! This crate provides:
//! - [`TestContext`]: a client over a fresh [`quarry_client::MemoryCatalog`]
//!   with fast retry settings and unique names
//! - [`FlakyBackend`]: a backend wrapper that injects transient failures and
//!   records calls
//! - [`CatalogServer`]: an HTTP server exposing any backend on `127.0.0.1`
//! - Assertion helpers for mutation responses
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry_test_utils::{TestContext, assert_partition};
//!
//! #[tokio::test]
//! async fn creates_glossary() {
//!     let ctx = TestContext::new();
//!     let response = ctx.client.create(ctx.glossary()).await.unwrap();
//!     assert_partition(&response, 1, 0, 0);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod server;
pub mod simulation;

pub use assertions::*;
pub use fixtures::*;
pub use server::*;
pub use simulation::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("quarry_client=debug".parse().expect("valid directive"))
                .add_directive("quarry_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
