//! # quarry-core
//!
//! Shared primitives for the Quarry catalog client.
//!
//! This crate provides the types every other Quarry crate speaks:
//!
//! - **Identifiers**: server-assigned [`Guid`]s and scope-derived [`QualifiedName`]s
//! - **Asset Model**: a common [`Asset`] envelope over a tagged [`AssetKind`] payload
//! - **Mutation Responses**: the created / updated / deleted partition returned by every write
//! - **Search and Audit**: request/response shapes for the eventually-consistent indexes
//! - **Retry Configuration**: the process-wide [`RetryBudget`] and [`BackoffPolicy`]
//! - **Error Types**: shared error definitions and result types
//!
//! ## Example
//!
//! ```rust
//! use quarry_core::prelude::*;
//!
//! let connection = Asset::connection("warehouse", "snowflake").unwrap();
//! assert_eq!(connection.qualified_name.as_str(), "default/snowflake/warehouse");
//! assert_eq!(connection.type_name(), "Connection");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod asset;
pub mod audit;
pub mod backoff;
pub mod config;
pub mod error;
pub mod id;
pub mod mutation;
pub mod observability;
pub mod search;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use quarry_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::asset::{
        Announcement, AnnouncementType, Asset, AssetKind, AssetRef, AssetStatus, AssetUpdate,
        Certificate, CertificateStatus, DeleteHandler, Patch,
    };
    pub use crate::audit::{AuditAction, AuditEntry, AuditSearchRequest, AuditSearchResponse};
    pub use crate::backoff::{BackoffPolicy, RetryBudget};
    pub use crate::config::{ClientConfig, RetryConfig};
    pub use crate::error::{Error, Result};
    pub use crate::id::{Guid, QualifiedName};
    pub use crate::mutation::MutationResponse;
    pub use crate::search::{
        AggregationField, AggregationResult, Bucket, Filter, SearchRequest, SearchResponse, Sort,
        SortField, SortOrder,
    };
}

// Re-export key types at crate root for ergonomics
pub use asset::{Asset, AssetKind, AssetRef, AssetStatus, AssetUpdate, DeleteHandler};
pub use audit::{AuditAction, AuditEntry, AuditSearchRequest, AuditSearchResponse};
pub use backoff::{BackoffPolicy, RetryBudget};
pub use config::{ClientConfig, RetryConfig};
pub use error::{Error, Result};
pub use id::{Guid, QualifiedName};
pub use mutation::MutationResponse;
pub use observability::{LogFormat, init_logging};
pub use search::{SearchRequest, SearchResponse};
