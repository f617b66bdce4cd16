//! Search requests and responses over the eventually-consistent asset index.
//!
//! The index lags the authoritative store: right after a mutation,
//! `approximateCount` may undercount and returned assets may carry a stale
//! status. Aggregation buckets share that lag, so bucket counts are only
//! meaningful after a satisfied poll (see `quarry_client::poll`).
//!
//! Filters are evaluated conjunctively. Requests carry no implicit status
//! filter: soft-deleted assets match unless a [`Filter::Status`] excludes
//! them, which is what delete verification relies on.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::asset::{Asset, AssetStatus, CertificateStatus};
use crate::id::{Guid, QualifiedName};

/// Default number of assets per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A single search predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Filter {
    /// Exact type name.
    TypeName(String),
    /// Any of several type names.
    TypeNames(Vec<String>),
    /// Exact guid.
    Guid(Guid),
    /// Exact qualified name.
    QualifiedName(QualifiedName),
    /// Qualified name equal to or scoped under the given prefix.
    WithinScope(String),
    /// Exact name.
    Name(String),
    /// Lifecycle status.
    Status(AssetStatus),
    /// Certificate status.
    CertificateStatus(CertificateStatus),
    /// Has any announcement.
    HasAnnouncement,
    /// Custom attribute equality.
    CustomAttribute {
        /// Attribute key.
        key: String,
        /// Expected value.
        value: serde_json::Value,
    },
}

impl Filter {
    /// Returns true if `asset` satisfies this predicate.
    #[must_use]
    pub fn matches(&self, asset: &Asset) -> bool {
        match self {
            Self::TypeName(type_name) => asset.type_name() == type_name,
            Self::TypeNames(type_names) => type_names.iter().any(|t| t == asset.type_name()),
            Self::Guid(guid) => asset.guid == Some(*guid),
            Self::QualifiedName(qn) => &asset.qualified_name == qn,
            Self::WithinScope(scope) => asset.qualified_name.is_within(scope),
            Self::Name(name) => &asset.name == name,
            Self::Status(status) => asset.status == *status,
            Self::CertificateStatus(status) => asset
                .certificate
                .as_ref()
                .is_some_and(|c| c.status == *status),
            Self::HasAnnouncement => asset.announcement.is_some(),
            Self::CustomAttribute { key, value } => asset.custom_attributes.get(key) == Some(value),
        }
    }
}

/// Sortable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Asset name.
    Name,
    /// Qualified name.
    QualifiedName,
    /// Creation timestamp.
    CreatedAt,
    /// Last modification timestamp.
    UpdatedAt,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    /// Field to sort by.
    pub field: SortField,
    /// Direction.
    #[serde(default)]
    pub order: SortOrder,
}

impl Sort {
    fn compare(&self, a: &Asset, b: &Asset) -> Ordering {
        let ordering = match self.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::QualifiedName => a.qualified_name.cmp(&b.qualified_name),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Fields that can be bucketed by an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationField {
    /// Bucket by type name.
    TypeName,
    /// Bucket by lifecycle status.
    Status,
    /// Bucket by certificate status (`NONE` when uncertified).
    CertificateStatus,
}

impl AggregationField {
    fn key_of(self, asset: &Asset) -> String {
        match self {
            Self::TypeName => asset.type_name().to_string(),
            Self::Status => asset.status.as_str().to_string(),
            Self::CertificateStatus => asset
                .certificate
                .as_ref()
                .map_or("NONE", |c| c.status.as_str())
                .to_string(),
        }
    }
}

/// A structured query over the asset index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Conjunctive filters.
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Sort keys, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    /// Offset of the first returned asset.
    #[serde(default)]
    pub from: usize,
    /// Maximum number of assets returned.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Named aggregation requests.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregations: BTreeMap<String, AggregationField>,
    /// Extra attributes to include in returned assets (see [`Asset::project`]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            from: 0,
            page_size: DEFAULT_PAGE_SIZE,
            aggregations: BTreeMap::new(),
            attributes: Vec::new(),
        }
    }
}

impl SearchRequest {
    /// Creates an unfiltered request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort key.
    #[must_use]
    pub fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort.push(Sort { field, order });
        self
    }

    /// Sets the page window.
    #[must_use]
    pub fn with_page(mut self, from: usize, page_size: usize) -> Self {
        self.from = from;
        self.page_size = page_size;
        self
    }

    /// Requests a named aggregation.
    #[must_use]
    pub fn with_aggregation(mut self, name: impl Into<String>, field: AggregationField) -> Self {
        self.aggregations.insert(name.into(), field);
        self
    }

    /// Requests an extra attribute on returned assets.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    /// Returns true if `asset` satisfies every filter.
    #[must_use]
    pub fn matches(&self, asset: &Asset) -> bool {
        self.filters.iter().all(|f| f.matches(asset))
    }

    /// Evaluates this request over a set of indexed documents.
    ///
    /// Counting and aggregation cover every match; sorting, paging and
    /// projection apply to the returned page only.
    pub fn execute<'a, I>(&self, documents: I) -> SearchResponse
    where
        I: IntoIterator<Item = &'a Asset>,
    {
        let mut matches: Vec<&Asset> = documents.into_iter().filter(|a| self.matches(a)).collect();

        let mut aggregations = BTreeMap::new();
        for (name, field) in &self.aggregations {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for asset in &matches {
                *counts.entry(field.key_of(asset)).or_default() += 1;
            }
            aggregations.insert(name.clone(), AggregationResult::from_counts(counts));
        }

        if !self.sort.is_empty() {
            matches.sort_by(|a, b| {
                self.sort
                    .iter()
                    .map(|s| s.compare(a, b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let approximate_count = matches.len() as u64;
        let active_count = matches.iter().filter(|a| a.is_active()).count() as u64;
        let assets = matches
            .into_iter()
            .skip(self.from)
            .take(self.page_size)
            .map(|a| a.project(&self.attributes))
            .collect();

        SearchResponse {
            approximate_count,
            active_count,
            assets,
            aggregations,
        }
    }
}

/// One aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket key.
    pub key: String,
    /// Number of matching assets.
    pub count: u64,
}

/// Buckets of one aggregation, largest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Buckets ordered by descending count, then key.
    pub buckets: Vec<Bucket>,
}

impl AggregationResult {
    fn from_counts(counts: BTreeMap<String, u64>) -> Self {
        let mut buckets: Vec<Bucket> = counts
            .into_iter()
            .map(|(key, count)| Bucket { key, count })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        Self { buckets }
    }

    /// Count of the bucket with `key`, or zero.
    #[must_use]
    pub fn count_of(&self, key: &str) -> u64 {
        self.buckets
            .iter()
            .find(|b| b.key == key)
            .map_or(0, |b| b.count)
    }
}

/// Result of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Index-side match count; may lag the store.
    pub approximate_count: u64,
    /// Index-side count of `ACTIVE` matches across every page.
    #[serde(default)]
    pub active_count: u64,
    /// The requested page.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Named aggregation results.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregations: BTreeMap<String, AggregationResult>,
}

impl SearchResponse {
    /// Aggregation result by name.
    #[must_use]
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResult> {
        self.aggregations.get(name)
    }
}
