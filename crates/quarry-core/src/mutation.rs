//! Partitioned results of mutating calls.
//!
//! Every create, update, delete or purge returns a [`MutationResponse`] with
//! three disjoint, ordered collections. Within one call an asset appears in
//! exactly one collection:
//!
//! - an asset created by the call stays in `createdAssets`, even when a later
//!   item of the same batch touches it;
//! - counterparts that merely gained or lost a relationship land in
//!   `updatedAssets`, once per call;
//! - a removal always wins over a create or update of the same asset.
//!
//! Backends assemble responses through [`MutationResponseBuilder`], which
//! enforces the partitioning.

use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::id::{Guid, QualifiedName};

/// The result of a mutating call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    #[serde(default)]
    created_assets: Vec<Asset>,
    #[serde(default)]
    updated_assets: Vec<Asset>,
    #[serde(default)]
    deleted_assets: Vec<Asset>,
}

impl MutationResponse {
    /// Starts building a response.
    #[must_use]
    pub fn builder() -> MutationResponseBuilder {
        MutationResponseBuilder::default()
    }

    /// Assets created by the call.
    #[must_use]
    pub fn created_assets(&self) -> &[Asset] {
        &self.created_assets
    }

    /// Assets updated by the call, including relationship counterparts.
    #[must_use]
    pub fn updated_assets(&self) -> &[Asset] {
        &self.updated_assets
    }

    /// Assets soft-deleted or purged by the call.
    #[must_use]
    pub fn deleted_assets(&self) -> &[Asset] {
        &self.deleted_assets
    }

    /// Returns true if the call changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created_assets.is_empty()
            && self.updated_assets.is_empty()
            && self.deleted_assets.is_empty()
    }

    /// Total number of assets across all three collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created_assets.len() + self.updated_assets.len() + self.deleted_assets.len()
    }

    /// Created assets of the given type.
    pub fn created_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Asset> {
        self.created_assets
            .iter()
            .filter(move |a| a.type_name() == type_name)
    }

    /// Updated assets of the given type.
    pub fn updated_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Asset> {
        self.updated_assets
            .iter()
            .filter(move |a| a.type_name() == type_name)
    }

    /// Finds a created asset by its qualified name.
    #[must_use]
    pub fn find_created(&self, qualified_name: &QualifiedName) -> Option<&Asset> {
        self.created_assets
            .iter()
            .find(|a| &a.qualified_name == qualified_name)
    }

    /// Guid assigned to a created asset, by qualified name.
    #[must_use]
    pub fn assigned_guid(&self, qualified_name: &QualifiedName) -> Option<Guid> {
        self.find_created(qualified_name).and_then(|a| a.guid)
    }

    /// Splits the response into `(created, updated, deleted)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Asset>, Vec<Asset>, Vec<Asset>) {
        (self.created_assets, self.updated_assets, self.deleted_assets)
    }
}

/// Builds a [`MutationResponse`] while keeping the three collections disjoint.
///
/// Assets are keyed by guid; recording an asset without a guid is a no-op.
#[derive(Debug, Default)]
pub struct MutationResponseBuilder {
    response: MutationResponse,
}

impl MutationResponseBuilder {
    /// Records an asset created by the call.
    pub fn created(&mut self, asset: Asset) -> &mut Self {
        let Some(guid) = asset.guid else {
            return self;
        };
        remove_guid(&mut self.response.updated_assets, guid);
        upsert(&mut self.response.created_assets, asset, guid);
        self
    }

    /// Records an asset updated by the call.
    ///
    /// If the asset was created earlier in the same call, the created entry is
    /// refreshed instead; if it was removed, the update is dropped.
    pub fn updated(&mut self, asset: Asset) -> &mut Self {
        let Some(guid) = asset.guid else {
            return self;
        };
        if contains_guid(&self.response.deleted_assets, guid) {
            return self;
        }
        if contains_guid(&self.response.created_assets, guid) {
            upsert(&mut self.response.created_assets, asset, guid);
        } else {
            upsert(&mut self.response.updated_assets, asset, guid);
        }
        self
    }

    /// Records an asset soft-deleted or purged by the call.
    pub fn deleted(&mut self, asset: Asset) -> &mut Self {
        let Some(guid) = asset.guid else {
            return self;
        };
        remove_guid(&mut self.response.created_assets, guid);
        remove_guid(&mut self.response.updated_assets, guid);
        upsert(&mut self.response.deleted_assets, asset, guid);
        self
    }

    /// Finishes the response.
    #[must_use]
    pub fn build(self) -> MutationResponse {
        self.response
    }
}

fn contains_guid(assets: &[Asset], guid: Guid) -> bool {
    assets.iter().any(|a| a.guid == Some(guid))
}

fn remove_guid(assets: &mut Vec<Asset>, guid: Guid) {
    assets.retain(|a| a.guid != Some(guid));
}

fn upsert(assets: &mut Vec<Asset>, asset: Asset, guid: Guid) {
    if let Some(existing) = assets.iter_mut().find(|a| a.guid == Some(guid)) {
        *existing = asset;
    } else {
        assets.push(asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(name: &str) -> Asset {
        let mut asset = Asset::glossary(name).unwrap();
        asset.guid = Some(Guid::generate());
        asset
    }

    #[test]
    fn update_of_created_asset_stays_created() {
        let glossary = stored("g");
        let mut touched = glossary.clone();
        touched.version = 2;

        let mut builder = MutationResponse::builder();
        builder.created(glossary).updated(touched);
        let response = builder.build();

        assert_eq!(response.created_assets().len(), 1);
        assert!(response.updated_assets().is_empty());
        assert_eq!(response.created_assets()[0].version, 2);
    }

    #[test]
    fn counterpart_updates_are_recorded_once() {
        let parent = stored("parent");
        let mut builder = MutationResponse::builder();
        builder.updated(parent.clone());
        builder.updated(parent.clone());
        builder.updated(parent);
        assert_eq!(builder.build().updated_assets().len(), 1);
    }

    #[test]
    fn delete_wins_over_update() {
        let asset = stored("a");
        let mut builder = MutationResponse::builder();
        builder.updated(asset.clone()).deleted(asset.clone()).updated(asset);
        let response = builder.build();
        assert!(response.updated_assets().is_empty());
        assert_eq!(response.deleted_assets().len(), 1);
        assert_eq!(response.len(), 1);
    }

    #[test]
    fn assets_without_guid_are_ignored() {
        let mut builder = MutationResponse::builder();
        builder.created(Asset::glossary("unsaved").unwrap());
        assert!(builder.build().is_empty());
    }

    #[test]
    fn assigned_guid_looks_up_by_qualified_name() {
        let asset = stored("finance");
        let guid = asset.guid;
        let qn = asset.qualified_name.clone();
        let mut builder = MutationResponse::builder();
        builder.created(asset);
        assert_eq!(builder.build().assigned_guid(&qn), guid);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::json!({
            "createdAssets": [],
            "updatedAssets": [],
        });
        let response: MutationResponse = serde_json::from_value(json).unwrap();
        assert!(response.is_empty());
        let back = serde_json::to_value(&response).unwrap();
        assert!(back.get("deletedAssets").is_some());
    }
}
