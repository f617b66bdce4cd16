//! Custom assertion helpers for mutation responses and assets.

use std::collections::HashSet;

use quarry_core::{Asset, AssetStatus, DeleteHandler, MutationResponse};

/// Asserts the sizes of the three collections of a response.
///
/// # Panics
///
/// Panics if any size differs or the collections overlap.
pub fn assert_partition(
    response: &MutationResponse,
    created: usize,
    updated: usize,
    deleted: usize,
) {
    assert_eq!(
        (
            response.created_assets().len(),
            response.updated_assets().len(),
            response.deleted_assets().len()
        ),
        (created, updated, deleted),
        "expected (created, updated, deleted) = ({created}, {updated}, {deleted}), got {response:#?}"
    );
    assert_disjoint(response);
}

/// Asserts that no guid appears twice across the three collections.
///
/// # Panics
///
/// Panics on the first repeated guid.
pub fn assert_disjoint(response: &MutationResponse) {
    let mut seen = HashSet::new();
    for asset in response
        .created_assets()
        .iter()
        .chain(response.updated_assets())
        .chain(response.deleted_assets())
    {
        let guid = asset.guid.expect("response assets carry guids");
        assert!(seen.insert(guid), "guid {guid} appears more than once");
    }
}

/// Asserts that every deleted asset carries `handler`.
///
/// # Panics
///
/// Panics if nothing was deleted or a handler differs.
pub fn assert_deleted_with(response: &MutationResponse, handler: DeleteHandler) {
    assert!(
        !response.deleted_assets().is_empty(),
        "expected deleted assets"
    );
    for asset in response.deleted_assets() {
        assert_eq!(
            asset.delete_handler,
            Some(handler),
            "asset {} deleted with {:?}",
            asset.qualified_name,
            asset.delete_handler
        );
    }
}

/// Asserts the status of an asset.
///
/// # Panics
///
/// Panics if the status differs.
pub fn assert_status(asset: &Asset, status: AssetStatus) {
    assert_eq!(
        asset.status, status,
        "asset {} has status {}",
        asset.qualified_name, asset.status
    );
}

/// Asserts that two reads describe the same asset identity.
///
/// # Panics
///
/// Panics if guid, qualified name, name or type differ.
pub fn assert_same_identity(left: &Asset, right: &Asset) {
    assert_eq!(left.guid, right.guid, "guid changed");
    assert_eq!(
        left.qualified_name, right.qualified_name,
        "qualified name changed"
    );
    assert_eq!(left.name, right.name, "name changed");
    assert_eq!(left.type_name(), right.type_name(), "type changed");
}
