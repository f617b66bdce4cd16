//! Audit trail entries and audit search.
//!
//! Each lifecycle transition leaves one [`AuditEntry`]. The audit index is
//! eventually consistent in the same way as the asset index, so callers wait
//! for an expected entry count before asserting on the trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{Guid, QualifiedName};

/// Default number of audit entries returned.
pub const DEFAULT_AUDIT_PAGE_SIZE: usize = 25;

/// Kind of change recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// The asset was created.
    EntityCreate,
    /// The asset was updated (directly or as a relationship counterpart).
    EntityUpdate,
    /// The asset was soft-deleted.
    EntityDelete,
    /// The asset was restored.
    EntityRestore,
    /// The asset was purged.
    EntityPurge,
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Guid of the affected asset.
    pub guid: Guid,
    /// Type name of the affected asset.
    pub type_name: String,
    /// Qualified name of the affected asset.
    pub qualified_name: QualifiedName,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub user: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// Query over the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSearchRequest {
    /// Restrict to one asset by guid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    /// Restrict to one asset by qualified name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<QualifiedName>,
    /// Restrict to these actions (all when empty).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AuditAction>,
    /// Maximum number of entries returned, newest first.
    #[serde(default = "default_audit_page_size")]
    pub size: usize,
}

fn default_audit_page_size() -> usize {
    DEFAULT_AUDIT_PAGE_SIZE
}

impl AuditSearchRequest {
    /// Audit trail of one asset.
    #[must_use]
    pub fn for_guid(guid: Guid) -> Self {
        Self {
            guid: Some(guid),
            qualified_name: None,
            actions: Vec::new(),
            size: DEFAULT_AUDIT_PAGE_SIZE,
        }
    }

    /// Audit trail of one asset by qualified name (survives purge and re-create).
    #[must_use]
    pub fn for_qualified_name(qualified_name: QualifiedName) -> Self {
        Self {
            guid: None,
            qualified_name: Some(qualified_name),
            actions: Vec::new(),
            size: DEFAULT_AUDIT_PAGE_SIZE,
        }
    }

    /// Restricts to one action.
    #[must_use]
    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Returns true if `entry` satisfies the request.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.guid.is_none_or(|g| g == entry.guid)
            && self
                .qualified_name
                .as_ref()
                .is_none_or(|qn| qn == &entry.qualified_name)
            && (self.actions.is_empty() || self.actions.contains(&entry.action))
    }
}

/// Result of an audit search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSearchResponse {
    /// Number of matching entries in the audit index.
    pub total_count: u64,
    /// Matching entries, newest first.
    #[serde(default)]
    pub entries: Vec<AuditEntry>,
}

impl AuditSearchResponse {
    /// Number of returned entries with the given action.
    #[must_use]
    pub fn count_of(&self, action: AuditAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(guid: Guid, action: AuditAction) -> AuditEntry {
        AuditEntry {
            guid,
            type_name: "Table".into(),
            qualified_name: QualifiedName::new("default/pg/p/d/s/t").unwrap(),
            action,
            user: "tester".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn matches_guid_and_actions() {
        let guid = Guid::generate();
        let request = AuditSearchRequest::for_guid(guid).with_action(AuditAction::EntityDelete);
        assert!(request.matches(&entry(guid, AuditAction::EntityDelete)));
        assert!(!request.matches(&entry(guid, AuditAction::EntityCreate)));
        assert!(!request.matches(&entry(Guid::generate(), AuditAction::EntityDelete)));
    }

    #[test]
    fn actions_serialize_screaming() {
        let json = serde_json::to_value(AuditAction::EntityPurge).unwrap();
        assert_eq!(json, "ENTITY_PURGE");
    }
}
