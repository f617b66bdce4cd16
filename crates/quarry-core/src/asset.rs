//! Asset data model for the Quarry catalog client.
//!
//! Every catalog entity shares one envelope ([`Asset`]): guid, qualified
//! name, name, status, relationships and governance fields. What differs per
//! type lives in the tagged [`AssetKind`] payload, serialized inline with a
//! `typeName` discriminator.
//!
//! # Qualified Names
//!
//! Qualified names are derived, never chosen:
//! - connections: `default/{connector}/{name}`
//! - glossaries: `glossary/{name}`
//! - everything else: `{parent qualified name}/{name}`
//!
//! # Example
//!
//! ```rust
//! use quarry_core::asset::{Asset, AssetKind};
//!
//! let connection = Asset::connection("prod", "postgres").unwrap();
//! let database = Asset::child(AssetKind::Database, "sales", &connection.to_ref()).unwrap();
//! assert_eq!(database.qualified_name.as_str(), "default/postgres/prod/sales");
//! assert_eq!(database.parent.as_ref().unwrap().type_name, "Connection");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{Guid, QualifiedName};

/// Attribute name selecting the parent reference in projections.
pub const ATTR_PARENT: &str = "parent";
/// Attribute name selecting peer relationships in projections.
pub const ATTR_RELATED: &str = "related";
/// Attribute name selecting the certificate in projections.
pub const ATTR_CERTIFICATE: &str = "certificate";
/// Attribute name selecting the announcement in projections.
pub const ATTR_ANNOUNCEMENT: &str = "announcement";
/// Attribute name selecting custom attributes in projections.
pub const ATTR_CUSTOM_ATTRIBUTES: &str = "customAttributes";

/// Lifecycle status visible on an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    /// The asset is live.
    #[default]
    Active,
    /// The asset was soft-deleted and can be restored.
    Deleted,
}

impl AssetStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an asset was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteHandler {
    /// Soft delete: status flips to `DELETED`, recoverable.
    Soft,
    /// Hard delete: removed from the store but kept in history.
    Hard,
    /// Purge: permanently removed.
    Purge,
}

impl DeleteHandler {
    /// Returns the wire name of the handler.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Soft => "SOFT",
            Self::Hard => "HARD",
            Self::Purge => "PURGE",
        }
    }
}

impl fmt::Display for DeleteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific payload of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typeName")]
pub enum AssetKind {
    /// A connection to an external system; the root of a scope.
    Connection {
        /// Connector type (e.g. `snowflake`, `postgres`).
        connector: String,
    },
    /// A database within a connection.
    Database,
    /// A schema within a database.
    Schema,
    /// A table within a schema.
    #[serde(rename_all = "camelCase")]
    Table {
        /// Row count, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        row_count: Option<u64>,
    },
    /// A view within a schema.
    View {
        /// View definition SQL, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        definition: Option<String>,
    },
    /// A column within a table or view.
    #[serde(rename_all = "camelCase")]
    Column {
        /// Column data type.
        data_type: String,
        /// Ordinal position within the parent.
        order: u32,
    },
    /// A business glossary; the root of a glossary scope.
    Glossary,
    /// A term within a glossary.
    GlossaryTerm,
}

impl AssetKind {
    /// Returns the type name used as discriminator on the wire.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Connection",
            Self::Database => "Database",
            Self::Schema => "Schema",
            Self::Table { .. } => "Table",
            Self::View { .. } => "View",
            Self::Column { .. } => "Column",
            Self::Glossary => "Glossary",
            Self::GlossaryTerm => "GlossaryTerm",
        }
    }

    /// Returns the type names an asset of this kind may be parented by.
    ///
    /// Empty for root kinds (connections and glossaries).
    #[must_use]
    pub const fn parent_type_names(&self) -> &'static [&'static str] {
        match self {
            Self::Connection { .. } | Self::Glossary => &[],
            Self::Database => &["Connection"],
            Self::Schema => &["Database"],
            Self::Table { .. } | Self::View { .. } => &["Schema"],
            Self::Column { .. } => &["Table", "View"],
            Self::GlossaryTerm => &["Glossary"],
        }
    }

    /// Returns true if this kind must be created under a parent.
    #[must_use]
    pub const fn requires_parent(&self) -> bool {
        !self.parent_type_names().is_empty()
    }
}

/// A reference from one asset to another.
///
/// References always carry the type and qualified name; the guid is present
/// once the target has been created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    /// Guid of the target, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    /// Type name of the target.
    pub type_name: String,
    /// Qualified name of the target.
    pub qualified_name: QualifiedName,
}

impl AssetRef {
    /// Creates a reference by type and qualified name.
    #[must_use]
    pub fn new(type_name: impl Into<String>, qualified_name: QualifiedName) -> Self {
        Self {
            guid: None,
            type_name: type_name.into(),
            qualified_name,
        }
    }

    /// Attaches a guid to the reference.
    #[must_use]
    pub fn with_guid(mut self, guid: Guid) -> Self {
        self.guid = Some(guid);
        self
    }

    /// Returns true if this reference points at `asset`.
    ///
    /// Guids win when both sides have one; otherwise type and qualified name
    /// must match.
    #[must_use]
    pub fn points_to(&self, asset: &Asset) -> bool {
        match (self.guid, asset.guid) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.type_name == asset.type_name() && self.qualified_name == asset.qualified_name
            }
        }
    }

    /// Returns true if both references identify the same asset.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        match (self.guid, other.guid) {
            (Some(a), Some(b)) => a == b,
            _ => self.type_name == other.type_name && self.qualified_name == other.qualified_name,
        }
    }
}

/// Certification state of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    /// Certified as trustworthy.
    Verified,
    /// Work in progress.
    Draft,
    /// No longer recommended.
    Deprecated,
}

impl CertificateStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::Draft => "DRAFT",
            Self::Deprecated => "DEPRECATED",
        }
    }
}

/// Certificate attached to an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Certification state.
    pub status: CertificateStatus,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Severity of an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementType {
    /// Informational notice.
    Information,
    /// Warning.
    Warning,
    /// Known issue.
    Issue,
}

/// Announcement attached to an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Severity.
    pub announcement_type: AnnouncementType,
    /// Short title.
    pub title: String,
    /// Optional body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Server-assigned identifier; `None` on a definition not yet created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    /// Scope-qualified unique name.
    pub qualified_name: QualifiedName,
    /// Human label, not necessarily unique.
    pub name: String,
    /// Variant payload, serialized inline with its `typeName`.
    #[serde(flatten)]
    pub kind: AssetKind,
    /// Lifecycle status.
    #[serde(default)]
    pub status: AssetStatus,
    /// Containing asset, for kinds that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<AssetRef>,
    /// Peer relationships.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<AssetRef>,
    /// Certificate, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    /// Announcement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<Announcement>,
    /// Free-form custom attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_attributes: BTreeMap<String, serde_json::Value>,
    /// How the asset was removed, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_handler: Option<DeleteHandler>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Modification counter, starting at 1 on creation.
    #[serde(default)]
    pub version: u64,
}

impl Asset {
    fn definition(kind: AssetKind, name: String, qualified_name: QualifiedName) -> Self {
        Self {
            guid: None,
            qualified_name,
            name,
            kind,
            status: AssetStatus::Active,
            parent: None,
            related: Vec::new(),
            certificate: None,
            announcement: None,
            custom_attributes: BTreeMap::new(),
            delete_handler: None,
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }

    /// Defines a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or connector is empty or contains `/`.
    pub fn connection(name: impl Into<String>, connector: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let connector = connector.into();
        let qualified_name = QualifiedName::from_segments(["default", &connector, &name])?;
        Ok(Self::definition(
            AssetKind::Connection { connector },
            name,
            qualified_name,
        ))
    }

    /// Defines a new glossary.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains `/`.
    pub fn glossary(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let qualified_name = QualifiedName::from_segments(["glossary", &name])?;
        Ok(Self::definition(AssetKind::Glossary, name, qualified_name))
    }

    /// Defines a new asset scoped under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is a root kind, if `parent` has a type
    /// that cannot contain `kind`, or if the name is invalid.
    pub fn child(kind: AssetKind, name: impl Into<String>, parent: &AssetRef) -> Result<Self> {
        let name = name.into();
        let allowed = kind.parent_type_names();
        if allowed.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} assets cannot have a parent",
                kind.type_name()
            )));
        }
        if !allowed.contains(&parent.type_name.as_str()) {
            return Err(Error::InvalidInput(format!(
                "{} cannot be created under {} (expected one of {allowed:?})",
                kind.type_name(),
                parent.type_name
            )));
        }
        let qualified_name = parent.qualified_name.child(&name)?;
        let mut asset = Self::definition(kind, name, qualified_name);
        asset.parent = Some(parent.clone());
        Ok(asset)
    }

    /// Adds a peer relationship to the definition.
    #[must_use]
    pub fn with_related(mut self, target: AssetRef) -> Self {
        self.add_related(target);
        self
    }

    /// Sets the certificate on the definition.
    #[must_use]
    pub fn with_certificate(mut self, status: CertificateStatus, message: Option<&str>) -> Self {
        self.certificate = Some(Certificate {
            status,
            message: message.map(str::to_string),
        });
        self
    }

    /// Sets a custom attribute on the definition.
    #[must_use]
    pub fn with_custom_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the type name of this asset.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Returns true if the asset is `ACTIVE`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AssetStatus::Active
    }

    /// Returns a reference to this asset.
    #[must_use]
    pub fn to_ref(&self) -> AssetRef {
        AssetRef {
            guid: self.guid,
            type_name: self.type_name().to_string(),
            qualified_name: self.qualified_name.clone(),
        }
    }

    /// Adds a peer relationship. Returns false if it was already present.
    pub fn add_related(&mut self, target: AssetRef) -> bool {
        if self.related.iter().any(|r| r.same_target(&target)) {
            return false;
        }
        self.related.push(target);
        true
    }

    /// Removes a peer relationship. Returns false if it was not present.
    pub fn remove_related(&mut self, target: &AssetRef) -> bool {
        let before = self.related.len();
        self.related.retain(|r| !r.same_target(target));
        self.related.len() != before
    }

    /// Applies the scalar fields of an update (certificate, announcement,
    /// custom attributes). Relationship changes are left to the caller since
    /// they touch counterparts.
    pub fn apply_fields(&mut self, update: &AssetUpdate) {
        update.certificate.clone().apply(&mut self.certificate);
        update.announcement.clone().apply(&mut self.announcement);
        for (key, value) in &update.custom_attributes {
            if value.is_null() {
                self.custom_attributes.remove(key);
            } else {
                self.custom_attributes.insert(key.clone(), value.clone());
            }
        }
    }

    /// Returns a projection of this asset.
    ///
    /// Identity, type payload, status and timestamps are always kept; the
    /// relationship and governance fields only when named in `attributes`.
    #[must_use]
    pub fn project(&self, attributes: &[String]) -> Self {
        let wants = |name: &str| attributes.iter().any(|a| a == name);
        let mut projected = self.clone();
        if !wants(ATTR_PARENT) {
            projected.parent = None;
        }
        if !wants(ATTR_RELATED) {
            projected.related.clear();
        }
        if !wants(ATTR_CERTIFICATE) {
            projected.certificate = None;
        }
        if !wants(ATTR_ANNOUNCEMENT) {
            projected.announcement = None;
        }
        if !wants(ATTR_CUSTOM_ATTRIBUTES) {
            projected.custom_attributes.clear();
        }
        projected
    }
}

/// A three-way change to an optional field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum Patch<T> {
    /// Leave the field unchanged.
    Keep,
    /// Replace the field.
    Set(T),
    /// Remove the field.
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> Patch<T> {
    /// Returns true if the patch leaves the field unchanged.
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Applies the patch to `target`.
    pub fn apply(self, target: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *target = Some(value),
            Self::Clear => *target = None,
        }
    }
}

/// Field set for updating an existing asset by qualified name.
///
/// A `null` custom attribute value removes that attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUpdate {
    /// Certificate change.
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub certificate: Patch<Certificate>,
    /// Announcement change.
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub announcement: Patch<Announcement>,
    /// Custom attributes to set (or remove, when `null`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_attributes: BTreeMap<String, serde_json::Value>,
    /// Peer relationships to establish.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_related: Vec<AssetRef>,
    /// Peer relationships to break.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_related: Vec<AssetRef>,
}

impl AssetUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the certificate.
    #[must_use]
    pub fn certificate(mut self, status: CertificateStatus, message: Option<&str>) -> Self {
        self.certificate = Patch::Set(Certificate {
            status,
            message: message.map(str::to_string),
        });
        self
    }

    /// Removes the certificate.
    #[must_use]
    pub fn clear_certificate(mut self) -> Self {
        self.certificate = Patch::Clear;
        self
    }

    /// Sets the announcement.
    #[must_use]
    pub fn announcement(
        mut self,
        announcement_type: AnnouncementType,
        title: impl Into<String>,
        message: Option<&str>,
    ) -> Self {
        self.announcement = Patch::Set(Announcement {
            announcement_type,
            title: title.into(),
            message: message.map(str::to_string),
        });
        self
    }

    /// Removes the announcement.
    #[must_use]
    pub fn clear_announcement(mut self) -> Self {
        self.announcement = Patch::Clear;
        self
    }

    /// Sets a custom attribute.
    #[must_use]
    pub fn custom_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Establishes a peer relationship.
    #[must_use]
    pub fn relate(mut self, target: AssetRef) -> Self {
        self.add_related.push(target);
        self
    }

    /// Breaks a peer relationship.
    #[must_use]
    pub fn unrelate(mut self, target: AssetRef) -> Self {
        self.remove_related.push(target);
        self
    }

    /// Returns true if the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificate.is_keep()
            && self.announcement.is_keep()
            && self.custom_attributes.is_empty()
            && self.add_related.is_empty()
            && self.remove_related.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_checks_parent_type() {
        let connection = Asset::connection("prod", "postgres").unwrap();
        let err = Asset::child(AssetKind::Schema, "public", &connection.to_ref()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn root_kinds_reject_parents() {
        let glossary = Asset::glossary("finance").unwrap();
        assert!(Asset::child(AssetKind::Glossary, "nested", &glossary.to_ref()).is_err());
    }

    #[test]
    fn column_accepts_table_or_view() {
        let schema = AssetRef::new(
            "Schema",
            QualifiedName::new("default/pg/prod/sales/public").unwrap(),
        );
        let view = Asset::child(AssetKind::View { definition: None }, "v_orders", &schema).unwrap();
        let column = Asset::child(
            AssetKind::Column {
                data_type: "int".into(),
                order: 1,
            },
            "id",
            &view.to_ref(),
        )
        .unwrap();
        assert_eq!(
            column.qualified_name.as_str(),
            "default/pg/prod/sales/public/v_orders/id"
        );
    }

    #[test]
    fn serializes_type_name_inline() {
        let asset = Asset::connection("prod", "postgres").unwrap();
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["typeName"], "Connection");
        assert_eq!(json["connector"], "postgres");
        assert_eq!(json["qualifiedName"], "default/postgres/prod");
        assert_eq!(json["status"], "ACTIVE");

        let back: Asset = serde_json::from_value(json).unwrap();
        assert_eq!(back, asset);
    }

    #[test]
    fn table_payload_uses_camel_case() {
        let schema = AssetRef::new("Schema", QualifiedName::new("default/pg/p/d/s").unwrap());
        let table = Asset::child(AssetKind::Table { row_count: Some(42) }, "t", &schema).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["rowCount"], 42);
    }

    #[test]
    fn related_is_deduplicated() {
        let target = AssetRef::new("Glossary", QualifiedName::new("glossary/g").unwrap());
        let mut asset = Asset::glossary("other").unwrap();
        assert!(asset.add_related(target.clone()));
        assert!(!asset.add_related(target.clone()));
        assert!(asset.remove_related(&target));
        assert!(asset.related.is_empty());
    }

    #[test]
    fn apply_fields_patches_and_removes_null_attributes() {
        let mut asset = Asset::glossary("g")
            .unwrap()
            .with_certificate(CertificateStatus::Draft, None)
            .with_custom_attribute("owner", "data-team")
            .with_custom_attribute("tier", 2);

        let update = AssetUpdate::new()
            .clear_certificate()
            .announcement(AnnouncementType::Warning, "migrating", None)
            .custom_attribute("tier", serde_json::Value::Null);
        asset.apply_fields(&update);

        assert!(asset.certificate.is_none());
        assert_eq!(asset.announcement.as_ref().unwrap().title, "migrating");
        assert!(!asset.custom_attributes.contains_key("tier"));
        assert_eq!(asset.custom_attributes["owner"], "data-team");
    }

    #[test]
    fn projection_strips_unrequested_fields() {
        let asset = Asset::glossary("g")
            .unwrap()
            .with_certificate(CertificateStatus::Verified, Some("ok"))
            .with_custom_attribute("owner", "x");

        let stub = asset.project(&[]);
        assert!(stub.certificate.is_none());
        assert!(stub.custom_attributes.is_empty());
        assert_eq!(stub.qualified_name, asset.qualified_name);

        let with_cert = asset.project(&[ATTR_CERTIFICATE.to_string()]);
        assert!(with_cert.certificate.is_some());
    }

    #[test]
    fn patch_serializes_with_op_tag() {
        let update = AssetUpdate::new().clear_certificate();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["certificate"]["op"], "clear");
        assert!(json.get("announcement").is_none());
    }
}
