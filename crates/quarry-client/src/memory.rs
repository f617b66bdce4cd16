//! In-memory catalog with a lagging search index.
//!
//! [`MemoryCatalog`] keeps an authoritative store (read by `get_*`) and a
//! separate search/audit index that trails it. Every mutation queues its
//! index effects; they become visible once `index_lag` further index reads
//! (searches or audit searches) have happened. [`MemoryCatalog::refresh`]
//! publishes everything at once.
//!
//! Thread-safe via `RwLock`; the lock is never held across an await.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quarry_core::config::DEFAULT_MAX_BATCH_SIZE;
use quarry_core::{
    Asset, AssetRef, AssetStatus, AuditAction, AuditEntry, AuditSearchRequest,
    AuditSearchResponse, ClientConfig, DeleteHandler, Error, Guid, MutationResponse,
    QualifiedName, Result, SearchRequest, SearchResponse,
};

use crate::backend::{CatalogBackend, UpdateRequest};
use crate::lifecycle::{DeleteOutcome, LifecycleState};

/// Default number of index reads a change stays invisible for.
pub const DEFAULT_INDEX_LAG: u32 = 1;

/// User recorded on audit entries by default.
pub const DEFAULT_AUDIT_USER: &str = "quarry";

type NameKey = (String, QualifiedName);

fn name_key(type_name: &str, qualified_name: &QualifiedName) -> NameKey {
    (type_name.to_string(), qualified_name.clone())
}

struct Described<'a>(&'a str, &'a QualifiedName);

impl fmt::Display for Described<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}

#[derive(Debug, Clone)]
struct Settings {
    max_batch_size: usize,
    index_lag: u32,
    user: String,
}

impl Settings {
    fn check_batch(&self, len: usize) -> Result<()> {
        if len > self.max_batch_size {
            return Err(Error::invalid_request(format!(
                "batch of {len} items exceeds the limit of {}",
                self.max_batch_size
            )));
        }
        Ok(())
    }
}

/// In-memory catalog for tests and local simulation.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
    settings: Settings,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Creates an empty catalog with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState::default())),
            settings: Settings {
                max_batch_size: DEFAULT_MAX_BATCH_SIZE,
                index_lag: DEFAULT_INDEX_LAG,
                user: DEFAULT_AUDIT_USER.to_string(),
            },
        }
    }

    /// Creates an empty catalog using the batch limit from `config`.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new().with_max_batch_size(config.max_batch_size)
    }

    /// Sets how many index reads a change stays invisible for.
    #[must_use]
    pub fn with_index_lag(mut self, index_lag: u32) -> Self {
        self.settings.index_lag = index_lag;
        self
    }

    /// Sets the batch limit.
    #[must_use]
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.settings.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Sets the user recorded on audit entries.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.settings.user = user.into();
        self
    }

    /// Configured index lag.
    #[must_use]
    pub fn index_lag(&self) -> u32 {
        self.settings.index_lag
    }

    /// Publishes every queued index change immediately.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the lock is poisoned.
    pub fn refresh(&self) -> Result<()> {
        self.write()?.index.publish_all();
        Ok(())
    }

    /// Number of index changes not yet visible to search.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the lock is poisoned.
    pub fn pending_index_changes(&self) -> Result<usize> {
        Ok(self.read()?.index.pending.len())
    }

    /// Number of stored (active or soft-deleted) assets.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the lock is poisoned.
    pub fn stored_len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>> {
        self.state.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>> {
        self.state.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl CatalogBackend for MemoryCatalog {
    async fn create(&self, assets: Vec<Asset>) -> Result<MutationResponse> {
        self.write()?.create(&self.settings, assets)
    }

    async fn update(&self, updates: Vec<UpdateRequest>) -> Result<MutationResponse> {
        self.write()?.update(&self.settings, updates)
    }

    async fn delete(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.write()?.delete(&self.settings, guids)
    }

    async fn purge(&self, guids: &[Guid]) -> Result<MutationResponse> {
        self.write()?.purge(&self.settings, guids)
    }

    async fn restore(&self, type_name: &str, qualified_name: &QualifiedName) -> Result<bool> {
        Ok(self
            .write()?
            .restore(&self.settings, type_name, qualified_name))
    }

    async fn get_by_guid(&self, guid: Guid, complete: bool) -> Result<Asset> {
        let state = self.read()?;
        let asset = state
            .records
            .get(&guid)
            .ok_or_else(|| Error::not_found("Asset", guid))?;
        Ok(view(asset, complete))
    }

    async fn get_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &QualifiedName,
        complete: bool,
    ) -> Result<Asset> {
        let state = self.read()?;
        let asset = state
            .names
            .get(&name_key(type_name, qualified_name))
            .and_then(|guid| state.records.get(guid))
            .ok_or_else(|| Error::not_found(type_name, qualified_name))?;
        Ok(view(asset, complete))
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut state = self.write()?;
        state.index.advance();
        Ok(request.execute(state.index.documents.values()))
    }

    async fn audit_search(&self, request: &AuditSearchRequest) -> Result<AuditSearchResponse> {
        let mut state = self.write()?;
        state.index.advance();
        let matching: Vec<&AuditEntry> = state
            .index
            .audit
            .iter()
            .rev()
            .filter(|e| request.matches(e))
            .collect();
        Ok(AuditSearchResponse {
            total_count: matching.len() as u64,
            entries: matching.into_iter().take(request.size).cloned().collect(),
        })
    }
}

fn view(asset: &Asset, complete: bool) -> Asset {
    if complete {
        asset.clone()
    } else {
        asset.project(&[])
    }
}

#[derive(Debug)]
enum IndexOp {
    Upsert(Box<Asset>),
    Remove(Guid),
    Audit(AuditEntry),
}

#[derive(Debug)]
struct PendingOp {
    visible_at: u64,
    op: IndexOp,
}

/// The eventually consistent side: documents and audit entries, plus the
/// queue of changes not yet published.
#[derive(Debug, Default)]
struct SearchIndex {
    reads: u64,
    documents: BTreeMap<Guid, Asset>,
    audit: Vec<AuditEntry>,
    pending: VecDeque<PendingOp>,
}

impl SearchIndex {
    fn enqueue(&mut self, op: IndexOp, lag: u32) {
        self.pending.push_back(PendingOp {
            visible_at: self.reads + u64::from(lag) + 1,
            op,
        });
    }

    /// Counts one index read and publishes whatever became due.
    fn advance(&mut self) {
        self.reads += 1;
        while self
            .pending
            .front()
            .is_some_and(|p| p.visible_at <= self.reads)
        {
            if let Some(pending) = self.pending.pop_front() {
                self.apply(pending.op);
            }
        }
    }

    fn publish_all(&mut self) {
        while let Some(pending) = self.pending.pop_front() {
            self.apply(pending.op);
        }
    }

    fn apply(&mut self, op: IndexOp) {
        match op {
            IndexOp::Upsert(asset) => {
                if let Some(guid) = asset.guid {
                    self.documents.insert(guid, *asset);
                }
            }
            IndexOp::Remove(guid) => {
                self.documents.remove(&guid);
            }
            IndexOp::Audit(entry) => self.audit.push(entry),
        }
    }
}

/// Guids touched by one call, in first-touch order.
#[derive(Debug, Default)]
struct ChangeSet {
    created: Vec<Guid>,
    created_set: HashSet<Guid>,
    touched: Vec<Guid>,
    touched_set: HashSet<Guid>,
}

impl ChangeSet {
    fn record_created(&mut self, guid: Guid) {
        if self.created_set.insert(guid) {
            self.created.push(guid);
        }
    }

    /// Returns true the first time an asset not created by this call is touched.
    fn touch(&mut self, guid: Guid) -> bool {
        if self.created_set.contains(&guid) {
            return false;
        }
        if self.touched_set.insert(guid) {
            self.touched.push(guid);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    records: HashMap<Guid, Asset>,
    names: HashMap<NameKey, Guid>,
    purged: HashSet<Guid>,
    index: SearchIndex,
}

impl CatalogState {
    fn lifecycle_by_name(&self, key: &NameKey) -> LifecycleState {
        self.names
            .get(key)
            .and_then(|guid| self.records.get(guid))
            .map_or(LifecycleState::Nonexistent, |a| {
                LifecycleState::from_status(a.status)
            })
    }

    fn lifecycle_by_guid(&self, guid: Guid) -> LifecycleState {
        if self.purged.contains(&guid) {
            return LifecycleState::Purged;
        }
        self.records
            .get(&guid)
            .map_or(LifecycleState::Nonexistent, |a| {
                LifecycleState::from_status(a.status)
            })
    }

    /// Resolves a reference against the store and, for creates, the batch
    /// being created.
    fn resolve(&self, reference: &AssetRef, batch: &HashMap<NameKey, Guid>) -> Result<Guid> {
        if let Some(guid) = reference.guid {
            let target = self
                .records
                .get(&guid)
                .ok_or_else(|| Error::not_found(reference.type_name.as_str(), guid))?;
            if target.type_name() != reference.type_name {
                return Err(Error::invalid_request(format!(
                    "reference to {guid} expects {} but the asset is a {}",
                    reference.type_name,
                    target.type_name()
                )));
            }
            return Ok(guid);
        }
        let key = name_key(&reference.type_name, &reference.qualified_name);
        batch
            .get(&key)
            .or_else(|| self.names.get(&key))
            .copied()
            .ok_or_else(|| {
                Error::not_found(reference.type_name.as_str(), &reference.qualified_name)
            })
    }

    fn touch(&mut self, guid: Guid, now: DateTime<Utc>, changes: &mut ChangeSet) {
        if changes.touch(guid) {
            if let Some(asset) = self.records.get_mut(&guid) {
                asset.version += 1;
                asset.updated_at = Some(now);
            }
        }
    }

    fn reindex(
        &mut self,
        settings: &Settings,
        guid: Guid,
        action: AuditAction,
        now: DateTime<Utc>,
    ) {
        let Some(asset) = self.records.get(&guid) else {
            return;
        };
        let entry = AuditEntry {
            guid,
            type_name: asset.type_name().to_string(),
            qualified_name: asset.qualified_name.clone(),
            action,
            user: settings.user.clone(),
            timestamp: now,
        };
        let document = Box::new(asset.clone());
        self.index
            .enqueue(IndexOp::Upsert(document), settings.index_lag);
        self.index.enqueue(IndexOp::Audit(entry), settings.index_lag);
    }

    fn finish(
        &mut self,
        settings: &Settings,
        changes: &ChangeSet,
        now: DateTime<Utc>,
    ) -> MutationResponse {
        let mut builder = MutationResponse::builder();
        for guid in &changes.created {
            if let Some(asset) = self.records.get(guid) {
                builder.created(asset.clone());
            }
        }
        for guid in &changes.touched {
            if let Some(asset) = self.records.get(guid) {
                builder.updated(asset.clone());
            }
        }
        for guid in &changes.created {
            self.reindex(settings, *guid, AuditAction::EntityCreate, now);
        }
        for guid in &changes.touched {
            self.reindex(settings, *guid, AuditAction::EntityUpdate, now);
        }
        builder.build()
    }

    fn create(&mut self, settings: &Settings, mut assets: Vec<Asset>) -> Result<MutationResponse> {
        settings.check_batch(assets.len())?;

        let mut batch: HashMap<NameKey, Guid> = HashMap::with_capacity(assets.len());
        for asset in &assets {
            validate_definition(asset)?;
            let what = Described(asset.type_name(), &asset.qualified_name);
            let key = name_key(asset.type_name(), &asset.qualified_name);
            self.lifecycle_by_name(&key).create(&what)?;
            if batch.contains_key(&key) {
                return Err(Error::invalid_request(format!(
                    "{what} appears more than once in the batch"
                )));
            }
            batch.insert(key, Guid::generate());
        }

        for asset in &mut assets {
            let key = name_key(asset.type_name(), &asset.qualified_name);
            let guid = *batch.get(&key).ok_or_else(|| Error::Internal {
                message: format!("no guid reserved for {}", asset.qualified_name),
            })?;
            asset.guid = Some(guid);
            if let Some(parent) = asset.parent.as_mut() {
                parent.guid = Some(self.resolve(parent, &batch)?);
            }
            for related in &mut asset.related {
                let target = self.resolve(related, &batch)?;
                if target == guid {
                    return Err(Error::invalid_request(format!(
                        "{} cannot be related to itself",
                        asset.qualified_name
                    )));
                }
                related.guid = Some(target);
            }
        }

        // Validation is complete; nothing below can fail.
        let now = Utc::now();
        let mut changes = ChangeSet::default();
        for mut asset in assets {
            let Some(guid) = asset.guid else { continue };
            asset.status = AssetStatus::Active;
            asset.delete_handler = None;
            asset.created_at = Some(now);
            asset.updated_at = Some(now);
            asset.version = 1;
            self.names
                .insert(name_key(asset.type_name(), &asset.qualified_name), guid);
            self.records.insert(guid, asset);
            changes.record_created(guid);
        }

        for guid in changes.created.clone() {
            let Some(asset) = self.records.get(&guid) else {
                continue;
            };
            let this = asset.to_ref();
            let parent = asset.parent.as_ref().and_then(|p| p.guid);
            let related: Vec<Guid> = asset.related.iter().filter_map(|r| r.guid).collect();

            if let Some(parent) = parent {
                self.touch(parent, now, &mut changes);
            }
            for target in related {
                if let Some(counterpart) = self.records.get_mut(&target) {
                    counterpart.add_related(this.clone());
                }
                self.touch(target, now, &mut changes);
            }
        }

        Ok(self.finish(settings, &changes, now))
    }

    fn update(
        &mut self,
        settings: &Settings,
        updates: Vec<UpdateRequest>,
    ) -> Result<MutationResponse> {
        settings.check_batch(updates.len())?;

        let no_batch = HashMap::new();
        let mut resolved = Vec::with_capacity(updates.len());
        for request in updates {
            let key = name_key(&request.type_name, &request.qualified_name);
            let what = Described(&request.type_name, &request.qualified_name);
            self.lifecycle_by_name(&key)
                .update(&request.type_name, &what)?;
            let guid = *self
                .names
                .get(&key)
                .ok_or_else(|| {
                    Error::not_found(request.type_name.as_str(), &request.qualified_name)
                })?;

            let mut add = Vec::with_capacity(request.update.add_related.len());
            for target in &request.update.add_related {
                let target_guid = self.resolve(target, &no_batch)?;
                if target_guid == guid {
                    return Err(Error::invalid_request(format!(
                        "{what} cannot be related to itself"
                    )));
                }
                add.push(target.clone().with_guid(target_guid));
            }
            let mut remove = Vec::with_capacity(request.update.remove_related.len());
            for target in &request.update.remove_related {
                let target_guid = self.resolve(target, &no_batch)?;
                remove.push(target.clone().with_guid(target_guid));
            }
            resolved.push((guid, request.update, add, remove));
        }

        let now = Utc::now();
        let mut changes = ChangeSet::default();
        for (guid, update, add, remove) in resolved {
            self.touch(guid, now, &mut changes);
            let Some(asset) = self.records.get_mut(&guid) else {
                continue;
            };
            asset.apply_fields(&update);
            let this = asset.to_ref();

            let mut counterparts = Vec::new();
            for target in add {
                let target_guid = target.guid;
                if asset.add_related(target) {
                    counterparts.extend(target_guid.map(|g| (g, true)));
                }
            }
            for target in remove {
                let target_guid = target.guid;
                if asset.remove_related(&target) {
                    counterparts.extend(target_guid.map(|g| (g, false)));
                }
            }

            for (target, added) in counterparts {
                if let Some(counterpart) = self.records.get_mut(&target) {
                    if added {
                        counterpart.add_related(this.clone());
                    } else {
                        counterpart.remove_related(&this);
                    }
                }
                self.touch(target, now, &mut changes);
            }
        }

        Ok(self.finish(settings, &changes, now))
    }

    fn delete(&mut self, settings: &Settings, guids: &[Guid]) -> Result<MutationResponse> {
        settings.check_batch(guids.len())?;
        let guids = dedup(guids);

        let mut transitions = Vec::with_capacity(guids.len());
        for guid in guids {
            let (next, outcome) = self.lifecycle_by_guid(guid).delete("Asset", &guid)?;
            transitions.push((guid, next, outcome));
        }

        let now = Utc::now();
        let mut builder = MutationResponse::builder();
        for (guid, next, outcome) in transitions {
            if outcome == DeleteOutcome::AlreadyDeleted {
                continue;
            }
            let (Some(asset), Some(status)) = (self.records.get_mut(&guid), next.status()) else {
                continue;
            };
            asset.status = status;
            asset.delete_handler = Some(DeleteHandler::Soft);
            asset.version += 1;
            asset.updated_at = Some(now);
            builder.deleted(asset.clone());
            self.reindex(settings, guid, AuditAction::EntityDelete, now);
        }
        Ok(builder.build())
    }

    fn purge(&mut self, settings: &Settings, guids: &[Guid]) -> Result<MutationResponse> {
        settings.check_batch(guids.len())?;
        let guids = dedup(guids);

        for guid in &guids {
            self.lifecycle_by_guid(*guid).purge("Asset", guid)?;
        }
        if let Some(child) = self.records.values().find(|a| {
            a.guid.is_some_and(|g| !guids.contains(&g))
                && a.parent
                    .as_ref()
                    .and_then(|p| p.guid)
                    .is_some_and(|p| guids.contains(&p))
        }) {
            return Err(Error::conflict(format!(
                "{} {} still belongs to a purged container; purge it first",
                child.type_name(),
                child.qualified_name
            )));
        }

        let now = Utc::now();
        let mut builder = MutationResponse::builder();
        for guid in guids {
            let Some(mut asset) = self.records.remove(&guid) else {
                continue;
            };
            self.names
                .remove(&name_key(asset.type_name(), &asset.qualified_name));
            self.purged.insert(guid);

            let this = asset.to_ref();
            for target in asset.related.iter().filter_map(|r| r.guid) {
                if let Some(counterpart) = self.records.get_mut(&target) {
                    if counterpart.remove_related(&this) {
                        let document = Box::new(counterpart.clone());
                        self.index
                            .enqueue(IndexOp::Upsert(document), settings.index_lag);
                    }
                }
            }

            asset.delete_handler = Some(DeleteHandler::Purge);
            asset.updated_at = Some(now);
            self.index
                .enqueue(IndexOp::Remove(guid), settings.index_lag);
            self.index.enqueue(
                IndexOp::Audit(AuditEntry {
                    guid,
                    type_name: asset.type_name().to_string(),
                    qualified_name: asset.qualified_name.clone(),
                    action: AuditAction::EntityPurge,
                    user: settings.user.clone(),
                    timestamp: now,
                }),
                settings.index_lag,
            );
            builder.deleted(asset);
        }
        Ok(builder.build())
    }

    fn restore(
        &mut self,
        settings: &Settings,
        type_name: &str,
        qualified_name: &QualifiedName,
    ) -> bool {
        let key = name_key(type_name, qualified_name);
        let Some(guid) = self.names.get(&key).copied() else {
            return false;
        };
        let (next, restored) = self.lifecycle_by_guid(guid).restore();
        let Some(status) = next.status().filter(|_| restored) else {
            return false;
        };
        let now = Utc::now();
        if let Some(asset) = self.records.get_mut(&guid) {
            asset.status = status;
            asset.delete_handler = None;
            asset.version += 1;
            asset.updated_at = Some(now);
        }
        self.reindex(settings, guid, AuditAction::EntityRestore, now);
        true
    }
}

fn validate_definition(asset: &Asset) -> Result<()> {
    if asset.name.trim().is_empty() {
        return Err(Error::invalid_request(format!(
            "{} {} has an empty name",
            asset.type_name(),
            asset.qualified_name
        )));
    }
    if asset.guid.is_some() {
        return Err(Error::invalid_request(format!(
            "{} already carries a guid; guids are assigned on create",
            asset.qualified_name
        )));
    }
    let allowed = asset.kind.parent_type_names();
    match &asset.parent {
        None if !allowed.is_empty() => Err(Error::invalid_request(format!(
            "{} {} needs a parent of type {allowed:?}",
            asset.type_name(),
            asset.qualified_name
        ))),
        Some(_) if allowed.is_empty() => Err(Error::invalid_request(format!(
            "{} assets cannot have a parent",
            asset.type_name()
        ))),
        Some(parent) if !allowed.contains(&parent.type_name.as_str()) => {
            Err(Error::invalid_request(format!(
                "{} cannot be created under {}",
                asset.type_name(),
                parent.type_name
            )))
        }
        Some(parent) if !asset.qualified_name.is_within(parent.qualified_name.as_str()) => {
            Err(Error::invalid_request(format!(
                "{} is not scoped under its parent {}",
                asset.qualified_name, parent.qualified_name
            )))
        }
        _ => Ok(()),
    }
}

fn dedup(guids: &[Guid]) -> Vec<Guid> {
    let mut seen = HashSet::with_capacity(guids.len());
    guids.iter().copied().filter(|g| seen.insert(*g)).collect()
}
