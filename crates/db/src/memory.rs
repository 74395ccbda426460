//! In-memory ODA backend.
//!
//! Keeps every entity version and status row in process memory behind a
//! `tokio::sync::RwLock`. A unit of work stages its writes locally and merges
//! them into the shared store on commit; reads see committed state plus the
//! unit's own staged writes.
//!
//! [`MemoryOda::load_dir`] seeds the store from a directory laid out as:
//!
//! ```text
//! <dir>/sbd/*.json                     one entity document per file
//! <dir>/sbd_status_history/*.json      a status record or an array of records
//! <dir>/sbi/...  <dir>/eb/...  <dir>/prj/...
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ptt_core::entity::{EntityDocument, EntityKind};
use ptt_core::history::StatusRecord;
use ptt_core::query::{QueryParams, StatusQuery};
use ptt_core::types::Version;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{OdaError, OdaResult};
use crate::uow::{
    next_version, stamp_status, EntityRepository, Oda, StatusHistoryRepository, UnitOfWork,
};

#[derive(Debug, Default, Clone)]
struct Store {
    /// Every stored version of each entity, ascending.
    entities: HashMap<EntityKind, BTreeMap<String, Vec<EntityDocument>>>,
    /// Status rows in the order they were recorded.
    history: HashMap<EntityKind, Vec<StatusRecord>>,
}

impl Store {
    fn push_entity(&mut self, document: EntityDocument) {
        let versions = self
            .entities
            .entry(document.kind())
            .or_default()
            .entry(document.id().to_string())
            .or_default();
        versions.push(document);
        versions.sort_by_key(EntityDocument::version);
    }

    fn push_status(&mut self, record: StatusRecord) {
        self.history.entry(record.kind).or_default().push(record);
    }

    fn versions(&self, kind: EntityKind, id: &str) -> &[EntityDocument] {
        self.entities
            .get(&kind)
            .and_then(|by_id| by_id.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn ids(&self, kind: EntityKind) -> impl Iterator<Item = &String> {
        self.entities.get(&kind).into_iter().flat_map(BTreeMap::keys)
    }

    fn rows(&self, kind: EntityKind) -> &[StatusRecord] {
        self.history.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fold a unit of work's writes into the store. Nothing is merged when a
    /// staged entity version already exists.
    fn merge(&mut self, staged: Store) -> OdaResult<()> {
        for document in staged.entities.values().flat_map(BTreeMap::values).flatten() {
            let stored = self.versions(document.kind(), document.id());
            if stored.iter().any(|doc| doc.version() == document.version()) {
                return Err(OdaError::VersionConflict {
                    identifier: document.id().to_string(),
                    version: document.version(),
                });
            }
        }

        for by_id in staged.entities.into_values() {
            for document in by_id.into_values().flatten() {
                self.push_entity(document);
            }
        }
        for record in staged.history.into_values().flatten() {
            self.push_status(record);
        }
        Ok(())
    }
}

/// Process-local ODA. Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryOda {
    store: Arc<RwLock<Store>>,
}

impl MemoryOda {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity version as-is, bypassing version stamping.
    pub async fn insert_entity(&self, document: EntityDocument) {
        self.store.write().await.push_entity(document);
    }

    /// Record a status row as-is, bypassing metadata stamping.
    pub async fn insert_status(&self, record: StatusRecord) {
        self.store.write().await.push_status(record);
    }

    /// Build a store seeded from `dir`. Missing kind directories are skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> OdaResult<Self> {
        let dir = dir.as_ref();
        let mut store = Store::default();

        for kind in EntityKind::ALL {
            for (path, value) in read_json_files(&dir.join(kind.as_str()))? {
                let document = EntityDocument::from_json(kind, value)
                    .map_err(|e| OdaError::Corrupt(format!("{}: {e}", path.display())))?;
                store.push_entity(document);
            }

            let history_dir = dir.join(format!("{}_status_history", kind.as_str()));
            for (path, value) in read_json_files(&history_dir)? {
                let values = match value {
                    Value::Array(values) => values,
                    single => vec![single],
                };
                for value in values {
                    let record = StatusRecord::from_json(kind, value)
                        .map_err(|e| OdaError::Corrupt(format!("{}: {e}", path.display())))?;
                    store.push_status(record);
                }
            }
        }

        let entity_count: usize = store
            .entities
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum();
        let status_count: usize = store.history.values().map(Vec::len).sum();
        tracing::info!(
            dir = %dir.display(),
            entity_count,
            status_count,
            "Loaded in-memory ODA seed data"
        );

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
        })
    }
}

/// Parse every `*.json` file in `dir`, sorted by file name.
fn read_json_files(dir: &Path) -> OdaResult<Vec<(PathBuf, Value)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| -> OdaResult<(PathBuf, Value)> {
            let raw = std::fs::read_to_string(&path).map_err(io_error(&path))?;
            let value = serde_json::from_str(&raw)?;
            Ok((path, value))
        })
        .collect()
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OdaError {
    let path = path.to_path_buf();
    move |source| OdaError::Io { path, source }
}

#[async_trait]
impl Oda for MemoryOda {
    async fn uow(&self) -> OdaResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            store: Arc::clone(&self.store),
            staged: Store::default(),
        }))
    }

    async fn health_check(&self) -> OdaResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryUnitOfWork {
    store: Arc<RwLock<Store>>,
    staged: Store,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn entities(&mut self, kind: EntityKind) -> Box<dyn EntityRepository + '_> {
        Box::new(MemoryEntityRepo {
            kind,
            store: &self.store,
            staged: &mut self.staged,
        })
    }

    fn status_history(&mut self, kind: EntityKind) -> Box<dyn StatusHistoryRepository + '_> {
        Box::new(MemoryStatusRepo {
            kind,
            store: &self.store,
            staged: &mut self.staged,
        })
    }

    async fn commit(self: Box<Self>) -> OdaResult<()> {
        let Self { store, staged } = *self;
        store.write().await.merge(staged)?;
        tracing::debug!("Committed in-memory unit of work");
        Ok(())
    }
}

struct MemoryEntityRepo<'a> {
    kind: EntityKind,
    store: &'a RwLock<Store>,
    staged: &'a mut Store,
}

impl MemoryEntityRepo<'_> {
    /// Committed and staged versions of one entity, ascending.
    fn versions(&self, committed: &Store, id: &str) -> Vec<EntityDocument> {
        let mut versions: Vec<EntityDocument> = committed
            .versions(self.kind, id)
            .iter()
            .chain(self.staged.versions(self.kind, id))
            .cloned()
            .collect();
        versions.sort_by_key(EntityDocument::version);
        versions
    }
}

#[async_trait]
impl EntityRepository for MemoryEntityRepo<'_> {
    async fn get(&mut self, id: &str, version: Option<Version>) -> OdaResult<EntityDocument> {
        let committed = self.store.read().await;
        let versions = self.versions(&committed, id);
        let found = match version {
            Some(version) => versions.into_iter().find(|doc| doc.version() == version),
            None => versions.into_iter().last(),
        };
        found.ok_or_else(|| OdaError::not_found(id))
    }

    async fn contains(&mut self, id: &str) -> OdaResult<bool> {
        let committed = self.store.read().await;
        Ok(!committed.versions(self.kind, id).is_empty()
            || !self.staged.versions(self.kind, id).is_empty())
    }

    async fn query(&mut self, params: &QueryParams) -> OdaResult<Vec<EntityDocument>> {
        let committed = self.store.read().await;
        let ids: BTreeSet<&String> = committed
            .ids(self.kind)
            .chain(self.staged.ids(self.kind))
            .collect();

        let matched: Vec<EntityDocument> = ids
            .into_iter()
            .filter_map(|id| self.versions(&committed, id).pop())
            .filter(|doc| params.matches(doc.id(), doc.metadata()))
            .collect();

        tracing::debug!(kind = %self.kind, count = matched.len(), "Queried entities");
        Ok(matched)
    }

    async fn add(&mut self, document: EntityDocument) -> OdaResult<EntityDocument> {
        let latest = self.get(document.id(), None).await?;
        let stored = next_version(&latest, document);
        tracing::debug!(
            kind = %self.kind,
            id = stored.id(),
            version = stored.version(),
            "Staged entity version"
        );
        self.staged.push_entity(stored.clone());
        Ok(stored)
    }
}

struct MemoryStatusRepo<'a> {
    kind: EntityKind,
    store: &'a RwLock<Store>,
    staged: &'a mut Store,
}

impl MemoryStatusRepo<'_> {
    /// Rows for one entity in recorded order.
    fn rows(&self, committed: &Store, id: &str, version: Option<Version>) -> Vec<StatusRecord> {
        let mut rows: Vec<StatusRecord> = committed
            .rows(self.kind)
            .iter()
            .chain(self.staged.rows(self.kind))
            .filter(|row| row.entity_ref == id)
            .filter(|row| version.map_or(true, |v| row.entity_version == v))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.metadata.created_on);
        rows
    }
}

#[async_trait]
impl StatusHistoryRepository for MemoryStatusRepo<'_> {
    async fn current(&mut self, id: &str, version: Option<Version>) -> OdaResult<StatusRecord> {
        let committed = self.store.read().await;
        self.rows(&committed, id, version)
            .pop()
            .ok_or_else(|| OdaError::not_found(id))
    }

    async fn query(&mut self, query: &StatusQuery) -> OdaResult<Vec<StatusRecord>> {
        let committed = self.store.read().await;
        Ok(self.rows(&committed, &query.entity_id, query.version))
    }

    async fn add(&mut self, record: StatusRecord) -> OdaResult<StatusRecord> {
        let prior_rows = {
            let committed = self.store.read().await;
            self.rows(&committed, &record.entity_ref, None).len()
        };
        let stored = stamp_status(record, prior_rows);
        tracing::debug!(
            kind = %self.kind,
            entity_ref = %stored.entity_ref,
            current_status = %stored.current_status,
            "Staged status record"
        );
        self.staged.push_status(stored.clone());
        Ok(stored)
    }
}
