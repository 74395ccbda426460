//! Unit-of-work and repository traits shared by every ODA backend.
//!
//! A unit of work is opened per request. Repositories borrow it mutably, so
//! they are obtained, used and dropped one statement at a time:
//!
//! ```ignore
//! let mut uow = oda.uow().await?;
//! let sbd = uow.sbds().get("sbd-mvp01-20200325-00001", None).await?;
//! let status = uow.sbds_status_history().current(sbd.id(), Some(sbd.version())).await?;
//! ```
//!
//! Writes become visible to other units of work only after [`UnitOfWork::commit`].
//! Dropping a unit of work without committing discards them.

use async_trait::async_trait;
use ptt_core::entity::{EntityDocument, EntityKind, Metadata};
use ptt_core::history::StatusRecord;
use ptt_core::query::{QueryParams, StatusQuery};
use ptt_core::status::initial_status;
use ptt_core::types::{Version, DEFAULT_USER};

use crate::error::{OdaError, OdaResult};

/// Versioned entity documents of one kind.
#[async_trait]
pub trait EntityRepository: Send {
    /// Fetch a version of an entity, the latest when `version` is `None`.
    async fn get(&mut self, id: &str, version: Option<Version>) -> OdaResult<EntityDocument>;

    async fn contains(&mut self, id: &str) -> OdaResult<bool>;

    /// Latest version of every entity matching `params`, ordered by id.
    async fn query(&mut self, params: &QueryParams) -> OdaResult<Vec<EntityDocument>>;

    /// Store `document` as the next version of an existing entity.
    async fn add(&mut self, document: EntityDocument) -> OdaResult<EntityDocument>;
}

/// Status-history rows of one kind.
#[async_trait]
pub trait StatusHistoryRepository: Send {
    /// Most recently recorded row for the entity, optionally for one version.
    async fn current(&mut self, id: &str, version: Option<Version>) -> OdaResult<StatusRecord>;

    /// Every row for the entity, oldest first.
    async fn query(&mut self, query: &StatusQuery) -> OdaResult<Vec<StatusRecord>>;

    async fn add(&mut self, record: StatusRecord) -> OdaResult<StatusRecord>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    fn entities(&mut self, kind: EntityKind) -> Box<dyn EntityRepository + '_>;

    fn status_history(&mut self, kind: EntityKind) -> Box<dyn StatusHistoryRepository + '_>;

    fn sbds(&mut self) -> Box<dyn EntityRepository + '_> {
        self.entities(EntityKind::Sbd)
    }

    fn sbis(&mut self) -> Box<dyn EntityRepository + '_> {
        self.entities(EntityKind::Sbi)
    }

    fn ebs(&mut self) -> Box<dyn EntityRepository + '_> {
        self.entities(EntityKind::Eb)
    }

    fn prjs(&mut self) -> Box<dyn EntityRepository + '_> {
        self.entities(EntityKind::Prj)
    }

    fn sbds_status_history(&mut self) -> Box<dyn StatusHistoryRepository + '_> {
        self.status_history(EntityKind::Sbd)
    }

    fn sbis_status_history(&mut self) -> Box<dyn StatusHistoryRepository + '_> {
        self.status_history(EntityKind::Sbi)
    }

    fn ebs_status_history(&mut self) -> Box<dyn StatusHistoryRepository + '_> {
        self.status_history(EntityKind::Eb)
    }

    fn prjs_status_history(&mut self) -> Box<dyn StatusHistoryRepository + '_> {
        self.status_history(EntityKind::Prj)
    }

    /// Make every write of this unit of work durable.
    async fn commit(self: Box<Self>) -> OdaResult<()>;
}

/// Latest recorded status of an entity across all its versions, or the
/// kind's initial status when no row has been recorded yet.
pub async fn latest_status(
    uow: &mut dyn UnitOfWork,
    kind: EntityKind,
    id: &str,
) -> OdaResult<String> {
    match uow.status_history(kind).current(id, None).await {
        Ok(record) => Ok(record.current_status),
        Err(OdaError::NotFound { .. }) => Ok(initial_status(kind).to_string()),
        Err(err) => Err(err),
    }
}

/// An Observation Data Archive the service can open units of work against.
#[async_trait]
pub trait Oda: Send + Sync {
    async fn uow(&self) -> OdaResult<Box<dyn UnitOfWork>>;

    async fn health_check(&self) -> OdaResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Metadata for a new version of `latest`: creation fields are preserved,
/// the modification fields are stamped now.
pub(crate) fn next_version(
    latest: &EntityDocument,
    mut incoming: EntityDocument,
) -> EntityDocument {
    let previous = latest.metadata();
    let metadata = Metadata {
        version: previous.version + 1,
        created_by: previous.created_by.clone(),
        created_on: previous.created_on,
        last_modified_by: Some(DEFAULT_USER.to_string()),
        last_modified_on: chrono::Utc::now(),
        pdm_version: incoming
            .metadata()
            .pdm_version
            .clone()
            .or_else(|| previous.pdm_version.clone()),
    };
    incoming.set_metadata(metadata);
    incoming
}

/// Stamp a status row about to be recorded; `prior_rows` is how many rows the
/// entity already has.
pub(crate) fn stamp_status(mut record: StatusRecord, prior_rows: usize) -> StatusRecord {
    let mut metadata = Metadata::created(DEFAULT_USER, chrono::Utc::now());
    metadata.version = Version::try_from(prior_rows + 1).unwrap_or(Version::MAX);
    metadata.pdm_version = record.metadata.pdm_version.take();
    record.metadata = metadata;
    record
}
