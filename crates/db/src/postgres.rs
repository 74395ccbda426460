//! Postgres ODA backend.
//!
//! Each entity kind has a versioned document table `tab_oda_<kind>` (the full
//! JSON document in `info` plus indexed metadata columns) and a companion
//! `tab_oda_<kind>_status_history`. One transaction backs each unit of work.
//!
//! Table and column names come from [`EntityKind`], never from user input.

use async_trait::async_trait;
use ptt_core::entity::{EntityDocument, EntityKind, Metadata};
use ptt_core::history::StatusRecord;
use ptt_core::query::{MatchType, QueryParams, StatusQuery};
use ptt_core::types::{Timestamp, Version};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, Postgres, Transaction};

use crate::error::{OdaError, OdaResult};
use crate::uow::{
    next_version, stamp_status, EntityRepository, Oda, StatusHistoryRepository, UnitOfWork,
};
use crate::DbPool;

/// ODA backed by a sqlx connection pool.
#[derive(Debug, Clone)]
pub struct PgOda {
    pool: DbPool,
}

impl PgOda {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Oda for PgOda {
    async fn uow(&self) -> OdaResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> OdaResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Rolls back on drop unless committed.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn entities(&mut self, kind: EntityKind) -> Box<dyn EntityRepository + '_> {
        Box::new(PgEntityRepo {
            kind,
            conn: &mut *self.tx,
        })
    }

    fn status_history(&mut self, kind: EntityKind) -> Box<dyn StatusHistoryRepository + '_> {
        Box::new(PgStatusRepo {
            kind,
            conn: &mut *self.tx,
        })
    }

    async fn commit(self: Box<Self>) -> OdaResult<()> {
        self.tx.commit().await?;
        tracing::debug!("Committed Postgres unit of work");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct EntityRow {
    info: Value,
}

fn entity_table(kind: EntityKind) -> String {
    format!("tab_oda_{}", kind.as_str())
}

/// Bind values for the `WHERE` clause produced by [`filter_clause`].
#[derive(Debug, PartialEq)]
enum FilterBind {
    Text(String),
    Range(Option<Timestamp>, Option<Timestamp>),
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn text_filter(column: &str, value: &str, match_type: MatchType) -> (String, FilterBind) {
    match match_type {
        MatchType::Equals => (format!("{column} = $1"), FilterBind::Text(value.to_string())),
        MatchType::StartsWith => (
            format!("{column} LIKE $1"),
            FilterBind::Text(format!("{}%", escape_like(value))),
        ),
        MatchType::Contains => (
            format!("{column} LIKE $1"),
            FilterBind::Text(format!("%{}%", escape_like(value))),
        ),
    }
}

fn range_filter(
    column: &str,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
) -> (String, FilterBind) {
    (
        format!(
            "($1::timestamptz IS NULL OR {column} >= $1) AND ($2::timestamptz IS NULL OR {column} <= $2)"
        ),
        FilterBind::Range(start, end),
    )
}

fn filter_clause(kind: EntityKind, params: &QueryParams) -> (String, FilterBind) {
    match params {
        QueryParams::Identifier {
            pattern,
            match_type,
        } => text_filter(kind.id_field(), pattern, *match_type),
        QueryParams::User { user, match_type } => text_filter("created_by", user, *match_type),
        QueryParams::CreatedBetween { start, end } => range_filter("created_on", *start, *end),
        QueryParams::ModifiedBetween { start, end } => {
            range_filter("last_modified_on", *start, *end)
        }
    }
}

struct PgEntityRepo<'a> {
    kind: EntityKind,
    conn: &'a mut PgConnection,
}

impl PgEntityRepo<'_> {
    fn decode(&self, row: EntityRow) -> OdaResult<EntityDocument> {
        Ok(EntityDocument::from_json(self.kind, row.info)?)
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepo<'_> {
    async fn get(&mut self, id: &str, version: Option<Version>) -> OdaResult<EntityDocument> {
        let query = format!(
            "SELECT info FROM {table}
             WHERE {id_col} = $1 AND ($2::int4 IS NULL OR version = $2)
             ORDER BY version DESC
             LIMIT 1",
            table = entity_table(self.kind),
            id_col = self.kind.id_field(),
        );
        let row = sqlx::query_as::<_, EntityRow>(&query)
            .bind(id)
            .bind(version)
            .fetch_optional(&mut *self.conn)
            .await?
            .ok_or_else(|| OdaError::not_found(id))?;
        self.decode(row)
    }

    async fn contains(&mut self, id: &str) -> OdaResult<bool> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE {id_col} = $1)",
            table = entity_table(self.kind),
            id_col = self.kind.id_field(),
        );
        let (exists,): (bool,) = sqlx::query_as(&query)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(exists)
    }

    async fn query(&mut self, params: &QueryParams) -> OdaResult<Vec<EntityDocument>> {
        let id_col = self.kind.id_field();
        let (clause, bind) = filter_clause(self.kind, params);
        let query = format!(
            "SELECT info FROM (
                 SELECT DISTINCT ON ({id_col}) info, {id_col}, created_by, created_on, last_modified_on
                 FROM {table}
                 ORDER BY {id_col}, version DESC
             ) latest
             WHERE {clause}
             ORDER BY {id_col}",
            table = entity_table(self.kind),
        );

        let rows = match bind {
            FilterBind::Text(value) => {
                sqlx::query_as::<_, EntityRow>(&query)
                    .bind(value)
                    .fetch_all(&mut *self.conn)
                    .await?
            }
            FilterBind::Range(start, end) => {
                sqlx::query_as::<_, EntityRow>(&query)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&mut *self.conn)
                    .await?
            }
        };

        tracing::debug!(kind = %self.kind, count = rows.len(), "Queried entities");
        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    async fn add(&mut self, document: EntityDocument) -> OdaResult<EntityDocument> {
        let latest = self.get(document.id(), None).await?;
        let stored = next_version(&latest, document);
        let metadata = stored.metadata();

        let query = format!(
            "INSERT INTO {table}
                (info, {id_col}, version, created_by, created_on, last_modified_by, last_modified_on)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            table = entity_table(self.kind),
            id_col = self.kind.id_field(),
        );
        sqlx::query(&query)
            .bind(stored.to_json())
            .bind(stored.id())
            .bind(metadata.version)
            .bind(&metadata.created_by)
            .bind(metadata.created_on)
            .bind(&metadata.last_modified_by)
            .bind(metadata.last_modified_on)
            .execute(&mut *self.conn)
            .await
            .map_err(|err| match &err {
                // 23505: unique violation on uq_tab_oda_*_id_version
                sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                    OdaError::VersionConflict {
                        identifier: stored.id().to_string(),
                        version: metadata.version,
                    }
                }
                _ => OdaError::Database(err),
            })?;

        tracing::debug!(
            kind = %self.kind,
            id = stored.id(),
            version = stored.version(),
            "Inserted entity version"
        );
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Status history
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct StatusRow {
    entity_ref: String,
    entity_version: i32,
    previous_status: String,
    current_status: String,
    version: i32,
    created_by: Option<String>,
    created_on: Timestamp,
    last_modified_by: Option<String>,
    last_modified_on: Timestamp,
}

impl StatusRow {
    fn into_record(self, kind: EntityKind) -> StatusRecord {
        StatusRecord {
            kind,
            entity_ref: self.entity_ref,
            entity_version: self.entity_version,
            previous_status: self.previous_status,
            current_status: self.current_status,
            metadata: Metadata {
                version: self.version,
                created_by: self.created_by,
                created_on: self.created_on,
                last_modified_by: self.last_modified_by,
                last_modified_on: self.last_modified_on,
                pdm_version: None,
            },
        }
    }
}

fn status_table(kind: EntityKind) -> String {
    format!("tab_oda_{}_status_history", kind.as_str())
}

/// Column list for status-history queries, aliased onto [`StatusRow`].
fn status_columns(kind: EntityKind) -> String {
    format!(
        "{ref_col} AS entity_ref, {version_col} AS entity_version, previous_status, \
         current_status, version, created_by, created_on, last_modified_by, last_modified_on",
        ref_col = kind.ref_field(),
        version_col = kind.version_field(),
    )
}

struct PgStatusRepo<'a> {
    kind: EntityKind,
    conn: &'a mut PgConnection,
}

#[async_trait]
impl StatusHistoryRepository for PgStatusRepo<'_> {
    async fn current(&mut self, id: &str, version: Option<Version>) -> OdaResult<StatusRecord> {
        let query = format!(
            "SELECT {columns} FROM {table}
             WHERE {ref_col} = $1 AND ($2::int4 IS NULL OR {version_col} = $2)
             ORDER BY created_on DESC, id DESC
             LIMIT 1",
            columns = status_columns(self.kind),
            table = status_table(self.kind),
            ref_col = self.kind.ref_field(),
            version_col = self.kind.version_field(),
        );
        let row = sqlx::query_as::<_, StatusRow>(&query)
            .bind(id)
            .bind(version)
            .fetch_optional(&mut *self.conn)
            .await?
            .ok_or_else(|| OdaError::not_found(id))?;
        Ok(row.into_record(self.kind))
    }

    async fn query(&mut self, query: &StatusQuery) -> OdaResult<Vec<StatusRecord>> {
        let sql = format!(
            "SELECT {columns} FROM {table}
             WHERE {ref_col} = $1 AND ($2::int4 IS NULL OR {version_col} = $2)
             ORDER BY created_on ASC, id ASC",
            columns = status_columns(self.kind),
            table = status_table(self.kind),
            ref_col = self.kind.ref_field(),
            version_col = self.kind.version_field(),
        );
        let rows = sqlx::query_as::<_, StatusRow>(&sql)
            .bind(&query.entity_id)
            .bind(query.version)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(|row| row.into_record(self.kind)).collect())
    }

    async fn add(&mut self, record: StatusRecord) -> OdaResult<StatusRecord> {
        let count_query = format!(
            "SELECT COUNT(*) FROM {table} WHERE {ref_col} = $1",
            table = status_table(self.kind),
            ref_col = self.kind.ref_field(),
        );
        let (count,): (i64,) = sqlx::query_as(&count_query)
            .bind(&record.entity_ref)
            .fetch_one(&mut *self.conn)
            .await?;
        let prior_rows = usize::try_from(count)
            .map_err(|_| OdaError::Corrupt(format!("negative row count {count}")))?;

        let stored = stamp_status(record, prior_rows);
        let metadata = &stored.metadata;

        let insert = format!(
            "INSERT INTO {table}
                ({ref_col}, {version_col}, previous_status, current_status, version,
                 created_by, created_on, last_modified_by, last_modified_on)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            table = status_table(self.kind),
            ref_col = self.kind.ref_field(),
            version_col = self.kind.version_field(),
        );
        sqlx::query(&insert)
            .bind(&stored.entity_ref)
            .bind(stored.entity_version)
            .bind(&stored.previous_status)
            .bind(&stored.current_status)
            .bind(metadata.version)
            .bind(&metadata.created_by)
            .bind(metadata.created_on)
            .bind(&metadata.last_modified_by)
            .bind(metadata.last_modified_on)
            .execute(&mut *self.conn)
            .await?;

        tracing::debug!(
            kind = %self.kind,
            entity_ref = %stored.entity_ref,
            current_status = %stored.current_status,
            "Inserted status record"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(escape_like("sbd_100%"), "sbd\\_100\\%");
        assert_eq!(
            text_filter("sbd_id", "sbd-mvp01", MatchType::StartsWith).1,
            FilterBind::Text("sbd-mvp01%".into())
        );
        assert_eq!(
            text_filter("created_by", "Default", MatchType::Contains).1,
            FilterBind::Text("%Default%".into())
        );
    }

    #[test]
    fn identifier_filter_targets_kind_column() {
        let (clause, bind) = filter_clause(
            EntityKind::Eb,
            &QueryParams::Identifier {
                pattern: "eb-mvp01-20240426-5004".into(),
                match_type: MatchType::Equals,
            },
        );
        assert_eq!(clause, "eb_id = $1");
        assert_eq!(bind, FilterBind::Text("eb-mvp01-20240426-5004".into()));
    }

    #[test]
    fn date_filters_bind_open_ranges() {
        let (clause, bind) = filter_clause(
            EntityKind::Prj,
            &QueryParams::ModifiedBetween {
                start: None,
                end: None,
            },
        );
        assert!(clause.contains("last_modified_on >= $1"));
        assert_eq!(bind, FilterBind::Range(None, None));
    }

    #[test]
    fn table_names_follow_kind() {
        assert_eq!(entity_table(EntityKind::Sbi), "tab_oda_sbi");
        assert_eq!(status_table(EntityKind::Prj), "tab_oda_prj_status_history");
        assert!(status_columns(EntityKind::Sbd).starts_with("sbd_ref AS entity_ref"));
    }
}
