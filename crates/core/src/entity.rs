//! Entity kinds and the documents the ODA stores for them.
//!
//! The PTT services never interpret an entity beyond its identifier field and
//! its `metadata` block; everything else is carried through as JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{Timestamp, Version};

/// The four entity kinds exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Sbd,
    Sbi,
    Eb,
    Prj,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Sbd, Self::Sbi, Self::Eb, Self::Prj];

    /// Short name used by `/status/get_entity` and in table names (`sbd`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sbd => "sbd",
            Self::Sbi => "sbi",
            Self::Eb => "eb",
            Self::Prj => "prj",
        }
    }

    /// Route segment for the collection (`sbds`).
    pub fn collection(self) -> &'static str {
        match self {
            Self::Sbd => "sbds",
            Self::Sbi => "sbis",
            Self::Eb => "ebs",
            Self::Prj => "prjs",
        }
    }

    /// Identifier field inside the entity document (`sbd_id`).
    pub fn id_field(self) -> &'static str {
        match self {
            Self::Sbd => "sbd_id",
            Self::Sbi => "sbi_id",
            Self::Eb => "eb_id",
            Self::Prj => "prj_id",
        }
    }

    /// Reference field inside a status-history record (`sbd_ref`).
    pub fn ref_field(self) -> &'static str {
        match self {
            Self::Sbd => "sbd_ref",
            Self::Sbi => "sbi_ref",
            Self::Eb => "eb_ref",
            Self::Prj => "prj_ref",
        }
    }

    /// Version field inside a status-history record (`sbd_version`).
    pub fn version_field(self) -> &'static str {
        match self {
            Self::Sbd => "sbd_version",
            Self::Sbi => "sbi_version",
            Self::Eb => "eb_version",
            Self::Prj => "prj_version",
        }
    }

    /// Product data model schema name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Sbd => "SBDefinition",
            Self::Sbi => "SBInstance",
            Self::Eb => "OSOExecutionBlock",
            Self::Prj => "Project",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| CoreError::UnknownEntity(s.to_string()))
    }
}

/// Type-level entity kind, used to instantiate one generic handler per
/// collection.
pub trait Tracked: Send + Sync + 'static {
    const KIND: EntityKind;
}

pub struct Sbd;
pub struct Sbi;
pub struct Eb;
pub struct Prj;

impl Tracked for Sbd {
    const KIND: EntityKind = EntityKind::Sbd;
}

impl Tracked for Sbi {
    const KIND: EntityKind = EntityKind::Sbi;
}

impl Tracked for Eb {
    const KIND: EntityKind = EntityKind::Eb;
}

impl Tracked for Prj {
    const KIND: EntityKind = EntityKind::Prj;
}

fn default_version() -> Version {
    1
}

fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Versioning and audit block shared by entities and status records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default = "default_version")]
    pub version: Version,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "now")]
    pub created_on: Timestamp,
    #[serde(default)]
    pub last_modified_by: Option<String>,
    #[serde(default = "now")]
    pub last_modified_on: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdm_version: Option<String>,
}

impl Metadata {
    /// Fresh metadata for a first version created by `user` at `at`.
    pub fn created(user: &str, at: Timestamp) -> Self {
        Self {
            version: 1,
            created_by: Some(user.to_string()),
            created_on: at,
            last_modified_by: Some(user.to_string()),
            last_modified_on: at,
            pdm_version: None,
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        let at = now();
        Self {
            version: 1,
            created_by: None,
            created_on: at,
            last_modified_by: None,
            last_modified_on: at,
            pdm_version: None,
        }
    }
}

/// A stored entity: its kind plus the JSON object the ODA holds.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDocument {
    kind: EntityKind,
    id: String,
    metadata: Metadata,
    fields: Map<String, Value>,
}

impl EntityDocument {
    /// Validate and wrap a JSON document of the given kind.
    ///
    /// The document must be an object carrying a non-empty string in the
    /// kind's id field. A missing `metadata` block is treated as version 1.
    /// A `status` field is dropped: status lives in the status history, and
    /// read responses append it with [`EntityDocument::with_status`].
    pub fn from_json(kind: EntityKind, value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut fields) = value else {
            return Err(CoreError::Validation(format!(
                "{} must be a JSON object",
                kind.label()
            )));
        };

        let id = match fields.get(kind.id_field()) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(_) => {
                return Err(CoreError::Validation(format!(
                    "{} must be a non-empty string",
                    kind.id_field()
                )))
            }
            None => return Err(CoreError::missing_field(kind.id_field())),
        };

        let metadata = match fields.remove("metadata") {
            Some(Value::Null) | None => Metadata::default(),
            Some(raw) => serde_json::from_value(raw)
                .map_err(|e| CoreError::Validation(format!("Invalid metadata: {e}")))?,
        };
        fields.remove("status");

        Ok(Self {
            kind,
            id,
            metadata,
            fields,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.metadata.version
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Serialize back to the JSON object, metadata included.
    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        fields.insert(
            "metadata".to_string(),
            serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        );
        Value::Object(fields)
    }

    /// The document with its current `status` appended, as returned by the
    /// read endpoints.
    pub fn with_status(&self, status: &str) -> Value {
        let mut value = self.to_json();
        if let Value::Object(ref mut fields) = value {
            fields.insert("status".to_string(), Value::String(status.to_string()));
        }
        value
    }
}

impl Serialize for EntityDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn entity_kind_parses_case_insensitively() {
        assert_eq!("SBD".parse::<EntityKind>().unwrap(), EntityKind::Sbd);
        assert_eq!("eb".parse::<EntityKind>().unwrap(), EntityKind::Eb);
        assert_matches!(
            "ebi".parse::<EntityKind>(),
            Err(CoreError::UnknownEntity(name)) if name == "ebi"
        );
    }

    #[test]
    fn field_names_follow_kind_prefix() {
        assert_eq!(EntityKind::Prj.id_field(), "prj_id");
        assert_eq!(EntityKind::Sbi.ref_field(), "sbi_ref");
        assert_eq!(EntityKind::Eb.version_field(), "eb_version");
        assert_eq!(EntityKind::Sbd.collection(), "sbds");
    }

    #[test]
    fn document_without_metadata_defaults_to_version_one() {
        let doc = EntityDocument::from_json(
            EntityKind::Sbd,
            json!({"sbd_id": "sbd-mvp01-20200325-00001", "telescope": "ska_mid"}),
        )
        .unwrap();

        assert_eq!(doc.id(), "sbd-mvp01-20200325-00001");
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.to_json()["telescope"], "ska_mid");
    }

    #[test]
    fn document_requires_id_field() {
        let err = EntityDocument::from_json(EntityKind::Eb, json!({"sbd_id": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "Field required: eb_id");
    }

    #[test]
    fn document_rejects_non_object() {
        assert_matches!(
            EntityDocument::from_json(EntityKind::Prj, json!([1, 2])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn with_status_appends_status_field() {
        let doc = EntityDocument::from_json(
            EntityKind::Prj,
            json!({
                "prj_id": "prj-mvp01-20220923-00001",
                "metadata": {"version": 3, "created_on": "2022-03-28T15:43:53.971548Z",
                             "last_modified_on": "2022-03-28T15:43:53.971548Z"}
            }),
        )
        .unwrap();

        let value = doc.with_status("Submitted");
        assert_eq!(value["status"], "Submitted");
        assert_eq!(value["metadata"]["version"], 3);
    }

    #[test]
    fn status_field_is_not_stored_with_document() {
        let doc = EntityDocument::from_json(
            EntityKind::Sbd,
            json!({"sbd_id": "sbd-mvp01-20200325-00001", "status": "Complete"}),
        )
        .unwrap();

        assert!(doc.to_json().get("status").is_none());
        assert_eq!(doc.with_status("Draft")["status"], "Draft");
    }
}
