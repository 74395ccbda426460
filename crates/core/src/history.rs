//! Status-history records and the body of a status update request.

use serde::ser::SerializeMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::entity::{EntityKind, Metadata};
use crate::error::CoreError;
use crate::status::{initial_status, parse_status};
use crate::types::Version;

/// One row of an entity's status history.
///
/// Serializes with the kind-specific keys the product data model uses, e.g.
/// `sbd_ref` / `sbd_version` for a scheduling block definition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub kind: EntityKind,
    pub entity_ref: String,
    pub entity_version: Version,
    pub previous_status: String,
    pub current_status: String,
    pub metadata: Metadata,
}

impl StatusRecord {
    /// Parse a stored status-history document of the given kind.
    pub fn from_json(kind: EntityKind, value: Value) -> Result<Self, CoreError> {
        let Value::Object(fields) = value else {
            return Err(CoreError::Validation(format!(
                "{} status history must be a JSON object",
                kind.label()
            )));
        };

        let entity_ref = required_str(&fields, kind.ref_field())?.to_string();
        let current_status = parse_status(kind, required_str(&fields, "current_status")?)?;
        let previous_status = match optional_str(&fields, "previous_status")? {
            Some(status) => parse_status(kind, status)?,
            None => initial_status(kind),
        };
        let entity_version = optional_version(&fields, kind.version_field())?.unwrap_or(1);
        let metadata = match fields.get("metadata") {
            Some(Value::Null) | None => Metadata::default(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| CoreError::Validation(format!("Invalid metadata: {e}")))?,
        };

        Ok(Self {
            kind,
            entity_ref,
            entity_version,
            previous_status: previous_status.to_string(),
            current_status: current_status.to_string(),
            metadata,
        })
    }
}

impl Serialize for StatusRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry(self.kind.ref_field(), &self.entity_ref)?;
        map.serialize_entry(self.kind.version_field(), &self.entity_version)?;
        map.serialize_entry("previous_status", &self.previous_status)?;
        map.serialize_entry("current_status", &self.current_status)?;
        map.serialize_entry("metadata", &self.metadata)?;
        map.end()
    }
}

/// Body of `PUT /{collection}/{id}/status`, validated against the path.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub entity_ref: String,
    pub entity_version: Option<Version>,
    pub previous_status: Option<&'static str>,
    pub current_status: &'static str,
}

impl StatusUpdate {
    /// Validate a request body for `kind`.
    ///
    /// Field presence and status values are checked before the reference is
    /// compared with `path_id`.
    pub fn from_json(kind: EntityKind, path_id: &str, body: &Value) -> Result<Self, CoreError> {
        let Value::Object(fields) = body else {
            return Err(CoreError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        };

        let entity_ref = required_str(fields, kind.ref_field())?;
        let current_status = parse_status(kind, required_str(fields, "current_status")?)?;
        let previous_status = optional_str(fields, "previous_status")?
            .map(|status| parse_status(kind, status))
            .transpose()?;
        let entity_version = optional_version(fields, kind.version_field())?;

        if entity_ref != path_id {
            return Err(CoreError::Mismatch {
                path: path_id.to_string(),
                body: entity_ref.to_string(),
            });
        }

        Ok(Self {
            entity_ref: entity_ref.to_string(),
            entity_version,
            previous_status,
            current_status,
        })
    }

    /// Turn the update into a record ready to be added to the history.
    pub fn into_record(
        self,
        kind: EntityKind,
        version: Version,
        previous_default: &str,
    ) -> StatusRecord {
        StatusRecord {
            kind,
            entity_ref: self.entity_ref,
            entity_version: version,
            previous_status: self
                .previous_status
                .map(str::to_string)
                .unwrap_or_else(|| previous_default.to_string()),
            current_status: self.current_status.to_string(),
            metadata: Metadata::default(),
        }
    }
}

fn required_str<'a>(fields: &'a Map<String, Value>, field: &str) -> Result<&'a str, CoreError> {
    optional_str(fields, field)?.ok_or_else(|| CoreError::missing_field(field))
}

fn optional_str<'a>(
    fields: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, CoreError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(CoreError::Validation(format!("{field} must be a string"))),
    }
}

/// Versions arrive either as numbers or as numeric strings (`"1"`).
fn optional_version(
    fields: &Map<String, Value>,
    field: &str,
) -> Result<Option<Version>, CoreError> {
    let invalid = || CoreError::Validation(format!("{field} must be a positive integer"));
    let version = match fields.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| Version::try_from(v).ok())
            .ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse::<Version>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    if version < 1 {
        return Err(invalid());
    }
    Ok(Some(version))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn record_serializes_with_kind_specific_keys() {
        let record = StatusRecord {
            kind: EntityKind::Eb,
            entity_ref: "eb-mvp01-20240426-5004".into(),
            entity_version: 2,
            previous_status: "Created".into(),
            current_status: "Fully Observed".into(),
            metadata: Metadata::default(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["eb_ref"], "eb-mvp01-20240426-5004");
        assert_eq!(value["eb_version"], 2);
        assert_eq!(value["current_status"], "Fully Observed");
        assert!(value.get("sbd_ref").is_none());
    }

    #[test]
    fn record_from_json_defaults_previous_status() {
        let record = StatusRecord::from_json(
            EntityKind::Sbd,
            json!({"sbd_ref": "sbd-1", "current_status": "Submitted"}),
        )
        .unwrap();

        assert_eq!(record.previous_status, "Draft");
        assert_eq!(record.entity_version, 1);
    }

    #[test]
    fn update_requires_ref_field() {
        let body = json!({
            "current1_status": "Submitted",
            "previous_status": "Draft",
            "prj_version": "1"
        });
        let err = StatusUpdate::from_json(EntityKind::Prj, "prj-t0001-20240702-00002", &body)
            .unwrap_err();
        assert_eq!(err.to_string(), "Field required: prj_ref");
    }

    #[test]
    fn update_detects_mismatch() {
        let body = json!({
            "current_status": "Executing",
            "previous_status": "Created",
            "sbi_ref": "sbi-mvp01-20240426-5004",
        });
        let err = StatusUpdate::from_json(EntityKind::Sbi, "sbi-mvp01-20240426-5003", &body)
            .unwrap_err();
        assert_matches!(err, CoreError::Mismatch { .. });
        assert!(err.to_string().contains("mismatch between"));
    }

    #[test]
    fn update_rejects_unknown_status() {
        let body = json!({"sbd_ref": "sbd-1", "current_status": "Finished"});
        assert_matches!(
            StatusUpdate::from_json(EntityKind::Sbd, "sbd-1", &body),
            Err(CoreError::InvalidStatus(msg)) if msg == "'Finished' is not a valid SBDStatus"
        );
    }

    #[test]
    fn update_accepts_string_version() {
        let body = json!({"eb_ref": "eb-1", "current_status": "Failed", "eb_version": "3"});
        let update = StatusUpdate::from_json(EntityKind::Eb, "eb-1", &body).unwrap();
        assert_eq!(update.entity_version, Some(3));
        assert_eq!(update.previous_status, None);

        let record = update.into_record(EntityKind::Eb, 3, "Created");
        assert_eq!(record.previous_status, "Created");
        assert_eq!(record.current_status, "Failed");
    }

    #[test]
    fn update_rejects_zero_version() {
        let body = json!({"eb_ref": "eb-1", "current_status": "Failed", "eb_version": 0});
        assert_matches!(
            StatusUpdate::from_json(EntityKind::Eb, "eb-1", &body),
            Err(CoreError::Validation(_))
        );
    }
}
