//! Query parameter types for API handlers.
//!
//! Collection queries use [`ptt_core::query::RawQueryParams`] directly; the
//! structs here cover the status endpoints.

use ptt_core::types::Version;
use serde::Deserialize;
use validator::Validate;

/// `?version=` on the single-entity status endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct VersionParams {
    pub version: Option<Version>,
}

/// Query parameters for `GET /{collection}/status/history`.
///
/// The version may be given under the kind-specific name (`sbd_version`,
/// `eb_version`, ...) or as plain `version`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StatusHistoryParams {
    #[validate(length(min = 1, message = "entity_id must not be empty"))]
    pub entity_id: Option<String>,
    #[serde(
        alias = "sbd_version",
        alias = "sbi_version",
        alias = "eb_version",
        alias = "prj_version"
    )]
    #[validate(range(min = 1, message = "version must be at least 1"))]
    pub version: Option<Version>,
}

/// `?entity_name=` on `GET /status/get_entity`.
#[derive(Debug, Default, Deserialize)]
pub struct EntityNameParams {
    pub entity_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_params_reject_empty_entity_id() {
        let params = StatusHistoryParams {
            entity_id: Some(String::new()),
            version: None,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn history_params_accept_kind_specific_version() {
        let params: StatusHistoryParams =
            serde_json::from_value(serde_json::json!({"entity_id": "eb-1", "eb_version": 2}))
                .unwrap();
        assert_eq!(params.version, Some(2));
        assert!(params.validate().is_ok());
    }
}
