//! Query parameters accepted by the collection and status-history endpoints.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::entity::Metadata;
use crate::error::CoreError;
use crate::types::{Timestamp, Version};

pub const MIXED_QUERY_TYPES: &str = "Different query types are not currently supported - for example, cannot combine date created query or entity query with a user query";
pub const MISSING_PARAMETERS: &str = "Parameters are missing or not currently supported";

/// How a string parameter is compared with the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchType {
    #[default]
    Equals,
    StartsWith,
    Contains,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::StartsWith => "starts_with",
            Self::Contains => "contains",
        }
    }

    pub fn matches(self, candidate: &str, pattern: &str) -> bool {
        match self {
            Self::Equals => candidate == pattern,
            Self::StartsWith => candidate.starts_with(pattern),
            Self::Contains => candidate.contains(pattern),
        }
    }
}

impl std::str::FromStr for MatchType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "starts_with" => Ok(Self::StartsWith),
            "contains" => Ok(Self::Contains),
            other => Err(CoreError::QueryParameter(format!(
                "match_type '{other}' is not supported; expected equals, starts_with or contains"
            ))),
        }
    }
}

/// Query-string parameters as received, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQueryParams {
    pub entity_id: Option<String>,
    pub user: Option<String>,
    pub match_type: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub last_modified_after: Option<String>,
    pub last_modified_before: Option<String>,
    pub query_type: Option<String>,
}

/// A single validated entity query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParams {
    Identifier {
        pattern: String,
        match_type: MatchType,
    },
    User {
        user: String,
        match_type: MatchType,
    },
    CreatedBetween {
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    },
    ModifiedBetween {
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    },
}

impl QueryParams {
    /// Validate raw parameters. Exactly one query type may be given.
    pub fn from_raw(raw: &RawQueryParams) -> Result<Self, CoreError> {
        let entity_id = non_empty(&raw.entity_id);
        let user = non_empty(&raw.user);
        let created_after = parse_timestamp("created_after", &raw.created_after)?;
        let created_before = parse_timestamp("created_before", &raw.created_before)?;
        let modified_after = parse_timestamp("last_modified_after", &raw.last_modified_after)?;
        let modified_before = parse_timestamp("last_modified_before", &raw.last_modified_before)?;

        let has_created = created_after.is_some() || created_before.is_some();
        let has_modified = modified_after.is_some() || modified_before.is_some();
        let supplied = [entity_id.is_some(), user.is_some(), has_created, has_modified]
            .into_iter()
            .filter(|present| *present)
            .count();

        match supplied {
            0 => return Err(CoreError::QueryParameter(MISSING_PARAMETERS.to_string())),
            1 => {}
            _ => return Err(CoreError::QueryParameter(MIXED_QUERY_TYPES.to_string())),
        }

        if let Some(query_type) = non_empty(&raw.query_type) {
            let agrees = match query_type {
                "created_between" => has_created,
                "modified_between" => has_modified,
                other => {
                    return Err(CoreError::QueryParameter(format!(
                        "query_type '{other}' is not supported; expected created_between or modified_between"
                    )))
                }
            };
            if !agrees {
                return Err(CoreError::QueryParameter(format!(
                    "query_type '{query_type}' does not match the supplied date parameters"
                )));
            }
        }

        let match_type = match non_empty(&raw.match_type) {
            Some(m) => m.parse()?,
            None => MatchType::default(),
        };

        Ok(if let Some(pattern) = entity_id {
            Self::Identifier {
                pattern: pattern.to_string(),
                match_type,
            }
        } else if let Some(user) = user {
            Self::User {
                user: user.to_string(),
                match_type,
            }
        } else if has_created {
            Self::CreatedBetween {
                start: created_after,
                end: created_before,
            }
        } else {
            Self::ModifiedBetween {
                start: modified_after,
                end: modified_before,
            }
        })
    }

    /// Evaluate the query against one stored entity.
    pub fn matches(&self, id: &str, metadata: &Metadata) -> bool {
        match self {
            Self::Identifier {
                pattern,
                match_type,
            } => match_type.matches(id, pattern),
            Self::User { user, match_type } => metadata
                .created_by
                .as_deref()
                .is_some_and(|created_by| match_type.matches(created_by, user)),
            Self::CreatedBetween { start, end } => within(metadata.created_on, *start, *end),
            Self::ModifiedBetween { start, end } => {
                within(metadata.last_modified_on, *start, *end)
            }
        }
    }
}

/// Parameters of `GET /{collection}/status/history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    pub entity_id: String,
    pub version: Option<Version>,
}

impl StatusQuery {
    pub fn new(entity_id: Option<&str>, version: Option<Version>) -> Result<Self, CoreError> {
        let entity_id = entity_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::QueryParameter("entity_id is required".to_string()))?;
        Ok(Self {
            entity_id: entity_id.to_string(),
            version,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn within(at: Timestamp, start: Option<Timestamp>, end: Option<Timestamp>) -> bool {
    start.map_or(true, |start| at >= start) && end.map_or(true, |end| at <= end)
}

/// RFC 3339, falling back to naive date-times and plain dates read as UTC.
fn parse_timestamp(field: &str, value: &Option<String>) -> Result<Option<Timestamp>, CoreError> {
    let Some(raw) = non_empty(value) else {
        return Ok(None);
    };

    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&chrono::Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Some(naive.and_utc()));
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(naive.and_utc()));
    }

    Err(CoreError::QueryParameter(format!(
        "Invalid timestamp for {field}: '{raw}'"
    )))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    fn raw() -> RawQueryParams {
        RawQueryParams::default()
    }

    #[test]
    fn identifier_query_defaults_to_equals() {
        let params = QueryParams::from_raw(&RawQueryParams {
            entity_id: Some("sbd-mvp01-20200325-00001".into()),
            ..raw()
        })
        .unwrap();

        assert_eq!(
            params,
            QueryParams::Identifier {
                pattern: "sbd-mvp01-20200325-00001".into(),
                match_type: MatchType::Equals,
            }
        );
    }

    #[test]
    fn mixed_query_types_are_rejected() {
        let err = QueryParams::from_raw(&RawQueryParams {
            user: Some("DefaultUser".into()),
            created_after: Some("2022-03-28T15:43:53.971548+00:00".into()),
            ..raw()
        })
        .unwrap_err();

        assert_eq!(err.to_string(), MIXED_QUERY_TYPES);
    }

    #[test]
    fn no_parameters_is_an_error() {
        assert_matches!(
            QueryParams::from_raw(&raw()),
            Err(CoreError::QueryParameter(msg)) if msg == MISSING_PARAMETERS
        );
    }

    #[test]
    fn unknown_match_type_is_rejected() {
        assert_matches!(
            QueryParams::from_raw(&RawQueryParams {
                user: Some("Default".into()),
                match_type: Some("fuzzy".into()),
                ..raw()
            }),
            Err(CoreError::QueryParameter(_))
        );
    }

    #[test]
    fn created_between_accepts_open_ranges() {
        let params = QueryParams::from_raw(&RawQueryParams {
            created_after: Some("2022-03-28T15:43:53Z".into()),
            query_type: Some("created_between".into()),
            ..raw()
        })
        .unwrap();

        assert_matches!(params, QueryParams::CreatedBetween { start: Some(_), end: None });
    }

    #[test]
    fn query_type_must_agree_with_dates() {
        assert_matches!(
            QueryParams::from_raw(&RawQueryParams {
                created_after: Some("2022-03-28".into()),
                query_type: Some("modified_between".into()),
                ..raw()
            }),
            Err(CoreError::QueryParameter(_))
        );
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        assert_matches!(
            QueryParams::from_raw(&RawQueryParams {
                last_modified_before: Some("yesterday".into()),
                ..raw()
            }),
            Err(CoreError::QueryParameter(msg)) if msg.contains("last_modified_before")
        );
    }

    #[test]
    fn matches_evaluates_each_query_type() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 4, 26, 12, 0, 0).unwrap();
        let metadata = Metadata::created("DefaultUser", at);

        let starts = QueryParams::Identifier {
            pattern: "sbi-mvp01".into(),
            match_type: MatchType::StartsWith,
        };
        assert!(starts.matches("sbi-mvp01-20240426-5016", &metadata));
        assert!(!starts.matches("sbi-t0001-20240426-5016", &metadata));

        let user = QueryParams::User {
            user: "Default".into(),
            match_type: MatchType::Contains,
        };
        assert!(user.matches("any", &metadata));

        let before = QueryParams::CreatedBetween {
            start: None,
            end: Some(at - chrono::Duration::days(1)),
        };
        assert!(!before.matches("any", &metadata));

        let modified = QueryParams::ModifiedBetween {
            start: Some(at),
            end: Some(at),
        };
        assert!(modified.matches("any", &metadata));
    }

    #[test]
    fn status_query_requires_entity_id() {
        assert_matches!(StatusQuery::new(Some("  "), None), Err(CoreError::QueryParameter(_)));
        let query = StatusQuery::new(Some("eb-1"), Some(2)).unwrap();
        assert_eq!(query.entity_id, "eb-1");
        assert_eq!(query.version, Some(2));
    }
}
