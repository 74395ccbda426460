//! Status vocabularies for each entity kind.
//!
//! Variant order matches the product data model and is the order reported by
//! the status catalogue endpoint.

use indexmap::IndexMap;

use crate::entity::EntityKind;
use crate::error::CoreError;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $variant:ident = $key:literal => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( #[serde(rename = $value)] $variant ),+
        }

        impl $name {
            /// Every status in vocabulary order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Vocabulary name as reported by the product data model.
            pub const LABEL: &'static str = $label;

            /// Upper-case enum name (`IN_PROGRESS`).
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $key ),+
                }
            }

            /// Wire value (`In Progress`).
            pub fn value(self) -> &'static str {
                match self {
                    $( $name::$variant => $value ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|status| status.value() == s)
                    .ok_or_else(|| {
                        CoreError::InvalidStatus(format!("'{s}' is not a valid {}", $label))
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.value())
            }
        }
    };
}

define_status_enum! {
    /// Scheduling block definition status.
    SbdStatus ("SBDStatus") {
        Draft = "DRAFT" => "Draft",
        Submitted = "SUBMITTED" => "Submitted",
        Ready = "READY" => "Ready",
        InProgress = "IN_PROGRESS" => "In Progress",
        Observed = "OBSERVED" => "Observed",
        Suspended = "SUSPENDED" => "Suspended",
        FailedProcessing = "FAILED_PROCESSING" => "Failed Processing",
        Complete = "COMPLETE" => "Complete",
    }
}

define_status_enum! {
    /// Scheduling block instance status.
    SbiStatus ("SBIStatus") {
        Created = "CREATED" => "Created",
        Executing = "EXECUTING" => "Executing",
        Failed = "FAILED" => "Failed",
        Observed = "OBSERVED" => "Observed",
    }
}

define_status_enum! {
    /// Execution block status.
    EbStatus ("OSOEBStatus") {
        Created = "CREATED" => "Created",
        FullyObserved = "FULLY_OBSERVED" => "Fully Observed",
        Failed = "FAILED" => "Failed",
    }
}

define_status_enum! {
    /// Project status.
    ProjectStatus ("ProjectStatus") {
        Draft = "DRAFT" => "Draft",
        Submitted = "SUBMITTED" => "Submitted",
        Ready = "READY" => "Ready",
        InProgress = "IN_PROGRESS" => "In Progress",
        Observed = "OBSERVED" => "Observed",
        Complete = "COMPLETE" => "Complete",
        Cancelled = "CANCELLED" => "Cancelled",
        OutOfTime = "OUT_OF_TIME" => "Out of Time",
    }
}

fn pairs<S: Copy>(
    all: &[S],
    name: fn(S) -> &'static str,
    value: fn(S) -> &'static str,
) -> IndexMap<&'static str, &'static str> {
    all.iter().map(|s| (name(*s), value(*s))).collect()
}

/// Ordered `NAME -> value` map of the statuses an entity kind may take.
pub fn catalogue(kind: EntityKind) -> IndexMap<&'static str, &'static str> {
    match kind {
        EntityKind::Sbd => pairs(SbdStatus::ALL, SbdStatus::name, SbdStatus::value),
        EntityKind::Sbi => pairs(SbiStatus::ALL, SbiStatus::name, SbiStatus::value),
        EntityKind::Eb => pairs(EbStatus::ALL, EbStatus::name, EbStatus::value),
        EntityKind::Prj => pairs(ProjectStatus::ALL, ProjectStatus::name, ProjectStatus::value),
    }
}

/// Validate a status value for a kind, returning its canonical spelling.
pub fn parse_status(kind: EntityKind, value: &str) -> Result<&'static str, CoreError> {
    Ok(match kind {
        EntityKind::Sbd => value.parse::<SbdStatus>()?.value(),
        EntityKind::Sbi => value.parse::<SbiStatus>()?.value(),
        EntityKind::Eb => value.parse::<EbStatus>()?.value(),
        EntityKind::Prj => value.parse::<ProjectStatus>()?.value(),
    })
}

/// Status an entity starts its life in.
pub fn initial_status(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Sbd => SbdStatus::Draft.value(),
        EntityKind::Sbi => SbiStatus::Created.value(),
        EntityKind::Eb => EbStatus::Created.value(),
        EntityKind::Prj => ProjectStatus::Draft.value(),
    }
}
