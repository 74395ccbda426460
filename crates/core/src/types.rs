/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Entity and status-history versions start at 1.
pub type Version = i32;

/// User recorded in metadata when the caller does not identify itself.
pub const DEFAULT_USER: &str = "DefaultUser";
