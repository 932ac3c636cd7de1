/// All entity identities are 64-bit integers assigned by the persistence layer.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
