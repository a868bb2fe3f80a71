use thiserror::Error;

/// Failure reading or writing a persisted blob.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("blob '{key}' is not valid JSON: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("blob '{key}' does not match the expected layout: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("blob '{key}' has an unexpected shape (expected {expected})")]
    UnexpectedShape { key: String, expected: &'static str },

    #[error("failed to encode blob: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure while upgrading the primary blob to the current schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("data version {found} is newer than supported version {current}")]
    UnsupportedVersion { found: u32, current: u32 },

    #[error("migration table is not contiguous: entry {index} starts at version {from}")]
    BrokenLadder { index: usize, from: u32 },

    #[error("migration table covers {len} steps but the current version is {current}")]
    IncompleteLadder { len: usize, current: u32 },

    #[error("day '{date}' cannot be migrated: {reason}")]
    MalformedDay { date: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
