use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The session cannot be used right now (poisoned lock, lost connection).
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("message {id} already mirrors origin message {existing}, refusing {requested}")]
    OriginConflict {
        id: i64,
        existing: i64,
        requested: i64,
    },
}

/// Whether `err` is a storage failure worth retrying on a fresh unit of work:
/// lock contention, I/O trouble, or an unavailable session anywhere in the
/// error chain.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(store) = cause.downcast_ref::<StoreError>() {
            return matches!(store, StoreError::Unavailable(_));
        }
        if let Some(sqlite) = cause.downcast_ref::<rusqlite::Error>() {
            return is_transient_sqlite(sqlite);
        }
        false
    })
}

fn is_transient_sqlite(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
        ),
        _ => false,
    }
}
