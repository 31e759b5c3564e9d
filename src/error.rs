//! Store error taxonomy. `DuplicateId` is the conflict signal the engine's
//! retry path keys on; everything else is opaque backend failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this event id already exists. Raised by `create` only;
    /// the engine resolves it by re-reading and re-applying the update rules.
    #[error("record already exists for event id {0}")]
    DuplicateId(String),

    /// `update` was asked to overwrite a record that is not there.
    #[error("no record to update for event id {0}")]
    MissingRecord(String),

    /// Unclassified backend failure (connection lost, query error, ...).
    #[error("storage backend failure: {0}")]
    Backend(String),
}
