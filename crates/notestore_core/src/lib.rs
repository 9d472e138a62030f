//! MongoDB-backed persistence core for notes.
//!
//! Owns the note document shape, the title uniqueness constraint, and the
//! translation of store outcomes into domain errors. Connection lifecycle stays
//! with the caller: pass an open `mongodb::Database` to
//! [`MongoNoteRepository::try_new`].

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{ConfigError, NoteStoreConfig};
pub use db::{DbResult, StoreError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_env, logging_status, LogLevel,
    LoggingError,
};
pub use model::note::{Note, NoteDraft, NoteId, NoteIdParseError, NoteStats};
pub use repo::note_repo::{
    MongoNoteRepository, NoteListQuery, NoteRepository, RepoError, RepoResult,
};
