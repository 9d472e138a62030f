//! Domain model for persisted notes.
//!
//! # Responsibility
//! - Define the note document shape shared by the store and its callers.
//! - Translate between external hex tokens and store-native identifiers.
//!
//! # Invariants
//! - Every persisted note is identified by a store-assigned `NoteId`.
//! - Deletion is a hard delete; there is no tombstone state.

pub mod note;
