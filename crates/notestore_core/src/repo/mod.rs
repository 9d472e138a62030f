//! Repository layer contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the note data access contract.
//! - Isolate MongoDB query details from callers.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to store transport errors.
//! - Malformed identifiers never reach the store.

pub mod note_repo;
