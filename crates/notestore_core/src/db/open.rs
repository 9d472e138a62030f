//! Collection bootstrap for the notes store.
//!
//! # Responsibility
//! - Bind the typed notes collection on a caller-owned database.
//! - Create the unique `title` index before returning a usable collection.
//!
//! # Invariants
//! - Returned collections have the title uniqueness constraint in place.
//! - Index creation failure is fatal; no collection is returned.

use super::{with_deadline, DbResult};
use crate::config::NoteStoreConfig;
use crate::model::note::Note;
use bson::doc;
use log::{error, info};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use std::time::Instant;

/// Binds the notes collection and ensures its unique title index.
///
/// # Side effects
/// - Issues one `createIndexes` command (a no-op when the index exists).
/// - Emits `collection_open` logging events with duration and status.
pub async fn open_notes_collection(
    database: &Database,
    config: &NoteStoreConfig,
) -> DbResult<Collection<Note>> {
    let started_at = Instant::now();
    info!(
        "event=collection_open module=db status=start collection={}",
        config.collection_name
    );

    let collection = database.collection::<Note>(&config.collection_name);

    match with_deadline(
        "create_title_index",
        config.operation_timeout,
        collection.create_index(title_unique_index()),
    )
    .await
    {
        Ok(_) => {
            info!(
                "event=collection_open module=db status=ok collection={} duration_ms={}",
                config.collection_name,
                started_at.elapsed().as_millis()
            );
            Ok(collection)
        }
        Err(err) => {
            error!(
                "event=collection_open module=db status=error collection={} duration_ms={} error_code=index_create_failed error={}",
                config.collection_name,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Unique ascending index on `title`.
///
/// The name is left to the server (`title_1`) so an index created by any
/// other setup on the same key is recognized instead of conflicting.
pub(crate) fn title_unique_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "title": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
