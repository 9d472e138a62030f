//! Note repository contract and MongoDB implementation.
//!
//! # Responsibility
//! - Provide create/get/list/update/delete/stats over the notes collection.
//! - Translate hex tokens to `ObjectId` and store outcomes to `RepoError`.
//!
//! # Invariants
//! - Each operation issues at most one store call.
//! - Lists are ordered by `_id DESC`; cursors select ids strictly below.
//! - `update_note` always refreshes `updatedAt` and is a single
//!   find-and-modify on the store side.
//! - Logs carry metadata only, never titles or content.

use crate::config::{ConfigError, NoteStoreConfig};
use crate::db::{open_notes_collection, with_deadline, DbResult, StoreError};
use crate::model::note::{now_millis, Note, NoteDraft, NoteId, NoteStats};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use log::{debug, warn};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Domain error for note persistence operations.
#[derive(Debug)]
pub enum RepoError {
    /// Identifier is malformed or matches no note.
    NotFound(String),
    /// Title collides with an existing note.
    Conflict(String),
    /// List cursor is not a valid note id.
    InvalidCursor(String),
    Config(ConfigError),
    Store(StoreError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Conflict(title) => write!(f, "note title already exists: `{title}`"),
            Self::InvalidCursor(cursor) => write!(f, "invalid list cursor `{cursor}`"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Query options for note listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Case-insensitive pattern matched against `title`.
    pub title_pattern: Option<String>,
    /// Maximum notes to return. Normalized by `NoteStoreConfig`.
    pub limit: Option<u32>,
    /// Hex id of the last note of the previous page.
    pub cursor: Option<String>,
}

impl NoteListQuery {
    /// Builds a query from raw request values; empty strings mean "absent".
    pub fn new(query: &str, limit: u32, cursor: &str) -> Self {
        Self {
            title_pattern: non_empty(query),
            limit: Some(limit),
            cursor: non_empty(cursor),
        }
    }

    /// Matches titles containing `text` literally, ignoring case.
    pub fn title_contains(text: &str) -> Self {
        Self {
            title_pattern: non_empty(text).map(|value| regex::escape(&value)),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = non_empty(&cursor.into());
        self
    }
}

/// Repository interface for note operations.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Persists a new note and returns it with its store-assigned id.
    async fn create_note(&self, title: &str, content: &str) -> RepoResult<Note>;
    /// Gets one note by hex id.
    async fn get_note(&self, id: &str) -> RepoResult<Note>;
    /// Lists notes newest-id first with optional title filter and cursor.
    ///
    /// The page size is normalized by `NoteStoreConfig::normalize_list_limit`:
    /// `None` or `Some(0)` use `default_list_limit` rather than "unlimited",
    /// and larger requests are clamped to `max_list_limit`.
    async fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    /// Replaces the supplied fields and returns the post-update note.
    async fn update_note(
        &self,
        id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> RepoResult<Note>;
    /// Hard-deletes one note.
    async fn delete_note(&self, id: &str) -> RepoResult<()>;
    /// Computes collection-wide count and average content length.
    async fn note_stats(&self) -> RepoResult<NoteStats>;
}

/// MongoDB-backed notes repository.
#[derive(Debug, Clone)]
pub struct MongoNoteRepository {
    collection: Collection<Note>,
    config: NoteStoreConfig,
}

impl MongoNoteRepository {
    /// Binds the configured collection and ensures the unique title index.
    ///
    /// # Errors
    /// - `RepoError::Config` when the config fails validation.
    /// - `RepoError::Store` when index creation fails.
    pub async fn try_new(database: &Database, config: NoteStoreConfig) -> RepoResult<Self> {
        config.validate()?;
        let collection = open_notes_collection(database, &config).await?;
        Ok(Self { collection, config })
    }

    /// Wraps an already prepared collection without touching its indexes.
    #[cfg(test)]
    pub(crate) fn with_collection(collection: Collection<Note>, config: NoteStoreConfig) -> Self {
        Self { collection, config }
    }

    async fn run<F, T>(&self, operation: &'static str, call: F) -> DbResult<T>
    where
        F: std::future::IntoFuture<Output = mongodb::error::Result<T>>,
    {
        let started_at = Instant::now();
        let result = with_deadline(operation, self.config.operation_timeout, call).await;
        match &result {
            Ok(_) => debug!(
                "event={operation} module=repo status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={operation} module=repo status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

#[async_trait]
impl NoteRepository for MongoNoteRepository {
    async fn create_note(&self, title: &str, content: &str) -> RepoResult<Note> {
        let draft = NoteDraft::new(title, content, now_millis());
        let drafts = self.collection.clone_with_type::<NoteDraft>();

        let inserted = self
            .run("note_create", drafts.insert_one(&draft))
            .await
            .map_err(|err| conflict_or_store(err, title))?;

        let id = inserted.inserted_id.as_object_id().ok_or_else(|| {
            StoreError::InvalidData(format!(
                "inserted id is not an ObjectId: {}",
                inserted.inserted_id
            ))
        })?;
        Ok(draft.into_note(id.into()))
    }

    async fn get_note(&self, id: &str) -> RepoResult<Note> {
        let note_id = parse_note_id(id)?;
        self.run("note_get", self.collection.find_one(id_filter(note_id)))
            .await?
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    async fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let filter = list_filter(query)?;
        let limit = self.config.normalize_list_limit(query.limit);
        let find = self
            .collection
            .find(filter)
            .sort(doc! { "_id": -1 })
            .limit(i64::from(limit));

        let notes = self
            .run("note_list", async move {
                let cursor = find.await?;
                cursor.try_collect::<Vec<Note>>().await
            })
            .await?;
        Ok(notes)
    }

    async fn update_note(
        &self,
        id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> RepoResult<Note> {
        let note_id = parse_note_id(id)?;
        let update = update_document(title, content, now_millis());
        let action = self
            .collection
            .find_one_and_update(id_filter(note_id), update)
            .return_document(ReturnDocument::After);

        self.run("note_update", action)
            .await
            .map_err(|err| conflict_or_store(err, title.unwrap_or_default()))?
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    async fn delete_note(&self, id: &str) -> RepoResult<()> {
        let note_id = parse_note_id(id)?;
        let deleted = self
            .run("note_delete", self.collection.delete_one(id_filter(note_id)))
            .await?;
        if deleted.deleted_count == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn note_stats(&self) -> RepoResult<NoteStats> {
        let pipeline = stats_pipeline();
        let action = self.collection.aggregate(pipeline);
        let group = self
            .run("note_stats", async move {
                let mut cursor = action.await?;
                cursor.try_next().await
            })
            .await?;
        Ok(stats_from_group(group)?)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_note_id(id: &str) -> RepoResult<NoteId> {
    NoteId::parse(id).map_err(|_| RepoError::NotFound(id.to_string()))
}

fn conflict_or_store(err: StoreError, title: &str) -> RepoError {
    if err.is_duplicate_key() {
        RepoError::Conflict(title.to_string())
    } else {
        RepoError::Store(err)
    }
}

fn id_filter(id: NoteId) -> Document {
    doc! { "_id": id.as_object_id() }
}

/// Builds the `find` filter for a list query.
///
/// # Errors
/// - `RepoError::InvalidCursor` when the cursor is not a valid note id.
pub fn list_filter(query: &NoteListQuery) -> RepoResult<Document> {
    let mut filter = Document::new();
    if let Some(pattern) = query.title_pattern.as_deref() {
        filter.insert("title", doc! { "$regex": pattern, "$options": "i" });
    }
    if let Some(cursor) = query.cursor.as_deref() {
        let after =
            NoteId::parse(cursor).map_err(|_| RepoError::InvalidCursor(cursor.to_string()))?;
        filter.insert("_id", doc! { "$lt": after.as_object_id() });
    }
    Ok(filter)
}

/// Builds the `$set` update; absent fields are left untouched.
pub fn update_document(
    title: Option<&str>,
    content: Option<&str>,
    now: DateTime<Utc>,
) -> Document {
    let mut set = doc! { "updatedAt": bson::DateTime::from_chrono(now) };
    if let Some(title) = title {
        set.insert("title", title);
    }
    if let Some(content) = content {
        set.insert("content", content);
    }
    doc! { "$set": set }
}

/// Single-group pipeline for collection statistics.
pub fn stats_pipeline() -> Vec<Document> {
    vec![doc! {
        "$group": {
            "_id": Bson::Null,
            "totalNotes": { "$sum": 1 },
            "avgContentLength": { "$avg": { "$strLenCP": "$content" } },
        }
    }]
}

/// Decodes the `$group` output; no group means an empty collection.
pub fn stats_from_group(group: Option<Document>) -> DbResult<NoteStats> {
    let Some(group) = group else {
        return Ok(NoteStats::default());
    };

    let total_notes = match group.get("totalNotes") {
        Some(Bson::Int32(value)) if *value >= 0 => *value as u64,
        Some(Bson::Int64(value)) if *value >= 0 => *value as u64,
        other => {
            return Err(StoreError::InvalidData(format!(
                "unexpected totalNotes value: {other:?}"
            )))
        }
    };
    let avg_content_length = match group.get("avgContentLength") {
        Some(Bson::Double(value)) => round_to_hundredths(*value),
        Some(Bson::Int32(value)) => f64::from(*value),
        Some(Bson::Int64(value)) => *value as f64,
        Some(Bson::Null) | None => 0.0,
        other => {
            return Err(StoreError::InvalidData(format!(
                "unexpected avgContentLength value: {other:?}"
            )))
        }
    };

    Ok(NoteStats {
        total_notes,
        avg_content_length,
    })
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{
        list_filter, stats_from_group, stats_pipeline, update_document, MongoNoteRepository,
        NoteListQuery, NoteRepository, RepoError,
    };
    use crate::config::NoteStoreConfig;
    use crate::db::StoreError;
    use crate::model::note::{now_millis, Note, NoteStats};
    use bson::oid::ObjectId;
    use bson::{doc, Bson};
    use mongodb::Client;
    use std::time::Duration;

    const MISSING_ID: &str = "65f1a2b3c4d5e6f708091a2b";

    /// Repository over a client that can never reach a server.
    ///
    /// Any call that reaches the store fails with a store error once server
    /// selection gives up; short-circuited calls return immediately.
    async fn unreachable_repo(config: NoteStoreConfig) -> MongoNoteRepository {
        let client = Client::with_uri_str(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200",
        )
        .await
        .expect("client construction does not connect");
        let collection = client.database("notestore_unreachable").collection::<Note>("notes");
        MongoNoteRepository::with_collection(collection, config)
    }

    #[test]
    fn new_query_treats_empty_strings_as_absent() {
        let query = NoteListQuery::new("", 2, "");
        assert_eq!(query.title_pattern, None);
        assert_eq!(query.cursor, None);
        assert_eq!(query.limit, Some(2));
        assert_eq!(list_filter(&query).unwrap(), doc! {});
    }

    #[test]
    fn list_filter_matches_title_case_insensitively() {
        let filter = list_filter(&NoteListQuery::new("^meet", 10, "")).unwrap();
        assert_eq!(
            filter,
            doc! { "title": { "$regex": "^meet", "$options": "i" } }
        );
    }

    #[test]
    fn title_contains_escapes_pattern_metacharacters() {
        let query = NoteListQuery::title_contains("a+b (draft)");
        assert_eq!(query.title_pattern.as_deref(), Some(r"a\+b \(draft\)"));
        assert_eq!(NoteListQuery::title_contains("").title_pattern, None);
    }

    #[test]
    fn list_filter_restricts_ids_below_cursor() {
        let cursor = ObjectId::new();
        let filter = list_filter(&NoteListQuery::default().after(cursor.to_hex())).unwrap();
        assert_eq!(filter, doc! { "_id": { "$lt": cursor } });
    }

    #[test]
    fn list_filter_rejects_malformed_cursor() {
        let err = list_filter(&NoteListQuery::new("", 2, "not-an-id")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidCursor(cursor) if cursor == "not-an-id"));
    }

    #[test]
    fn update_document_only_sets_present_fields() {
        let now = now_millis();
        let update = update_document(None, Some("new content"), now);
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("content").unwrap(), "new content");
        assert_eq!(
            set.get_datetime("updatedAt").unwrap(),
            &bson::DateTime::from_chrono(now)
        );
        assert!(!set.contains_key("title"));
        assert!(!set.contains_key("createdAt"));
    }

    #[test]
    fn update_document_without_fields_still_refreshes_updated_at() {
        let update = update_document(None, None, now_millis());
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains_key("updatedAt"));
    }

    #[test]
    fn stats_pipeline_is_a_single_group() {
        let pipeline = stats_pipeline();
        assert_eq!(pipeline.len(), 1);
        let group = pipeline[0].get_document("$group").unwrap();
        assert_eq!(group.get("_id"), Some(&Bson::Null));
    }

    #[test]
    fn stats_from_no_group_is_zeroed() {
        assert_eq!(stats_from_group(None).unwrap(), NoteStats::default());
    }

    #[test]
    fn stats_rounds_average_to_two_decimals() {
        let avg = 10.0_f64 / 3.0;
        let stats = stats_from_group(Some(doc! {
            "_id": Bson::Null,
            "totalNotes": 3,
            "avgContentLength": avg,
        }))
        .unwrap();
        assert_eq!(stats.total_notes, 3);
        assert_eq!(stats.avg_content_length, 3.33);

        let stats = stats_from_group(Some(doc! {
            "totalNotes": 2_i64,
            "avgContentLength": 4.0,
        }))
        .unwrap();
        assert_eq!(stats.total_notes, 2);
        assert_eq!(stats.avg_content_length, 4.0);
    }

    #[test]
    fn stats_rejects_unexpected_shapes() {
        let err = stats_from_group(Some(doc! { "totalNotes": "many" })).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn malformed_ids_short_circuit_to_not_found() {
        let repo = unreachable_repo(NoteStoreConfig::default()).await;

        let err = repo.get_note("xyz").await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(id) if id == "xyz"));
        let err = repo.update_note("xyz", Some("t"), None).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
        let err = repo.delete_note("").await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_cursor_short_circuits_to_invalid_cursor() {
        let repo = unreachable_repo(NoteStoreConfig::default()).await;
        let err = repo
            .list_notes(&NoteListQuery::new("", 2, "bad-cursor"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn well_formed_id_reaches_the_store_and_surfaces_store_error() {
        let repo = unreachable_repo(NoteStoreConfig::default()).await;
        let err = repo.get_note(MISSING_ID).await.unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::Mongo(_))));
    }

    #[tokio::test]
    async fn operation_timeout_surfaces_as_store_timeout() {
        let config = NoteStoreConfig::default().with_operation_timeout(Duration::from_millis(20));
        let repo = unreachable_repo(config).await;
        let err = repo.delete_note(MISSING_ID).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Store(StoreError::Timeout {
                operation: "note_delete",
                ..
            })
        ));
    }
}
