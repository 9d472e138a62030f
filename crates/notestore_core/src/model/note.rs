//! Note domain model.
//!
//! # Responsibility
//! - Define the read model (`Note`) and write model (`NoteDraft`).
//! - Define the typed aggregate result (`NoteStats`).
//!
//! # Invariants
//! - `id` is assigned by the store on insert and never changes.
//! - `created_at` is written once; `updated_at` moves on every update.
//! - Timestamps carry millisecond precision to match BSON `DateTime`.

use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Stable identifier of a note.
///
/// Stored as a BSON `ObjectId` and exposed to callers as a 24-char hex token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(ObjectId);

impl NoteId {
    /// Parses an external hex token into a note id.
    ///
    /// # Errors
    /// - Returns `NoteIdParseError` when `token` is not exactly 24 hex chars.
    pub fn parse(token: &str) -> Result<Self, NoteIdParseError> {
        ObjectId::parse_str(token)
            .map(Self)
            .map_err(|_| NoteIdParseError {
                token: token.to_string(),
            })
    }

    /// Returns the external hex token for this id.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Returns the store-native identifier.
    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for NoteId {
    fn from(value: ObjectId) -> Self {
        Self(value)
    }
}

impl FromStr for NoteId {
    type Err = NoteIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Malformed external note identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteIdParseError {
    /// Token as supplied by the caller.
    pub token: String,
}

impl Display for NoteIdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid note id `{}`", self.token)
    }
}

impl Error for NoteIdParseError {}

/// Persisted note as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Store-assigned id, serialized as `_id`.
    #[serde(rename = "_id")]
    pub id: NoteId,
    /// Unique across the collection.
    pub title: String,
    /// Free text body.
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for a new note.
///
/// Carries no `_id` so the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl NoteDraft {
    /// Creates a draft with both timestamps set to `now`.
    pub fn new(title: impl Into<String>, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Binds the store-assigned id, producing the persisted read model.
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Aggregate statistics over the whole notes collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteStats {
    pub total_notes: u64,
    /// Mean `content` length in characters, rounded to 2 decimals.
    pub avg_content_length: f64,
}

/// Current time truncated to the store's millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

#[cfg(test)]
mod tests {
    use super::{now_millis, Note, NoteDraft, NoteId};
    use bson::oid::ObjectId;
    use bson::Bson;
    use chrono::Timelike;

    #[test]
    fn note_id_parses_hex_and_displays_lowercase() {
        let id = NoteId::parse("65F1A2B3C4D5E6F708091A2B").expect("upper hex should parse");
        assert_eq!(id.to_hex(), "65f1a2b3c4d5e6f708091a2b");
        assert_eq!(id.to_string(), id.to_hex());

        let reparsed: NoteId = id.to_hex().parse().expect("own token should parse");
        assert_eq!(reparsed, id);
    }

    #[test]
    fn note_id_rejects_malformed_tokens() {
        for token in ["", "abc", "zzzzzzzzzzzzzzzzzzzzzzzz", "65f1a2b3c4d5e6f708091a2b00"] {
            let err = NoteId::parse(token).expect_err("malformed token must be rejected");
            assert_eq!(err.token, token);
        }
    }

    #[test]
    fn note_serializes_with_store_field_names() {
        let now = now_millis();
        let note = NoteDraft::new("title", "body", now).into_note(ObjectId::new().into());
        let doc = bson::to_document(&note).expect("note should encode");

        assert!(matches!(doc.get("_id"), Some(Bson::ObjectId(_))));
        assert!(matches!(doc.get("createdAt"), Some(Bson::DateTime(_))));
        assert!(matches!(doc.get("updatedAt"), Some(Bson::DateTime(_))));
        assert_eq!(doc.get_str("title").unwrap(), "title");

        let decoded: Note = bson::from_document(doc).expect("note should decode");
        assert_eq!(decoded, note);
    }

    #[test]
    fn draft_omits_id_so_the_store_assigns_one() {
        let doc = bson::to_document(&NoteDraft::new("t", "c", now_millis())).unwrap();
        assert!(!doc.contains_key("_id"));
        assert_eq!(
            doc.get_datetime("createdAt").unwrap(),
            doc.get_datetime("updatedAt").unwrap()
        );
    }

    #[test]
    fn now_millis_has_no_sub_millisecond_part() {
        assert_eq!(now_millis().nanosecond() % 1_000_000, 0);
    }
}
