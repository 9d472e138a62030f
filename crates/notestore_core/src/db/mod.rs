//! MongoDB collection bootstrap and store-level errors.
//!
//! # Responsibility
//! - Bind the notes collection from a caller-owned database handle.
//! - Ensure the title uniqueness constraint before the collection is used.
//! - Bound single store calls with an optional deadline.
//!
//! # Invariants
//! - Core code must not read/write notes before the unique index exists.
//! - Connection lifecycle and credentials stay with the caller.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::IntoFuture;
use std::time::Duration;

mod open;

pub use open::open_notes_collection;

pub type DbResult<T> = Result<T, StoreError>;

/// Server error code for a violated unique index.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug)]
pub enum StoreError {
    Mongo(mongodb::error::Error),
    /// A store call did not finish within the configured deadline.
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// The store returned a document this crate cannot interpret.
    InvalidData(String),
}

impl StoreError {
    /// Returns whether this error is a unique index violation.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::Mongo(err) => is_duplicate_key(err),
            _ => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mongo(err) => write!(f, "{err}"),
            Self::Timeout { operation, after } => write!(
                f,
                "store operation `{operation}` timed out after {}ms",
                after.as_millis()
            ),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mongo(err) => Some(err),
            Self::Timeout { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(value: mongodb::error::Error) -> Self {
        Self::Mongo(value)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// Awaits one store call, bounded by `timeout` when set.
///
/// Dropping the returned future cancels the call.
pub async fn with_deadline<F, T>(
    operation: &'static str,
    timeout: Option<Duration>,
    call: F,
) -> DbResult<T>
where
    F: IntoFuture<Output = mongodb::error::Result<T>>,
{
    let call = call.into_future();
    match timeout {
        Some(after) => match tokio::time::timeout(after, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout { operation, after }),
        },
        None => call.await.map_err(StoreError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::{with_deadline, StoreError};
    use std::time::Duration;

    #[tokio::test]
    async fn with_deadline_reports_elapsed_calls_as_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, mongodb::error::Error>(())
        };
        let err = with_deadline("probe", Some(Duration::from_millis(10)), slow)
            .await
            .expect_err("call should time out");
        match err {
            StoreError::Timeout { operation, after } => {
                assert_eq!(operation, "probe");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn with_deadline_passes_results_through() {
        let value = with_deadline("probe", None, async { Ok::<_, mongodb::error::Error>(7) })
            .await
            .expect("call should succeed");
        assert_eq!(value, 7);
    }

    #[test]
    fn timeout_error_is_not_a_duplicate_key() {
        let err = StoreError::Timeout {
            operation: "note_create",
            after: Duration::from_millis(5),
        };
        assert!(!err.is_duplicate_key());
        assert!(err.to_string().contains("note_create"));
    }
}
