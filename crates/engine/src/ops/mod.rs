use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

mod allocation;
mod donations;
mod projects;

/// How many times a sweep is re-run from a fresh read before the conflict is
/// surfaced to the caller.
const MAX_SWEEP_RETRIES: u32 = 3;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

/// Run a sweep inside a DB transaction with serializable semantics.
///
/// SQLite transactions are serializable; a writer that raced another sweep
/// gets a busy/locked error instead of a merged result. The whole block is
/// then retried from a fresh read; partial results are never merged. After
/// [`MAX_SWEEP_RETRIES`] the conflict is surfaced as
/// [`EngineError::ConcurrencyConflict`].
macro_rules! with_sweep_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            let $tx = $self.database.begin().await?;
            // The async block keeps `?` inside the body from short-circuiting
            // past the retry loop.
            let result: crate::ResultEngine<_> = async { $body }.await;
            match result {
                Ok(value) => match $tx.commit().await {
                    Ok(()) => break Ok(value),
                    Err(err) if crate::ops::is_write_conflict(&err) => {
                        attempt += 1;
                        if attempt > crate::ops::MAX_SWEEP_RETRIES {
                            break Err(crate::EngineError::ConcurrencyConflict(
                                "sweep kept conflicting with concurrent writes".to_string(),
                            ));
                        }
                    }
                    Err(err) => break Err(err.into()),
                },
                Err(crate::EngineError::Database(err))
                    if crate::ops::is_write_conflict(&err) =>
                {
                    attempt += 1;
                    if attempt > crate::ops::MAX_SWEEP_RETRIES {
                        break Err(crate::EngineError::ConcurrencyConflict(
                            "sweep kept conflicting with concurrent writes".to_string(),
                        ));
                    }
                }
                Err(err) => break Err(err),
            }
        }
    }};
}

pub(crate) use with_sweep_tx;
pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// True for store errors that mean "a concurrent writer got there first":
/// the sweep is safe to re-run from a fresh read.
fn is_write_conflict(err: &DbErr) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("busy")
        || message.contains("serialization")
        || message.contains("deadlock")
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.nfc().collect())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Opaque pagination cursor for `(created_at ASC, id ASC)` listings.
///
/// Serialized as URL-safe base64 JSON; clients treat it as a token.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PageCursor {
    created_at: DateTime<Utc>,
    id: Uuid,
}

impl PageCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid page cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid page cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid page cursor".to_string()))
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = PageCursor {
            created_at: Utc::now(),
            id: Uuid::new_v4(),
        };
        let encoded = cursor.encode().unwrap();
        let decoded = PageCursor::decode(&encoded).unwrap();
        assert_eq!(decoded.id, cursor.id);
        assert_eq!(decoded.created_at, cursor.created_at);
    }

    #[test]
    fn cursor_rejects_garbage() {
        assert!(matches!(
            PageCursor::decode("not a cursor!"),
            Err(EngineError::InvalidCursor(_))
        ));
    }

    #[test]
    fn normalize_rejects_blank_names() {
        assert!(normalize_required_name("  ", "project").is_err());
        assert_eq!(
            normalize_required_name(" Shelter ", "project").unwrap(),
            "Shelter"
        );
    }

    #[test]
    fn locked_database_counts_as_conflict() {
        let err = DbErr::Exec(sea_orm::RuntimeErr::Internal(
            "database is locked".to_string(),
        ));
        assert!(is_write_conflict(&err));

        let err = DbErr::Exec(sea_orm::RuntimeErr::Internal("syntax error".to_string()));
        assert!(!is_write_conflict(&err));
    }
}
