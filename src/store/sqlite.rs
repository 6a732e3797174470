//! SQLite-backed flashcard store.
//!
//! One row per flashcard. The learner/question uniqueness invariant lives
//! in the schema (`UNIQUE(owner_id, question_ref)`), and the conditional
//! write is a single `UPDATE ... WHERE id = ? AND version = ?` — SQLite's
//! row-level atomicity is the whole compare-and-set. Timestamps are stored
//! as unix milliseconds so `ORDER BY next_review_at` matches the due-queue
//! ordering contract without string parsing.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use uuid::Uuid;

use crate::flashcards::models::{CardSource, CardStatus, Difficulty, Flashcard};
use crate::flashcards::store::{FlashcardStore, Result, StoreError};

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

const CARD_COLUMNS: &str = "id, owner_id, question_ref, front, back, explanation, category, tags, \
     difficulty, status, archived, interval, repetitions, ease_factor, correct_count, \
     incorrect_count, last_reviewed_at, next_review_at, version, source, created_at, updated_at";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        let conn = Connection::open(&db_path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                question_ref TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                explanation TEXT,
                category TEXT NOT NULL,
                -- JSON array of tag strings
                tags TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                status TEXT NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0,
                interval INTEGER NOT NULL,
                repetitions INTEGER NOT NULL,
                ease_factor REAL NOT NULL,
                correct_count INTEGER NOT NULL,
                incorrect_count INTEGER NOT NULL,
                -- unix milliseconds; NULL until the first review
                last_reviewed_at INTEGER,
                next_review_at INTEGER NOT NULL,
                version INTEGER NOT NULL,
                source TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(owner_id, question_ref)
            );

            CREATE INDEX IF NOT EXISTS idx_flashcards_owner_due
                ON flashcards(owner_id, next_review_at);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl FlashcardStore for SqliteStore {
    async fn get(&self, id: Uuid) -> Result<Option<Flashcard>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM flashcards WHERE id = ?1", CARD_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id.to_string()], row_to_card)
                .optional()?)
        })
        .await
    }

    async fn get_by_owner_and_question(
        &self,
        owner_id: Uuid,
        question_ref: &str,
    ) -> Result<Option<Flashcard>> {
        let question_ref = question_ref.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM flashcards WHERE owner_id = ?1 AND question_ref = ?2",
                CARD_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![owner_id.to_string(), question_ref], row_to_card)
                .optional()?)
        })
        .await
    }

    async fn put_conditional(&self, card: &Flashcard, expected_version: Option<u64>) -> Result<()> {
        let card = card.clone();
        self.with_conn(move |conn| {
            let tags = serde_json::to_string(&card.tags)
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            match expected_version {
                None => {
                    let result = conn.execute(
                        "INSERT INTO flashcards (id, owner_id, question_ref, front, back, \
                         explanation, category, tags, difficulty, status, archived, interval, \
                         repetitions, ease_factor, correct_count, incorrect_count, \
                         last_reviewed_at, next_review_at, version, source, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                         ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                        params![
                            card.id.to_string(),
                            card.owner_id.to_string(),
                            card.question_ref,
                            card.front,
                            card.back,
                            card.explanation,
                            card.category,
                            tags,
                            card.difficulty.as_str(),
                            card.status.as_str(),
                            card.archived,
                            card.interval,
                            card.repetitions,
                            card.ease_factor,
                            card.correct_count,
                            card.incorrect_count,
                            card.last_reviewed_at.map(|t| t.timestamp_millis()),
                            card.next_review_at.timestamp_millis(),
                            card.version,
                            card.source.as_str(),
                            card.created_at.timestamp_millis(),
                            card.updated_at.timestamp_millis(),
                        ],
                    );
                    match result {
                        Ok(_) => Ok(()),
                        // A duplicate id or learner/question pair is the
                        // insert losing its race, not a backend failure.
                        Err(rusqlite::Error::SqliteFailure(e, _))
                            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                        {
                            Err(StoreError::VersionConflict { card_id: card.id })
                        }
                        Err(e) => Err(e.into()),
                    }
                }
                Some(expected) => {
                    let changed = conn.execute(
                        "UPDATE flashcards SET front = ?1, back = ?2, explanation = ?3, \
                         category = ?4, tags = ?5, difficulty = ?6, status = ?7, archived = ?8, \
                         interval = ?9, repetitions = ?10, ease_factor = ?11, \
                         correct_count = ?12, incorrect_count = ?13, last_reviewed_at = ?14, \
                         next_review_at = ?15, version = ?16, updated_at = ?17 \
                         WHERE id = ?18 AND version = ?19",
                        params![
                            card.front,
                            card.back,
                            card.explanation,
                            card.category,
                            tags,
                            card.difficulty.as_str(),
                            card.status.as_str(),
                            card.archived,
                            card.interval,
                            card.repetitions,
                            card.ease_factor,
                            card.correct_count,
                            card.incorrect_count,
                            card.last_reviewed_at.map(|t| t.timestamp_millis()),
                            card.next_review_at.timestamp_millis(),
                            card.version,
                            card.updated_at.timestamp_millis(),
                            card.id.to_string(),
                            expected,
                        ],
                    )?;
                    if changed == 0 {
                        return Err(StoreError::VersionConflict { card_id: card.id });
                    }
                    Ok(())
                }
            }
        })
        .await
    }

    async fn query_due(
        &self,
        owner_id: Uuid,
        as_of: DateTime<Utc>,
        limit: usize,
        exclude_statuses: &[CardStatus],
    ) -> Result<Vec<Flashcard>> {
        let exclude: Vec<CardStatus> = exclude_statuses.to_vec();
        self.with_conn(move |conn| {
            let mut sql = format!(
                "SELECT {} FROM flashcards \
                 WHERE owner_id = ? AND archived = 0 AND next_review_at <= ?",
                CARD_COLUMNS
            );
            if !exclude.is_empty() {
                sql.push_str(" AND status NOT IN (");
                sql.push_str(&vec!["?"; exclude.len()].join(", "));
                sql.push(')');
            }
            sql.push_str(" ORDER BY next_review_at ASC, created_at ASC, id ASC LIMIT ?");

            let owner = owner_id.to_string();
            let as_of_millis = as_of.timestamp_millis();
            let limit = limit as i64;

            let mut values: Vec<&dyn ToSql> = vec![&owner, &as_of_millis];
            let excluded: Vec<&'static str> = exclude.iter().map(|s| s.as_str()).collect();
            for status in &excluded {
                values.push(status);
            }
            values.push(&limit);

            let mut stmt = conn.prepare(&sql)?;
            let cards = stmt
                .query_map(rusqlite::params_from_iter(values), row_to_card)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(cards)
        })
        .await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Flashcard>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM flashcards WHERE owner_id = ?1 ORDER BY created_at ASC, id ASC",
                CARD_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let cards = stmt
                .query_map(params![owner_id.to_string()], row_to_card)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(cards)
        })
        .await
    }
}

fn row_to_card(row: &rusqlite::Row) -> rusqlite::Result<Flashcard> {
    let tags_json: String = row.get(7)?;
    Ok(Flashcard {
        id: parse_uuid(row.get::<_, String>(0)?, 0)?,
        owner_id: parse_uuid(row.get::<_, String>(1)?, 1)?,
        question_ref: row.get(2)?,
        front: row.get(3)?,
        back: row.get(4)?,
        explanation: row.get(5)?,
        category: row.get(6)?,
        tags: serde_json::from_str(&tags_json)
            .map_err(|e| conv_err(7, rusqlite::types::Type::Text, e))?,
        difficulty: Difficulty::parse(&row.get::<_, String>(8)?)
            .ok_or_else(|| conv_err(8, rusqlite::types::Type::Text, "unknown difficulty"))?,
        status: CardStatus::parse(&row.get::<_, String>(9)?)
            .ok_or_else(|| conv_err(9, rusqlite::types::Type::Text, "unknown status"))?,
        archived: row.get(10)?,
        interval: row.get(11)?,
        repetitions: row.get(12)?,
        ease_factor: row.get(13)?,
        correct_count: row.get(14)?,
        incorrect_count: row.get(15)?,
        last_reviewed_at: row
            .get::<_, Option<i64>>(16)?
            .map(|millis| timestamp(16, millis))
            .transpose()?,
        next_review_at: timestamp(17, row.get(17)?)?,
        version: row.get(18)?,
        source: CardSource::parse(&row.get::<_, String>(19)?)
            .ok_or_else(|| conv_err(19, rusqlite::types::Type::Text, "unknown source"))?,
        created_at: timestamp(20, row.get(20)?)?,
        updated_at: timestamp(21, row.get(21)?)?,
    })
}

fn parse_uuid(value: String, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value).map_err(|e| conv_err(idx, rusqlite::types::Type::Text, e))
}

fn timestamp(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conv_err(idx, rusqlite::types::Type::Integer, "timestamp out of range"))
}

fn conv_err(
    idx: usize,
    sql_type: rusqlite::types::Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, sql_type, err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::CardSnapshot;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::new(dir.path().join("flashcards.db")).unwrap()
    }

    fn card(owner: Uuid, question: &str) -> Flashcard {
        let snapshot = CardSnapshot {
            front: "What is ownership?".to_string(),
            back: "Every value has a single owner".to_string(),
            explanation: Some("See chapter 4".to_string()),
            category: "rust".to_string(),
            tags: vec!["memory".to_string(), "basics".to_string()],
            difficulty: Difficulty::Hard,
        };
        Flashcard::new(owner, question.to_string(), snapshot, CardSource::WrongAnswer, fixed_now())
    }

    #[tokio::test]
    async fn test_insert_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let owner = Uuid::new_v4();
        let c = card(owner, "q-1");

        store.put_conditional(&c, None).await.unwrap();

        let loaded = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, c.id);
        assert_eq!(loaded.owner_id, owner);
        assert_eq!(loaded.question_ref, "q-1");
        assert_eq!(loaded.tags, c.tags);
        assert_eq!(loaded.explanation, c.explanation);
        assert_eq!(loaded.difficulty, Difficulty::Hard);
        assert_eq!(loaded.source, CardSource::WrongAnswer);
        assert_eq!(loaded.status, CardStatus::New);
        assert_eq!(loaded.last_reviewed_at, None);
        assert_eq!(loaded.next_review_at, c.next_review_at);
        assert_eq!(loaded.version, 0);

        let by_pair = store
            .get_by_owner_and_question(owner, "q-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_pair.id, c.id);
    }

    #[tokio::test]
    async fn test_unique_pair_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let owner = Uuid::new_v4();

        store.put_conditional(&card(owner, "q-1"), None).await.unwrap();
        let err = store
            .put_conditional(&card(owner, "q-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // A different learner can hold the same question.
        store
            .put_conditional(&card(Uuid::new_v4(), "q-1"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let c = card(Uuid::new_v4(), "q-1");
        store.put_conditional(&c, None).await.unwrap();

        let mut updated = c.clone();
        updated.repetitions = 1;
        updated.interval = 6;
        updated.status = CardStatus::Learning;
        updated.last_reviewed_at = Some(fixed_now());
        updated.version = 1;
        store.put_conditional(&updated, Some(0)).await.unwrap();

        let err = store.put_conditional(&updated, Some(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let loaded = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.interval, 6);
        assert_eq!(loaded.last_reviewed_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn test_query_due_order_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let owner = Uuid::new_v4();
        let now = fixed_now();

        let mut oldest = card(owner, "q-oldest");
        oldest.next_review_at = now - Duration::days(5);
        let mut middle = card(owner, "q-middle");
        middle.next_review_at = now - Duration::days(1);
        let mut future = card(owner, "q-future");
        future.next_review_at = now + Duration::days(1);
        let mut mastered = card(owner, "q-mastered");
        mastered.next_review_at = now - Duration::days(2);
        mastered.status = CardStatus::Mastered;
        let mut archived = card(owner, "q-archived");
        archived.next_review_at = now - Duration::days(9);
        archived.archived = true;

        for c in [&oldest, &middle, &future, &mastered, &archived] {
            store.put_conditional(c, None).await.unwrap();
        }

        let due = store
            .query_due(owner, now, 10, &[CardStatus::Mastered])
            .await
            .unwrap();
        assert_eq!(
            due.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![oldest.id, middle.id]
        );

        // Without the exclusion, the mastered card joins in due order;
        // the archived card never does.
        let due = store.query_due(owner, now, 10, &[]).await.unwrap();
        assert_eq!(
            due.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![oldest.id, mastered.id, middle.id]
        );

        let limited = store.query_due(owner, now, 1, &[]).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, oldest.id);
    }

    #[tokio::test]
    async fn test_list_by_owner_includes_archived() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let owner = Uuid::new_v4();

        let mut archived = card(owner, "q-archived");
        archived.archived = true;
        store.put_conditional(&archived, None).await.unwrap();
        store.put_conditional(&card(owner, "q-active"), None).await.unwrap();
        store.put_conditional(&card(Uuid::new_v4(), "q-other"), None).await.unwrap();

        let cards = store.list_by_owner(owner).await.unwrap();
        assert_eq!(cards.len(), 2);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let owner = Uuid::new_v4();
        let c = card(owner, "q-1");

        {
            let store = open_store(&dir);
            store.put_conditional(&c, None).await.unwrap();
        }

        let store = open_store(&dir);
        let loaded = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(loaded.front, c.front);
    }
}
