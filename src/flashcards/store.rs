//! Storage contract for flashcards.
//!
//! The scheduling core depends only on this trait, not on any particular
//! database. Implementations must provide a conditional write keyed on the
//! card's version stamp; that single compare-and-set is the whole
//! concurrency story — no locks are held across store calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{CardStatus, Flashcard};

#[derive(Error, Debug)]
pub enum StoreError {
    /// The conditional write lost: for an update, the stored version no
    /// longer matches the expected one; for an insert, a card for the same
    /// learner/question pair already exists.
    #[error("version conflict on card {card_id}")]
    VersionConflict { card_id: Uuid },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable keyed storage for flashcard records.
///
/// `query_due` must return cards ordered by `next_review_at` ascending,
/// ties broken by `created_at` then `id`, and must never include archived
/// cards. Reads may be snapshot/eventually-consistent; writers are never
/// blocked by readers.
#[async_trait]
pub trait FlashcardStore: Send + Sync {
    /// Fetch a card by id.
    async fn get(&self, id: Uuid) -> Result<Option<Flashcard>>;

    /// Fetch the unique card for a learner/question pair.
    async fn get_by_owner_and_question(
        &self,
        owner_id: Uuid,
        question_ref: &str,
    ) -> Result<Option<Flashcard>>;

    /// Conditionally persist a card.
    ///
    /// With `expected_version: Some(v)` the write applies only if the
    /// stored card still has version `v` (the caller passes the card with
    /// its version already incremented). With `None` the write is an
    /// insert and applies only if no card exists for the id or the
    /// learner/question pair. Either failure is a `VersionConflict`.
    async fn put_conditional(&self, card: &Flashcard, expected_version: Option<u64>) -> Result<()>;

    /// Cards for `owner_id` with `next_review_at <= as_of`, excluding the
    /// given statuses and all archived cards, in the due-queue order,
    /// at most `limit` entries.
    async fn query_due(
        &self,
        owner_id: Uuid,
        as_of: DateTime<Utc>,
        limit: usize,
        exclude_statuses: &[CardStatus],
    ) -> Result<Vec<Flashcard>>;

    /// All cards for a learner, archived included. Used for stats and
    /// administrative listings, not for scheduling decisions.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Flashcard>>;
}
