//! Card lifecycle: creation, soft archival, and per-owner stats.
//!
//! Creation is an upsert keyed on the learner/question pair — repeated
//! wrong answers on the same question must never reset progress. The
//! scheduler itself never hard-deletes; removal from active study is the
//! archival flag, and deletion stays an administrative action elsewhere.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::SchedulerConfig;

use super::error::{FlashcardError, Result};
use super::models::{CardSnapshot, CardSource, CardStatus, Flashcard, ReviewStats};
use super::store::{FlashcardStore, StoreError};

pub struct CardLifecycle {
    store: Arc<dyn FlashcardStore>,
    config: SchedulerConfig,
}

impl CardLifecycle {
    pub fn new(store: Arc<dyn FlashcardStore>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Create a card for a learner/question pair, or return the existing
    /// one unchanged. Idempotent: a concurrent duplicate insert loses the
    /// store-level race and resolves to the winner's card.
    pub async fn create_or_get(
        &self,
        owner_id: Uuid,
        question_ref: String,
        snapshot: CardSnapshot,
        source: CardSource,
        now: DateTime<Utc>,
    ) -> Result<Flashcard> {
        if let Some(existing) = self.fetch_pair(owner_id, &question_ref).await? {
            return Ok(existing);
        }

        let card = Flashcard::new(owner_id, question_ref.clone(), snapshot, source, now);
        match self.bounded(self.store.put_conditional(&card, None)).await {
            Ok(Ok(())) => {
                log::info!(
                    "created flashcard {} for owner {} (question {}, source {})",
                    card.id,
                    owner_id,
                    question_ref,
                    card.source.as_str()
                );
                Ok(card)
            }
            // Lost the insert race: someone else created the pair between
            // our read and our write. Their card is the canonical one.
            Ok(Err(StoreError::VersionConflict { .. })) => self
                .fetch_pair(owner_id, &question_ref)
                .await?
                .ok_or(FlashcardError::NotFound),
            Ok(Err(StoreError::Backend(e))) => Err(FlashcardError::Unavailable(e)),
            Err(e) => Err(e),
        }
    }

    /// Remove a card from active due queues without deleting its history.
    pub async fn archive(&self, card_id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> Result<Flashcard> {
        self.set_archived(card_id, owner_id, true, now).await
    }

    /// Return an archived card to active study.
    pub async fn unarchive(&self, card_id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> Result<Flashcard> {
        self.set_archived(card_id, owner_id, false, now).await
    }

    async fn set_archived(
        &self,
        card_id: Uuid,
        owner_id: Uuid,
        archived: bool,
        now: DateTime<Utc>,
    ) -> Result<Flashcard> {
        let attempts = self.config.max_review_retries + 1;

        for _ in 1..=attempts {
            let card = self
                .bounded(self.store.get(card_id))
                .await?
                .map_err(|e| FlashcardError::Unavailable(e.to_string()))?
                .filter(|c| c.owner_id == owner_id)
                .ok_or(FlashcardError::NotFound)?;

            if card.archived == archived {
                return Ok(card);
            }

            let expected = card.version;
            let mut updated = card;
            updated.archived = archived;
            updated.updated_at = now;
            updated.version = expected + 1;

            match self
                .bounded(self.store.put_conditional(&updated, Some(expected)))
                .await?
            {
                Ok(()) => {
                    log::info!("flashcard {} archived={}", card_id, archived);
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(StoreError::Backend(e)) => return Err(FlashcardError::Unavailable(e)),
            }
        }

        Err(FlashcardError::Conflict { attempts })
    }

    /// Per-owner counts by status, plus due and archived counts.
    pub async fn stats(&self, owner_id: Uuid, as_of: DateTime<Utc>) -> Result<ReviewStats> {
        let cards = self
            .bounded(self.store.list_by_owner(owner_id))
            .await?
            .map_err(|e| FlashcardError::Unavailable(e.to_string()))?;

        let mut stats = ReviewStats::default();
        stats.total_cards = cards.len();

        for card in &cards {
            if card.archived {
                stats.archived_cards += 1;
                continue;
            }
            match card.status {
                CardStatus::New => stats.new_cards += 1,
                CardStatus::Learning => stats.learning_cards += 1,
                CardStatus::Review => stats.review_cards += 1,
                CardStatus::Mastered => stats.mastered_cards += 1,
            }
            if card.is_due(as_of) {
                stats.due_cards += 1;
            }
        }

        Ok(stats)
    }

    async fn fetch_pair(&self, owner_id: Uuid, question_ref: &str) -> Result<Option<Flashcard>> {
        self.bounded(self.store.get_by_owner_and_question(owner_id, question_ref))
            .await?
            .map_err(|e| FlashcardError::Unavailable(e.to_string()))
    }

    /// Apply the configured timeout to a store call; the inner store error
    /// is left for the caller to interpret (insert races are not failures).
    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<std::result::Result<T, StoreError>> {
        tokio::time::timeout(self.config.store_timeout(), call)
            .await
            .map_err(|_| FlashcardError::Unavailable("store call timed out".to_string()))
    }
}
