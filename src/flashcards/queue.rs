//! Due-queue selection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::SchedulerConfig;

use super::error::{FlashcardError, Result};
use super::models::{CardStatus, Flashcard};
use super::store::FlashcardStore;

/// Read-only selector over the cards whose scheduled review time has
/// arrived. Safe to call concurrently and repeatedly; never mutates state.
pub struct DueQueue {
    store: Arc<dyn FlashcardStore>,
    config: SchedulerConfig,
}

impl DueQueue {
    pub fn new(store: Arc<dyn FlashcardStore>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Cards for `owner_id` due at or before `as_of`, most overdue first.
    ///
    /// Ties on `next_review_at` are broken by `created_at`, then by `id`,
    /// so repeated calls over unchanged data return the same sequence and
    /// pagination is reproducible. Archived cards are excluded regardless
    /// of `exclude_statuses`; default study sessions additionally pass
    /// `[CardStatus::Mastered]` here.
    pub async fn due_cards(
        &self,
        owner_id: Uuid,
        as_of: DateTime<Utc>,
        limit: usize,
        exclude_statuses: &[CardStatus],
    ) -> Result<Vec<Flashcard>> {
        let query = self
            .store
            .query_due(owner_id, as_of, limit, exclude_statuses);
        let mut cards = tokio::time::timeout(self.config.store_timeout(), query)
            .await
            .map_err(|_| FlashcardError::Unavailable("due query timed out".to_string()))?
            .map_err(|e| FlashcardError::Unavailable(e.to_string()))?;

        // The store contract already orders results; re-sorting pins the
        // total order even for backends with weaker ordering guarantees.
        cards.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        cards.truncate(limit);

        log::debug!("due queue for {}: {} cards as of {}", owner_id, cards.len(), as_of);
        Ok(cards)
    }
}
