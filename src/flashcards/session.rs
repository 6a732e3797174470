//! Review session orchestration.
//!
//! A review is one logical read-modify-write: fetch the card, run the
//! scheduler engine, persist the result conditioned on the version that was
//! read. Concurrent submissions for the same card (duplicate network
//! retries, multiple devices) lose the conditional write and are re-fetched
//! and re-attempted up to a bounded retry count. A failed review leaves the
//! stored card untouched — the only mutation is the single conditional
//! write, so caller cancellation can never apply a partial state change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::SchedulerConfig;

use super::algorithm;
use super::error::{FlashcardError, Result};
use super::models::Flashcard;
use super::store::{FlashcardStore, StoreError};

pub struct ReviewSession {
    store: Arc<dyn FlashcardStore>,
    config: SchedulerConfig,
}

impl ReviewSession {
    pub fn new(store: Arc<dyn FlashcardStore>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Submit a review and return the updated card.
    ///
    /// This is the only write path for scheduling fields. A card that is
    /// absent — or owned by someone else — is reported as `NotFound`;
    /// ownership failures are indistinguishable from absence by design.
    pub async fn review(
        &self,
        card_id: Uuid,
        owner_id: Uuid,
        quality: i32,
        now: DateTime<Utc>,
    ) -> Result<Flashcard> {
        let attempts = self.config.max_review_retries + 1;

        for attempt in 1..=attempts {
            let card = self
                .bounded(self.store.get(card_id), "fetch")
                .await?
                .filter(|c| c.owner_id == owner_id)
                .ok_or(FlashcardError::NotFound)?;

            let outcome = algorithm::schedule(&card, quality, now, &self.config)?;
            let expected = card.version;
            let mut updated = outcome.apply(card);
            updated.version = expected + 1;

            match self
                .bounded(self.store.put_conditional(&updated, Some(expected)), "persist")
                .await
            {
                Ok(()) => {
                    log::debug!(
                        "review applied: card {} quality {} -> interval {}d status {:?} (version {})",
                        card_id,
                        quality,
                        updated.interval,
                        updated.status,
                        updated.version
                    );
                    return Ok(updated);
                }
                Err(FlashcardError::Conflict { .. }) => {
                    log::debug!(
                        "review conflict on card {} (attempt {}/{}), re-fetching",
                        card_id,
                        attempt,
                        attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        log::warn!("review on card {} conflicted {} times, giving up", card_id, attempts);
        Err(FlashcardError::Conflict { attempts })
    }

    /// Run a store call under the configured timeout, mapping store
    /// failures into the caller-facing taxonomy.
    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = std::result::Result<T, StoreError>>,
        what: &str,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout(), call).await {
            Err(_) => Err(FlashcardError::Unavailable(format!("store {} timed out", what))),
            Ok(Err(StoreError::VersionConflict { .. })) => {
                Err(FlashcardError::Conflict { attempts: 1 })
            }
            Ok(Err(StoreError::Backend(e))) => Err(FlashcardError::Unavailable(e)),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::{CardSnapshot, CardSource, CardStatus, Difficulty};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn snapshot() -> CardSnapshot {
        CardSnapshot {
            front: "front".to_string(),
            back: "back".to_string(),
            explanation: None,
            category: "general".to_string(),
            tags: Vec::new(),
            difficulty: Difficulty::Medium,
        }
    }

    async fn seed(store: &MemoryStore, owner: Uuid) -> Flashcard {
        let card = Flashcard::new(owner, "q-1".to_string(), snapshot(), CardSource::Manual, fixed_now());
        store.put_conditional(&card, None).await.unwrap();
        card
    }

    /// Store wrapper that fails the first N conditional writes with a
    /// version conflict, then delegates.
    struct ConflictingStore {
        inner: MemoryStore,
        remaining_conflicts: AtomicU32,
    }

    impl ConflictingStore {
        fn new(conflicts: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                remaining_conflicts: AtomicU32::new(conflicts),
            }
        }
    }

    #[async_trait]
    impl FlashcardStore for ConflictingStore {
        async fn get(&self, id: Uuid) -> std::result::Result<Option<Flashcard>, StoreError> {
            self.inner.get(id).await
        }

        async fn get_by_owner_and_question(
            &self,
            owner_id: Uuid,
            question_ref: &str,
        ) -> std::result::Result<Option<Flashcard>, StoreError> {
            self.inner.get_by_owner_and_question(owner_id, question_ref).await
        }

        async fn put_conditional(
            &self,
            card: &Flashcard,
            expected_version: Option<u64>,
        ) -> std::result::Result<(), StoreError> {
            if self
                .remaining_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::VersionConflict { card_id: card.id });
            }
            self.inner.put_conditional(card, expected_version).await
        }

        async fn query_due(
            &self,
            owner_id: Uuid,
            as_of: DateTime<Utc>,
            limit: usize,
            exclude_statuses: &[CardStatus],
        ) -> std::result::Result<Vec<Flashcard>, StoreError> {
            self.inner.query_due(owner_id, as_of, limit, exclude_statuses).await
        }

        async fn list_by_owner(&self, owner_id: Uuid) -> std::result::Result<Vec<Flashcard>, StoreError> {
            self.inner.list_by_owner(owner_id).await
        }
    }

    /// Store whose reads hang long enough to trip the configured timeout.
    struct SlowStore;

    #[async_trait]
    impl FlashcardStore for SlowStore {
        async fn get(&self, _id: Uuid) -> std::result::Result<Option<Flashcard>, StoreError> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(None)
        }

        async fn get_by_owner_and_question(
            &self,
            _owner_id: Uuid,
            _question_ref: &str,
        ) -> std::result::Result<Option<Flashcard>, StoreError> {
            Ok(None)
        }

        async fn put_conditional(
            &self,
            _card: &Flashcard,
            _expected_version: Option<u64>,
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn query_due(
            &self,
            _owner_id: Uuid,
            _as_of: DateTime<Utc>,
            _limit: usize,
            _exclude_statuses: &[CardStatus],
        ) -> std::result::Result<Vec<Flashcard>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_by_owner(&self, _owner_id: Uuid) -> std::result::Result<Vec<Flashcard>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_review_happy_path() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let card = seed(&store, owner).await;

        let session = ReviewSession::new(store.clone(), SchedulerConfig::default());
        let updated = session.review(card.id, owner, 4, fixed_now()).await.unwrap();

        assert_eq!(updated.repetitions, 1);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.last_reviewed_at, Some(fixed_now()));

        // The stored card matches what was returned.
        let stored = store.get(card.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.repetitions, 1);
    }

    #[tokio::test]
    async fn test_unknown_card_is_not_found() {
        let session = ReviewSession::new(Arc::new(MemoryStore::new()), SchedulerConfig::default());
        let err = session
            .review(Uuid::new_v4(), Uuid::new_v4(), 4, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::NotFound));
    }

    #[tokio::test]
    async fn test_owner_mismatch_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let card = seed(&store, Uuid::new_v4()).await;

        let session = ReviewSession::new(store.clone(), SchedulerConfig::default());
        let err = session
            .review(card.id, Uuid::new_v4(), 4, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::NotFound));

        // Prior state fully intact.
        let stored = store.get(card.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 0);
        assert_eq!(stored.repetitions, 0);
    }

    #[tokio::test]
    async fn test_invalid_quality_is_rejected_without_write() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let card = seed(&store, owner).await;

        let session = ReviewSession::new(store.clone(), SchedulerConfig::default());
        let err = session.review(card.id, owner, 9, fixed_now()).await.unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidInput(_)));

        let stored = store.get(card.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_conflict_retries_then_succeeds() {
        let store = Arc::new(ConflictingStore::new(2));
        let owner = Uuid::new_v4();
        let card = seed(&store.inner, owner).await;

        let session = ReviewSession::new(store.clone(), SchedulerConfig::default());
        let updated = session.review(card.id, owner, 4, fixed_now()).await.unwrap();

        // Two conflicted attempts, then one applied write.
        assert_eq!(updated.version, 1);
        assert_eq!(store.remaining_conflicts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conflict_exhausts_bounded_retries() {
        let store = Arc::new(ConflictingStore::new(u32::MAX));
        let owner = Uuid::new_v4();
        let card = seed(&store.inner, owner).await;

        let session = ReviewSession::new(store.clone(), SchedulerConfig::default());
        let err = session.review(card.id, owner, 4, fixed_now()).await.unwrap_err();
        assert!(matches!(err, FlashcardError::Conflict { attempts: 4 }));

        // Nothing was applied.
        let stored = store.inner.get(card.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_stale_version_loses_exactly_once() {
        // Two submissions race from the same starting version. With
        // retries disabled, the store-level CAS admits exactly one.
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let card = seed(&store, owner).await;

        let config = SchedulerConfig {
            max_review_retries: 0,
            ..SchedulerConfig::default()
        };
        let session = ReviewSession::new(store.clone(), config);

        let first = session.review(card.id, owner, 4, fixed_now()).await;
        assert!(first.is_ok());

        // Replay the loser's write directly with the stale version.
        let stale = session.review(card.id, owner, 4, fixed_now()).await.unwrap();
        assert_eq!(stale.version, 2);

        let mut replay = card.clone();
        replay.version = 1;
        let err = store.put_conditional(&replay, Some(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // Exactly two applied updates, never a lost one.
        let stored = store.get(card.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.repetitions, 2);
    }

    #[tokio::test]
    async fn test_store_timeout_surfaces_unavailable() {
        let config = SchedulerConfig {
            store_timeout_ms: 10,
            ..SchedulerConfig::default()
        };
        let session = ReviewSession::new(Arc::new(SlowStore), config);
        let err = session
            .review(Uuid::new_v4(), Uuid::new_v4(), 4, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::Unavailable(_)));
    }
}
