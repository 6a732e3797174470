//! In-memory flashcard store.
//!
//! Reference implementation of the store contract, including the
//! compare-and-set semantics of `put_conditional`. Used throughout the
//! service-layer tests and for ephemeral demo servers.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::flashcards::models::{CardStatus, Flashcard};
use crate::flashcards::store::{FlashcardStore, Result, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    cards: Mutex<HashMap<Uuid, Flashcard>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// The mutex is only held for map access, never across an await point.
#[async_trait]
impl FlashcardStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Flashcard>> {
        let cards = self.cards.lock().unwrap();
        Ok(cards.get(&id).cloned())
    }

    async fn get_by_owner_and_question(
        &self,
        owner_id: Uuid,
        question_ref: &str,
    ) -> Result<Option<Flashcard>> {
        let cards = self.cards.lock().unwrap();
        Ok(cards
            .values()
            .find(|c| c.owner_id == owner_id && c.question_ref == question_ref)
            .cloned())
    }

    async fn put_conditional(&self, card: &Flashcard, expected_version: Option<u64>) -> Result<()> {
        let mut cards = self.cards.lock().unwrap();

        match expected_version {
            None => {
                let pair_taken = cards
                    .values()
                    .any(|c| c.owner_id == card.owner_id && c.question_ref == card.question_ref);
                if pair_taken || cards.contains_key(&card.id) {
                    return Err(StoreError::VersionConflict { card_id: card.id });
                }
            }
            Some(expected) => match cards.get(&card.id) {
                Some(stored) if stored.version == expected => {}
                _ => return Err(StoreError::VersionConflict { card_id: card.id }),
            },
        }

        cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn query_due(
        &self,
        owner_id: Uuid,
        as_of: DateTime<Utc>,
        limit: usize,
        exclude_statuses: &[CardStatus],
    ) -> Result<Vec<Flashcard>> {
        let cards = self.cards.lock().unwrap();

        let mut due: Vec<Flashcard> = cards
            .values()
            .filter(|c| {
                c.owner_id == owner_id
                    && !c.archived
                    && c.next_review_at <= as_of
                    && !exclude_statuses.contains(&c.status)
            })
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Flashcard>> {
        let cards = self.cards.lock().unwrap();
        let mut owned: Vec<Flashcard> = cards
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::{CardSnapshot, CardSource, Difficulty};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn card(owner: Uuid, question: &str) -> Flashcard {
        let snapshot = CardSnapshot {
            front: "front".to_string(),
            back: "back".to_string(),
            explanation: None,
            category: "general".to_string(),
            tags: Vec::new(),
            difficulty: Difficulty::Medium,
        };
        Flashcard::new(owner, question.to_string(), snapshot, CardSource::Manual, fixed_now())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let c = card(owner, "q-1");

        store.put_conditional(&c, None).await.unwrap();
        assert_eq!(store.get(c.id).await.unwrap().unwrap().id, c.id);
        assert_eq!(
            store
                .get_by_owner_and_question(owner, "q-1")
                .await
                .unwrap()
                .unwrap()
                .id,
            c.id
        );
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_pair_insert_conflicts() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        store.put_conditional(&card(owner, "q-1"), None).await.unwrap();
        let err = store.put_conditional(&card(owner, "q-1"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_conditional_update_checks_version() {
        let store = MemoryStore::new();
        let c = card(Uuid::new_v4(), "q-1");
        store.put_conditional(&c, None).await.unwrap();

        let mut updated = c.clone();
        updated.repetitions = 1;
        updated.version = 1;
        store.put_conditional(&updated, Some(0)).await.unwrap();

        // A second write against the stale version is rejected.
        let err = store.put_conditional(&updated, Some(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        assert_eq!(store.get(c.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_update_of_missing_card_conflicts() {
        let store = MemoryStore::new();
        let c = card(Uuid::new_v4(), "q-1");
        let err = store.put_conditional(&c, Some(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }
}
