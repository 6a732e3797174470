//! Data models for the flashcard system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ease factor assigned to newly created cards (SM-2 default).
pub const DEFAULT_EASE_FACTOR: f32 = 2.5;

/// Where a card is in the learning process.
///
/// Derived by the scheduler engine on each review; never set directly by
/// callers after creation. `Mastered` additionally requires the configured
/// interval and repetition thresholds to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardStatus {
    /// Never passed a review
    New,
    /// In initial learning, or demoted by a lapse
    Learning,
    /// Regular spaced review
    Review,
    /// Long-interval card; excluded from default study sessions
    Mastered,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::New
    }
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Mastered => "mastered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "review" => Some(Self::Review),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }
}

/// Informational difficulty grade. Does not affect scheduling math; used
/// for UI sorting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Medium
    }
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// How the card entered the system. Immutable provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardSource {
    /// Created automatically after the learner answered the question wrong
    WrongAnswer,
    /// Added explicitly by the learner
    Manual,
    /// Added from a bookmarked question
    Bookmark,
}

impl Default for CardSource {
    fn default() -> Self {
        Self::Manual
    }
}

impl CardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WrongAnswer => "wrong_answer",
            Self::Manual => "manual",
            Self::Bookmark => "bookmark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wrong_answer" => Some(Self::WrongAnswer),
            "manual" => Some(Self::Manual),
            "bookmark" => Some(Self::Bookmark),
            _ => None,
        }
    }
}

/// Display text and classification handed over by the question bank at
/// creation time. The card keeps this snapshot even if the live question
/// later changes — a deliberate content freeze.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

/// A flashcard: the unit of scheduling, one per learner/question pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: Uuid,
    /// The learner; immutable after creation
    pub owner_id: Uuid,
    /// Opaque reference into the question bank; immutable
    pub question_ref: String,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub status: CardStatus,
    /// Soft-archival flag, outside the status set. Archived cards never
    /// appear in due queues but keep their review history.
    #[serde(default)]
    pub archived: bool,
    /// Days until the next scheduled review, >= 1
    pub interval: u32,
    /// Consecutive passes since the last lapse
    #[serde(default)]
    pub repetitions: u32,
    /// SM-2 ease factor, >= 1.3
    pub ease_factor: f32,
    /// Lifetime count of passed reviews
    #[serde(default)]
    pub correct_count: u32,
    /// Lifetime count of lapsed reviews
    #[serde(default)]
    pub incorrect_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// Always present; equals `created_at` until the first review
    pub next_review_at: DateTime<Utc>,
    /// Optimistic-concurrency stamp, incremented on every persisted write
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub source: CardSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flashcard {
    /// Create a new card in its initial state: status `new`, immediately
    /// due, version 0.
    pub fn new(
        owner_id: Uuid,
        question_ref: String,
        snapshot: CardSnapshot,
        source: CardSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            question_ref,
            front: snapshot.front,
            back: snapshot.back,
            explanation: snapshot.explanation,
            category: snapshot.category,
            tags: snapshot.tags,
            difficulty: snapshot.difficulty,
            status: CardStatus::New,
            archived: false,
            interval: 1,
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            correct_count: 0,
            incorrect_count: 0,
            last_reviewed_at: None,
            next_review_at: now,
            version: 0,
            source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the card is due at the given instant.
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.next_review_at <= as_of
    }
}

/// Per-owner review statistics. Status buckets count active cards only;
/// archived cards are reported separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub mastered_cards: usize,
    pub archived_cards: usize,
    pub due_cards: usize,
}
