//! Spaced repetition core for question-bank flashcards.
//!
//! This module provides:
//! - The flashcard data model (one card per learner/question pair)
//! - The pure SM-2 scheduling engine
//! - Due-queue selection with a deterministic total order
//! - Review submission with optimistic concurrency
//! - Card lifecycle (idempotent creation, soft archival, stats)

pub mod algorithm;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod queue;
pub mod session;
pub mod store;

pub use error::{FlashcardError, Result};
pub use lifecycle::CardLifecycle;
pub use models::*;
pub use queue::DueQueue;
pub use session::ReviewSession;
pub use store::{FlashcardStore, StoreError};
