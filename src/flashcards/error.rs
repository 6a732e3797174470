//! Caller-facing error taxonomy for the flashcard services.

use thiserror::Error;

/// Errors surfaced by the review, queue, and lifecycle services.
///
/// The scheduler engine itself performs no I/O and can only produce
/// `InvalidInput`; everything store-related originates in the services and
/// is returned as a typed result, never as a silent default.
#[derive(Error, Debug)]
pub enum FlashcardError {
    /// Malformed caller input (e.g. a quality rating outside 0–5).
    /// Never retried; surfaced immediately.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Card absent, or owned by a different learner. Owner mismatch is
    /// reported as not-found so the API does not leak card existence.
    #[error("flashcard not found")]
    NotFound,

    /// Optimistic-concurrency version mismatch that survived the bounded
    /// retry loop. The caller may resubmit.
    #[error("review conflicted with a concurrent update after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// The store timed out or failed. Safe to retry the whole request:
    /// the version check makes the operation idempotent.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, FlashcardError>;
