//! SM-2 Spaced Repetition Algorithm
//!
//! Pure scheduling engine: maps (current card state, review quality) to the
//! next card state. Performs no I/O and reads no clock — the review instant
//! is injected — so identical inputs always produce identical outputs.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but upon seeing answer, remembered
//! - 2: Incorrect, but answer seemed easy to recall
//! - 3: Correct response with serious difficulty
//! - 4: Correct response after hesitation
//! - 5: Perfect response with no hesitation
//!
//! Ratings below 3 are lapses and reset progress; 3 and above are passes.

use chrono::{DateTime, Duration, Utc};

use crate::config::SchedulerConfig;

use super::error::{FlashcardError, Result};
use super::models::{CardStatus, Flashcard};

/// Minimum ease factor allowed
const MIN_EASE_FACTOR: f32 = 1.3;

/// Lowest quality rating counted as a pass
const PASS_THRESHOLD: i32 = 3;

/// Result of scheduling a single review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub interval: u32,
    pub ease_factor: f32,
    pub repetitions: u32,
    pub status: CardStatus,
    pub passed: bool,
    pub reviewed_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
}

impl ReviewOutcome {
    /// Apply this outcome to a card, producing the next card state.
    /// Does not touch the version stamp; persistence owns that.
    pub fn apply(&self, mut card: Flashcard) -> Flashcard {
        card.interval = self.interval;
        card.ease_factor = self.ease_factor;
        card.repetitions = self.repetitions;
        card.status = self.status;
        if self.passed {
            card.correct_count += 1;
        } else {
            card.incorrect_count += 1;
        }
        card.last_reviewed_at = Some(self.reviewed_at);
        card.next_review_at = self.next_review_at;
        card.updated_at = self.reviewed_at;
        card
    }
}

/// Compute the next review schedule for a card using SM-2.
///
/// # Arguments
/// * `card` - Current card state
/// * `quality` - Quality rating (0-5); out-of-range values are rejected
/// * `now` - The review instant
/// * `config` - Mastery promotion thresholds
pub fn schedule(
    card: &Flashcard,
    quality: i32,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Result<ReviewOutcome> {
    validate_quality(quality)?;

    let passed = quality >= PASS_THRESHOLD;
    let interval = next_interval(card, quality);

    let (repetitions, ease_factor, status) = if passed {
        let repetitions = card.repetitions + 1;

        // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored.
        // The new interval above is computed with the old ease factor.
        let q = (5 - quality) as f32;
        let ease_factor = (card.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR);

        (repetitions, ease_factor, promote(card.status, repetitions, interval, config))
    } else {
        // Lapse: progress resets, ease factor is left as-is, and the card
        // drops back to learning even from review/mastered.
        (0, card.ease_factor, CardStatus::Learning)
    };

    Ok(ReviewOutcome {
        interval,
        ease_factor,
        repetitions,
        status,
        passed,
        reviewed_at: now,
        next_review_at: now + Duration::days(interval as i64),
    })
}

/// Interval (days) a given quality rating would produce. Shared with
/// [`preview_intervals`]; independent of the review instant.
fn next_interval(card: &Flashcard, quality: i32) -> u32 {
    if quality < PASS_THRESHOLD {
        return 1;
    }
    match card.repetitions + 1 {
        1 => 1,
        2 => 6,
        _ => ((card.interval as f32 * card.ease_factor).round() as u32).max(1),
    }
}

/// Status transition on a pass. Never regresses: `review` and `mastered`
/// cards keep at least their current standing.
fn promote(current: CardStatus, repetitions: u32, interval: u32, config: &SchedulerConfig) -> CardStatus {
    let status = match current {
        CardStatus::New | CardStatus::Learning if repetitions >= 2 => CardStatus::Review,
        s => s,
    };
    if status == CardStatus::Review
        && interval >= config.mastery_interval_days
        && repetitions >= config.mastery_repetitions
    {
        CardStatus::Mastered
    } else {
        status
    }
}

fn validate_quality(quality: i32) -> Result<()> {
    if !(0..=5).contains(&quality) {
        return Err(FlashcardError::InvalidInput(format!(
            "quality must be between 0 and 5, got {}",
            quality
        )));
    }
    Ok(())
}

/// Calculate the interval each quality rating (0-5) would give.
/// Used to show learners what each rating means before they answer.
pub fn preview_intervals(card: &Flashcard) -> [u32; 6] {
    let mut intervals = [0u32; 6];
    for (quality, slot) in intervals.iter_mut().enumerate() {
        *slot = next_interval(card, quality as i32);
    }
    intervals
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: u32) -> String {
    if days == 0 {
        "now".to_string()
    } else if days == 1 {
        "1d".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        let weeks = days / 7;
        if weeks == 1 {
            "1w".to_string()
        } else {
            format!("{}w", weeks)
        }
    } else if days < 365 {
        let months = days / 30;
        if months == 1 {
            "1mo".to_string()
        } else {
            format!("{}mo", months)
        }
    } else {
        let years = days / 365;
        if years == 1 {
            "1y".to_string()
        } else {
            format!("{}y", years)
        }
    }
}
