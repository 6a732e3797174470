use anyhow::{bail, Result};
use chrono::Utc;
use uuid::Uuid;

use mneme_lib::flashcards::{
    algorithm, CardSnapshot, CardSource, CardStatus, Difficulty, Flashcard,
};

use crate::app::App;
use crate::OutputFormat;

fn print_card(card: &Flashcard, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(card)?),
        OutputFormat::Plain => {
            println!("{}  [{}]  {}", card.id, card.status.as_str(), card.front);
            println!(
                "  interval {}  reps {}  ease {:.2}  due {}",
                algorithm::format_interval(card.interval),
                card.repetitions,
                card.ease_factor,
                card.next_review_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn add(
    app: &App,
    owner: Uuid,
    question: String,
    front: String,
    back: String,
    explanation: Option<String>,
    category: String,
    tags: Option<String>,
    difficulty: Option<String>,
    source: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let difficulty = match difficulty.as_deref() {
        Some(value) => match Difficulty::parse(value) {
            Some(d) => d,
            None => bail!("Unknown difficulty '{}' (easy, medium, hard)", value),
        },
        None => Difficulty::default(),
    };
    let source = match source.as_deref() {
        Some(value) => match CardSource::parse(value) {
            Some(s) => s,
            None => bail!("Unknown source '{}' (wrong_answer, manual, bookmark)", value),
        },
        None => CardSource::Manual,
    };
    let tags = tags
        .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let snapshot = CardSnapshot {
        front,
        back,
        explanation,
        category,
        tags,
        difficulty,
    };
    let card = app
        .lifecycle
        .create_or_get(owner, question, snapshot, source, Utc::now())
        .await?;
    print_card(&card, format)
}

pub async fn review(
    app: &App,
    card_id: Uuid,
    owner: Uuid,
    quality: i32,
    format: &OutputFormat,
) -> Result<()> {
    let card = app.session.review(card_id, owner, quality, Utc::now()).await?;
    print_card(&card, format)
}

pub async fn due(
    app: &App,
    owner: Uuid,
    limit: usize,
    include_mastered: bool,
    format: &OutputFormat,
) -> Result<()> {
    let exclude: &[CardStatus] = if include_mastered {
        &[]
    } else {
        &[CardStatus::Mastered]
    };
    let cards = app.queue.due_cards(owner, Utc::now(), limit, exclude).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cards)?),
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("No cards due.");
                return Ok(());
            }
            for card in &cards {
                print_card(card, format)?;
            }
        }
    }
    Ok(())
}

pub async fn set_archived(
    app: &App,
    card_id: Uuid,
    owner: Uuid,
    archived: bool,
    format: &OutputFormat,
) -> Result<()> {
    let card = if archived {
        app.lifecycle.archive(card_id, owner, Utc::now()).await?
    } else {
        app.lifecycle.unarchive(card_id, owner, Utc::now()).await?
    };
    print_card(&card, format)
}

pub async fn stats(app: &App, owner: Uuid, format: &OutputFormat) -> Result<()> {
    let stats = app.lifecycle.stats(owner, Utc::now()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => {
            println!("total     {}", stats.total_cards);
            println!("new       {}", stats.new_cards);
            println!("learning  {}", stats.learning_cards);
            println!("review    {}", stats.review_cards);
            println!("mastered  {}", stats.mastered_cards);
            println!("archived  {}", stats.archived_cards);
            println!("due now   {}", stats.due_cards);
        }
    }
    Ok(())
}
