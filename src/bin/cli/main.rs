mod app;
mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use mneme_lib::server::{self, ApiState};

#[derive(Parser)]
#[command(name = "mneme-cli", about = "Mneme flashcard scheduler CLI", version)]
struct Cli {
    /// Use a specific data directory (default: platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Add a flashcard for a learner (idempotent per learner/question)
    Add {
        /// Learner id
        owner: Uuid,
        /// Question reference in the question bank
        question: String,
        /// Front (question) text
        front: String,
        /// Back (answer) text
        back: String,
        /// Optional explanation text
        #[arg(long)]
        explanation: Option<String>,
        /// Category label
        #[arg(long, default_value = "general")]
        category: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Difficulty: easy, medium, hard
        #[arg(long)]
        difficulty: Option<String>,
        /// Provenance: wrong_answer, manual, bookmark
        #[arg(long)]
        source: Option<String>,
    },

    /// Submit a review for a card
    Review {
        /// Card id
        card: Uuid,
        /// Learner id
        owner: Uuid,
        /// Quality of recall, 0-5 (below 3 is a lapse)
        quality: i32,
    },

    /// List cards due for review
    Due {
        /// Learner id
        owner: Uuid,
        /// Maximum results
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Include mastered cards
        #[arg(long)]
        include_mastered: bool,
    },

    /// Archive a card (kept, but excluded from due queues)
    Archive {
        /// Card id
        card: Uuid,
        /// Learner id
        owner: Uuid,
    },

    /// Return an archived card to active study
    Unarchive {
        /// Card id
        card: Uuid,
        /// Learner id
        owner: Uuid,
    },

    /// Show review statistics for a learner
    Stats {
        /// Learner id
        owner: Uuid,
    },

    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:7151")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let app = app::App::new(cli.data_dir.clone())?;

    match cli.command {
        Command::Add {
            owner,
            question,
            front,
            back,
            explanation,
            category,
            tags,
            difficulty,
            source,
        } => {
            commands::add(
                &app, owner, question, front, back, explanation, category, tags, difficulty,
                source, &cli.format,
            )
            .await?;
        }
        Command::Review { card, owner, quality } => {
            commands::review(&app, card, owner, quality, &cli.format).await?;
        }
        Command::Due {
            owner,
            limit,
            include_mastered,
        } => {
            commands::due(&app, owner, limit, include_mastered, &cli.format).await?;
        }
        Command::Archive { card, owner } => {
            commands::set_archived(&app, card, owner, true, &cli.format).await?;
        }
        Command::Unarchive { card, owner } => {
            commands::set_archived(&app, card, owner, false, &cli.format).await?;
        }
        Command::Stats { owner } => {
            commands::stats(&app, owner, &cli.format).await?;
        }
        Command::Serve { addr } => {
            let state = ApiState::new(app.store.clone(), app.config.clone());
            server::serve(addr, state).await?;
        }
    }

    Ok(())
}
