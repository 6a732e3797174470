use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use mneme_lib::config::{default_data_dir, SchedulerConfig};
use mneme_lib::flashcards::{CardLifecycle, DueQueue, FlashcardStore, ReviewSession};
use mneme_lib::store::SqliteStore;

/// Shared application state for CLI commands
pub struct App {
    pub config: SchedulerConfig,
    pub store: Arc<dyn FlashcardStore>,
    pub lifecycle: CardLifecycle,
    pub session: ReviewSession,
    pub queue: DueQueue,
}

impl App {
    /// Initialize from the default data directory (or an explicit override).
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir().context("Failed to get data directory")?,
        };

        let config = SchedulerConfig::load_or_default(&data_dir)
            .context("Failed to load configuration")?;

        let store: Arc<dyn FlashcardStore> = Arc::new(
            SqliteStore::new(data_dir.join("flashcards.db"))
                .context("Failed to open flashcard store")?,
        );

        Ok(Self {
            lifecycle: CardLifecycle::new(store.clone(), config.clone()),
            session: ReviewSession::new(store.clone(), config.clone()),
            queue: DueQueue::new(store.clone(), config.clone()),
            store,
            config,
        })
    }
}
