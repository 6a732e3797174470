//! Mneme — spaced repetition scheduling for question-bank flashcards.
//!
//! The library is organized around a pure SM-2 scheduler engine
//! ([`flashcards::algorithm`]) and a small set of services that move
//! flashcards through their lifecycle against a pluggable store:
//! creation and archival ([`flashcards::lifecycle`]), review submission
//! with optimistic concurrency ([`flashcards::session`]), and due-queue
//! selection ([`flashcards::queue`]). Storage backends live in [`store`];
//! the HTTP API in [`server`].

pub mod config;
pub mod flashcards;
pub mod server;
pub mod store;
