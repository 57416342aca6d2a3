//! Sync orchestration and cache service for playcache
//!
//! This crate is the heart of playcache, containing:
//! - The sync engine (one pass at a time, per-kind isolation)
//! - Sync triggers: periodic timer, connectivity transitions, fast path
//! - Widget notification after writes
//! - The composite leaderboard score
//! - `CacheService`, the context object the app talks to
//! - Socket commands applied to the cache service

mod commands;
mod engine;
mod events;
mod notifier;
mod scheduler;
mod scoring;
mod service;

pub use commands::*;
pub use engine::*;
pub use events::*;
pub use notifier::*;
pub use scheduler::*;
pub use scoring::*;
pub use service::*;
