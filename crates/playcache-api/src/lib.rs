//! Record model shared by every playcache crate
//!
//! This crate defines:
//! - Record kinds and their strongly typed payloads
//! - The sync record wrapper and its sync state
//! - The upserted profile record
//! - Envelopes pushed to the widget layer
//! - Cache inspection summaries
//! - The playcached socket protocol (requests, responses)

mod commands;
mod events;
mod payloads;
mod types;

pub use commands::*;
pub use events::*;
pub use payloads::*;
pub use types::*;
