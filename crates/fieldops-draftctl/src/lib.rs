//! Command-line host for field report drafts
//!
//! Loads configuration, opens a `DraftSession` per command and honours the
//! flush-on-dispose contract before exiting.

pub mod cli;
pub mod config;
