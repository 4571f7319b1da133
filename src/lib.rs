//! Storyforge - AI generation chain runner
//!
//! This library crate exposes the CLI building blocks for integration testing.

pub mod config;
pub mod confirm;
pub mod report;
pub mod runner;
