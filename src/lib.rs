//! Learner mastery and progress tracking engine.
//!
//! Turns raw answer events into per-word mastery scores across four skill
//! dimensions, maintains streaks, study sessions, aggregate scores and
//! achievement unlocks, and keeps the result durable across a remote keyed
//! store with an on-device fallback.

pub mod achievements;
pub mod config;
pub mod logging;
pub mod manager;
pub mod mastery;
pub mod models;
pub mod session;
pub mod store;

pub use manager::ProgressManager;
pub use models::{ActivityType, UserProgress, WordKnowledge};
pub use store::{ProgressSnapshot, ProgressStore, Scope};
