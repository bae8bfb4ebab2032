//! Adaptive difficulty.
//!
//! Each `(user, activity)` pair owns a bounded rolling history of scored
//! attempts and a current [`DifficultyTier`]. Tiers only move through the
//! hysteresis table in [`policy`]; there is no way to write a tier directly.
//!
//! ```text
//!            avg > easy_to_medium && trend >= 0
//!   ┌──────┐ ─────────────────────────────────► ┌────────┐ ──avg > medium_to_hard──► ┌──────┐
//!   │ EASY │                                    │ MEDIUM │       && trend >= 0       │ HARD │
//!   └──────┘ ◄───────────────────────────────── └────────┘ ◄───────────────────────── └──────┘
//!            avg < medium_to_easy || declining              avg < hard_to_medium
//!                                                           || declining
//! ```

pub mod engine;
pub mod history;
pub mod policy;

pub use engine::{AdaptiveDifficultyEngine, DifficultyDecision, DifficultyKey};
pub use history::{PerformanceRecord, RollingHistory};
pub use policy::{DifficultyTier, HistoryStats, predict_score, recommend_difficulty, trend};
