//! Forgetting-curve retention scheduling.
//!
//! Each `(user, item)` pair owns a [`RetentionProfile`]. Every review refits
//! the item's personalized forgetting curve and picks the next review offset:
//!
//! - successful recall: the interval grows along the personalized schedule
//! - failed recall: the interval shrinks, never past the last successful one

pub mod curve;
pub mod scheduler;

pub use curve::{ForgettingCurve, ReviewRecord, next_review_schedule, personalized_forgetting_curve};
pub use scheduler::{RetentionProfile, RetentionScheduler, ReviewPlan};
