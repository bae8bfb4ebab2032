//! Inbound event types
//!
//! Events arrive as `{type, data}` pairs. The tag set is closed, but unknown
//! tags are carried through as [`EventTag::Unknown`] instead of being rejected.

pub mod payload;
pub mod types;

pub use payload::{PerformanceData, ProfilePayload, ReviewInput, SensoryData, SessionData};
pub use types::{Event, EventResponse, EventTag};
