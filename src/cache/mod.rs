//! In-memory ephemeral state: presence, POI participation, rate counters.
//!
//! Durable rows are the truth on identity; these caches are the truth on
//! who is *currently* here. A process restart loses them by design — the
//! cleanup sweep and client re-attach repair the difference.

mod counters;
mod participation;
mod presence;

pub use counters::{RateCounters, WindowSnapshot};
pub use participation::{JoinOutcome, ParticipationCache};
pub use presence::{PresenceCache, PresenceRecord};
