//! Domain event infrastructure.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{DomainEvent, ParticipantInfo, PoiPayload};
