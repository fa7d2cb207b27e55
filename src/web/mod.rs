//! HTTP gateway: routing, DTOs, auth extraction, error mapping, fan-out.

pub mod auth;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod feedback;
pub mod maps;
pub mod pois;
pub mod rate_limit;
pub mod routes;
pub mod sessions;
pub mod users;
pub mod ws;

pub use routes::create_router;
