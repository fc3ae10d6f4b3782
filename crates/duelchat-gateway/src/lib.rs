//! The duelchat service facade: HTTP/WebSocket boundary over the session
//! store, plus the health check/watch sub-interface.

pub mod health;
pub mod routes;
pub mod server;
pub mod stream;

pub use health::{HealthRegistry, ServingStatus};
pub use server::{AppState, GatewayServer};
