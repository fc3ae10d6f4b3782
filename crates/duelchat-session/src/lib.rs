//! Concurrent session registry for the duelchat service.
//!
//! [`SessionStore`] owns every live session: creation, lookup, explicit
//! removal, and time-based eviction. A coarse lock protects the registry map
//! itself; a per-session async lock serializes transitions (and eviction)
//! for one session id, so distinct sessions run fully in parallel while one
//! session's transcript can never interleave.

pub mod session;
pub mod store;

pub use session::{SessionHandle, SessionInfo};
pub use store::{SessionStore, StoreConfig};
