//! Core types and error definitions for the duelchat service.
//!
//! This crate provides the foundational types shared across all duelchat
//! crates: error handling, conversation turns and transcripts, persona
//! definitions, and the structured chat reply.
//!
//! # Main types
//!
//! - [`DuelchatError`] — Unified error enum for all duelchat subsystems.
//! - [`DuelchatResult`] — Convenience alias for `Result<T, DuelchatError>`.
//! - [`Role`] / [`Turn`] / [`Transcript`] — One session's conversation log.
//! - [`Persona`] / [`PersonaCatalog`] — Immutable character definitions.
//! - [`ChatReply`] — A character's `{speech, emotion}` reply.

pub mod catalog;
pub mod error;
pub mod persona;
pub mod reply;
pub mod turn;

pub use catalog::PersonaCatalog;
pub use error::{DuelchatError, DuelchatResult};
pub use persona::{Persona, SpeechExample};
pub use reply::ChatReply;
pub use turn::{Role, Transcript, Turn};
