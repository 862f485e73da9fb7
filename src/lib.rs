//! Library crate for tale-forge-back, exposing modules for the binaries and integration tests.

pub mod config;
/// Persistence: entities, the store trait, and its backends.
pub mod dao;
/// Wire payloads: platform updates, button payloads, field validation.
pub mod dto;
pub mod error;
/// HTTP routes.
pub mod routes;
/// Authoring operations and background tasks.
pub mod services;
pub mod state;
