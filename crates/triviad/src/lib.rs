//! Triviad - trivia question daemon.
//!
//! Thin HTTP surface over the `trivia_common` acquisition pipeline:
//! config loading, collaborator wiring, and two routes.

pub mod config;
pub mod routes;
pub mod server;
