//! Core pipeline for the domain expiry watcher.
//!
//! This crate is intentionally framework-agnostic. The DNS host, WHOIS/RDAP lookups and
//! the chat transport live behind ports (traits) implemented in adapter crates.

pub mod accounts;
pub mod callback;
pub mod checker;
pub mod collector;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod expiry;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod queue;
pub mod scheduler;
pub mod security;
pub mod tasks;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
