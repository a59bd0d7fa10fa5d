//! Forwarding engine for relaying a Telegram chat's history into another chat.
//!
//! This crate is framework-agnostic. The messaging service lives behind ports
//! (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod job;
pub mod logging;
pub mod messaging;
pub mod pacing;
pub mod security;
pub mod source;
pub mod transport;

pub use errors::{Error, Result};
