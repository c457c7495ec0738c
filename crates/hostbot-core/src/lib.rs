//! Core of the host administration bot.
//!
//! Framework-agnostic: Telegram, Docker, systemd, apt and the metric sampler
//! live behind ports implemented in adapter crates.

pub mod alerting;
pub mod callback;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod host;
pub mod logging;
pub mod messaging;
pub mod security;
pub mod telemetry;
pub mod views;

pub use errors::{Error, Result};
