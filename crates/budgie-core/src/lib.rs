//! Core domain + application logic for the budgie ledger bot.
//!
//! This crate is intentionally transport-agnostic. Telegram lives behind the
//! `MessagingPort` trait implemented in the adapter crate.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;

pub use errors::{Error, Result};
