//! Shared types and infrastructure for Webmatch services
//!
//! Provides the common error type, data-folder/configuration resolution,
//! and the EventBus used for SSE broadcasting.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
