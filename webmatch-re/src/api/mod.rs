//! HTTP API handlers for webmatch-re
//!
//! REST endpoints for single-record resolution, batch jobs, settings, and
//! health, plus an SSE stream of job progress events.

pub mod health;
pub mod jobs;
pub mod resolve;
pub mod settings;
pub mod sse;

pub use health::health_routes;
pub use jobs::job_routes;
pub use resolve::resolve_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
