//! Shared error type for the Webmatch crates
//!
//! Service-facing HTTP errors live in the service crate; this enum covers
//! the failures that cross crate boundaries: storage, filesystem, and
//! configuration resolution.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite/sqlx failure
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or unresolvable configuration (TOML parse, unknown setting key,
    /// unparseable stored value)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant breach with no better home; always a bug
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert_via_question_mark() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/webmatch.toml")?)
        }
        assert!(matches!(read_missing(), Err(Error::Io(_))));
    }

    #[test]
    fn test_display_carries_the_detail_message() {
        let err = Error::Config("unknown setting key: master_password".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown setting key: master_password"
        );
    }
}
