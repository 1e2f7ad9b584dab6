//! Settings database access
//!
//! Key-value store backing the database tier of configuration. API key
//! changes made through the settings endpoints land here and win over
//! environment variables and the TOML file on next use.

use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use webmatch_common::{Error, Result};

/// Generic setting getter
///
/// Returns None when the key is absent; a present-but-unparseable value
/// is a configuration error, not a silent default.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a setting entirely
pub async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let pool = test_pool().await;
        let value: Option<String> = get_setting(&pool, "places_api_key").await.expect("get");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrips() {
        let pool = test_pool().await;
        set_setting(&pool, "places_api_key", "abc123").await.expect("set");

        let value: Option<String> = get_setting(&pool, "places_api_key").await.expect("get");
        assert_eq!(value.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let pool = test_pool().await;
        set_setting(&pool, "worker_pool_size", 4).await.expect("set");
        set_setting(&pool, "worker_pool_size", 8).await.expect("set");

        let value: Option<u32> = get_setting(&pool, "worker_pool_size").await.expect("get");
        assert_eq!(value, Some(8));
    }

    #[tokio::test]
    async fn test_unparseable_value_is_a_config_error() {
        let pool = test_pool().await;
        set_setting(&pool, "worker_pool_size", "many").await.expect("set");

        let result = get_setting::<u32>(&pool, "worker_pool_size").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_the_key() {
        let pool = test_pool().await;
        set_setting(&pool, "llm_api_key", "secret").await.expect("set");
        delete_setting(&pool, "llm_api_key").await.expect("delete");

        let value: Option<String> = get_setting(&pool, "llm_api_key").await.expect("get");
        assert!(value.is_none());
    }
}
