//! Configuration resolution for webmatch-re
//!
//! Engine tunables come from the `[engine]` table of `webmatch.toml` in the
//! data folder and fall back to compiled defaults. Adapter API keys resolve
//! with Database → ENV → TOML priority.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{info, warn};
use webmatch_common::{Error, Result};

// ============================================================================
// Engine Tunables
// ============================================================================

/// Knobs that shape a resolution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-adapter timeout in milliseconds
    pub adapter_timeout_ms: u64,
    /// Confidence at or above which a result is `resolved`
    pub resolved_threshold: u8,
    /// Confidence at or above which a result is `low-confidence`
    pub low_confidence_threshold: u8,
    /// Boost applied when two or more sources agree on a domain
    pub consensus_boost: u8,
    /// Concurrent workers draining a batch job
    pub worker_pool_size: usize,
    /// Page fetch timeout in milliseconds
    pub validation_timeout_ms: u64,
    /// LLM judgment timeout in milliseconds
    pub judgment_timeout_ms: u64,
    /// Fold `sub.example.com` candidates into a proposed `example.com` group
    pub merge_subdomains: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: 10_000,
            resolved_threshold: 80,
            low_confidence_threshold: 50,
            consensus_boost: 15,
            worker_pool_size: 4,
            validation_timeout_ms: 10_000,
            judgment_timeout_ms: 30_000,
            merge_subdomains: false,
        }
    }
}

// ============================================================================
// TOML File
// ============================================================================

/// On-disk shape of `webmatch.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceToml {
    pub engine: EngineConfig,
    pub keys: ApiKeys,
}

/// `[keys]` table of the TOML file. Every entry is optional; adapters whose
/// key resolves to nothing are left out of the registry at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub places_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub directory_api_key: Option<String>,
    pub enrichment_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

/// Read `webmatch.toml` from the data folder.
///
/// A missing file yields defaults; a file that exists but does not parse is a
/// startup error.
pub fn load_service_toml(path: &Path) -> Result<ServiceToml> {
    if !path.exists() {
        info!("No TOML config at {}, using defaults", path.display());
        return Ok(ServiceToml::default());
    }
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

// ============================================================================
// API Key Resolution
// ============================================================================

/// All adapter credentials after 3-tier resolution
#[derive(Debug, Clone, Default)]
pub struct AdapterKeys {
    pub places: Option<String>,
    pub search: Option<String>,
    pub directory: Option<String>,
    pub enrichment: Option<String>,
    pub llm: Option<String>,
}

/// Resolve every adapter key with Database → ENV → TOML priority
pub async fn resolve_adapter_keys(db: &Pool<Sqlite>, toml: &ApiKeys) -> Result<AdapterKeys> {
    Ok(AdapterKeys {
        places: resolve_api_key(
            db,
            "places_api_key",
            "WEBMATCH_PLACES_API_KEY",
            toml.places_api_key.as_ref(),
        )
        .await?,
        search: resolve_api_key(
            db,
            "search_api_key",
            "WEBMATCH_SEARCH_API_KEY",
            toml.search_api_key.as_ref(),
        )
        .await?,
        directory: resolve_api_key(
            db,
            "directory_api_key",
            "WEBMATCH_DIRECTORY_API_KEY",
            toml.directory_api_key.as_ref(),
        )
        .await?,
        enrichment: resolve_api_key(
            db,
            "enrichment_api_key",
            "WEBMATCH_ENRICHMENT_API_KEY",
            toml.enrichment_api_key.as_ref(),
        )
        .await?,
        llm: resolve_api_key(db, "llm_api_key", "WEBMATCH_LLM_API_KEY", toml.llm_api_key.as_ref())
            .await?,
    })
}

/// Resolve one API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
///
/// Returns `None` when the key is configured nowhere. Resolution sources are
/// checked in full up front so a multi-source misconfiguration can be warned
/// about before picking the winner.
pub async fn resolve_api_key(
    db: &Pool<Sqlite>,
    setting_key: &str,
    env_var: &str,
    toml_value: Option<&String>,
) -> Result<Option<String>> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key: Option<String> = crate::db::settings::get_setting(db, setting_key).await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = std::env::var(env_var).ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    if let Some(key) = toml_value {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using database (highest priority).",
            setting_key,
            sources.join(", ")
        );
    }

    // Resolution priority
    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("{} loaded from database", setting_key);
            return Ok(Some(key));
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("{} loaded from environment variable", setting_key);
            return Ok(Some(key));
        }
    }

    if let Some(key) = toml_value {
        if is_valid_key(key) {
            info!("{} loaded from TOML config", setting_key);
            return Ok(Some(key.clone()));
        }
    }

    info!(
        "{} not configured (checked database, {} and TOML), source will be skipped",
        setting_key, env_var
    );
    Ok(None)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Patch one key in `webmatch.toml`, preserving everything else in the file.
///
/// `None` clears the entry. The database stays authoritative; this keeps the
/// TOML backup in step with it.
pub fn sync_key_to_toml(setting_key: &str, value: Option<String>, toml_path: &Path) -> Result<()> {
    let mut config = load_service_toml(toml_path)?;

    let slot = match setting_key {
        "places_api_key" => &mut config.keys.places_api_key,
        "search_api_key" => &mut config.keys.search_api_key,
        "directory_api_key" => &mut config.keys.directory_api_key,
        "enrichment_api_key" => &mut config.keys.enrichment_api_key,
        "llm_api_key" => &mut config.keys.llm_api_key,
        other => return Err(Error::Config(format!("Unknown setting key: {}", other))),
    };
    *slot = value;

    let content = toml::to_string_pretty(&config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(toml_path, content)?;
    Ok(())
}
