//! Application configuration management

use std::env;

use anyhow::{Context, Result};

use crate::db::is_memory_url;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL
    pub database_url: String,

    /// Connection pool size (always 1 for in-memory databases)
    pub max_connections: u32,

    /// Maximum nesting depth accepted in mutation input
    pub max_assign_depth: usize,

    /// Models served without create/update/delete mutations
    pub read_only_models: Vec<String>,

    /// Create missing tables and columns at startup
    pub sync_schema: bool,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://modelgraph.db?mode=rwc".to_string());

        let max_connections = if is_memory_url(&database_url) {
            1
        } else {
            lookup("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?
        };

        let log_format = match lookup("MODELGRAPH_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => anyhow::bail!("Invalid MODELGRAPH_LOG_FORMAT: {other}"),
        };

        Ok(Self {
            database_url,

            max_connections,

            max_assign_depth: lookup("MODELGRAPH_MAX_ASSIGN_DEPTH")
                .unwrap_or_else(|| "8".to_string())
                .parse()
                .context("Invalid MODELGRAPH_MAX_ASSIGN_DEPTH")?,

            read_only_models: lookup("MODELGRAPH_READONLY_MODELS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),

            sync_schema: lookup("MODELGRAPH_SYNC_SCHEMA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),

            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, "sqlite://modelgraph.db?mode=rwc");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.max_assign_depth, 8);
        assert!(config.read_only_models.is_empty());
        assert!(config.sync_schema);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("MODELGRAPH_MAX_ASSIGN_DEPTH", "3"),
            ("MODELGRAPH_READONLY_MODELS", "Role, Article,"),
            ("MODELGRAPH_SYNC_SCHEMA", "false"),
            ("MODELGRAPH_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.max_assign_depth, 3);
        assert_eq!(config.read_only_models, ["Role", "Article"]);
        assert!(!config.sync_schema);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("DATABASE_MAX_CONNECTIONS", "many")]).is_err());
        assert!(config(&[("MODELGRAPH_LOG_FORMAT", "xml")]).is_err());
    }
}
