use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::schema::ColumnAlias;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Parse error for {field}: {value} - {reason}")]
    Parse {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to load aliases from {path}: {reason}")]
    Aliases { path: PathBuf, reason: String },
}

/// 服务配置，全部来自环境变量 (可由 .env 提供)
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    /// Postgres 的 schema 名；MySQL 使用当前库，SQLite 忽略
    pub db_schema: String,
    pub aliases_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse_var(&lookup, "BIND_ADDR", "0.0.0.0:3000")?;
        let max_connections: u32 = parse_var(&lookup, "DB_MAX_CONNECTIONS", "5")?;
        if max_connections == 0 {
            return Err(ConfigError::Parse {
                field: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            db_schema: lookup("DB_SCHEMA").unwrap_or_else(|| "public".to_string()),
            aliases_file: lookup("ANALYTICS_ALIASES_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// 读取附加列别名 (JSON 数组)；未配置时返回空
    pub fn load_aliases(&self) -> Result<Vec<ColumnAlias>, ConfigError> {
        let Some(path) = &self.aliases_file else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Aliases {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Aliases {
            path: path.clone(),
            reason: e.to_string(),
        })
    }
}

fn parse_var<F, T>(lookup: &F, field: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = lookup(field).unwrap_or_else(|| default.to_string());
    value.parse::<T>().map_err(|e| ConfigError::Parse {
        field,
        value: value.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:")]))
            .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.db_schema, "public");
        assert!(config.aliases_file.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_bad_port_names_the_variable() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("BIND_ADDR", "localhost:notaport"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("BIND_ADDR"));
    }

    #[test]
    fn test_zero_connections_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("DB_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
    }

    #[test]
    fn test_load_aliases_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"column": "grade", "physical_table": "grades", "physical_column": "label"}}]"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("ANALYTICS_ALIASES_FILE", path.as_str()),
        ]))
        .unwrap();

        let aliases = config.load_aliases().unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].table, None);
        assert_eq!(aliases[0].physical_table, "grades");
    }
}
