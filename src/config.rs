//! Service configuration, read from the environment.

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    /// Reject orders whose `totalAmount` differs from the sum of their items.
    pub verify_order_totals: bool,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            database_url: get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?,
            port: parse_or(get("PORT"), "PORT", 8083)?,
            database_max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: get("NATS_URL"),
            verify_order_totals: flag_or(get("VERIFY_ORDER_TOTALS"), "VERIFY_ORDER_TOTALS", true)?,
            run_migrations: flag_or(get("RUN_MIGRATIONS"), "RUN_MIGRATIONS", true)?,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v.parse().with_context(|| format!("{key} has an invalid value: {v}")),
        None => Ok(default),
    }
}

fn flag_or(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("{key} must be a boolean, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/storefront")]).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.nats_url, None);
        assert!(config.verify_order_totals);
        assert!(config.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/storefront"), ("PORT", "9000"), ("NATS_URL", "nats://bus:4222"),
            ("VERIFY_ORDER_TOTALS", "false"), ("RUN_MIGRATIONS", "0"), ("DATABASE_MAX_CONNECTIONS", "4"),
        ]).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_max_connections, 4);
        assert_eq!(config.nats_url.as_deref(), Some("nats://bus:4222"));
        assert!(!config.verify_order_totals);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("PORT", "eighty")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("RUN_MIGRATIONS", "maybe")]).is_err());
    }
}
