use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_URL: &str = "sqlite://./data/meta/file_ledger.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File metadata ledger API")]
pub struct Args {
    /// Host to bind to (overrides FILE_LEDGER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_LEDGER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides FILE_LEDGER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// SQLite pool size (overrides FILE_LEDGER_MAX_CONNECTIONS)
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Apply the schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values found through `lookup`, then defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = lookup("FILE_LEDGER_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let env_port = match lookup("FILE_LEDGER_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_LEDGER_PORT value `{}`", value))?,
            None => DEFAULT_PORT,
        };
        let env_db =
            lookup("FILE_LEDGER_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let env_max_connections = match lookup("FILE_LEDGER_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .with_context(|| format!("parsing FILE_LEDGER_MAX_CONNECTIONS value `{}`", value))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            max_connections: args.max_connections.unwrap_or(env_max_connections).max(1),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = AppConfig::resolve(Args::default(), lookup_from(&[])).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.database_url, "sqlite://./data/meta/file_ledger.db");
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn cli_overrides_environment() {
        let args = Args {
            port: Some(8080),
            database_url: Some("sqlite::memory:".into()),
            ..Args::default()
        };
        let env = lookup_from(&[
            ("FILE_LEDGER_HOST", "127.0.0.1"),
            ("FILE_LEDGER_PORT", "9000"),
            ("FILE_LEDGER_DATABASE_URL", "sqlite://env.db"),
        ]);

        let cfg = AppConfig::resolve(args, env).unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.database_url, "sqlite::memory:");
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::resolve(
            Args::default(),
            lookup_from(&[("FILE_LEDGER_PORT", "http")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("FILE_LEDGER_PORT"));
    }

    #[test]
    fn pool_size_never_drops_to_zero() {
        let args = Args {
            max_connections: Some(0),
            ..Args::default()
        };
        let cfg = AppConfig::resolve(args, lookup_from(&[])).unwrap();
        assert_eq!(cfg.max_connections, 1);
    }
}
