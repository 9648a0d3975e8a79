//! Closing service configuration.

use std::str::FromStr;

use rust_decimal::Decimal;

use closebook_common::BALANCE_EPSILON;
use closebook_ledger::RETAINED_EARNINGS_CODE;

/// Which ledger store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL through sqlx.
    Postgres,
    /// In-process store, data lost on exit.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(format!("Unknown store backend: {other}")),
        }
    }
}

/// Main closing service configuration.
#[derive(Debug, Clone)]
pub struct ClosingConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Database URL.
    pub database_url: String,
    /// Connection pool size.
    pub max_connections: u32,
    /// Store backend.
    pub store: StoreBackend,
    /// Run embedded migrations at startup.
    pub run_migrations: bool,
    /// Seed the default chart of accounts at startup.
    pub seed_chart: bool,
    /// Code of the retained earnings account.
    pub retained_earnings_code: String,
    /// Tolerance for "zero" balances.
    pub balance_epsilon: Decimal,
    /// Default page size for closing history.
    pub history_limit: usize,
    /// Log level.
    pub log_level: String,
}

impl Default for ClosingConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            database_url: "postgres://localhost/closebook".to_string(),
            max_connections: 10,
            store: StoreBackend::Postgres,
            run_migrations: true,
            seed_chart: false,
            retained_earnings_code: RETAINED_EARNINGS_CODE.to_string(),
            balance_epsilon: BALANCE_EPSILON,
            history_limit: 20,
            log_level: "info".to_string(),
        }
    }
}

fn env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ClosingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CLOSEBOOK_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("CLOSEBOOK_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(max) = std::env::var("CLOSEBOOK_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.max_connections = max;
            }
        }

        if let Ok(store) = std::env::var("CLOSEBOOK_STORE") {
            if let Ok(store) = store.parse() {
                config.store = store;
            }
        }

        if let Ok(flag) = std::env::var("CLOSEBOOK_RUN_MIGRATIONS") {
            if let Some(flag) = env_flag(&flag) {
                config.run_migrations = flag;
            }
        }

        if let Ok(flag) = std::env::var("CLOSEBOOK_SEED_CHART") {
            if let Some(flag) = env_flag(&flag) {
                config.seed_chart = flag;
            }
        }

        if let Ok(code) = std::env::var("CLOSEBOOK_RETAINED_EARNINGS_CODE") {
            config.retained_earnings_code = code;
        }

        if let Ok(epsilon) = std::env::var("CLOSEBOOK_BALANCE_EPSILON") {
            if let Ok(epsilon) = epsilon.parse() {
                config.balance_epsilon = epsilon;
            }
        }

        if let Ok(limit) = std::env::var("CLOSEBOOK_HISTORY_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.history_limit = limit;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.store == StoreBackend::Postgres && self.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            return Err("Max connections must be at least 1".to_string());
        }

        if self.retained_earnings_code.trim().is_empty() {
            return Err("Retained earnings code cannot be empty".to_string());
        }

        if self.balance_epsilon <= Decimal::ZERO {
            return Err("Balance epsilon must be positive".to_string());
        }

        if self.history_limit == 0 {
            return Err("History limit must be at least 1".to_string());
        }

        Ok(())
    }
}
