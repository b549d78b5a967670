use dotenvy::dotenv;
use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    /// Postgres `lock_timeout` applied before taking a payroll run row lock
    pub run_lock_timeout_ms: u64,
    /// Wall-clock budget for a single per-run transaction
    pub run_tx_budget_secs: u64,
    pub propagation_queue_size: usize,
    pub propagation_max_attempts: u32,
    pub ledger_max_attempts: u32,
    pub default_currency: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 3000)?,
            database_url: required_var("DATABASE_URL")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: required_var("JWT_SECRET")?,
            run_lock_timeout_ms: parse_var("RUN_LOCK_TIMEOUT_MS", 5_000)?,
            run_tx_budget_secs: parse_var("RUN_TX_BUDGET_SECS", 30)?,
            propagation_queue_size: parse_var("PROPAGATION_QUEUE_SIZE", 1_024)?,
            propagation_max_attempts: parse_var("PROPAGATION_MAX_ATTEMPTS", 3)?,
            ledger_max_attempts: parse_var("LEDGER_MAX_ATTEMPTS", 5)?,
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "UGX".to_string()),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 60)?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn run_tx_budget(&self) -> Duration {
        Duration::from_secs(self.run_tx_budget_secs)
    }
}

fn required_var(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a valid number: {}", name, e)),
        Err(_) => Ok(default),
    }
}
