use super::config_model::{Database, DotEnvyConfig, JobSettings, Redis, WorkerServer};
use anyhow::{Context, Result};
use crates::payments::sslcommerz_client::SslCommerzConfig;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: required("SERVER_PORT_WORKER")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let redis = Redis {
        url: required("REDIS_URL")?,
    };

    let sandbox = match std::env::var("SSLCOMMERZ_SANDBOX") {
        Ok(raw) => raw
            .trim()
            .parse::<bool>()
            .context("SSLCOMMERZ_SANDBOX is invalid")?,
        Err(_) => !is_production(),
    };

    let sslcommerz = SslCommerzConfig {
        store_id: required("SSLCOMMERZ_STORE_ID")?,
        store_password: required("SSLCOMMERZ_STORE_PASSWORD")?,
        sandbox,
    };

    let max_attempts = optional("WORKER_MAX_ATTEMPTS", "5")
        .parse::<i32>()
        .context("WORKER_MAX_ATTEMPTS is invalid")?;
    let jobs = JobSettings {
        max_attempts: max_attempts.max(1),
        poll_interval_secs: optional("WORKER_POLL_INTERVAL_SECS", "2")
            .parse()
            .context("WORKER_POLL_INTERVAL_SECS is invalid")?,
        lease_secs: optional("WORKER_JOB_LEASE_SECS", "300")
            .parse::<u64>()
            .context("WORKER_JOB_LEASE_SECS is invalid")?
            .max(1),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        redis,
        public_base_url: required("PUBLIC_BASE_URL")?,
        sslcommerz,
        jobs,
    })
}

fn is_production() -> bool {
    std::env::var("STAGE").is_ok_and(|stage| stage.trim().eq_ignore_ascii_case("production"))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
