use anyhow::{Context, Result};
use crates::payments::sslcommerz_client::SslCommerzConfig;

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, JwtSecrets, Redis},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let redis = Redis {
        url: required("REDIS_URL")?,
    };

    let jwt = JwtSecrets {
        user_secret: required("JWT_USER_SECRET")?,
        bus_secret: required("JWT_BUS_SECRET")?,
    };

    let sandbox = match std::env::var("SSLCOMMERZ_SANDBOX") {
        Ok(raw) => raw
            .trim()
            .parse::<bool>()
            .context("SSLCOMMERZ_SANDBOX is invalid")?,
        Err(_) => get_stage() != Stage::Production,
    };

    let sslcommerz = SslCommerzConfig {
        store_id: required("SSLCOMMERZ_STORE_ID")?,
        store_password: required("SSLCOMMERZ_STORE_PASSWORD")?,
        sandbox,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        redis,
        jwt,
        public_base_url: required("PUBLIC_BASE_URL")?,
        sslcommerz,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}
