use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::{
    infra::{
        cache::redis_status_cache::RedisStatusCache, db::postgres::postgres_connection,
    },
    payments::sslcommerz_client::SslCommerzClient,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!(error = ?error, "backend: exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!(stage = %config_loader::get_stage(), "backend: env has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("backend: postgres connection has been established");

    let status_cache = RedisStatusCache::connect(&dotenvy_env.redis.url).await?;
    info!("backend: redis connection has been established");

    let payment_gateway = SslCommerzClient::new(dotenvy_env.sslcommerz.clone())?;

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(status_cache),
        Arc::new(payment_gateway),
    )
    .await?;

    Ok(())
}
