use anyhow::Result;
use crates::{
    infra::{
        cache::redis_status_cache::RedisStatusCache,
        db::{
            postgres::postgres_connection,
            repositories::{job::JobPostgres, tickets::TicketPostgres, users::UserPostgres},
        },
    },
    payments::sslcommerz_client::SslCommerzClient,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{
    axum_http, config,
    services::job_loop::{self, JobLoopConfig},
    usecases::{
        balance_compensation::BalanceCompensationUseCase, check_events::CheckEventUseCase,
        ticket_fulfillment::TicketFulfillmentUseCase,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!(error = ?error, "worker: exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("worker: env has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("worker: postgres connection has been established");
    let db_pool = Arc::new(postgres_pool);

    let status_cache = Arc::new(RedisStatusCache::connect(&dotenvy_env.redis.url).await?);
    info!("worker: redis connection has been established");

    let payment_gateway = Arc::new(SslCommerzClient::new(dotenvy_env.sslcommerz.clone())?);

    let ticket_repository = Arc::new(TicketPostgres::new(Arc::clone(&db_pool)));
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let job_repository = Arc::new(JobPostgres::new(Arc::clone(&db_pool)));

    let loop_config = JobLoopConfig {
        max_attempts: dotenvy_env.jobs.max_attempts,
        poll_interval: Duration::from_secs(dotenvy_env.jobs.poll_interval_secs),
        lease: Duration::from_secs(dotenvy_env.jobs.lease_secs),
    };

    let fulfillment_usecase = Arc::new(TicketFulfillmentUseCase::new(
        Arc::clone(&ticket_repository),
        Arc::clone(&user_repository),
        status_cache,
        payment_gateway,
        &dotenvy_env.public_base_url,
    ));
    let check_event_usecase = Arc::new(CheckEventUseCase::new(ticket_repository));
    let compensation_usecase = Arc::new(BalanceCompensationUseCase::new(user_repository));

    let fulfillment_loop = tokio::spawn(job_loop::run(
        Arc::clone(&job_repository),
        fulfillment_usecase,
        loop_config,
    ));
    let check_event_loop = tokio::spawn(job_loop::run(
        Arc::clone(&job_repository),
        check_event_usecase,
        loop_config,
    ));
    let compensation_loop = tokio::spawn(job_loop::run(
        job_repository,
        compensation_usecase,
        loop_config,
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move { axum_http::http_serve::start(server_config).await });

    tokio::select! {
        result = fulfillment_loop => result??,
        result = check_event_loop => result??,
        result = compensation_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
