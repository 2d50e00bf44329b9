use crate::{
    auth::JwtKeys,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::{cache::redis_status_cache::RedisStatusCache, db::postgres::postgres_connection::PgPoolSquad},
    payments::sslcommerz_client::SslCommerzClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    status_cache: Arc<RedisStatusCache>,
    payment_gateway: Arc<SslCommerzClient>,
) -> Result<()> {
    let jwt_keys = Arc::new(JwtKeys::new(
        &config.jwt.user_secret,
        &config.jwt.bus_secret,
    ));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/tickets",
            routers::tickets::routes(Arc::clone(&db_pool), Arc::clone(&status_cache)),
        )
        .nest(
            "/api/v1/tickets/payment",
            routers::payments::routes(
                Arc::clone(&db_pool),
                Arc::clone(&status_cache),
                Arc::clone(&payment_gateway),
                &config.public_base_url,
            ),
        )
        .nest(
            "/api/v1/bus",
            routers::bus::routes(Arc::clone(&db_pool), Arc::clone(&status_cache)),
        )
        .nest(
            "/api/v1/wallet",
            routers::wallet::routes(
                Arc::clone(&db_pool),
                Arc::clone(&status_cache),
                Arc::clone(&payment_gateway),
                &config.public_base_url,
            ),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(jwt_keys))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = config.backend_server.port, "http: backend is listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = ?err, "http: failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "http: failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("http: received ctrl+c signal"),
        _ = terminate => info!("http: received terminate signal"),
    }
}
