use crates::payments::sslcommerz_client::SslCommerzConfig;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub redis: Redis,
    pub jwt: JwtSecrets,
    pub public_base_url: String,
    pub sslcommerz: SslCommerzConfig,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Redis {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtSecrets {
    pub user_secret: String,
    pub bus_secret: String,
}
