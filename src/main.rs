use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use authgate::config::AuthConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("AUTHGATE_HTTP_PORT").unwrap_or_else(|_| "4000".to_string());
    let provider = std::env::var("AUTHGATE_PROVIDER_URL").unwrap_or_else(|_| "<unset>".to_string());
    let secure = std::env::var("AUTHGATE_SECURE_COOKIES").unwrap_or_else(|_| "true".to_string());
    info!(
        target: "authgate",
        "authgate starting: RUST_LOG='{}', http_port={}, provider_url='{}', secure_cookies={}",
        rust_log, http_port, provider, secure
    );

    let config = AuthConfig::from_env()?;
    authgate::server::run(config).await
}
