use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use line_proxy::cache::build_token_store;
use line_proxy::helpers::time::SystemClock;
use line_proxy::line::manager::AccessTokenManager;
use line_proxy::observability::metrics::get_metrics;
use line_proxy::proxy::forward::ProxyState;
use line_proxy::secrets::build_secret_provider;
use line_proxy::server::server::{self, AppState};
use line_proxy::sources::metadata::MetadataTokenSource;
use line_proxy::utils::config_loader;
use line_proxy::utils::logging::{self, LogLevel};
use reqwest::Client;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "line-proxy.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Create request client
    //
    // one timeout bounds secrets, store, exchange and upstream calls
    // -------------------------------

    let client = Client::builder()
        .timeout(Duration::from_millis(service_config.settings.http_timeout_ms))
        .build()?;
    let clock = Arc::new(SystemClock);

    // -------------------------------
    // 3. Collaborators: secret provider and token store
    // -------------------------------

    let gcp_auth = MetadataTokenSource::new(
        client.clone(),
        service_config.gcp.metadata_token_url.clone(),
        clock.clone(),
    );
    let secrets = build_secret_provider(&service_config.secrets, &client, &gcp_auth);
    let store = build_token_store(&service_config.store, &client, &gcp_auth);

    // -------------------------------
    // 4. Access token manager
    // -------------------------------

    let manager = AccessTokenManager::from_config(&service_config, client.clone(), store, secrets, clock);

    // -------------------------------
    // 5. Start http server
    // -------------------------------

    let proxy_state = ProxyState::new(
        manager,
        client,
        service_config.line.api_base_url.clone(),
        service_config.line.proxy_prefix.clone(),
    );
    let state = AppState::new(get_metrics().await, proxy_state);

    info!("Service starting...");
    server::start(&service_config.settings, state).await
}
