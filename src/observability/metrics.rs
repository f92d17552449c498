use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async { 
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Credential metrics
    pub credential_requests: IntCounterVec,
    pub token_exchanges: IntCounterVec,
    pub token_exchange_duration: HistogramVec,
    pub token_expiry_unix: IntGauge,

    // Proxy metrics
    pub proxy_requests: IntCounterVec,
    pub upstream_duration: HistogramVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("lineproxy".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Credential
            credential_requests: IntCounterVec::new(Opts::new("credential_requests_total", "Credential requests by outcome"),&["outcome"],).unwrap(),
            token_exchanges: IntCounterVec::new(Opts::new("token_exchanges_total", "Assertion exchanges by result"),&["result"],).unwrap(),
            token_exchange_duration: HistogramVec::new(HistogramOpts::new("token_exchange_duration_seconds", "Refresh duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["result"],).unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the current access token").unwrap(),

            // Proxy
            proxy_requests: IntCounterVec::new(Opts::new("proxy_requests_total", "Proxied requests by method and status class"),&["method", "status"],).unwrap(),
            upstream_duration: HistogramVec::new(HistogramOpts::new("upstream_duration_seconds", "Upstream call duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["method"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.credential_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_exchanges.clone())).unwrap();
        reg.register(Box::new(metrics.token_exchange_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.proxy_requests.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_duration.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
