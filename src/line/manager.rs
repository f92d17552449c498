//! Channel access token lifecycle.
//!
//! Freshness is decided on every read; there is no background refresh.
//! Refreshes are single-flight: the first caller that finds the slot absent
//! or stale spawns the refresh task, every caller arriving while it runs
//! waits on the same outcome. The task is detached from its callers, so a
//! dropped inbound request does not cancel a refresh others are waiting on.

use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::store::TokenStore;
use crate::cache::token::{CredentialRecord, TokenState};
use crate::config::settings::{RetryConfig, ServiceConfig};
use crate::helpers::time::{get_instant, Clock};
use crate::line::assertion::AssertionBuilder;
use crate::line::error::CredentialError;
use crate::line::exchange::TokenExchangeClient;
use crate::line::signing_key::{encoding_key_from_secret, SigningMaterial};
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;
use crate::secrets::SecretProvider;
use crate::utils::constants::{TOKEN_ID, TOKEN_KIND};

type RefreshOutcome = Option<Result<String, CredentialError>>;

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub channel_id: String,
    pub private_key_secret: String,
    pub key_id_secret: String,
    pub safety_margin_seconds: u64,
    pub cache_signing_key: bool,
}

struct Inner {
    settings: ManagerSettings,
    store: Arc<dyn TokenStore>,
    secrets: Arc<dyn SecretProvider>,
    assertions: AssertionBuilder,
    exchange: TokenExchangeClient,
    clock: Arc<dyn Clock>,
    retry: RetrySettings,
    inflight: Mutex<Option<watch::Receiver<RefreshOutcome>>>,
    signing_material: RwLock<Option<SigningMaterial>>,
}

/// Owns the read-decide-write sequence on the `LineAccessToken/current` record.
#[derive(Clone)]
pub struct AccessTokenManager {
    inner: Arc<Inner>,
}

impl AccessTokenManager {
    pub fn new(
        settings: ManagerSettings,
        store: Arc<dyn TokenStore>,
        secrets: Arc<dyn SecretProvider>,
        assertions: AssertionBuilder,
        exchange: TokenExchangeClient,
        clock: Arc<dyn Clock>,
        retry: RetrySettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                store,
                secrets,
                assertions,
                exchange,
                clock,
                retry,
                inflight: Mutex::new(None),
                signing_material: RwLock::new(None),
            }),
        }
    }

    /// Wire the manager from the `line` and `settings` sections.
    pub fn from_config(
        cfg: &ServiceConfig,
        client: Client,
        store: Arc<dyn TokenStore>,
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let line = &cfg.line;
        Self::new(
            ManagerSettings {
                channel_id: line.channel_id.clone(),
                private_key_secret: line.private_key_secret.clone(),
                key_id_secret: line.key_id_secret.clone(),
                safety_margin_seconds: cfg.settings.safety_margin_seconds,
                cache_signing_key: line.cache_signing_key,
            },
            store,
            secrets,
            AssertionBuilder::new(
                line.audience.clone(),
                line.assertion_ttl_seconds,
                line.access_token_ttl_seconds,
            ),
            TokenExchangeClient::new(client, line.token_endpoint.clone()),
            clock,
            RetryConfig::to_settings(&cfg.settings.retry),
        )
    }

    /// Bearer token for the next upstream call.
    pub async fn get_credential(&self) -> Result<String, CredentialError> {
        let metrics = get_metrics().await;

        let result = self.resolve().await;
        let outcome = match &result {
            Ok((TokenState::Fresh, _)) => "fresh",
            Ok(_) => "refreshed",
            Err(e) => {
                error!("credential acquisition failed: {}", e);
                "failed"
            }
        };
        metrics.credential_requests.with_label_values(&[outcome]).inc();
        result.map(|(_, token)| token)
    }

    async fn resolve(&self) -> Result<(TokenState, String), CredentialError> {
        let now = self.inner.clock.now_unix();
        let current = self.read_current().await?;
        let state = TokenState::of(current.as_ref(), now, self.inner.settings.safety_margin_seconds);

        if let (TokenState::Fresh, Some(record)) = (state, current) {
            return Ok((state, record.access_token));
        }
        debug!("credential is {}, refresh required", state.as_str());
        self.join_or_start_refresh().await.map(|token| (state, token))
    }

    async fn read_current(&self) -> Result<Option<CredentialRecord>, CredentialError> {
        Ok(self.inner.store.get(TOKEN_KIND, TOKEN_ID).await?)
    }

    async fn join_or_start_refresh(&self) -> Result<String, CredentialError> {
        let mut rx = {
            let mut inflight = self.inner.inflight.lock().await;
            // joinable only while running: a closed sender means the task died,
            // a published outcome means it finished and the slot is about to clear
            let joinable = inflight
                .as_ref()
                .filter(|rx| rx.has_changed().is_ok() && rx.borrow().is_none())
                .cloned();
            match joinable {
                Some(rx) => {
                    debug!("joining in-flight refresh");
                    rx
                }
                None => {
                    // another refresh may have finished since our first read
                    let now = self.inner.clock.now_unix();
                    if let Some(record) = self
                        .read_current()
                        .await?
                        .filter(|r| r.is_fresh(now, self.inner.settings.safety_margin_seconds))
                    {
                        return Ok(record.access_token);
                    }

                    let (tx, rx) = watch::channel(None);
                    *inflight = Some(rx.clone());
                    let manager = self.clone();
                    tokio::spawn(async move { manager.run_refresh(tx).await });
                    rx
                }
            }
        };

        let outcome = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| CredentialError::RefreshAborted("refresh task ended without a result".into()))?;
        let result = (*outcome).clone();
        result.unwrap_or_else(|| Err(CredentialError::RefreshAborted("empty refresh outcome".into())))
    }

    async fn run_refresh(self, tx: watch::Sender<RefreshOutcome>) {
        let metrics = get_metrics().await;
        let start = get_instant();

        let result = self
            .inner
            .retry
            .run_with_retry(CredentialError::is_transient, || self.refresh_once())
            .await;

        let label = if result.is_ok() { "success" } else { "failure" };
        metrics.token_exchange_duration.with_label_values(&[label]).observe(start.elapsed().as_secs_f64());

        // publish and clear under one lock: the slot never outlives its outcome
        let mut inflight = self.inner.inflight.lock().await;
        tx.send_replace(Some(result));
        *inflight = None;
    }

    async fn refresh_once(&self) -> Result<String, CredentialError> {
        let metrics = get_metrics().await;
        let material = self.signing_material().await?;
        let now = self.inner.clock.now_unix();
        let assertion = self.inner.assertions.build_assertion(
            &material.key,
            &material.key_id,
            &self.inner.settings.channel_id,
            now,
        )?;

        let exchanged = match self.inner.exchange.exchange(&assertion).await {
            Ok(exchanged) => exchanged,
            Err(e) => {
                metrics.token_exchanges.with_label_values(&["failure"]).inc();
                if let CredentialError::ExchangeRejected { .. } = e {
                    self.forget_signing_material().await;
                }
                return Err(e);
            }
        };
        metrics.token_exchanges.with_label_values(&["success"]).inc();

        let record = CredentialRecord::issued_at(exchanged.access_token, now, exchanged.expires_in)
            .ok_or_else(|| {
                CredentialError::MalformedExchangeResponse(format!(
                    "'expires_in' {} is out of range",
                    exchanged.expires_in
                ))
            })?;
        self.inner.store.save(TOKEN_KIND, TOKEN_ID, &record).await?;
        metrics.token_expiry_unix.set(record.expires_at);
        info!("channel access token refreshed, expires_at {}", record.expires_at);

        Ok(record.access_token)
    }

    async fn signing_material(&self) -> Result<SigningMaterial, CredentialError> {
        let settings = &self.inner.settings;
        if settings.cache_signing_key {
            if let Some(material) = self.inner.signing_material.read().await.clone() {
                return Ok(material);
            }
        }

        let private_key = self.inner.secrets.get_secret(&settings.private_key_secret).await?;
        let key_id = self.inner.secrets.get_secret(&settings.key_id_secret).await?;
        let material = SigningMaterial {
            key: encoding_key_from_secret(&private_key)?,
            key_id: key_id.trim().to_owned(),
        };

        if settings.cache_signing_key {
            *self.inner.signing_material.write().await = Some(material.clone());
        }
        Ok(material)
    }

    /// Lock the in-flight slot, to order callers around a running refresh.
    #[cfg(test)]
    pub(crate) async fn lock_refresh_slot(
        &self,
    ) -> tokio::sync::MutexGuard<'_, Option<watch::Receiver<RefreshOutcome>>> {
        self.inner.inflight.lock().await
    }

    async fn forget_signing_material(&self) {
        if self.inner.settings.cache_signing_key {
            warn!("exchange rejected, dropping cached signing key");
            *self.inner.signing_material.write().await = None;
        }
    }
}
