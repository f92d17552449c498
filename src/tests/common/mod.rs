// tests/common/mod.rs
pub use axum::{Router, body::Body};
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::EncodingKey;
use reqwest::Client;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::cache::memory::MemoryTokenStore;
use crate::cache::store::{StoreError, TokenStore};
use crate::cache::token::CredentialRecord;
use crate::helpers::time::ManualClock;
use crate::line::assertion::AssertionBuilder;
use crate::line::exchange::TokenExchangeClient;
use crate::line::manager::{AccessTokenManager, ManagerSettings};
use crate::resilience::retry::RetrySettings;
use crate::secrets::{SecretError, SecretProvider};

pub const T: i64 = 1_700_000_000;
pub const CHANNEL_ID: &str = "12345";
pub const KID: &str = "abc";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// ================================
/// Signing key
/// ================================
pub struct TestKey {
    pub encoding: EncodingKey,
    pub private_pem: String,
    pub public_pem: String,
    pub jwk: String,
}

static TEST_KEY: OnceLock<TestKey> = OnceLock::new();

/// One 2048-bit key per test binary, generation is slow.
pub fn test_key() -> &'static TestKey {
    TEST_KEY.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA key");
        let private_pem = private
            .to_pkcs1_pem(LineEnding::LF)
            .expect("failed to encode PEM")
            .as_str()
            .to_owned();
        let public_pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("failed to encode public PEM");

        let b64 = |n: &BigUint| URL_SAFE_NO_PAD.encode(n.to_bytes_be());
        let primes = private.primes();
        let jwk = json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": b64(private.n()),
            "e": b64(private.e()),
            "d": b64(private.d()),
            "p": b64(&primes[0]),
            "q": b64(&primes[1]),
        })
        .to_string();

        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key");
        TestKey { encoding, private_pem, public_pem, jwk }
    })
}

/// Decode one base64url JWT segment into JSON.
pub fn decode_segment(segment: &str) -> serde_json::Value {
    let bytes = URL_SAFE_NO_PAD.decode(segment).expect("base64url segment");
    serde_json::from_slice(&bytes).expect("json segment")
}

/// ================================
/// Mock token endpoint
/// ================================
#[derive(Debug, Clone)]
pub struct TokenEndpointBehavior {
    pub expires_in: i64,
    /// number of initial calls answered with `fail_status`
    pub fail_first: usize,
    pub fail_status: StatusCode,
    pub malformed: bool,
    pub delay: Duration,
}

impl Default for TokenEndpointBehavior {
    fn default() -> Self {
        Self {
            expires_in: 3600,
            fail_first: 0,
            fail_status: StatusCode::BAD_REQUEST,
            malformed: false,
            delay: Duration::ZERO,
        }
    }
}

impl TokenEndpointBehavior {
    pub fn rejecting(status: StatusCode) -> Self {
        Self { fail_first: usize::MAX, fail_status: status, ..Self::default() }
    }
}

#[derive(Clone)]
pub struct MockTokenEndpoint {
    pub url: String,
    pub calls: Arc<AtomicUsize>,
    pub forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub handle: Arc<JoinHandle<()>>,
}

impl MockTokenEndpoint {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_form(&self) -> HashMap<String, String> {
        self.forms.lock().unwrap().last().cloned().expect("no exchange recorded")
    }
}

/// Issues `tok1`, `tok2`, ... in call order once failures are used up.
pub async fn spawn_token_endpoint(behavior: TokenEndpointBehavior) -> MockTokenEndpoint {
    let calls = Arc::new(AtomicUsize::new(0));
    let forms = Arc::new(Mutex::new(Vec::new()));

    let router = Router::new().route("/oauth2/v2.1/token", post({
        let calls = calls.clone();
        let forms = forms.clone();
        move |Form(form): Form<HashMap<String, String>>| {
            let calls = calls.clone();
            let forms = forms.clone();
            let behavior = behavior.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                forms.lock().unwrap().push(form);
                tokio::time::sleep(behavior.delay).await;

                if n < behavior.fail_first {
                    return (behavior.fail_status, Json(json!({"error": "invalid_client", "error_description": "rejected"})));
                }
                if behavior.malformed {
                    return (StatusCode::OK, Json(json!({"token_type": "Bearer"})));
                }
                let issued = n + 1 - behavior.fail_first.min(n + 1);
                (StatusCode::OK, Json(json!({
                    "access_token": format!("tok{}", issued),
                    "expires_in": behavior.expires_in,
                    "token_type": "Bearer",
                    "key_id": "sDTOzw5wIfxxxxPEzcmeQA"
                })))
            }
        }
    }));
    let (handle, addr) = spawn_axum(router).await;

    MockTokenEndpoint {
        url: format!("http://{}/oauth2/v2.1/token", addr),
        calls,
        forms,
        handle: Arc::new(handle),
    }
}

/// ================================
/// Collaborator doubles
/// ================================
#[derive(Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
    pub reads: AtomicUsize,
}

impl StaticSecrets {
    pub fn line_key() -> Self {
        let mut values = HashMap::new();
        values.insert("line-priv-key".to_owned(), test_key().jwk.clone());
        values.insert("line-kid".to_owned(), KID.to_owned());
        Self { values, reads: AtomicUsize::new(0) }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.values.remove(name);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretProvider for StaticSecrets {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.values.get(name).cloned().ok_or_else(|| SecretError::NotFound(name.to_owned()))
    }
}

/// Store whose reads or writes fail, wrapping a working memory store.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryTokenStore,
    pub fail_get: bool,
    pub fail_save: bool,
}

#[async_trait]
impl TokenStore for FlakyStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        if self.fail_get {
            return Err(StoreError::Unavailable("lookup timed out".into()));
        }
        self.inner.get(kind, id).await
    }

    async fn save(&self, kind: &str, id: &str, record: &CredentialRecord) -> Result<(), StoreError> {
        if self.fail_save {
            return Err(StoreError::Unavailable("commit timed out".into()));
        }
        self.inner.save(kind, id, record).await
    }
}

/// ================================
/// Manager harness
/// ================================
pub struct Harness {
    pub manager: AccessTokenManager,
    pub store: Arc<dyn TokenStore>,
    pub secrets: Arc<StaticSecrets>,
    pub clock: Arc<ManualClock>,
    pub endpoint: MockTokenEndpoint,
}

pub struct HarnessOptions {
    pub behavior: TokenEndpointBehavior,
    pub store: Arc<dyn TokenStore>,
    pub secrets: StaticSecrets,
    pub cache_signing_key: bool,
    pub retry_attempts: u32,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            behavior: TokenEndpointBehavior::default(),
            store: Arc::new(MemoryTokenStore::new()),
            secrets: StaticSecrets::line_key(),
            cache_signing_key: false,
            retry_attempts: 1,
        }
    }
}

pub async fn harness(options: HarnessOptions) -> Harness {
    let endpoint = spawn_token_endpoint(options.behavior).await;
    let clock = Arc::new(ManualClock::new(T));
    let secrets = Arc::new(options.secrets);

    let manager = AccessTokenManager::new(
        ManagerSettings {
            channel_id: CHANNEL_ID.to_owned(),
            private_key_secret: "line-priv-key".to_owned(),
            key_id_secret: "line-kid".to_owned(),
            safety_margin_seconds: 300,
            cache_signing_key: options.cache_signing_key,
        },
        options.store.clone(),
        secrets.clone(),
        AssertionBuilder::new("https://api.line.me/".to_owned(), 1800, 2_592_000),
        TokenExchangeClient::new(build_reqwest_client(), endpoint.url.clone()),
        clock.clone(),
        RetrySettings { attempts: options.retry_attempts, base_delay_ms: 10, max_delay_ms: 40 },
    );

    Harness { manager, store: options.store, secrets, clock, endpoint }
}
