use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, Method, Request, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;
use reqwest::Client;
use tracing::{info, warn};

use crate::helpers::time::get_instant;
use crate::line::manager::AccessTokenManager;
use crate::observability::metrics::get_metrics;
use crate::proxy::error::ProxyError;
use crate::server::server::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Not forwarded upstream: hop-by-hop, replaced (`authorization`, `host`),
/// or not relayable (`accept-encoding`, bodies are passed through undecoded).
const SKIPPED_REQUEST_HEADERS: [&str; 12] = [
    "host",
    "authorization",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "accept-encoding",
];

/// Upstream request id, relayed so callers can quote it to LINE support.
const LINE_REQUEST_ID: &str = "x-line-request-id";

#[derive(Clone)]
pub struct ProxyState {
    manager: AccessTokenManager,
    client: Client,
    upstream_base: String,
    prefix: String,
}

impl ProxyState {
    pub fn new(manager: AccessTokenManager, client: Client, upstream_base: String, prefix: String) -> Self {
        Self {
            manager,
            client,
            upstream_base: upstream_base.trim_end_matches('/').to_owned(),
            prefix,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}/v2/bot/info?x=1` -> `{upstream_base}/v2/bot/info?x=1`
    pub fn upstream_url(&self, uri: &Uri) -> String {
        let path = uri.path();
        let stripped = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
        let mut url = format!("{}{}", self.upstream_base, stripped);
        if let Some(query) = uri.query() {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

fn is_bodiless(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::DELETE)
}

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !SKIPPED_REQUEST_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Catch-all handler for everything under the proxy prefix.
pub async fn forward(State(state): State<AppState>, req: Request<Body>) -> Response {
    let metrics = get_metrics().await;
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = match try_forward(&state.proxy_state, req).await {
        Ok(response) => response,
        Err(e) => {
            warn!("{} {} failed: {}", method, path, e);
            e.into_response()
        }
    };

    let status = response.status();
    info!("{} {} -> {}", method, path, status.as_u16());
    let status_class = format!("{}xx", status.as_u16() / 100);
    metrics.proxy_requests.with_label_values(&[method.as_str(), status_class.as_str()]).inc();
    response
}

async fn try_forward(state: &ProxyState, req: Request<Body>) -> Result<Response, ProxyError> {
    let token = state.manager.get_credential().await?;

    let (parts, body) = req.into_parts();
    let target = state.upstream_url(&parts.uri);
    let mut request = state
        .client
        .request(parts.method.clone(), &target)
        .headers(forwardable_headers(&parts.headers))
        .bearer_auth(token);

    if !is_bodiless(&parts.method) {
        let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
            if exceeds_length_limit(&e) {
                ProxyError::PayloadTooLarge(MAX_BODY_BYTES)
            } else {
                ProxyError::InvalidRequest(e.to_string())
            }
        })?;
        request = request.body(bytes);
    }

    let metrics = get_metrics().await;
    let start = get_instant();
    let upstream = request
        .send()
        .await
        .map_err(|e| ProxyError::UpstreamForwardFailure(e.to_string()))?;
    metrics
        .upstream_duration
        .with_label_values(&[parts.method.as_str()])
        .observe(start.elapsed().as_secs_f64());

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let request_id = upstream.headers().get(LINE_REQUEST_ID).cloned();
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::UpstreamForwardFailure(e.to_string()))?;

    let mut response = (status, bytes).into_response();
    let headers = response.headers_mut();
    headers.remove(header::CONTENT_TYPE);
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    if let Some(request_id) = request_id {
        headers.insert(HeaderName::from_static(LINE_REQUEST_ID), request_id);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn oversized_body_is_a_length_limit_error() {
        let err = to_bytes(Body::from(vec![0u8; 64]), 16).await.unwrap_err();
        assert!(exceeds_length_limit(&err));
    }

    #[test]
    fn bodiless_methods() {
        assert!(is_bodiless(&Method::GET));
        assert!(is_bodiless(&Method::DELETE));
        assert!(!is_bodiless(&Method::POST));
        assert!(!is_bodiless(&Method::PUT));
    }

    #[test]
    fn hop_by_hop_and_auth_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer client-supplied"));
        headers.insert(header::HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-line-retry-key", HeaderValue::from_static("123e4567-e89b-12d3-a456-426614174000"));

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[header::CONTENT_TYPE], "application/json");
        assert!(forwarded.contains_key("x-line-retry-key"));
    }
}
