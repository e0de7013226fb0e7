//! Outbound HTTP to the scoreboard API over a pooled keep-alive client.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::TransportError;

const USER_AGENT: &str = concat!("schedule-sync/", env!("CARGO_PKG_VERSION"));
const BODY_SNIPPET_LEN: usize = 200;

/// A single GET against the upstream. Implementations do not retry.
pub trait Transport: Send + Sync {
    fn get_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Drop pooled connections and start over with a fresh pool.
    fn recycle(&self) {}
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_idle_per_host: usize,
    pub max_concurrent: usize,
    pub requests_per_minute: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "https://site.api.espn.com/apis/site/v2/sports/football/nfl".to_string(),
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            max_idle_per_host: 5,
            max_concurrent: 10,
            requests_per_minute: 60,
        }
    }
}

/// reqwest-backed transport. The client sits behind a lock so `recycle` can
/// swap in a fresh pool while callers hold clones of the old one.
pub struct HttpTransport {
    settings: HttpSettings,
    client: RwLock<reqwest::Client>,
    in_flight: Arc<Semaphore>,
    rate_limiter: RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>,
}

impl HttpTransport {
    pub fn new(settings: HttpSettings) -> anyhow::Result<Self> {
        let client = build_client(&settings)?;
        let per_minute = NonZeroU32::new(settings.requests_per_minute.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            in_flight: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            client: RwLock::new(client),
            rate_limiter,
            settings,
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn current_client(&self) -> reqwest::Client {
        // reqwest::Client is an Arc internally; cloning is cheap.
        match self.client.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn build_client(settings: &HttpSettings) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .use_rustls_tls()
        .build()
        .context("Failed to create HTTP client")
}

impl Transport for HttpTransport {
    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| TransportError::network(format!("request pool closed: {}", e)))?;

        // Wait for rate limit
        self.rate_limiter.until_ready().await;

        let url = self.url_for(endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .current_client()
            .get(&url)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();
            warn!("Upstream error (status {}) for {}: {}", status, url, snippet);
            return Err(TransportError::status(status.as_u16(), snippet));
        }

        serde_json::from_str(&body)
            .map_err(|e| TransportError::network(format!("invalid JSON from {}: {}", url, e)))
    }

    fn recycle(&self) {
        match build_client(&self.settings) {
            Ok(fresh) => {
                let mut guard = match self.client.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = fresh;
                info!("Recycled HTTP connection pool");
            }
            Err(e) => warn!("Keeping existing HTTP client, rebuild failed: {:?}", e),
        }
    }
}
