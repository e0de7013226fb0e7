//! Cache-first upstream client: cache → retry → transport.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheClass, CacheKey, CacheStats, ResponseCache};
use crate::error::{SyncError, SyncResult};
use crate::espn::ScoreboardResponse;
use crate::http::Transport;
use crate::model::SeasonType;
use crate::retry::RetryPolicy;

const SCOREBOARD_ENDPOINT: &str = "scoreboard";

pub struct ScheduleClient<T> {
    transport: T,
    cache: ResponseCache,
    retry: RetryPolicy,
}

impl<T: Transport> ScheduleClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self {
            transport,
            cache: ResponseCache::new(),
            retry,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Fetch one week's scoreboard.
    pub async fn fetch_week(
        &self,
        season_year: i32,
        week: u8,
        season_type: SeasonType,
        cancel: &CancellationToken,
    ) -> SyncResult<ScoreboardResponse> {
        let params = vec![
            ("dates".to_string(), season_year.to_string()),
            ("seasontype".to_string(), season_type.code().to_string()),
            ("week".to_string(), week.to_string()),
        ];
        let payload = self
            .fetch_json(SCOREBOARD_ENDPOINT, &params, CacheClass::for_endpoint(SCOREBOARD_ENDPOINT), cancel)
            .await?;
        decode(payload)
    }

    /// Serve from cache when live; otherwise go to the network through the
    /// retry policy and cache the result. Cache hits never retry.
    pub async fn fetch_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        class: CacheClass,
        cancel: &CancellationToken,
    ) -> SyncResult<Value> {
        let key = CacheKey::new(endpoint, params);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Cache hit for {}", key.as_str());
            return Ok(hit);
        }

        let transport = &self.transport;
        let label = key.as_str();
        let fetch = self.retry.run(move |attempt| {
            debug!("Fetching {} (attempt {})", label, attempt);
            transport.get_json(endpoint, params)
        });

        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = fetch => result?,
        };

        self.cache.insert(key, class, payload.clone());
        Ok(payload)
    }

    /// Purge stale cache entries and recycle pooled connections.
    pub fn cleanup_connections(&self) -> usize {
        let purged = self.cache.purge_expired();
        self.transport.recycle();
        info!("Connection cleanup complete ({} cache entries purged)", purged);
        purged
    }
}

fn decode<D: DeserializeOwned>(payload: Value) -> SyncResult<D> {
    serde_json::from_value(payload).map_err(|e| SyncError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicU32,
        fail: bool,
        recycled: AtomicU32,
    }

    impl Transport for CountingTransport {
        async fn get_json(
            &self,
            _endpoint: &str,
            _params: &[(String, String)],
        ) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::status(500, "boom"))
            } else {
                Ok(json!({ "events": [] }))
            }
        }

        fn recycle(&self) {
            self.recycled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_served_from_cache() {
        let client = ScheduleClient::new(CountingTransport::default(), RetryPolicy::default());
        let cancel = CancellationToken::new();

        client.fetch_week(2024, 5, SeasonType::Regular, &cancel).await.unwrap();
        client.fetch_week(2024, 5, SeasonType::Regular, &cancel).await.unwrap();
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
        client.fetch_week(2024, 5, SeasonType::Regular, &cancel).await.unwrap();
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 2);

        let stats = client.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn different_weeks_do_not_share_entries() {
        let client = ScheduleClient::new(CountingTransport::default(), RetryPolicy::default());
        let cancel = CancellationToken::new();

        client.fetch_week(2024, 5, SeasonType::Regular, &cancel).await.unwrap();
        client.fetch_week(2024, 6, SeasonType::Regular, &cancel).await.unwrap();
        client.fetch_week(2024, 5, SeasonType::Preseason, &cancel).await.unwrap();
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_cached() {
        let transport = CountingTransport {
            fail: true,
            ..Default::default()
        };
        let client = ScheduleClient::new(transport, RetryPolicy::default());
        let cancel = CancellationToken::new();

        let err = client
            .fetch_week(2024, 1, SeasonType::Regular, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ExhaustedRetries { attempts: 3, .. }));
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn single_attempt_failure_still_reports_exhausted_retries() {
        let transport = CountingTransport {
            fail: true,
            ..Default::default()
        };
        let client = ScheduleClient::new(transport, RetryPolicy::new(1, Duration::from_secs(1)));

        let err = client
            .fetch_week(2024, 1, SeasonType::Regular, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            SyncError::ExhaustedRetries { attempts, last } => {
                assert_eq!(attempts, 1);
                assert_eq!(last.status, Some(500));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_token_stops_network_fetch() {
        let client = ScheduleClient::new(CountingTransport::default(), RetryPolicy::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .fetch_week(2024, 1, SeasonType::Regular, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }

    #[tokio::test]
    async fn cleanup_recycles_transport() {
        let client = ScheduleClient::new(CountingTransport::default(), RetryPolicy::default());
        client.cleanup_connections();
        assert_eq!(client.transport().recycled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_decode_error() {
        struct Garbage;
        impl Transport for Garbage {
            async fn get_json(
                &self,
                _endpoint: &str,
                _params: &[(String, String)],
            ) -> Result<Value, TransportError> {
                Ok(json!({ "events": "not a list" }))
            }
        }

        let client = ScheduleClient::new(Garbage, RetryPolicy::default());
        let err = client
            .fetch_week(2024, 1, SeasonType::Regular, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
