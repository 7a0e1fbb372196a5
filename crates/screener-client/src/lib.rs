//! Composes the cache, the rate limiter, and bounded request concurrency
//! into the single outbound surface the pipeline talks to: the provider's
//! `v3`/`v4` REST endpoints. Every exposed method returns a "payload or
//! null" shape (`Vec<Value>` empty, or `Option<Value>` none) rather than a
//! `Result` — a failed endpoint never unwinds across this boundary, it just
//! reads as absent data to the Normalizer.

mod bundle;

pub use bundle::ComprehensiveBundle;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use screener_cache::{Cache, CacheBackend};
use screener_config::{ApiConfig, SecretApiKey};
use screener_ratelimit::AdaptiveRateLimiter;
use serde_json::Value;
use tokio::sync::Semaphore;

/// A provider response whose top level may legitimately be either a JSON
/// array or a single object (e.g. an error payload, or a TTM endpoint that
/// sometimes returns its one record bare). Always normalized to a list.
fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

/// Fetches, caches, paces, and retries requests against the provider's
/// `v3`/`v4` REST APIs. One instance is shared (behind an `Arc`) across the
/// whole pipeline run; its cache and rate limiter are the only process-wide
/// mutable state (the concurrency permit is local to this struct).
pub struct Fetcher<B: CacheBackend> {
    client: Client,
    api_key: SecretApiKey,
    base_url_v3: String,
    base_url_v4: String,
    cache: Cache<B>,
    rate_limiter: Arc<AdaptiveRateLimiter>,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
}

impl<B: CacheBackend> Fetcher<B> {
    pub fn new(
        api: &ApiConfig,
        api_key: SecretApiKey,
        cache: Cache<B>,
        rate_limiter: Arc<AdaptiveRateLimiter>,
        max_workers: usize,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url_v3: api.base_url.clone(),
            base_url_v4: api.base_url_v4.clone(),
            cache,
            rate_limiter,
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            max_retries: api.max_retries.max(1),
        }
    }

    fn key(&self) -> &str {
        self.api_key.expose()
    }

    /// The single request primitive every endpoint method funnels through:
    /// cache consult, permit + rate-limit slot, bounded retries, write-through
    /// on success. 404 returns `None` immediately with no retry; any other
    /// non-2xx, a timeout, or a transport error retries within the budget and
    /// then degrades to `None` rather than propagating.
    async fn fetch_json(&self, url: &str, ttl_override: Option<Duration>) -> Option<Value> {
        if let Some(cached) = self.cache.get(url).await {
            if let Ok(value) = serde_json::from_slice(&cached) {
                return Some(value);
            }
        }

        let _permit = self.semaphore.acquire().await.ok()?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.rate_limiter.acquire().await;

            let response = match self.client.get(url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("transport error fetching {url}: {e}");
                    if attempt >= self.max_retries {
                        return None;
                    }
                    continue;
                }
            };

            let status = response.status();
            self.rate_limiter
                .handle_response(status, response.headers())
                .await;

            match status {
                StatusCode::OK => {
                    let bytes = match response.bytes().await {
                        Ok(bytes) => bytes,
                        Err(_) => {
                            if attempt >= self.max_retries {
                                return None;
                            }
                            continue;
                        }
                    };
                    let value: Value = match serde_json::from_slice(&bytes) {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::warn!("malformed JSON from {url}: {e}");
                            return None;
                        }
                    };
                    self.cache.set(url, &bytes, ttl_override).await;
                    return Some(value);
                }
                StatusCode::NOT_FOUND => return None,
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::debug!("429 from {url}, attempt {attempt}/{}", self.max_retries);
                    if attempt >= self.max_retries {
                        return None;
                    }
                }
                other => {
                    tracing::debug!("HTTP {other} from {url}, attempt {attempt}/{}", self.max_retries);
                    if attempt >= self.max_retries {
                        return None;
                    }
                }
            }
        }
    }

    pub async fn get_nasdaq_symbols(&self) -> Vec<Value> {
        let url = format!("{}/symbol/NASDAQ?apikey={}", self.base_url_v3, self.key());
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    /// Batches in groups of 100 symbols (the provider's own limit) and
    /// concatenates, keeping only records that actually carry a `symbol`.
    pub async fn get_company_profiles(&self, symbols: &[String]) -> Vec<Value> {
        let mut profiles = Vec::new();
        for batch in symbols.chunks(100) {
            let joined = batch.join(",");
            let url = format!("{}/profile/{joined}?apikey={}", self.base_url_v3, self.key());
            if let Some(value) = self.fetch_json(&url, None).await {
                profiles.extend(
                    as_list(value)
                        .into_iter()
                        .filter(|p| p.get("symbol").and_then(Value::as_str).is_some()),
                );
            }
        }
        profiles
    }

    pub async fn get_income_statements(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!(
            "{}/income-statement/{symbol}?limit={limit}&apikey={}",
            self.base_url_v3,
            self.key()
        );
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_cash_flow_statements(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!(
            "{}/cash-flow-statement/{symbol}?limit={limit}&apikey={}",
            self.base_url_v3,
            self.key()
        );
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_balance_sheets(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!(
            "{}/balance-sheet-statement/{symbol}?limit={limit}&apikey={}",
            self.base_url_v3,
            self.key()
        );
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_ratios(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!("{}/ratios/{symbol}?limit={limit}&apikey={}", self.base_url_v3, self.key());
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_ratios_ttm(&self, symbol: &str) -> Vec<Value> {
        let url = format!("{}/ratios-ttm/{symbol}?apikey={}", self.base_url_v3, self.key());
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_key_metrics(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!(
            "{}/key-metrics/{symbol}?limit={limit}&apikey={}",
            self.base_url_v3,
            self.key()
        );
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_key_metrics_ttm(&self, symbol: &str) -> Vec<Value> {
        let url = format!("{}/key-metrics-ttm/{symbol}?apikey={}", self.base_url_v3, self.key());
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_financial_growth(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!(
            "{}/financial-growth/{symbol}?limit={limit}&apikey={}",
            self.base_url_v3,
            self.key()
        );
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    pub async fn get_insider_trading(&self, symbol: &str, limit: u32) -> Vec<Value> {
        let url = format!(
            "{}/insider-trading?symbol={symbol}&page=0&limit={limit}&apikey={}",
            self.base_url_v4,
            self.key()
        );
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    /// `from` defaults to two years back when not supplied, matching the
    /// provider's own default window for a symbol's earnings history.
    pub async fn get_earnings_calendar(&self, symbol: &str, from: Option<&str>, to: Option<&str>) -> Vec<Value> {
        let default_from = (Utc::now() - ChronoDuration::days(730))
            .format("%Y-%m-%d")
            .to_string();
        let from = from.unwrap_or(&default_from);
        let mut url = format!("{}/earnings-calendar?symbol={symbol}&from={from}", self.base_url_v3);
        if let Some(to) = to {
            url.push_str(&format!("&to={to}"));
        }
        url.push_str(&format!("&apikey={}", self.key()));
        self.fetch_json(&url, None).await.map(as_list).unwrap_or_default()
    }

    /// Two requests in parallel, bullish then bearish; either or both may
    /// come back empty without failing the call.
    pub async fn get_social_sentiment(&self, symbol: &str) -> (Option<Value>, Option<Value>) {
        let bullish_url = format!(
            "{}/social-sentiments/trending?symbol={symbol}&type=bullish&source=stocktwits&apikey={}",
            self.base_url_v4,
            self.key()
        );
        let bearish_url = format!(
            "{}/social-sentiments/trending?symbol={symbol}&type=bearish&source=stocktwits&apikey={}",
            self.base_url_v4,
            self.key()
        );
        let (bullish, bearish) = tokio::join!(
            self.fetch_json(&bullish_url, None),
            self.fetch_json(&bearish_url, None)
        );
        (
            bullish.map(as_list).and_then(|v| v.into_iter().next()),
            bearish.map(as_list).and_then(|v| v.into_iter().next()),
        )
    }

    /// Extracts the `historical` subtree the endpoint wraps its data under.
    /// An explicit `from`/`to` pair pins a fixed past window (cached for a
    /// day); otherwise `limit` bounds a rolling recent-bars request.
    pub async fn get_historical_price(
        &self,
        symbol: &str,
        from: Option<&str>,
        to: Option<&str>,
        limit: u32,
    ) -> Vec<Value> {
        let url = match (from, to) {
            (Some(from), Some(to)) => format!(
                "{}/historical-price-full/{symbol}?from={from}&to={to}&apikey={}",
                self.base_url_v3,
                self.key()
            ),
            _ => format!(
                "{}/historical-price-full/{symbol}?timeseries={limit}&apikey={}",
                self.base_url_v3,
                self.key()
            ),
        };
        let Some(value) = self.fetch_json(&url, None).await else {
            return Vec::new();
        };
        value
            .get("historical")
            .cloned()
            .map(as_list)
            .unwrap_or_default()
    }

    /// Fans out every endpoint this symbol needs concurrently and collects
    /// them into one bundle; a single endpoint's failure surfaces as an
    /// empty field, never as a failure of the whole bundle.
    pub async fn get_comprehensive_bundle(&self, symbol: &str) -> ComprehensiveBundle {
        let (
            income_statements,
            cash_flow_statements,
            balance_sheets,
            ratios,
            ratios_ttm,
            key_metrics,
            key_metrics_ttm,
            financial_growth,
            insider_trading,
            earnings_calendar,
            historical_price,
        ) = tokio::join!(
            self.get_income_statements(symbol, 20),
            self.get_cash_flow_statements(symbol, 20),
            self.get_balance_sheets(symbol, 20),
            self.get_ratios(symbol, 20),
            self.get_ratios_ttm(symbol),
            self.get_key_metrics(symbol, 20),
            self.get_key_metrics_ttm(symbol),
            self.get_financial_growth(symbol, 20),
            self.get_insider_trading(symbol, 50),
            self.get_earnings_calendar(symbol, None, None),
            self.get_historical_price(symbol, None, None, 5),
        );
        let (social_sentiment_bullish, social_sentiment_bearish) = self.get_social_sentiment(symbol).await;

        ComprehensiveBundle {
            income_statements,
            cash_flow_statements,
            balance_sheets,
            ratios,
            ratios_ttm,
            key_metrics,
            key_metrics_ttm,
            financial_growth,
            insider_trading,
            earnings_calendar,
            historical_price,
            social_sentiment_bullish,
            social_sentiment_bearish,
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}
