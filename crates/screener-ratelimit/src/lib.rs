//! Adaptive request pacing that reacts to 429s and rate-limit headers instead
//! of a fixed requests-per-second cap.

use std::collections::VecDeque;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct RateLimiterState {
    request_times: VecDeque<Instant>,
    backoff_until: Option<Instant>,
    last_429_time: Option<Instant>,
}

pub struct RateLimiterStats {
    pub requests_last_minute: usize,
    pub current_rps: f64,
    pub in_backoff: bool,
    pub backoff_remaining: Duration,
}

/// Single process-wide state machine, one instance shared (via `Arc`) across
/// every `Fetcher` request.
pub struct AdaptiveRateLimiter {
    state: Mutex<RateLimiterState>,
}

impl AdaptiveRateLimiter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateLimiterState::default()),
        }
    }

    /// Blocks until any active backoff has elapsed, then records this request
    /// in the sliding window.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if let Some(until) = state.backoff_until {
            let now = Instant::now();
            if now < until {
                let wait = until - now;
                tracing::info!("rate limited, waiting {:.1}s", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
            state.backoff_until = None;
        }

        let cutoff = Instant::now() - WINDOW;
        state.request_times.retain(|&t| t > cutoff);
        state.request_times.push_back(Instant::now());
    }

    /// Adapts backoff/pacing from a completed request's status and headers.
    pub async fn handle_response(&self, status: StatusCode, headers: &HeaderMap) {
        let mut state = self.state.lock().await;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_seconds(headers).unwrap_or_else(|| {
                let quick_succession = state
                    .last_429_time
                    .map(|last| Instant::now().duration_since(last) < Duration::from_secs(10))
                    .unwrap_or(false);
                if quick_succession {
                    30
                } else {
                    10
                }
            });
            let now = Instant::now();
            state.backoff_until = Some(now + Duration::from_secs(wait));
            state.last_429_time = Some(now);
            tracing::warn!("rate limited! backing off for {wait}s");
            return;
        }

        if status == StatusCode::OK {
            if let (Some(remaining), Some(reset)) = (
                header_u64(headers, "x-ratelimit-remaining"),
                header_u64(headers, "x-ratelimit-reset"),
            ) {
                if remaining < 10 {
                    let now_epoch = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    let seconds_until_reset = reset.saturating_sub(now_epoch).max(1);
                    let delay = seconds_until_reset as f64 / remaining.max(1) as f64;
                    tracing::info!(
                        "approaching rate limit: {remaining} remaining, slowing to {delay:.1}s between requests"
                    );
                    drop(state);
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
        }
    }

    pub async fn get_stats(&self) -> RateLimiterStats {
        let state = self.state.lock().await;
        let now = Instant::now();
        let cutoff = now - WINDOW;
        let recent: Vec<&Instant> = state.request_times.iter().filter(|&&t| t > cutoff).collect();
        let span = recent
            .iter()
            .min()
            .map(|&&oldest| now.duration_since(oldest).as_secs_f64().min(60.0))
            .unwrap_or(0.0);
        let current_rps = if recent.is_empty() || span == 0.0 {
            0.0
        } else {
            recent.len() as f64 / span
        };
        let in_backoff = state.backoff_until.map(|until| now < until).unwrap_or(false);
        let backoff_remaining = state
            .backoff_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default();

        RateLimiterStats {
            requests_last_minute: recent.len(),
            current_rps,
            in_backoff,
            backoff_remaining,
        }
    }
}

impl Default for AdaptiveRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name).and_then(|v| v.to_str().ok()).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(
                reqwest::header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        headers
    }

    #[tokio::test]
    async fn no_backoff_by_default() {
        let limiter = AdaptiveRateLimiter::new();
        let stats = limiter.get_stats().await;
        assert!(!stats.in_backoff);
        assert_eq!(stats.requests_last_minute, 0);
    }

    #[tokio::test]
    async fn acquire_records_request_times() {
        let limiter = AdaptiveRateLimiter::new();
        limiter.acquire().await;
        limiter.acquire().await;
        let stats = limiter.get_stats().await;
        assert_eq!(stats.requests_last_minute, 2);
    }

    #[tokio::test]
    async fn rate_limited_response_sets_backoff_from_retry_after() {
        let limiter = AdaptiveRateLimiter::new();
        let headers = headers_with(&[("retry-after", "5")]);
        limiter.handle_response(StatusCode::TOO_MANY_REQUESTS, &headers).await;
        let stats = limiter.get_stats().await;
        assert!(stats.in_backoff);
        assert!(stats.backoff_remaining <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn rate_limited_without_header_falls_back_to_ten_seconds() {
        let limiter = AdaptiveRateLimiter::new();
        limiter
            .handle_response(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new())
            .await;
        let stats = limiter.get_stats().await;
        assert!(stats.backoff_remaining <= Duration::from_secs(10));
        assert!(stats.backoff_remaining > Duration::from_secs(8));
    }

    #[tokio::test]
    async fn quick_succession_429s_back_off_longer() {
        let limiter = AdaptiveRateLimiter::new();
        limiter
            .handle_response(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new())
            .await;
        limiter
            .handle_response(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new())
            .await;
        let stats = limiter.get_stats().await;
        assert!(stats.backoff_remaining > Duration::from_secs(20));
    }

    #[tokio::test]
    async fn successful_response_with_ample_quota_does_not_block() {
        let limiter = AdaptiveRateLimiter::new();
        let headers = headers_with(&[("x-ratelimit-remaining", "200"), ("x-ratelimit-reset", "999999999999")]);
        let start = Instant::now();
        limiter.handle_response(StatusCode::OK, &headers).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
