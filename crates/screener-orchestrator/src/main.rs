use std::sync::Arc;

use anyhow::{Context, Result};
use screener_cache::{Cache, FileCacheBackend, InMemoryCacheBackend, SqliteCacheBackend};
use screener_client::Fetcher;
use screener_config::{ScreenerConfig, SecretApiKey};
use screener_orchestrator::Orchestrator;
use screener_ratelimit::AdaptiveRateLimiter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("SCREENER_CONFIG").unwrap_or_else(|_| "screener.toml".to_string());
    let config = match std::fs::metadata(&config_path) {
        Ok(_) => ScreenerConfig::from_path(&config_path).with_context(|| format!("loading config from {config_path}"))?,
        Err(_) => {
            tracing::info!("no config file at {config_path}, using defaults");
            ScreenerConfig::default()
        }
    };

    let api_key = SecretApiKey::from_env("SCREENER_API_KEY")
        .context("SCREENER_API_KEY must be set — the pipeline refuses to start without a credential")?;

    let as_of = match std::env::var("SCREENER_AS_OF") {
        Ok(raw) => {
            let date = chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .with_context(|| format!("SCREENER_AS_OF={raw} is not a YYYY-MM-DD date"))?;
            tracing::info!(as_of = %date, "running as a point-in-time backtest replay");
            Some(date)
        }
        Err(_) => None,
    };

    let max_workers = config.concurrency.max_workers;
    let filename_prefix = config.output.filename_prefix.clone();
    let rate_limiter = Arc::new(AdaptiveRateLimiter::new());

    tracing::info!(backend = %config.cache.backend, "initializing cache");
    let results_and_metadata = match config.cache.backend.as_str() {
        "memory" | "in-memory" => {
            let cache = Cache::new(Arc::new(InMemoryCacheBackend::new()));
            let fetcher = Fetcher::new(&config.api, api_key, cache, rate_limiter, max_workers);
            let orchestrator = Orchestrator::new(config, fetcher);
            orchestrator.run(as_of).await
        }
        "file" => {
            let dir = std::env::var("SCREENER_CACHE_DIR").unwrap_or_else(|_| ".screener-cache".to_string());
            let backend = FileCacheBackend::new(dir).context("creating file cache directory")?;
            let cache = Cache::new(Arc::new(backend));
            let fetcher = Fetcher::new(&config.api, api_key, cache, rate_limiter, max_workers);
            let orchestrator = Orchestrator::new(config, fetcher);
            orchestrator.run(as_of).await
        }
        _ => {
            let db_url = std::env::var("SCREENER_CACHE_DB").unwrap_or_else(|_| "sqlite://screener-cache.db?mode=rwc".to_string());
            let pool = sqlx::SqlitePool::connect(&db_url)
                .await
                .context("connecting to the sqlite cache database")?;
            let backend = SqliteCacheBackend::connect(pool)
                .await
                .context("initializing the sqlite cache schema")?;
            let cache = Cache::new(Arc::new(backend));
            let fetcher = Fetcher::new(&config.api, api_key, cache, rate_limiter, max_workers);
            let orchestrator = Orchestrator::new(config, fetcher);
            orchestrator.run(as_of).await
        }
    };

    let (results, metadata) = results_and_metadata;
    tracing::info!(
        universe_size = metadata.universe_size,
        filtered_size = metadata.filtered_size,
        analyzed_count = metadata.analyzed_count,
        dropped = metadata.dropped.len(),
        "screening run finished with {} qualifying stocks",
        results.len()
    );

    let filename = format!("{filename_prefix}_{}.json", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
    let file = std::fs::File::create(&filename).with_context(|| format!("creating {filename}"))?;
    serde_json::to_writer_pretty(file, &results).with_context(|| format!("writing results to {filename}"))?;
    tracing::info!("wrote {} results to {filename}", results.len());

    Ok(())
}
