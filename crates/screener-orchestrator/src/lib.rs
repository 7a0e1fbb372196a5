//! End-to-end pipeline: universe → initial filter → bounded-parallel
//! per-symbol analysis → threshold/cap → batch-normalize → sector
//! percentiles. The one component that owns a `JoinSet` and touches every
//! other crate in the workspace.

mod filter;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use screener_cache::CacheBackend;
use screener_client::Fetcher;
use screener_config::ScreenerConfig;
use screener_core::error::ScreeningError;
use screener_core::types::StockAnalysisResult;
use screener_scorer::{
    attach_sector_percentiles, prepare_earnings_info, prepare_financial_metrics,
    prepare_insider_trading_info, prepare_sentiment_info, PointInTimeFilter, Scorer,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use filter::{looks_like_fund_or_etf, passes_roe_gate, within_market_cap};

/// Aggregate statistics for one pipeline run, returned alongside the ranked
/// results so a caller never has to infer drop reasons from log output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetadata {
    pub universe_size: usize,
    pub filtered_size: usize,
    pub analyzed_count: usize,
    pub dropped: Vec<(String, String)>,
}

struct Candidate {
    symbol: String,
    company_name: String,
    sector: String,
    industry: String,
    market_cap: f64,
}

enum SymbolOutcome {
    Scored(StockAnalysisResult),
    Dropped { symbol: String, reason: String },
}

pub struct Orchestrator<B: CacheBackend> {
    fetcher: Arc<Fetcher<B>>,
    scorer: Arc<Scorer>,
    config: Arc<ScreenerConfig>,
}

impl<B: CacheBackend + Send + Sync + 'static> Orchestrator<B> {
    pub fn new(config: ScreenerConfig, fetcher: Fetcher<B>) -> Self {
        let scorer = Scorer::new(&config.scoring);
        Self {
            fetcher: Arc::new(fetcher),
            scorer: Arc::new(scorer),
            config: Arc::new(config),
        }
    }

    /// `as_of` turns this into a point-in-time backtest replay; `None` runs
    /// against the freshest data the provider will return.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, as_of: Option<NaiveDate>) -> (Vec<StockAnalysisResult>, RunMetadata) {
        let universe = self.fetcher.get_nasdaq_symbols().await;
        let universe_size = universe.len();
        tracing::info!(universe_size, "fetched NASDAQ universe");

        let symbols: Vec<String> = universe
            .iter()
            .filter_map(|v| v.get("symbol").and_then(Value::as_str).map(str::to_string))
            .collect();

        let profiles = self.fetcher.get_company_profiles(&symbols).await;
        let profile_by_symbol: HashMap<&str, &Value> = profiles
            .iter()
            .filter_map(|p| p.get("symbol").and_then(Value::as_str).map(|s| (s, p)))
            .collect();

        let candidates = self.initial_filter(&symbols, &profile_by_symbol);
        let filtered_size = candidates.len();
        tracing::info!(filtered_size, "initial filter complete");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max_workers.max(1)));
        let mut tasks = JoinSet::new();
        for candidate in candidates {
            let fetcher = Arc::clone(&self.fetcher);
            let scorer = Arc::clone(&self.scorer);
            let config = Arc::clone(&self.config);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                analyze_one(candidate, &fetcher, &scorer, &config, as_of).await
            });
        }

        let mut results = Vec::new();
        let mut dropped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(SymbolOutcome::Scored(result)) => results.push(result),
                Ok(SymbolOutcome::Dropped { symbol, reason }) => {
                    tracing::debug!(symbol, reason, "dropped");
                    dropped.push((symbol, reason));
                }
                Err(e) => tracing::warn!("symbol analysis task did not complete: {e}"),
            }
        }

        results.sort_by(|a, b| b.quality_score.partial_cmp(&a.quality_score).unwrap_or(Ordering::Equal));
        results.retain(|r| r.quality_score >= self.config.output.min_quality_score);
        results.truncate(self.config.output.max_stocks);

        normalize_quality_scores(&mut results);
        attach_sector_percentiles(&mut results);

        let analyzed_count = results.len();
        tracing::info!(analyzed_count, "pipeline run complete");

        (
            results,
            RunMetadata {
                universe_size,
                filtered_size,
                analyzed_count,
                dropped,
            },
        )
    }

    fn initial_filter(&self, symbols: &[String], profile_by_symbol: &HashMap<&str, &Value>) -> Vec<Candidate> {
        let criteria = &self.config.screening;
        symbols
            .iter()
            .filter_map(|symbol| {
                let profile = *profile_by_symbol.get(symbol.as_str())?;

                let exchange = profile.get("exchangeShortName").and_then(Value::as_str).unwrap_or("");
                if looks_like_fund_or_etf(symbol, exchange) {
                    return None;
                }

                let market_cap = profile.get("mktCap").and_then(Value::as_f64)?;
                if !within_market_cap(market_cap, &criteria.market_cap) {
                    return None;
                }

                let sector = profile.get("sector").and_then(Value::as_str).unwrap_or("N/A").to_string();
                if criteria.exclude_financial_services && sector == "Financial Services" {
                    return None;
                }

                let industry = profile.get("industry").and_then(Value::as_str).unwrap_or("N/A").to_string();
                let company_name = profile
                    .get("companyName")
                    .and_then(Value::as_str)
                    .unwrap_or(symbol)
                    .to_string();

                Some(Candidate {
                    symbol: symbol.clone(),
                    company_name,
                    sector,
                    industry,
                    market_cap,
                })
            })
            .collect()
    }
}

#[tracing::instrument(skip(candidate, fetcher, scorer, config), fields(symbol = %candidate.symbol))]
async fn analyze_one<B: CacheBackend>(
    candidate: Candidate,
    fetcher: &Fetcher<B>,
    scorer: &Scorer,
    config: &ScreenerConfig,
    as_of: Option<NaiveDate>,
) -> SymbolOutcome {
    let bundle = fetcher.get_comprehensive_bundle(&candidate.symbol).await;
    let pit = as_of.map(PointInTimeFilter::new);

    let (income, cash_flow, balance, ratios, ratios_ttm, key_metrics, earnings) = match &pit {
        Some(pit) => (
            pit.filter_statements(&bundle.income_statements),
            pit.filter_statements(&bundle.cash_flow_statements),
            pit.filter_statements(&bundle.balance_sheets),
            pit.filter_statements(&bundle.ratios),
            if pit.ttm_is_stale() { Vec::new() } else { bundle.ratios_ttm },
            pit.filter_statements(&bundle.key_metrics),
            pit.filter_earnings(&bundle.earnings_calendar),
        ),
        None => (
            bundle.income_statements,
            bundle.cash_flow_statements,
            bundle.balance_sheets,
            bundle.ratios,
            bundle.ratios_ttm,
            bundle.key_metrics,
            bundle.earnings_calendar,
        ),
    };

    let Some(metrics) = prepare_financial_metrics(&income, &cash_flow, &balance, &ratios, &ratios_ttm, &key_metrics)
    else {
        let reason = ScreeningError::InsufficientData("no overlapping statement dates".to_string());
        return SymbolOutcome::Dropped {
            symbol: candidate.symbol,
            reason: reason.to_string(),
        };
    };

    if !passes_roe_gate(&metrics.roe, &config.screening.roe) {
        return SymbolOutcome::Dropped {
            symbol: candidate.symbol,
            reason: "failed ROE gate".to_string(),
        };
    }

    let insider_trading = prepare_insider_trading_info(&bundle.insider_trading);
    let earnings_info = prepare_earnings_info(&earnings);
    let sentiment_info = prepare_sentiment_info(
        bundle.social_sentiment_bullish.as_ref(),
        bundle.social_sentiment_bearish.as_ref(),
    );

    let benchmark = config.benchmark_for(&candidate.sector);
    let result = scorer.score(
        &candidate.symbol,
        &candidate.company_name,
        &candidate.sector,
        &candidate.industry,
        candidate.market_cap,
        &metrics,
        &benchmark,
        insider_trading,
        earnings_info,
        sentiment_info,
    );
    SymbolOutcome::Scored(result)
}

/// `(x - min) / (max - min)` over the surviving batch; all 1.0 if the range
/// collapses to zero (every survivor scored identically).
fn normalize_quality_scores(results: &mut [StockAnalysisResult]) {
    if results.is_empty() {
        return;
    }
    let min = results.iter().map(|r| r.quality_score).fold(f64::INFINITY, f64::min);
    let max = results.iter().map(|r| r.quality_score).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    for result in results.iter_mut() {
        result.normalized_quality_score = if range > 0.0 {
            (result.quality_score - min) / range
        } else {
            1.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result_with(score: f64) -> StockAnalysisResult {
        StockAnalysisResult {
            symbol: "TST".to_string(),
            company_name: "Test".to_string(),
            sector: "Technology".to_string(),
            industry: "Software".to_string(),
            market_cap: 1.0,
            quality_score: score,
            normalized_quality_score: 0.0,
            component_scores: Default::default(),
            metrics: Default::default(),
            growth_analysis: Default::default(),
            risk_assessment: Default::default(),
            valuation_analysis: Default::default(),
            insider_trading: None,
            earnings_info: None,
            sentiment_info: None,
            sector_percentile: Default::default(),
        }
    }

    #[test]
    fn normalize_spreads_scores_across_the_batch() {
        let mut results = vec![result_with(0.9), result_with(0.7), result_with(0.5)];
        normalize_quality_scores(&mut results);
        assert!((results[0].normalized_quality_score - 1.0).abs() < 1e-9);
        assert!((results[2].normalized_quality_score - 0.0).abs() < 1e-9);
        assert!((results[1].normalized_quality_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn normalize_collapses_to_one_when_every_score_is_identical() {
        let mut results = vec![result_with(0.8), result_with(0.8)];
        normalize_quality_scores(&mut results);
        assert!(results.iter().all(|r| (r.normalized_quality_score - 1.0).abs() < 1e-9));
    }

    #[test]
    fn normalize_on_an_empty_batch_is_a_no_op() {
        let mut results: Vec<StockAnalysisResult> = Vec::new();
        normalize_quality_scores(&mut results);
        assert!(results.is_empty());
    }

    proptest! {
        // normalized_quality_score is monotone non-decreasing in quality_score,
        // bounded in [0,1], with min=0/max=1 whenever the batch's score range
        // is non-degenerate.
        #[test]
        fn normalize_is_monotone_and_bounded(scores in proptest::collection::vec(-1e6f64..1e6f64, 1..20)) {
            let mut results: Vec<StockAnalysisResult> = scores.iter().map(|&s| result_with(s)).collect();
            normalize_quality_scores(&mut results);

            for r in &results {
                prop_assert!(r.normalized_quality_score.is_finite());
                prop_assert!((0.0..=1.0).contains(&r.normalized_quality_score));
            }

            let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if max > min {
                let mut pairs: Vec<(f64, f64)> = scores
                    .iter()
                    .zip(results.iter())
                    .map(|(&q, r)| (q, r.normalized_quality_score))
                    .collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
                for w in pairs.windows(2) {
                    prop_assert!(w[1].1 >= w[0].1 - 1e-9);
                }
            }
        }
    }
}
