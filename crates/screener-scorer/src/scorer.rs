//! Combines the four analyzer axes into a single `StockAnalysisResult`,
//! applies the cross-axis coherence multiplier, and (once a batch of
//! results has been ranked) attaches batch-relative normalization and
//! sector percentiles.

use std::collections::HashMap;

use growth_analyzer::{GrowthAnalyzer, GrowthWeights};
use risk_analyzer::{RiskAnalyzer, RiskWeights};
use screener_config::{AnalyzerWeights, CoherenceBonusConfig, ScoringConfig, SectorBenchmark};
use screener_core::adaptive::{mean, stability, trend};
use screener_core::traits::{score_bag, Analyzer};
use screener_core::types::{
    EarningsInfo, FinancialMetrics, InsiderTradingInfo, SentimentInfo, StockAnalysisResult,
};
use sentiment_analyzer::{SentimentAnalyzer, SentimentWeights};
use valuation_analyzer::{ValuationAnalyzer, ValuationWeights};

pub struct Scorer {
    growth: GrowthAnalyzer,
    risk: RiskAnalyzer,
    valuation: ValuationAnalyzer,
    sentiment: SentimentAnalyzer,
    weights: AnalyzerWeights,
    coherence: CoherenceBonusConfig,
}

impl Scorer {
    pub fn new(scoring: &ScoringConfig) -> Self {
        Self {
            growth: GrowthAnalyzer::new(GrowthWeights::default()),
            risk: RiskAnalyzer::new(RiskWeights::default()),
            valuation: ValuationAnalyzer::new(ValuationWeights::default()),
            sentiment: SentimentAnalyzer::new(SentimentWeights::default()),
            weights: scoring.weights.clone(),
            coherence: scoring.coherence_bonus.clone(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn score(
        &self,
        symbol: &str,
        company_name: &str,
        sector: &str,
        industry: &str,
        market_cap: f64,
        metrics: &FinancialMetrics,
        benchmark: &SectorBenchmark,
        insider_trading: Option<InsiderTradingInfo>,
        earnings_info: Option<EarningsInfo>,
        sentiment_info: Option<SentimentInfo>,
    ) -> StockAnalysisResult {
        tracing::debug!(symbol, axis = self.growth.name(), "scoring axis");
        let growth_analysis = self.growth.analyze(metrics, benchmark);
        let growth_score = bag_f64(&growth_analysis, "growth_score");

        tracing::debug!(symbol, axis = self.risk.name(), "scoring axis");
        let risk_assessment = self.risk.analyze(metrics, benchmark);
        let risk_score = bag_f64(&risk_assessment, "risk_score");

        let eps_cagr = bag_f64(&growth_analysis, "eps_cagr");
        tracing::debug!(symbol, axis = self.valuation.name(), "scoring axis");
        let valuation_analysis = self.valuation.analyze(metrics, eps_cagr, market_cap, benchmark);
        let valuation_score = bag_f64(&valuation_analysis, "valuation_score");

        tracing::debug!(symbol, axis = self.sentiment.name(), "scoring axis");
        let sentiment_bag = self.sentiment.analyze(
            insider_trading.as_ref(),
            earnings_info.as_ref(),
            sentiment_info.as_ref(),
        );
        let sentiment_score = bag_f64(&sentiment_bag, "sentiment_score");

        let coherence_multiplier = coherence_multiplier(metrics, self.coherence.max_multiplier);

        let base_quality_score = self.weights.growth * growth_score
            + self.weights.risk * risk_score
            + self.weights.valuation * valuation_score
            + self.weights.sentiment * sentiment_score;
        let quality_score = base_quality_score * coherence_multiplier;

        let component_scores = score_bag([
            ("growth_score", growth_score),
            ("risk_score", risk_score),
            ("valuation_score", valuation_score),
            ("sentiment_score", sentiment_score),
            ("coherence_multiplier", coherence_multiplier),
            ("base_quality_score", base_quality_score),
            ("final_quality_score", quality_score),
        ]);

        let avg_roe = if metrics.roe.len() >= 3 { mean(&metrics.roe[..3]) } else { 0.0 };
        let fcf_yield = bag_f64(&valuation_analysis, "fcf_yield");
        let result_metrics = score_bag([
            ("revenue_cagr", bag_f64(&growth_analysis, "revenue_cagr")),
            ("eps_cagr", eps_cagr),
            ("fcf_cagr", bag_f64(&growth_analysis, "fcf_cagr")),
            ("avg_roe", avg_roe),
            ("latest_roe", FinancialMetrics::latest(&metrics.roe)),
            ("per", FinancialMetrics::latest(&metrics.per)),
            ("pbr", FinancialMetrics::latest(&metrics.pbr)),
            ("debt_to_equity", FinancialMetrics::latest(&metrics.debt_to_equity)),
            ("interest_coverage", FinancialMetrics::latest(&metrics.interest_coverage)),
            ("fcf_yield", fcf_yield),
        ]);

        StockAnalysisResult {
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            sector: sector.to_string(),
            industry: industry.to_string(),
            market_cap,
            quality_score,
            normalized_quality_score: 0.0,
            component_scores,
            metrics: result_metrics,
            growth_analysis,
            risk_assessment,
            valuation_analysis,
            insider_trading,
            earnings_info,
            sentiment_info,
            sector_percentile: HashMap::new(),
        }
    }
}

fn bag_f64(bag: &serde_json::Map<String, serde_json::Value>, key: &str) -> f64 {
    bag.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

/// Five boolean cross-axis alignment checks, each worth an equal share of
/// the distance between 0.9 and `max_multiplier`.
fn coherence_multiplier(metrics: &FinancialMetrics, max_multiplier: f64) -> f64 {
    let mut flags = 0u32;

    // 1. Revenue and FCF trend agree in direction (both rising, or both not).
    let revenue_growing = trend(&metrics.revenue) > 0.0;
    let fcf_growing = trend(&metrics.fcf) > 0.0;
    if revenue_growing == fcf_growing {
        flags += 1;
    }

    // 2. Stable margins paired with strong profitability.
    let margins_stable = stability(&metrics.operating_margin) > 0.7;
    let high_roe = FinancialMetrics::latest(&metrics.roe) > 0.15;
    if margins_stable && high_roe {
        flags += 1;
    }

    // 3. Fast EPS growth should command a higher P/E, and vice versa (XNOR).
    let fast_growth = match (metrics.eps.first(), metrics.eps.last()) {
        (Some(&latest), Some(&oldest)) if metrics.eps.len() > 1 => latest > oldest * 1.15,
        _ => false,
    };
    let high_pe = FinancialMetrics::latest(&metrics.per) > 20.0;
    if fast_growth == high_pe {
        flags += 1;
    }

    // 4. Low leverage paired with strong cash conversion.
    let low_debt = metrics.debt_to_equity.first().map(|&de| de < 1.0).unwrap_or(true);
    let strong_cf = metrics
        .ocf_to_net_income
        .first()
        .map(|&r| r > 1.0)
        .unwrap_or(false);
    if low_debt && strong_cf {
        flags += 1;
    }

    // 5. Both revenue and earnings are consistent, not just one.
    let revenue_consistent = stability(&metrics.revenue) > 0.7;
    let earnings_consistent = stability(&metrics.eps) > 0.7;
    if revenue_consistent && earnings_consistent {
        flags += 1;
    }

    let min_multiplier = 0.9;
    let coherence_ratio = flags as f64 / 5.0;
    min_multiplier + coherence_ratio * (max_multiplier - min_multiplier)
}

/// A metric path into `StockAnalysisResult`, as used by sector percentiles.
enum MetricPath {
    QualityScore,
    Metric(&'static str),
    Component(&'static str),
}

impl MetricPath {
    fn key(&self) -> &'static str {
        match self {
            MetricPath::QualityScore => "quality_score",
            MetricPath::Metric(k) => k,
            MetricPath::Component(k) => k,
        }
    }

    fn value_of(&self, result: &StockAnalysisResult) -> f64 {
        match self {
            MetricPath::QualityScore => result.quality_score,
            MetricPath::Metric(k) => result.metrics.get(*k).and_then(|v| v.as_f64()).unwrap_or(0.0),
            MetricPath::Component(k) => result
                .component_scores
                .get(*k)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
        }
    }

    fn full_path(&self) -> String {
        match self {
            MetricPath::QualityScore => "quality_score".to_string(),
            MetricPath::Metric(k) => format!("metrics.{k}"),
            MetricPath::Component(k) => format!("component_scores.{k}"),
        }
    }
}

/// Groups `results` by sector and, within any group of at least two,
/// computes "fraction of peers this issuer outranks x 100" for each tracked
/// metric path. Ties are broken by input order. Singleton sectors are left
/// unannotated.
pub fn attach_sector_percentiles(results: &mut [StockAnalysisResult]) {
    let higher_better = [
        MetricPath::QualityScore,
        MetricPath::Metric("revenue_cagr"),
        MetricPath::Metric("eps_cagr"),
        MetricPath::Metric("fcf_cagr"),
        MetricPath::Metric("latest_roe"),
        MetricPath::Metric("fcf_yield"),
        MetricPath::Component("growth_score"),
        MetricPath::Component("risk_score"),
        MetricPath::Component("valuation_score"),
    ];
    let lower_better = [MetricPath::Metric("per"), MetricPath::Metric("debt_to_equity")];

    let mut sector_indices: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, result) in results.iter().enumerate() {
        sector_indices.entry(result.sector.clone()).or_default().push(i);
    }

    for indices in sector_indices.values() {
        if indices.len() < 2 {
            continue;
        }
        for path in higher_better.iter() {
            apply_percentile(results, indices, path, true);
        }
        for path in lower_better.iter() {
            apply_percentile(results, indices, path, false);
        }
    }
}

fn apply_percentile(
    results: &mut [StockAnalysisResult],
    indices: &[usize],
    path: &MetricPath,
    higher_is_better: bool,
) {
    let mut ranked: Vec<(usize, f64)> = indices
        .iter()
        .map(|&i| (i, path.value_of(&results[i])))
        .collect();
    // Stable sort preserves input order for ties.
    ranked.sort_by(|a, b| {
        if higher_is_better {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    let total = ranked.len();
    let key = path.full_path();
    for (rank, (i, _)) in ranked.into_iter().enumerate() {
        let percentile = if total > 1 {
            100.0 * (rank as f64 / (total - 1) as f64)
        } else {
            50.0
        };
        // Rank 0 is best under the chosen ordering; "outranks" is the
        // complement of normalized rank.
        let outranks = 100.0 - percentile;
        results[i].sector_percentile.insert(key.clone(), outranks);
    }
    let _ = path.key();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use screener_config::ScoringConfig;

    fn metrics_with(eps: Vec<f64>, per: Vec<f64>, roe: Vec<f64>) -> FinancialMetrics {
        FinancialMetrics {
            eps,
            per,
            roe,
            ..Default::default()
        }
    }

    #[test]
    fn coherence_multiplier_is_bounded() {
        let metrics = metrics_with(vec![2.0, 1.0], vec![25.0], vec![0.2]);
        let m = coherence_multiplier(&metrics, 1.15);
        assert!((0.9..=1.15).contains(&m));
    }

    #[test]
    fn all_flags_aligned_hits_max_multiplier() {
        let metrics = FinancialMetrics {
            revenue: vec![120.0, 110.0, 100.0],
            fcf: vec![30.0, 25.0, 20.0],
            operating_margin: vec![0.20, 0.20, 0.20],
            roe: vec![0.18, 0.18, 0.18],
            eps: vec![10.0, 5.0],
            per: vec![30.0],
            debt_to_equity: vec![0.5],
            ocf_to_net_income: vec![1.1],
            ..Default::default()
        };
        let m = coherence_multiplier(&metrics, 1.15);
        assert!((m - 1.15).abs() < 1e-9, "expected max multiplier, got {m}");
    }

    #[test]
    fn score_produces_bounded_quality_score() {
        let scorer = Scorer::new(&ScoringConfig::default());
        let metrics = metrics_with(vec![2.0, 1.8], vec![18.0], vec![0.16, 0.15, 0.14]);
        let benchmark = SectorBenchmark::default();
        let result = scorer.score(
            "TST", "Test Co", "Technology", "Software", 5_000_000_000.0,
            &metrics, &benchmark, None, None, None,
        );
        assert!((0.0..=1.15).contains(&result.quality_score));
        assert!(result.sector_percentile.is_empty());
    }

    #[test]
    fn singleton_sector_gets_no_percentile() {
        let scorer = Scorer::new(&ScoringConfig::default());
        let metrics = metrics_with(vec![2.0], vec![18.0], vec![0.16]);
        let benchmark = SectorBenchmark::default();
        let mut results = vec![scorer.score(
            "TST", "Test Co", "Technology", "Software", 1.0, &metrics, &benchmark, None, None, None,
        )];
        attach_sector_percentiles(&mut results);
        assert!(results[0].sector_percentile.is_empty());
    }

    #[test]
    fn two_peers_get_opposite_percentiles() {
        let scorer = Scorer::new(&ScoringConfig::default());
        let benchmark = SectorBenchmark::default();
        let strong = metrics_with(vec![3.0, 1.0], vec![10.0], vec![0.30, 0.28, 0.26]);
        let weak = metrics_with(vec![1.0, 1.0], vec![10.0], vec![0.02, 0.02, 0.02]);
        let mut results = vec![
            scorer.score("A", "A Inc", "Technology", "Software", 1.0, &strong, &benchmark, None, None, None),
            scorer.score("B", "B Inc", "Technology", "Software", 1.0, &weak, &benchmark, None, None, None),
        ];
        attach_sector_percentiles(&mut results);
        let a_pct = results[0].sector_percentile["quality_score"];
        let b_pct = results[1].sector_percentile["quality_score"];
        assert!(a_pct > b_pct, "stronger issuer should outrank more peers: {a_pct} vs {b_pct}");
    }

    proptest! {
        // coherence_multiplier is always in [0.9, max_multiplier], and
        // quality_score is always in [0, max_multiplier], however the
        // underlying series are shaped.
        #[test]
        fn coherence_multiplier_always_within_bounds(
            revenue in proptest::collection::vec(-1e6f64..1e6f64, 0..6),
            fcf in proptest::collection::vec(-1e6f64..1e6f64, 0..6),
            operating_margin in proptest::collection::vec(-1f64..1f64, 0..6),
            roe in proptest::collection::vec(-1f64..1f64, 0..4),
            eps in proptest::collection::vec(-1e6f64..1e6f64, 0..4),
            per in proptest::collection::vec(-100f64..200f64, 0..2),
            debt_to_equity in proptest::collection::vec(-10f64..20f64, 0..2),
            ocf_to_net_income in proptest::collection::vec(-10f64..10f64, 0..2),
        ) {
            let metrics = FinancialMetrics {
                revenue,
                fcf,
                operating_margin,
                roe,
                eps,
                per,
                debt_to_equity,
                ocf_to_net_income,
                ..Default::default()
            };
            let m = coherence_multiplier(&metrics, 1.15);
            prop_assert!(m.is_finite());
            prop_assert!((0.9..=1.15).contains(&m));
        }

        #[test]
        fn score_is_always_within_bounds(
            eps in proptest::collection::vec(-1e6f64..1e6f64, 0..4),
            per in proptest::collection::vec(-100f64..200f64, 0..2),
            roe in proptest::collection::vec(-1f64..1f64, 0..4),
            market_cap in -1e6f64..1e12f64,
        ) {
            let scorer = Scorer::new(&ScoringConfig::default());
            let metrics = metrics_with(eps, per, roe);
            let benchmark = SectorBenchmark::default();
            let result = scorer.score(
                "TST", "Test Co", "Technology", "Software", market_cap,
                &metrics, &benchmark, None, None, None,
            );
            prop_assert!(result.quality_score.is_finite());
            prop_assert!((0.0..=1.15).contains(&result.quality_score));
        }
    }
}
