//! Valuation axis: P/E, P/B, FCF yield, and growth-adjusted (PEG) scoring.

use screener_config::SectorBenchmark;
use screener_core::traits::{score_bag, Analyzer};
use screener_core::types::FinancialMetrics;

pub struct ValuationWeights {
    pub per: f64,
    pub pbr: f64,
    pub fcf_yield: f64,
    pub growth_adjusted: f64,
}

impl Default for ValuationWeights {
    fn default() -> Self {
        Self {
            per: 0.30,
            pbr: 0.20,
            fcf_yield: 0.30,
            growth_adjusted: 0.20,
        }
    }
}

pub struct ValuationAnalyzer {
    weights: ValuationWeights,
}

impl ValuationAnalyzer {
    pub fn new(weights: ValuationWeights) -> Self {
        Self { weights }
    }

    /// `eps_cagr` comes from the growth analysis bag already computed for
    /// this issuer (the PEG leg is growth-adjusted valuation, not an
    /// independently-fetched growth figure).
    pub fn analyze(
        &self,
        metrics: &FinancialMetrics,
        eps_cagr: f64,
        market_cap: f64,
        benchmark: &SectorBenchmark,
    ) -> serde_json::Map<String, serde_json::Value> {
        let per = FinancialMetrics::latest(&metrics.per);
        let pbr = FinancialMetrics::latest(&metrics.pbr);

        let per_score = banded_ratio_score(per, 5.0, benchmark.per_max);
        let pbr_score = banded_ratio_score(pbr, 1.0, benchmark.pbr_max);

        let fcf_yield = fcf_yield(metrics.ttm_fcf, market_cap);
        let fcf_yield_score = fcf_yield_score(fcf_yield);

        let growth_adjusted_score = growth_adjusted_score(per, eps_cagr);

        let valuation_score = self.weights.per * per_score
            + self.weights.pbr * pbr_score
            + self.weights.fcf_yield * fcf_yield_score
            + self.weights.growth_adjusted * growth_adjusted_score;

        score_bag([
            ("per", per),
            ("pbr", pbr),
            ("fcf_yield", fcf_yield),
            ("per_score", per_score),
            ("pbr_score", pbr_score),
            ("fcf_yield_score", fcf_yield_score),
            ("growth_adjusted_score", growth_adjusted_score),
            ("valuation_score", valuation_score),
        ])
    }
}

impl Analyzer for ValuationAnalyzer {
    fn name(&self) -> &'static str {
        "valuation"
    }
}

/// Shared shape of `per_score`/`pbr_score`: 0 at/below zero, 1 at or below
/// `floor`, 0 at or above `cap`, linear in between.
fn banded_ratio_score(ratio: f64, floor: f64, cap: f64) -> f64 {
    if ratio <= 0.0 {
        0.0
    } else if ratio <= floor {
        1.0
    } else if ratio >= cap {
        0.0
    } else {
        1.0 - ((ratio - floor) / (cap - floor))
    }
}

fn fcf_yield(ttm_fcf: f64, market_cap: f64) -> f64 {
    if market_cap <= 0.0 || ttm_fcf <= 0.0 {
        0.0
    } else {
        ttm_fcf / market_cap
    }
}

fn fcf_yield_score(yield_: f64) -> f64 {
    if yield_ <= 0.0 {
        0.0
    } else if yield_ >= 0.08 {
        1.0
    } else if yield_ >= 0.06 {
        0.9
    } else if yield_ >= 0.04 {
        0.7
    } else if yield_ >= 0.02 {
        0.5
    } else if yield_ >= 0.01 {
        0.3
    } else {
        0.1
    }
}

fn growth_adjusted_score(per: f64, eps_cagr: f64) -> f64 {
    if per <= 0.0 || eps_cagr <= 0.0 {
        return 0.0;
    }
    let peg = per / (eps_cagr * 100.0);
    if peg <= 0.5 {
        1.0
    } else if peg <= 0.75 {
        0.9
    } else if peg <= 1.0 {
        0.8
    } else if peg <= 1.5 {
        0.6
    } else if peg <= 2.0 {
        0.4
    } else if peg <= 3.0 {
        0.2
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metrics_with(per: f64, pbr: f64, ttm_fcf: f64) -> FinancialMetrics {
        FinancialMetrics {
            per: vec![per],
            pbr: vec![pbr],
            ttm_fcf,
            ..Default::default()
        }
    }

    #[test]
    fn zero_or_negative_per_scores_zero() {
        assert_eq!(banded_ratio_score(0.0, 5.0, 30.0), 0.0);
        assert_eq!(banded_ratio_score(-3.0, 5.0, 30.0), 0.0);
    }

    #[test]
    fn per_at_floor_is_perfect() {
        assert_eq!(banded_ratio_score(5.0, 5.0, 30.0), 1.0);
    }

    #[test]
    fn per_at_cap_scores_zero() {
        assert_eq!(banded_ratio_score(30.0, 5.0, 30.0), 0.0);
    }

    #[test]
    fn fcf_yield_ignores_nonpositive_market_cap() {
        assert_eq!(fcf_yield(10.0, 0.0), 0.0);
    }

    #[test]
    fn fcf_yield_score_bands_match_thresholds() {
        assert_eq!(fcf_yield_score(0.09), 1.0);
        assert_eq!(fcf_yield_score(0.005), 0.1);
        assert_eq!(fcf_yield_score(0.0), 0.0);
    }

    #[test]
    fn peg_ratio_excellent_scores_one() {
        // per=10, eps_cagr=0.25 -> peg = 10 / 25 = 0.4
        assert_eq!(growth_adjusted_score(10.0, 0.25), 1.0);
    }

    #[test]
    fn negative_growth_disqualifies_growth_adjusted_score() {
        assert_eq!(growth_adjusted_score(10.0, -0.05), 0.0);
    }

    #[test]
    fn analyze_produces_bounded_valuation_score() {
        let analyzer = ValuationAnalyzer::new(ValuationWeights::default());
        let metrics = metrics_with(15.0, 2.0, 5_000_000.0);
        let benchmark = SectorBenchmark::default();
        let bag = analyzer.analyze(&metrics, 0.12, 100_000_000.0, &benchmark);
        let score = bag.get("valuation_score").unwrap().as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    proptest! {
        // valuation_score stays bounded and divide-safe for arbitrary P/E,
        // P/B, market cap, and growth-rate combinations, including
        // zero/negative denominators.
        #[test]
        fn analyze_score_always_bounded_and_finite(
            per in -50f64..200f64,
            pbr in -10f64..50f64,
            ttm_fcf in -1e9f64..1e9f64,
            eps_cagr in -2f64..5f64,
            market_cap in -1e6f64..1e12f64,
        ) {
            let analyzer = ValuationAnalyzer::new(ValuationWeights::default());
            let benchmark = SectorBenchmark::default();
            let metrics = metrics_with(per, pbr, ttm_fcf);
            let bag = analyzer.analyze(&metrics, eps_cagr, market_cap, &benchmark);
            let score = bag.get("valuation_score").unwrap().as_f64().unwrap();
            prop_assert!(score.is_finite());
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
