//! Risk axis: leverage, working-capital efficiency, margin stability, and
//! cash-flow quality.

use screener_config::SectorBenchmark;
use screener_core::adaptive::{stability, trend_remap};
use screener_core::traits::{score_bag, Analyzer};
use screener_core::types::FinancialMetrics;

pub struct RiskWeights {
    pub debt: f64,
    pub working_capital: f64,
    pub margin_stability: f64,
    pub cash_flow_quality: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            debt: 0.30,
            working_capital: 0.25,
            margin_stability: 0.25,
            cash_flow_quality: 0.20,
        }
    }
}

pub struct RiskAnalyzer {
    weights: RiskWeights,
}

impl RiskAnalyzer {
    pub fn new(weights: RiskWeights) -> Self {
        Self { weights }
    }

    pub fn analyze(
        &self,
        metrics: &FinancialMetrics,
        benchmark: &SectorBenchmark,
    ) -> serde_json::Map<String, serde_json::Value> {
        let debt_score = debt_metrics_score(metrics, benchmark);
        let wc_score = working_capital_score(metrics);
        let margin_score = margin_stability_score(metrics);
        let cash_flow_score = cash_flow_quality_score(metrics);

        let risk_score = self.weights.debt * debt_score
            + self.weights.working_capital * wc_score
            + self.weights.margin_stability * margin_score
            + self.weights.cash_flow_quality * cash_flow_score;

        score_bag([
            ("debt_score", debt_score),
            ("working_capital_score", wc_score),
            ("margin_stability_score", margin_score),
            ("cash_flow_quality_score", cash_flow_score),
            ("risk_score", risk_score),
        ])
    }
}

impl Analyzer for RiskAnalyzer {
    fn name(&self) -> &'static str {
        "risk"
    }
}

fn debt_metrics_score(metrics: &FinancialMetrics, benchmark: &SectorBenchmark) -> f64 {
    let de_ratio = FinancialMetrics::latest(&metrics.debt_to_equity);
    let de_score = if de_ratio <= 0.0 {
        1.0
    } else if de_ratio >= benchmark.debt_to_equity_max {
        0.0
    } else {
        1.0 - (de_ratio / benchmark.debt_to_equity_max)
    };

    let interest_coverage = FinancialMetrics::latest(&metrics.interest_coverage);
    let ic_score = if interest_coverage <= 0.0 {
        0.5
    } else if interest_coverage < 1.5 {
        0.0
    } else if interest_coverage < 3.0 {
        0.3
    } else if interest_coverage < 5.0 {
        0.6
    } else if interest_coverage < 10.0 {
        0.8
    } else {
        1.0
    };

    let debt_to_ebitda = FinancialMetrics::latest(&metrics.debt_to_ebitda);
    let de_ebitda_score = if debt_to_ebitda <= 0.0 {
        1.0
    } else if debt_to_ebitda > 5.0 {
        0.0
    } else if debt_to_ebitda > 4.0 {
        0.2
    } else if debt_to_ebitda > 3.0 {
        0.4
    } else if debt_to_ebitda > 2.0 {
        0.6
    } else if debt_to_ebitda > 1.0 {
        0.8
    } else {
        1.0
    };

    0.35 * de_score + 0.35 * ic_score + 0.30 * de_ebitda_score
}

fn working_capital_score(metrics: &FinancialMetrics) -> f64 {
    let wc_positive = metrics.working_capital.iter().take(3).all(|&wc| wc > 0.0);

    let wc_trend_score = trend_remap(&metrics.working_capital);

    let wc_to_revenue: Vec<f64> = metrics
        .working_capital
        .iter()
        .zip(metrics.revenue.iter())
        .map(|(&wc, &rev)| if rev > 0.0 { wc / rev } else { 0.0 })
        .collect();
    let wc_ratio = wc_to_revenue.first().copied().unwrap_or(0.0);
    let wc_ratio_score = if wc_ratio < 0.0 {
        0.0
    } else if wc_ratio == 0.0 {
        0.3
    } else if wc_ratio < 0.1 {
        0.5
    } else if wc_ratio <= 0.3 {
        1.0
    } else if wc_ratio <= 0.5 {
        0.7
    } else {
        0.4
    };

    0.3 * (if wc_positive { 1.0 } else { 0.0 }) + 0.3 * wc_trend_score + 0.4 * wc_ratio_score
}

fn margin_stability_score(metrics: &FinancialMetrics) -> f64 {
    let gm_stability = stability(&metrics.gross_margin);
    let om_stability = stability(&metrics.operating_margin);
    let gm_trend_score = trend_remap(&metrics.gross_margin);
    let om_trend_score = trend_remap(&metrics.operating_margin);

    0.25 * gm_stability + 0.25 * om_stability + 0.25 * gm_trend_score + 0.25 * om_trend_score
}

fn cash_flow_quality_score(metrics: &FinancialMetrics) -> f64 {
    let ocf_ni_ratio = FinancialMetrics::latest(&metrics.ocf_to_net_income);
    let ocf_ni_score = if ocf_ni_ratio <= 0.0 {
        0.0
    } else if ocf_ni_ratio < 0.7 {
        0.3
    } else if ocf_ni_ratio < 0.9 {
        0.7
    } else if ocf_ni_ratio <= 1.2 {
        1.0
    } else if ocf_ni_ratio <= 1.5 {
        0.8
    } else if ocf_ni_ratio <= 2.0 {
        0.6
    } else {
        0.4
    };

    let fcf_positive = metrics.fcf.iter().take(3).all(|&fcf| fcf > 0.0);
    let fcf_consistency = stability(&metrics.fcf);
    let fcf_trend_score = trend_remap(&metrics.fcf);

    0.4 * ocf_ni_score + 0.2 * (if fcf_positive { 1.0 } else { 0.0 }) + 0.2 * fcf_consistency + 0.2 * fcf_trend_score
}
