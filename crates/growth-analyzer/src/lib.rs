//! Growth axis: magnitude, consistency, and sustainability of a company's
//! revenue/earnings/cash-flow trajectory.

use screener_config::SectorBenchmark;
use screener_core::adaptive::{mean, std_dev, stability, trend_remap};
use screener_core::traits::{score_bag, Analyzer};
use screener_core::types::FinancialMetrics;

pub struct GrowthWeights {
    pub magnitude: f64,
    pub consistency: f64,
    pub sustainability: f64,
}

impl Default for GrowthWeights {
    fn default() -> Self {
        Self {
            magnitude: 0.35,
            consistency: 0.35,
            sustainability: 0.30,
        }
    }
}

pub struct GrowthAnalyzer {
    weights: GrowthWeights,
}

impl GrowthAnalyzer {
    pub fn new(weights: GrowthWeights) -> Self {
        Self { weights }
    }

    pub fn analyze(
        &self,
        metrics: &FinancialMetrics,
        benchmark: &SectorBenchmark,
    ) -> serde_json::Map<String, serde_json::Value> {
        let revenue_cagr = cagr(&metrics.revenue);
        let eps_cagr = cagr(&metrics.eps);
        let fcf_cagr = cagr(&metrics.fcf);

        let revenue_magnitude = magnitude_score(revenue_cagr, benchmark.revenue_growth_target);
        let eps_magnitude = magnitude_score(eps_cagr, benchmark.eps_growth_target);
        let fcf_magnitude = magnitude_score(fcf_cagr, benchmark.fcf_growth_target);
        let magnitude = mean(&[revenue_magnitude, eps_magnitude, fcf_magnitude]);

        let revenue_consistency = consistency_score(&metrics.revenue);
        let eps_consistency = consistency_score(&metrics.eps);
        let fcf_consistency = consistency_score(&metrics.fcf);
        let consistency = mean(&[revenue_consistency, eps_consistency, fcf_consistency]);

        let sustainability = sustainability_score(metrics);

        let growth_score = self.weights.magnitude * magnitude
            + self.weights.consistency * consistency
            + self.weights.sustainability * sustainability;

        score_bag([
            ("revenue_cagr", revenue_cagr),
            ("eps_cagr", eps_cagr),
            ("fcf_cagr", fcf_cagr),
            ("magnitude_score", magnitude),
            ("consistency_score", consistency),
            ("sustainability_score", sustainability),
            ("growth_score", growth_score),
        ])
    }
}

impl Analyzer for GrowthAnalyzer {
    fn name(&self) -> &'static str {
        "growth"
    }
}

/// `CAGR(series[-1] -> series[0], n = len-1)`, zero if either endpoint is
/// non-positive, `n <= 0`, or fewer than two points exist.
fn cagr(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let end = series[0];
    let start = series[series.len() - 1];
    let n = (series.len() - 1) as f64;
    if start <= 0.0 || end <= 0.0 || n <= 0.0 {
        return 0.0;
    }
    (end / start).powf(1.0 / n) - 1.0
}

fn magnitude_score(actual: f64, target: f64) -> f64 {
    if target <= 0.0 || actual <= 0.0 {
        return 0.0;
    }
    let ratio = actual / target;
    if ratio >= 2.0 {
        return 1.0;
    }
    (0.5 * (1.0 + (ratio + 0.1).ln() / 2f64.ln())).clamp(0.0, 1.0)
}

fn consistency_score(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let growth_rates: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if growth_rates.len() < 2 {
        return 0.0;
    }
    let mean_growth = mean(&growth_rates);
    if mean_growth <= 0.0 {
        return 0.0;
    }
    let bonus = if growth_rates.iter().all(|&r| r > 0.0) { 0.2 } else { 0.0 };
    let cv = std_dev(&growth_rates) / mean_growth;
    let consistency = 1.0 / (1.0 + cv);
    (consistency + bonus).min(1.0)
}

fn sustainability_score(metrics: &FinancialMetrics) -> f64 {
    let rd_intensity = ratio_series(&metrics.rd_expense, &metrics.revenue);
    let rd_score = trend_remap(&rd_intensity);

    let capex_efficiency = ratio_series(&metrics.fcf, &metrics.capex);
    let capex_score = trend_remap(&capex_efficiency);

    let margin_stability = stability(&metrics.operating_margin);

    let fcf_conversion = ratio_series(&metrics.fcf, &metrics.revenue);
    let fcf_score = trend_remap(&fcf_conversion);

    let ocf_ni_score = match metrics.ocf_to_net_income.first() {
        Some(&ratio) if (0.9..=1.3).contains(&ratio) => 1.0,
        Some(&ratio) if ratio > 0.7 && ratio < 1.5 => 0.7,
        Some(&ratio) if ratio > 0.5 && ratio < 1.7 => 0.4,
        Some(_) => 0.1,
        None => 0.0,
    };

    0.2 * rd_score + 0.2 * capex_score + 0.2 * margin_stability + 0.2 * fcf_score + 0.2 * ocf_ni_score
}

/// Elementwise `numerator[i] / denominator[i]`, zero where the denominator
/// isn't positive. Trims to the shorter of the two series.
fn ratio_series(numerator: &[f64], denominator: &[f64]) -> Vec<f64> {
    numerator
        .iter()
        .zip(denominator.iter())
        .map(|(&n, &d)| if d > 0.0 { n / d } else { 0.0 })
        .collect()
}
