use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Financial metrics for a single issuer, series aligned index-for-index with
/// `dates` and reverse-chronological (index 0 = most recent period).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub revenue: Vec<f64>,
    pub eps: Vec<f64>,
    pub fcf: Vec<f64>,
    pub ttm_fcf: f64,
    pub roe: Vec<f64>,

    pub gross_margin: Vec<f64>,
    pub operating_margin: Vec<f64>,

    pub working_capital: Vec<f64>,
    pub total_debt: Vec<f64>,
    pub total_equity: Vec<f64>,
    pub total_assets: Vec<f64>,

    pub rd_expense: Vec<f64>,
    pub capex: Vec<f64>,
    pub operating_cash_flow: Vec<f64>,

    /// Latest-only scalar, held as a one-element series to match the source's
    /// `per[0]` access pattern.
    pub per: Vec<f64>,
    pub pbr: Vec<f64>,

    pub dates: Vec<String>,

    #[serde(default)]
    pub debt_to_equity: Vec<f64>,
    #[serde(default)]
    pub interest_coverage: Vec<f64>,
    #[serde(default)]
    pub debt_to_ebitda: Vec<f64>,
    #[serde(default)]
    pub ocf_to_net_income: Vec<f64>,
}

impl FinancialMetrics {
    /// Latest (index 0) value of a series, or 0.0 if the series is empty.
    pub fn latest(series: &[f64]) -> f64 {
        series.first().copied().unwrap_or(0.0)
    }
}

/// Information about recent insider trading activity. Derived fields are
/// computed once at construction from the raw transaction list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderTradingInfo {
    pub buy_count: u32,
    pub sell_count: u32,
    pub net_buy_sell_ratio: f64,
    pub total_buy_value: f64,
    pub total_sell_value: f64,
    pub significant_buys: bool,
}

/// A single raw insider transaction as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInsiderTransaction {
    #[serde(default, rename = "transactionType")]
    pub transaction_type: String,
    #[serde(default, rename = "securitiesTransacted")]
    pub securities_transacted: f64,
    #[serde(default)]
    pub price: f64,
}

impl InsiderTradingInfo {
    /// Classify and tally a list of raw transactions. Transaction types
    /// starting with `P` or `B` count as buys, `S` as sells, others are
    /// ignored entirely.
    pub fn from_transactions(transactions: &[RawInsiderTransaction]) -> Self {
        let mut buy_count = 0u32;
        let mut sell_count = 0u32;
        let mut total_buy_value = 0.0;
        let mut total_sell_value = 0.0;

        for txn in transactions {
            let kind = txn.transaction_type.as_str();
            if kind.starts_with('P') || kind.starts_with('B') {
                buy_count += 1;
                total_buy_value += txn.securities_transacted * txn.price;
            } else if kind.starts_with('S') {
                sell_count += 1;
                total_sell_value += txn.securities_transacted * txn.price;
            }
        }

        let net_buy_sell_ratio = buy_count as f64 / sell_count.max(1) as f64;
        let significant_buys = buy_count > 0 && net_buy_sell_ratio >= 0.5;

        Self {
            buy_count,
            sell_count,
            net_buy_sell_ratio,
            total_buy_value,
            total_sell_value,
            significant_buys,
        }
    }
}

/// Information about the most recent earnings print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsInfo {
    pub latest_eps_actual: Option<f64>,
    pub latest_eps_estimated: Option<f64>,
    pub latest_revenue_actual: Option<f64>,
    pub latest_revenue_estimated: Option<f64>,
    pub eps_surprise_percentage: Option<f64>,
    pub revenue_surprise_percentage: Option<f64>,
    pub next_earnings_date: Option<String>,
    pub has_positive_surprise: bool,
}

impl EarningsInfo {
    pub fn new(
        latest_eps_actual: Option<f64>,
        latest_eps_estimated: Option<f64>,
        latest_revenue_actual: Option<f64>,
        latest_revenue_estimated: Option<f64>,
        next_earnings_date: Option<String>,
    ) -> Self {
        let eps_surprise_percentage = match (latest_eps_actual, latest_eps_estimated) {
            (Some(actual), Some(est)) if est != 0.0 => Some((actual - est) / est.abs()),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        };
        let revenue_surprise_percentage = match (latest_revenue_actual, latest_revenue_estimated) {
            (Some(actual), Some(est)) if est != 0.0 => Some((actual - est) / est.abs()),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        };
        let has_positive_surprise = eps_surprise_percentage.map(|s| s > 0.0).unwrap_or(false);

        Self {
            latest_eps_actual,
            latest_eps_estimated,
            latest_revenue_actual,
            latest_revenue_estimated,
            eps_surprise_percentage,
            revenue_surprise_percentage,
            next_earnings_date,
            has_positive_surprise,
        }
    }
}

/// Social/market sentiment snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentInfo {
    pub bullish_percentage: Option<f64>,
    pub bearish_percentage: Option<f64>,
    pub neutral_percentage: Option<f64>,
    pub sentiment_change: Option<f64>,
    pub overall_sentiment: String,
}

impl SentimentInfo {
    pub fn new(
        bullish_percentage: Option<f64>,
        bearish_percentage: Option<f64>,
        neutral_percentage: Option<f64>,
        sentiment_change: Option<f64>,
    ) -> Self {
        let overall_sentiment = match (bullish_percentage, bearish_percentage) {
            (Some(bullish), Some(bearish)) if bullish > 60.0 => "bullish",
            (Some(bullish), Some(bearish)) if bearish > 60.0 && bullish <= 60.0 => "bearish",
            _ => "neutral",
        }
        .to_string();

        Self {
            bullish_percentage,
            bearish_percentage,
            neutral_percentage,
            sentiment_change,
            overall_sentiment,
        }
    }
}

/// Complete per-issuer analysis result, the unit returned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAnalysisResult {
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: f64,

    pub quality_score: f64,
    #[serde(default)]
    pub normalized_quality_score: f64,

    pub component_scores: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metrics: serde_json::Map<String, serde_json::Value>,

    pub growth_analysis: serde_json::Map<String, serde_json::Value>,
    pub risk_assessment: serde_json::Map<String, serde_json::Value>,
    pub valuation_analysis: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub insider_trading: Option<InsiderTradingInfo>,
    #[serde(default)]
    pub earnings_info: Option<EarningsInfo>,
    #[serde(default)]
    pub sentiment_info: Option<SentimentInfo>,

    #[serde(default)]
    pub sector_percentile: HashMap<String, f64>,
}
