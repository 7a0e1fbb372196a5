use serde_json::Value;

/// Everything `Fetcher::get_comprehensive_bundle` gathers for one symbol,
/// keyed by endpoint the way the Normalizer expects to consume it.
#[derive(Debug, Clone, Default)]
pub struct ComprehensiveBundle {
    pub income_statements: Vec<Value>,
    pub cash_flow_statements: Vec<Value>,
    pub balance_sheets: Vec<Value>,
    pub ratios: Vec<Value>,
    pub ratios_ttm: Vec<Value>,
    pub key_metrics: Vec<Value>,
    pub key_metrics_ttm: Vec<Value>,
    pub financial_growth: Vec<Value>,
    pub insider_trading: Vec<Value>,
    pub earnings_calendar: Vec<Value>,
    pub historical_price: Vec<Value>,
    pub social_sentiment_bullish: Option<Value>,
    pub social_sentiment_bearish: Option<Value>,
}
