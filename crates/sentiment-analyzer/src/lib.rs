//! Sentiment axis: insider trading, earnings surprises, and social sentiment.
//! Every input is optional — a missing signal reads as neutral (0.5) rather
//! than dragging the composite down.

use screener_core::traits::{score_bag, Analyzer};
use screener_core::types::{EarningsInfo, InsiderTradingInfo, SentimentInfo};

pub struct SentimentWeights {
    pub insider: f64,
    pub earnings: f64,
    pub social: f64,
}

impl Default for SentimentWeights {
    fn default() -> Self {
        Self {
            insider: 0.40,
            earnings: 0.35,
            social: 0.25,
        }
    }
}

pub struct SentimentAnalyzer {
    weights: SentimentWeights,
}

impl SentimentAnalyzer {
    pub fn new(weights: SentimentWeights) -> Self {
        Self { weights }
    }

    pub fn analyze(
        &self,
        insider_trading: Option<&InsiderTradingInfo>,
        earnings_info: Option<&EarningsInfo>,
        sentiment_info: Option<&SentimentInfo>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let insider_score = insider_score(insider_trading);
        let earnings_score = earnings_score(earnings_info);
        let social_score = social_score(sentiment_info);

        let sentiment_score = self.weights.insider * insider_score
            + self.weights.earnings * earnings_score
            + self.weights.social * social_score;

        score_bag([
            ("insider_score", insider_score),
            ("earnings_score", earnings_score),
            ("social_score", social_score),
            ("sentiment_score", sentiment_score),
        ])
    }
}

impl Analyzer for SentimentAnalyzer {
    fn name(&self) -> &'static str {
        "sentiment"
    }
}

/// Bands a buy/sell ratio: `{>=2 => 1, >=1 => 0.8, >=0.5 => 0.4, else => 0.2}`,
/// with both sides zero collapsing to 0.5. A positive numerator against a
/// zero denominator is treated as an unbounded ratio (all buys, no sells).
fn ratio_band(numerator: f64, denominator: f64) -> f64 {
    if numerator <= 0.0 && denominator <= 0.0 {
        return 0.5;
    }
    let ratio = if denominator > 0.0 {
        numerator / denominator
    } else {
        f64::INFINITY
    };
    if ratio >= 2.0 {
        1.0
    } else if ratio >= 1.0 {
        0.8
    } else if ratio >= 0.5 {
        0.4
    } else {
        0.2
    }
}

fn insider_score(insider_trading: Option<&InsiderTradingInfo>) -> f64 {
    let Some(info) = insider_trading else {
        return 0.5;
    };

    let count_band = ratio_band(info.buy_count as f64, info.sell_count as f64);
    let value_band = ratio_band(info.total_buy_value, info.total_sell_value);
    let significant_bonus = if info.significant_buys { 1.0 } else { 0.5 };

    0.4 * count_band + 0.4 * value_band + 0.2 * significant_bonus
}

fn eps_surprise_band(surprise: f64) -> f64 {
    if surprise >= 0.20 {
        1.0
    } else if surprise >= 0.10 {
        0.9
    } else if surprise >= 0.05 {
        0.8
    } else if surprise >= 0.0 {
        0.7
    } else if surprise >= -0.05 {
        0.4
    } else if surprise >= -0.10 {
        0.3
    } else if surprise >= -0.20 {
        0.2
    } else {
        0.1
    }
}

fn revenue_surprise_band(surprise: f64) -> f64 {
    if surprise >= 0.10 {
        1.0
    } else if surprise >= 0.05 {
        0.9
    } else if surprise >= 0.02 {
        0.8
    } else if surprise >= 0.0 {
        0.7
    } else if surprise >= -0.02 {
        0.4
    } else if surprise >= -0.05 {
        0.3
    } else if surprise >= -0.10 {
        0.2
    } else {
        0.1
    }
}

fn earnings_score(earnings_info: Option<&EarningsInfo>) -> f64 {
    let Some(info) = earnings_info else {
        return 0.5;
    };

    let eps_score = info.eps_surprise_percentage.map(eps_surprise_band).unwrap_or(0.5);
    let revenue_score = info
        .revenue_surprise_percentage
        .map(revenue_surprise_band)
        .unwrap_or(0.5);

    0.6 * eps_score + 0.4 * revenue_score
}

fn bullish_share_band(ratio: f64) -> f64 {
    if ratio >= 0.8 {
        1.0
    } else if ratio >= 0.6 {
        0.8
    } else if ratio >= 0.4 {
        0.5
    } else if ratio >= 0.2 {
        0.3
    } else {
        0.0
    }
}

fn sentiment_change_band(change: f64) -> f64 {
    if change >= 5.0 {
        1.0
    } else if change >= 2.0 {
        0.8
    } else if change > -2.0 {
        0.5
    } else if change > -5.0 {
        0.3
    } else {
        0.0
    }
}

fn social_score(sentiment_info: Option<&SentimentInfo>) -> f64 {
    let Some(info) = sentiment_info else {
        return 0.5;
    };

    let bullish = info.bullish_percentage.unwrap_or(0.0);
    let bearish = info.bearish_percentage.unwrap_or(0.0);

    let base_score = if bullish > 0.0 || bearish > 0.0 {
        if bullish + bearish == 0.0 {
            0.5
        } else {
            bullish_share_band(bullish / (bullish + bearish))
        }
    } else {
        0.5
    };

    let change_score = sentiment_change_band(info.sentiment_change.unwrap_or(0.0));

    0.7 * base_score + 0.3 * change_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn insider(buy_count: u32, sell_count: u32, buy_value: f64, sell_value: f64, significant: bool) -> InsiderTradingInfo {
        InsiderTradingInfo {
            buy_count,
            sell_count,
            net_buy_sell_ratio: buy_count as f64 / sell_count.max(1) as f64,
            total_buy_value: buy_value,
            total_sell_value: sell_value,
            significant_buys: significant,
        }
    }

    #[test]
    fn missing_insider_data_is_neutral() {
        assert_eq!(insider_score(None), 0.5);
    }

    #[test]
    fn all_buys_no_sells_scores_high() {
        let info = insider(5, 0, 50_000.0, 0.0, true);
        let score = insider_score(Some(&info));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_sells_no_buys_scores_low() {
        let info = insider(0, 5, 0.0, 50_000.0, false);
        let score = insider_score(Some(&info));
        assert!(score < 0.3);
    }

    #[test]
    fn missing_earnings_info_is_neutral() {
        assert_eq!(earnings_score(None), 0.5);
    }

    #[test]
    fn strong_eps_and_revenue_beat_scores_high() {
        let info = EarningsInfo::new(Some(1.30), Some(1.00), Some(110.0), Some(100.0), None);
        // eps surprise = 0.30 -> 1.0, revenue surprise = 0.10 -> 1.0
        assert!((earnings_score(Some(&info)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn severe_eps_miss_scores_low() {
        let info = EarningsInfo::new(Some(0.50), Some(1.00), None, None, None);
        // eps surprise = -0.50 -> 0.1, revenue missing -> 0.5 neutral
        let score = earnings_score(Some(&info));
        assert!((score - (0.6 * 0.1 + 0.4 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn missing_sentiment_info_is_neutral() {
        assert_eq!(social_score(None), 0.5);
    }

    #[test]
    fn strongly_bullish_with_improving_trend_scores_high() {
        let info = SentimentInfo::new(Some(85.0), Some(15.0), Some(0.0), Some(6.0));
        let score = social_score(Some(&info));
        assert!(score > 0.9, "expected near-perfect score, got {score}");
    }

    #[test]
    fn analyze_produces_bounded_sentiment_score() {
        let analyzer = SentimentAnalyzer::new(SentimentWeights::default());
        let insider = insider(3, 2, 20_000.0, 15_000.0, false);
        let earnings = EarningsInfo::new(Some(1.05), Some(1.0), Some(101.0), Some(100.0), None);
        let sentiment = SentimentInfo::new(Some(55.0), Some(45.0), Some(0.0), Some(1.0));
        let bag = analyzer.analyze(Some(&insider), Some(&earnings), Some(&sentiment));
        let score = bag.get("sentiment_score").unwrap().as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    proptest! {
        // sentiment_score, and every axis feeding it, stays within [0,1] and
        // never produces NaN/infinity for any missing-input combination.
        #[test]
        fn analyze_score_always_bounded_and_finite(
            buy_count in 0u32..1000,
            sell_count in 0u32..1000,
            buy_value in 0f64..1e9,
            sell_value in 0f64..1e9,
            eps_actual in -10f64..10f64,
            eps_estimated in -10f64..10f64,
            bullish in 0f64..100f64,
            bearish in 0f64..100f64,
            sentiment_change in -20f64..20f64,
            has_insider: bool,
            has_earnings: bool,
            has_sentiment: bool,
        ) {
            let analyzer = SentimentAnalyzer::new(SentimentWeights::default());
            let insider_info = insider(buy_count, sell_count, buy_value, sell_value, false);
            let earnings_info = EarningsInfo::new(Some(eps_actual), Some(eps_estimated), None, None, None);
            let sentiment_info = SentimentInfo::new(Some(bullish), Some(bearish), None, Some(sentiment_change));

            let bag = analyzer.analyze(
                has_insider.then_some(&insider_info),
                has_earnings.then_some(&earnings_info),
                has_sentiment.then_some(&sentiment_info),
            );
            let score = bag.get("sentiment_score").unwrap().as_f64().unwrap();
            prop_assert!(score.is_finite());
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
