//! Pure predicates applied before the expensive per-symbol fan-out: which
//! universe entries are worth fetching a full bundle for at all.

use screener_config::{MarketCapFilter, RoeGate};

/// A 5-letter symbol ending in `X`, or an exchange string naming a mutual
/// fund/ETF structure, is dropped before it ever reaches the Fetcher.
pub fn looks_like_fund_or_etf(symbol: &str, exchange_short_name: &str) -> bool {
    let symbol_pattern = symbol.len() == 5 && symbol.ends_with('X');
    let exchange_upper = exchange_short_name.to_uppercase();
    symbol_pattern || exchange_upper.contains("MUTUAL") || exchange_upper.contains("FUND")
}

pub fn within_market_cap(market_cap: f64, filter: &MarketCapFilter) -> bool {
    let min_ok = filter.min_market_cap.map(|min| market_cap >= min).unwrap_or(true);
    let max_ok = filter.max_market_cap.map(|max| market_cap <= max).unwrap_or(true);
    min_ok && max_ok
}

/// The trailing `gate.years` periods (index 0 = most recent, per
/// `FinancialMetrics`'s reverse-chronological convention) must each clear
/// `min_each_year`, and their mean must clear `min_avg`.
pub fn passes_roe_gate(roe: &[f64], gate: &RoeGate) -> bool {
    if roe.len() < gate.years {
        return false;
    }
    let recent = &roe[..gate.years];
    let avg = recent.iter().sum::<f64>() / gate.years as f64;
    avg >= gate.min_avg && recent.iter().all(|&r| r >= gate.min_each_year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_letter_symbol_ending_in_x_is_a_fund() {
        assert!(looks_like_fund_or_etf("VFIAX", ""));
    }

    #[test]
    fn ordinary_four_letter_symbol_is_not_a_fund() {
        assert!(!looks_like_fund_or_etf("AAPL", "NASDAQ"));
    }

    #[test]
    fn exchange_naming_mutual_fund_is_excluded_regardless_of_symbol() {
        assert!(looks_like_fund_or_etf("ABC", "MUTUAL"));
        assert!(looks_like_fund_or_etf("ABC", "closed-end fund"));
    }

    #[test]
    fn market_cap_filter_with_no_bounds_admits_everything() {
        assert!(within_market_cap(1.0, &MarketCapFilter::default()));
    }

    #[test]
    fn market_cap_filter_respects_both_bounds() {
        let filter = MarketCapFilter {
            min_market_cap: Some(1_000_000.0),
            max_market_cap: Some(1_000_000_000.0),
        };
        assert!(within_market_cap(50_000_000.0, &filter));
        assert!(!within_market_cap(500.0, &filter));
        assert!(!within_market_cap(2_000_000_000.0, &filter));
    }

    #[test]
    fn roe_gate_requires_every_recent_year_and_the_average() {
        let gate = RoeGate {
            years: 3,
            min_each_year: 0.10,
            min_avg: 0.15,
        };
        assert!(passes_roe_gate(&[0.20, 0.18, 0.16], &gate));
        assert!(!passes_roe_gate(&[0.20, 0.05, 0.16], &gate), "one bad year fails the gate");
        assert!(!passes_roe_gate(&[0.11, 0.11, 0.11], &gate), "average below min_avg fails");
        assert!(!passes_roe_gate(&[0.20, 0.18], &gate), "insufficient history fails");
    }
}
