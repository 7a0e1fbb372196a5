use std::time::Duration;

/// Endpoint-derived TTL, checked in order with `default` last. Mirrors the
/// provider's URL-substring scheme: the first matching token wins.
const TTL_TABLE: &[(&str, u64)] = &[
    ("symbol", 86_400),
    ("profile", 86_400),
    ("sector", 86_400),
    ("esg", 86_400),
    ("financial-statement", 3_600),
    ("key-metrics", 3_600),
    ("ratios", 3_600),
    ("earnings", 900),
    ("analyst", 7_200),
    ("quote", 300),
];

const DEFAULT_TTL: u64 = 3_600;

/// `historical-price-full` is special-cased: a request carrying both `from=`
/// and `to=` pins a fixed past window and can be cached for a full day;
/// without a range it's effectively a live quote and gets the short TTL.
pub fn ttl_for_url(url: &str) -> Duration {
    if url.contains("historical-price-full") {
        let ttl = if url.contains("from=") && url.contains("to=") {
            86_400
        } else {
            300
        };
        return Duration::from_secs(ttl);
    }

    for (needle, ttl) in TTL_TABLE {
        if url.contains(needle) {
            return Duration::from_secs(*ttl);
        }
    }
    Duration::from_secs(DEFAULT_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_and_profile_get_a_day() {
        assert_eq!(ttl_for_url("https://api/v3/symbol/list").as_secs(), 86_400);
        assert_eq!(ttl_for_url("https://api/v3/profile/AAPL").as_secs(), 86_400);
    }

    #[test]
    fn earnings_gets_fifteen_minutes() {
        assert_eq!(ttl_for_url("https://api/v3/earnings-calendar").as_secs(), 900);
    }

    #[test]
    fn historical_price_without_range_is_short() {
        let url = "https://api/v3/historical-price-full/AAPL";
        assert_eq!(ttl_for_url(url).as_secs(), 300);
    }

    #[test]
    fn historical_price_with_explicit_range_is_long() {
        let url = "https://api/v3/historical-price-full/AAPL?from=2024-01-01&to=2024-02-01";
        assert_eq!(ttl_for_url(url).as_secs(), 86_400);
    }

    #[test]
    fn unmatched_url_falls_back_to_default() {
        assert_eq!(ttl_for_url("https://api/v3/anything-else").as_secs(), DEFAULT_TTL);
    }
}
