//! Point-in-time replay: strips any record that would not have been
//! publicly known as of a simulated "today", so a backtest never leaks
//! future information into the Normalizer.

use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

fn parse_date(record: &Value, field: &str) -> Option<NaiveDate> {
    record
        .get(field)?
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub struct PointInTimeFilter {
    as_of: NaiveDate,
}

impl PointInTimeFilter {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Keeps a statement row iff `max(fillingDate, date) <= as_of`. A row
    /// with neither date present is dropped outright.
    pub fn filter_statements(&self, records: &[Value]) -> Vec<Value> {
        records
            .iter()
            .filter(|r| {
                let filling = parse_date(r, "fillingDate");
                let reported = parse_date(r, "date");
                match (filling, reported) {
                    (None, None) => false,
                    (Some(f), Some(rep)) => f.max(rep) <= self.as_of,
                    (Some(d), None) | (None, Some(d)) => d <= self.as_of,
                }
            })
            .cloned()
            .collect()
    }

    /// Keeps only earnings rows with a reported `epsActual` dated on or
    /// before `as_of`.
    pub fn filter_earnings(&self, records: &[Value]) -> Vec<Value> {
        records
            .iter()
            .filter(|r| {
                let has_actual = r.get("epsActual").map(|v| !v.is_null()).unwrap_or(false);
                has_actual && parse_date(r, "date").map(|d| d <= self.as_of).unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Keeps price bars dated on or before `as_of`.
    pub fn filter_prices(&self, records: &[Value]) -> Vec<Value> {
        records
            .iter()
            .filter(|r| parse_date(r, "date").map(|d| d <= self.as_of).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// TTM ratios/metrics carry implicit lookahead (they average in
    /// quarters that postdate `as_of` once too much wall-clock time has
    /// passed); drop the whole endpoint once the gap exceeds a week.
    pub fn ttm_is_stale(&self) -> bool {
        let now = Utc::now().date_naive();
        now - self.as_of > Duration::days(7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter_on(as_of: &str) -> PointInTimeFilter {
        PointInTimeFilter::new(NaiveDate::parse_from_str(as_of, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn statement_filed_after_cutoff_is_dropped() {
        let pit = filter_on("2023-06-30");
        let rows = vec![json!({"date": "2023-03-31", "fillingDate": "2023-07-15"})];
        assert!(pit.filter_statements(&rows).is_empty());
    }

    #[test]
    fn statement_filed_before_cutoff_is_kept() {
        let pit = filter_on("2023-06-30");
        let rows = vec![json!({"date": "2023-03-31", "fillingDate": "2023-05-01"})];
        assert_eq!(pit.filter_statements(&rows).len(), 1);
    }

    #[test]
    fn statement_with_neither_date_is_dropped() {
        let pit = filter_on("2023-06-30");
        let rows = vec![json!({"revenue": 100.0})];
        assert!(pit.filter_statements(&rows).is_empty());
    }

    #[test]
    fn earnings_row_missing_actual_is_dropped() {
        let pit = filter_on("2023-06-30");
        let rows = vec![json!({"date": "2023-05-01", "epsEstimated": 1.0})];
        assert!(pit.filter_earnings(&rows).is_empty());
    }

    #[test]
    fn earnings_row_with_actual_and_past_date_is_kept() {
        let pit = filter_on("2023-06-30");
        let rows = vec![json!({"date": "2023-05-01", "epsActual": 1.05})];
        assert_eq!(pit.filter_earnings(&rows).len(), 1);
    }

    #[test]
    fn future_price_bar_is_dropped() {
        let pit = filter_on("2023-06-30");
        let rows = vec![json!({"date": "2023-07-01", "close": 100.0})];
        assert!(pit.filter_prices(&rows).is_empty());
    }
}
