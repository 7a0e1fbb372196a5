//! Turns raw provider JSON into the pure `FinancialMetrics`/aux-info types
//! the analyzers consume. Every field read is `safe_float`-guarded: a
//! missing or unparsable value reads as zero rather than failing the whole
//! record.

use std::collections::HashMap;

use screener_core::types::{
    EarningsInfo, FinancialMetrics, InsiderTradingInfo, RawInsiderTransaction, SentimentInfo,
};
use serde_json::Value;

/// Treats JSON `null`, an empty string, or the literal string `"0"` as zero;
/// otherwise reads a JSON number directly or parses a numeric string;
/// anything else (including any failure) is zero. Never panics.
pub fn safe_float(v: &Value) -> f64 {
    match v {
        Value::Null => 0.0,
        Value::String(s) if s.is_empty() || s == "0" => 0.0,
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn get_float(record: &Value, field: &str) -> f64 {
    record.get(field).map(safe_float).unwrap_or(0.0)
}

fn optional_float(record: &Value, field: &str) -> Option<f64> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(v) => Some(safe_float(v)),
    }
}

fn index_by_date(records: &[Value]) -> HashMap<&str, &Value> {
    records
        .iter()
        .filter_map(|r| r.get("date").and_then(Value::as_str).map(|d| (d, r)))
        .collect()
}

/// Builds a `FinancialMetrics` from the per-endpoint statement lists, or
/// `None` if there is no common reporting date across income/cash-flow/
/// balance-sheet statements.
pub fn prepare_financial_metrics(
    income_statements: &[Value],
    cash_flow_statements: &[Value],
    balance_sheets: &[Value],
    ratios: &[Value],
    ratios_ttm: &[Value],
    key_metrics: &[Value],
) -> Option<FinancialMetrics> {
    if income_statements.is_empty() || cash_flow_statements.is_empty() || balance_sheets.is_empty() {
        return None;
    }

    let income_by_date = index_by_date(income_statements);
    let cash_flow_by_date = index_by_date(cash_flow_statements);
    let balance_by_date = index_by_date(balance_sheets);
    let ratios_by_date = index_by_date(ratios);
    let key_metrics_by_date = index_by_date(key_metrics);

    let mut common: Vec<&str> = income_by_date
        .keys()
        .filter(|d| cash_flow_by_date.contains_key(*d) && balance_by_date.contains_key(*d))
        .copied()
        .collect();
    if !ratios.is_empty() {
        common.retain(|d| ratios_by_date.contains_key(d));
    }
    if !key_metrics.is_empty() {
        common.retain(|d| key_metrics_by_date.contains_key(d));
    }
    if common.is_empty() {
        return None;
    }
    common.sort_unstable_by(|a, b| b.cmp(a));

    let mut revenue = Vec::with_capacity(common.len());
    let mut eps = Vec::with_capacity(common.len());
    let mut fcf = Vec::with_capacity(common.len());
    let mut roe = Vec::with_capacity(common.len());
    let mut gross_margin = Vec::with_capacity(common.len());
    let mut operating_margin = Vec::with_capacity(common.len());
    let mut working_capital = Vec::with_capacity(common.len());
    let mut total_debt = Vec::with_capacity(common.len());
    let mut total_equity = Vec::with_capacity(common.len());
    let mut total_assets = Vec::with_capacity(common.len());
    let mut rd_expense = Vec::with_capacity(common.len());
    let mut capex = Vec::with_capacity(common.len());
    let mut operating_cash_flow = Vec::with_capacity(common.len());
    let mut debt_to_equity = Vec::with_capacity(common.len());
    let mut interest_coverage = Vec::with_capacity(common.len());
    let mut debt_to_ebitda = Vec::with_capacity(common.len());
    let mut ocf_to_net_income = Vec::with_capacity(common.len());

    for date in &common {
        let income = income_by_date[date];
        let cash_flow = cash_flow_by_date[date];
        let balance = balance_by_date[date];
        let ratio = ratios_by_date.get(date).copied();

        revenue.push(get_float(income, "revenue"));
        eps.push(get_float(income, "eps"));
        let fcf_value = get_float(cash_flow, "freeCashFlow");
        fcf.push(fcf_value);
        roe.push(ratio.map(|r| get_float(r, "returnOnEquity")).unwrap_or(0.0));

        gross_margin.push(get_float(income, "grossProfitRatio"));
        operating_margin.push(get_float(income, "operatingIncomeRatio"));

        let current_assets = get_float(balance, "totalCurrentAssets");
        let current_liabilities = get_float(balance, "totalCurrentLiabilities");
        working_capital.push(current_assets - current_liabilities);

        let debt = get_float(balance, "totalDebt");
        let equity = get_float(balance, "totalStockholdersEquity");
        let assets = get_float(balance, "totalAssets");
        total_debt.push(debt);
        total_equity.push(equity);
        total_assets.push(assets);

        debt_to_equity.push(if equity > 0.0 { debt / equity } else { 0.0 });

        let operating_income = get_float(income, "operatingIncome");
        let interest_expense = get_float(income, "interestExpense");
        interest_coverage.push(if interest_expense > 0.0 {
            operating_income / interest_expense
        } else {
            0.0
        });

        let ebitda = get_float(income, "ebitda");
        debt_to_ebitda.push(if ebitda > 0.0 { debt / ebitda } else { 0.0 });

        rd_expense.push(get_float(income, "researchAndDevelopmentExpenses"));
        capex.push(get_float(cash_flow, "capitalExpenditure").abs());
        let ocf = get_float(cash_flow, "netCashProvidedByOperatingActivities");
        operating_cash_flow.push(ocf);

        let net_income = get_float(income, "netIncome");
        ocf_to_net_income.push(if net_income > 0.0 { ocf / net_income } else { 0.0 });
    }

    let (per, pbr) = match ratios_ttm.first() {
        Some(r) => (
            vec![get_float(r, "peRatioTTM")],
            vec![get_float(r, "priceBookValueRatioTTM")],
        ),
        None => (vec![0.0], vec![0.0]),
    };

    let ttm_fcf = if fcf.len() >= 4 {
        fcf[..4].iter().sum()
    } else {
        fcf.iter().sum()
    };

    Some(FinancialMetrics {
        revenue,
        eps,
        fcf,
        ttm_fcf,
        roe,
        gross_margin,
        operating_margin,
        working_capital,
        total_debt,
        total_equity,
        total_assets,
        rd_expense,
        capex,
        operating_cash_flow,
        per,
        pbr,
        dates: common.iter().map(|s| s.to_string()).collect(),
        debt_to_equity,
        interest_coverage,
        debt_to_ebitda,
        ocf_to_net_income,
    })
}

/// `None` if there are no recent insider transactions to classify.
pub fn prepare_insider_trading_info(raw_transactions: &[Value]) -> Option<InsiderTradingInfo> {
    if raw_transactions.is_empty() {
        return None;
    }
    let transactions: Vec<RawInsiderTransaction> = raw_transactions
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect();
    Some(InsiderTradingInfo::from_transactions(&transactions))
}

/// `None` if the earnings calendar has no entries at all.
pub fn prepare_earnings_info(earnings_calendar: &[Value]) -> Option<EarningsInfo> {
    let most_recent = earnings_calendar.first()?;
    let next_earnings_date = most_recent
        .get("date")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(EarningsInfo::new(
        optional_float(most_recent, "epsActual"),
        optional_float(most_recent, "epsEstimated"),
        optional_float(most_recent, "revenueActual"),
        optional_float(most_recent, "revenueEstimated"),
        next_earnings_date,
    ))
}

/// `None` if neither the bullish nor bearish trending-sentiment record was
/// returned by the provider.
pub fn prepare_sentiment_info(bullish: Option<&Value>, bearish: Option<&Value>) -> Option<SentimentInfo> {
    if bullish.is_none() && bearish.is_none() {
        return None;
    }

    let bullish_percentage = bullish.map(|b| get_float(b, "sentiment"));
    let bearish_percentage = bearish.map(|b| get_float(b, "sentiment"));
    let neutral_percentage =
        Some((100.0 - bullish_percentage.unwrap_or(0.0) - bearish_percentage.unwrap_or(0.0)).max(0.0));

    let last_bullish = bullish.map(|b| get_float(b, "lastSentiment")).unwrap_or(0.0);
    let sentiment_change = if last_bullish > 0.0 {
        Some(bullish_percentage.unwrap_or(0.0) - last_bullish)
    } else {
        Some(0.0)
    };

    Some(SentimentInfo::new(
        bullish_percentage,
        bearish_percentage,
        neutral_percentage,
        sentiment_change,
    ))
}
