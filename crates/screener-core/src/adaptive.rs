/// Shared statistical primitives used across the analyzer crates: `mean`/
/// `std_dev`, and the `stability`/`trend` helpers built on top of them.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Stability of a time series via coefficient of variation: `1/(1+CV)`.
/// Higher is more stable. Zero if fewer than two points or the mean is zero.
pub fn stability(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let cv = std_dev(values) / m.abs();
    1.0 / (1.0 + cv)
}

/// Trend strength and direction: sigmoid-compressed mean of sequential
/// relative changes, range `[-1, 1]`. Zero if fewer than two points or no
/// changes could be computed.
pub fn trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let changes: Vec<f64> = values
        .windows(2)
        .map(|w| {
            let (prev, cur) = (w[0], w[1]);
            if prev == 0.0 {
                0.0
            } else {
                (cur - prev) / prev.abs()
            }
        })
        .collect();
    if changes.is_empty() {
        return 0.0;
    }
    let avg_change = changes.iter().sum::<f64>() / changes.len() as f64;
    2.0 / (1.0 + (-5.0 * avg_change).exp()) - 1.0
}

/// `trend` remapped from `[-1, 1]` to `[0, 1]`.
pub fn trend_remap(values: &[f64]) -> f64 {
    (trend(values) + 1.0) / 2.0
}
