//! Causal column operations.
//!
//! Every function maps input columns to an output column of the same length
//! where output row `i` reads only input rows `0..=i`. A row without enough
//! history, or whose window touches an absent input, yields `None`.
//!
//! Windows are summed front to back on every call; there are no running
//! totals, so a value depends only on the window contents and not on how the
//! table was built.

/// Value `k` rows back. SHIFT(k)[i] = X[i-k]
pub fn shift(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= k { values[i - k] } else { None })
        .collect()
}

fn window(values: &[Option<f64>], i: usize, n: usize) -> Option<Vec<f64>> {
    if n == 0 || i + 1 < n {
        return None;
    }
    values[i + 1 - n..=i].iter().copied().collect()
}

/// Simple moving average over the trailing `n` rows.
pub fn rolling_mean(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| window(values, i, n).map(|w| w.iter().sum::<f64>() / n as f64))
        .collect()
}

/// Population standard deviation over the trailing `n` rows.
///
/// STDDEV(n)[i] = sqrt(sum((X[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
pub fn rolling_std(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            window(values, i, n).map(|w| {
                let mean = w.iter().sum::<f64>() / n as f64;
                let variance = w
                    .iter()
                    .map(|x| {
                        let diff = x - mean;
                        diff * diff
                    })
                    .sum::<f64>()
                    / n as f64;
                variance.sqrt()
            })
        })
        .collect()
}

/// Exponential moving average, k = 2/(n+1), seeded with the SMA of the first
/// `n` present values. An absent input breaks the chain and restarts seeding.
pub fn ema(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if n == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let k = 2.0 / (n as f64 + 1.0);
    let mut current: Option<f64> = None;
    let mut seed: Vec<f64> = Vec::new();

    for value in values {
        match (*value, current) {
            (None, _) => {
                current = None;
                seed.clear();
                out.push(None);
            }
            (Some(x), Some(prev)) => {
                let next = x * k + prev * (1.0 - k);
                current = Some(next);
                out.push(current);
            }
            (Some(x), None) => {
                seed.push(x);
                if seed.len() == n {
                    current = Some(seed.iter().sum::<f64>() / n as f64);
                    seed.clear();
                }
                out.push(current);
            }
        }
    }
    out
}

/// Percent change over `n` rows. ROC(n)[i] = (X[i] - X[i-n]) / X[i-n] * 100,
/// 0 when X[i-n] is 0.
pub fn rate_of_change(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if n == 0 || i < n {
                return None;
            }
            let (prev, curr) = (values[i - n]?, values[i]?);
            if prev == 0.0 {
                Some(0.0)
            } else {
                Some((curr - prev) / prev * 100.0)
            }
        })
        .collect()
}

/// True range; the first row has no previous close and uses high - low.
pub fn true_range(
    high: &[Option<f64>],
    low: &[Option<f64>],
    close: &[Option<f64>],
) -> Vec<Option<f64>> {
    (0..close.len())
        .map(|i| {
            let (h, l) = (high[i]?, low[i]?);
            if i == 0 {
                return Some(h - l);
            }
            let prev_close = close[i - 1]?;
            let hc = (h - prev_close).abs();
            let lc = (l - prev_close).abs();
            Some((h - l).max(hc).max(lc))
        })
        .collect()
}

/// Wilder-smoothed average of `values`: first output is the plain mean of the
/// first `n` values, then avg = (prev * (n-1) + x) / n.
fn wilder(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut current: Option<f64> = None;
    let mut seed: Vec<f64> = Vec::new();

    for value in values {
        match (*value, current) {
            (None, _) => {
                current = None;
                seed.clear();
            }
            (Some(x), Some(prev)) => {
                current = Some((prev * (n - 1) as f64 + x) / n as f64);
            }
            (Some(x), None) => {
                seed.push(x);
                if seed.len() == n {
                    current = Some(seed.iter().sum::<f64>() / n as f64);
                    seed.clear();
                }
            }
        }
        out.push(current);
    }
    out
}

/// Average true range with Wilder smoothing. First valid row is `n - 1`.
pub fn atr(
    high: &[Option<f64>],
    low: &[Option<f64>],
    close: &[Option<f64>],
    n: usize,
) -> Vec<Option<f64>> {
    if n == 0 {
        return vec![None; close.len()];
    }
    wilder(&true_range(high, low, close), n)
}

/// Relative strength index with Wilder smoothing. First valid row is `n`.
///
/// RSI = 100 - 100 / (1 + avg_gain / avg_loss); 100 when avg_loss is 0.
pub fn rsi(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    if n == 0 {
        return vec![None; values.len()];
    }

    let changes: Vec<Option<f64>> = (0..values.len())
        .map(|i| {
            if i == 0 {
                None
            } else {
                Some(values[i]? - values[i - 1]?)
            }
        })
        .collect();
    let gains: Vec<Option<f64>> = changes.iter().map(|c| c.map(|c| c.max(0.0))).collect();
    let losses: Vec<Option<f64>> = changes.iter().map(|c| c.map(|c| (-c).max(0.0))).collect();

    let avg_gain = wilder(&gains, n);
    let avg_loss = wilder(&losses, n);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| {
            let (g, l) = ((*g)?, (*l)?);
            if l == 0.0 {
                Some(100.0)
            } else {
                Some(100.0 - 100.0 / (1.0 + g / l))
            }
        })
        .collect()
}
