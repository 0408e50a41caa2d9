//! Regressors of the additive model: piecewise linear trend and Fourier terms.

use std::f64::consts::PI;

use chrono::NaiveDate;

/// Days since 1970-01-01, the time axis of every Fourier term.
pub(crate) fn epoch_days(date: NaiveDate) -> f64 {
    (date - NaiveDate::default()).num_days() as f64
}

/// `sin(2πit/P), cos(2πit/P)` for `i` in `1..=order`, interleaved.
pub(crate) fn fourier_row(days: f64, period: f64, order: usize, out: &mut Vec<f64>) {
    for i in 1..=order {
        let x = 2.0 * PI * i as f64 * days / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}

/// Positions of trend changepoints on the scaled time axis.
///
/// Up to `max_changepoints` are spread uniformly over the first
/// `range` fraction of the observations; short histories get fewer.
pub(crate) fn changepoints(t: &[f64], max_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let count = max_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let step = (hist_size - 1) as f64 / count as f64;
    (1..=count)
        .map(|i| t[(i as f64 * step).round() as usize])
        .collect()
}

/// Trend regressors for scaled time `t`: `[1, t, (t - s_1)+, ...]`.
pub(crate) fn trend_row(t: f64, changepoints: &[f64], out: &mut Vec<f64>) {
    out.push(1.0);
    out.push(t);
    out.extend(changepoints.iter().map(|&s| (t - s).max(0.0)));
}
