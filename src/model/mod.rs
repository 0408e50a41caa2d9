//! Additive seasonal trend model.
//!
//! `y(t) = trend(t) + Σ seasonal_i(t)`, where the trend is piecewise linear
//! with automatically placed changepoints and every seasonal term is a
//! truncated Fourier series. Observations are scaled by their maximum
//! absolute value and time by the span of the history before fitting.
//!
//! ```no_run
//! # use stock_forecast::model::{forecast, ModelConfig};
//! # fn demo(history: &stock_forecast::series::HistoricalSeries) {
//! let (fitted, prediction) = forecast(history, &ModelConfig::default(), 900).unwrap();
//! assert_eq!(
//!     prediction.last_date(),
//!     history.last_date().map(|d| d + chrono::Days::new(900)),
//! );
//! # }
//! ```

mod features;
mod solver;

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::error::ModelFitError;
use crate::series::{Component, ForecastSeries, HistoricalSeries, PricePoint};

use features::{changepoints, epoch_days, fourier_row, trend_row};
use solver::{fit_map, Design, Prior, SolverSettings};

/// Shortest history that identifies a slope.
pub const MIN_OBSERVATIONS: usize = 2;

/// A periodic term expressed as a Fourier series.
#[derive(Debug, Clone, PartialEq)]
pub struct Seasonality {
    pub name: String,
    /// Period in days.
    pub period: f64,
    pub fourier_order: usize,
}

impl Seasonality {
    pub fn new(name: impl Into<String>, period: f64, fourier_order: usize) -> Self {
        Self {
            name: name.into(),
            period,
            fourier_order,
        }
    }
}

/// Whether a built-in seasonality takes part in the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Enabled when the history is long enough to identify it.
    Auto,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub n_changepoints: usize,
    /// Fraction of the history eligible for changepoints.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub trend_prior_scale: f64,
    pub yearly_seasonality: Toggle,
    pub weekly_seasonality: Toggle,
    pub custom_seasonalities: Vec<Seasonality>,
}

impl Default for ModelConfig {
    /// Yearly on when identifiable, weekly off, plus a 30.5 day monthly term.
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            trend_prior_scale: 5.0,
            yearly_seasonality: Toggle::Auto,
            weekly_seasonality: Toggle::Disabled,
            custom_seasonalities: vec![Seasonality::new("monthly", 30.5, 5)],
        }
    }
}

const YEARLY: (f64, usize) = (365.25, 10);
const WEEKLY: (f64, usize) = (7.0, 3);

impl ModelConfig {
    /// The seasonal terms that take part in a fit spanning `span_days`.
    fn active_seasonalities(&self, span_days: f64, observations: usize) -> Vec<Seasonality> {
        let mut active = Vec::new();

        let yearly = match self.yearly_seasonality {
            Toggle::Enabled => true,
            Toggle::Disabled => false,
            Toggle::Auto => span_days >= 2.0 * 365.0,
        };
        if yearly {
            active.push(Seasonality::new("yearly", YEARLY.0, YEARLY.1));
        }

        let weekly = match self.weekly_seasonality {
            Toggle::Enabled => true,
            Toggle::Disabled => false,
            Toggle::Auto => span_days >= 2.0 * 7.0 && observations > 14,
        };
        if weekly {
            active.push(Seasonality::new("weekly", WEEKLY.0, WEEKLY.1));
        }

        active.extend(self.custom_seasonalities.iter().cloned());
        active
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FittedSeasonality {
    spec: Seasonality,
    coefficients: Vec<f64>,
}

impl FittedSeasonality {
    /// Contribution in scaled units at `days` since the epoch.
    fn evaluate(&self, days: f64, buf: &mut Vec<f64>) -> f64 {
        buf.clear();
        fourier_row(days, self.spec.period, self.spec.fourier_order, buf);
        buf.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum()
    }
}

/// A model fitted to one history, ready to predict.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    history_dates: Vec<NaiveDate>,
    start: NaiveDate,
    span_days: f64,
    y_scale: f64,
    offset: f64,
    slope: f64,
    changepoints: Vec<f64>,
    deltas: Vec<f64>,
    seasonalities: Vec<FittedSeasonality>,
    sigma: f64,
    iterations: usize,
}

/// Fits `config` to `history`.
pub fn fit(history: &HistoricalSeries, config: &ModelConfig) -> Result<FittedModel, ModelFitError> {
    let n = history.len();
    if n < MIN_OBSERVATIONS {
        return Err(ModelFitError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: n,
        });
    }

    let prices: Vec<f64> = history.prices().collect();
    let first = prices[0];
    if prices.iter().all(|&p| p == first) {
        return Err(ModelFitError::Degenerate);
    }
    let y_scale = prices.iter().fold(0.0_f64, |acc, p| acc.max(p.abs()));

    let dates: Vec<NaiveDate> = history.dates().collect();
    let start = dates[0];
    let span_days = (dates[n - 1] - start).num_days() as f64;
    let t: Vec<f64> = dates
        .iter()
        .map(|&d| (d - start).num_days() as f64 / span_days)
        .collect();

    let cps = changepoints(&t, config.n_changepoints, config.changepoint_range);
    let seasonal_specs = config.active_seasonalities(span_days, n);

    let mut priors = vec![Prior::Normal {
        scale: config.trend_prior_scale,
    }; 2];
    priors.extend(cps.iter().map(|_| Prior::Laplace {
        scale: config.changepoint_prior_scale,
    }));
    for spec in &seasonal_specs {
        priors.extend((0..2 * spec.fourier_order).map(|_| Prior::Normal {
            scale: config.seasonality_prior_scale,
        }));
    }

    let mut design = Design::new(priors.len());
    let mut row = Vec::with_capacity(priors.len());
    for ((&ti, &date), &price) in t.iter().zip(&dates).zip(&prices) {
        row.clear();
        trend_row(ti, &cps, &mut row);
        let days = epoch_days(date);
        for spec in &seasonal_specs {
            fourier_row(days, spec.period, spec.fourier_order, &mut row);
        }
        design.push_row(&row, price / y_scale);
    }

    let estimate = fit_map(&design, &priors, SolverSettings::default())?;
    let coefficients = estimate.coefficients;

    let mut cursor = 2 + cps.len();
    let seasonalities = seasonal_specs
        .into_iter()
        .map(|spec| {
            let width = 2 * spec.fourier_order;
            let fitted = FittedSeasonality {
                coefficients: coefficients[cursor..cursor + width].to_vec(),
                spec,
            };
            cursor += width;
            fitted
        })
        .collect();

    let model = FittedModel {
        history_dates: dates,
        start,
        span_days,
        y_scale,
        offset: coefficients[0],
        slope: coefficients[1],
        deltas: coefficients[2..2 + cps.len()].to_vec(),
        changepoints: cps,
        seasonalities,
        sigma: estimate.sigma,
        iterations: estimate.iterations,
    };

    debug!(
        observations = n,
        changepoints = model.changepoints.len(),
        seasonalities = ?model.seasonal_terms(),
        iterations = model.iterations,
        sigma = model.sigma * model.y_scale,
        "model fitted"
    );
    Ok(model)
}

/// Fits `config` to `history` and predicts `horizon_days` past its end.
pub fn forecast(
    history: &HistoricalSeries,
    config: &ModelConfig,
    horizon_days: u32,
) -> Result<(FittedModel, ForecastSeries), ModelFitError> {
    if horizon_days == 0 {
        return Err(ModelFitError::InvalidHorizon(horizon_days));
    }
    let model = fit(history, config)?;
    let prediction = model.predict(horizon_days)?;
    Ok((model, prediction))
}

impl FittedModel {
    /// Fitted values for every historical date, then one value per calendar
    /// day up to `horizon_days` after the last one.
    pub fn predict(&self, horizon_days: u32) -> Result<ForecastSeries, ModelFitError> {
        if horizon_days == 0 {
            return Err(ModelFitError::InvalidHorizon(horizon_days));
        }

        let last = self.history_dates[self.history_dates.len() - 1];
        let future = (1..=u64::from(horizon_days)).filter_map(|d| last.checked_add_days(Days::new(d)));
        let dates: Vec<NaiveDate> = self.history_dates.iter().copied().chain(future).collect();

        let mut points = Vec::with_capacity(dates.len());
        let mut trend = Vec::with_capacity(dates.len());
        let mut seasonal: Vec<Component> = self
            .seasonalities
            .iter()
            .map(|s| Component {
                name: s.spec.name.clone(),
                values: Vec::with_capacity(dates.len()),
            })
            .collect();

        let mut buf = Vec::new();
        for &date in &dates {
            let level = self.trend_at(date);
            let days = epoch_days(date);
            let mut total = level;
            for (fitted, component) in self.seasonalities.iter().zip(seasonal.iter_mut()) {
                let value = fitted.evaluate(days, &mut buf) * self.y_scale;
                component.values.push(value);
                total += value;
            }
            trend.push(level);
            points.push(PricePoint { date, price: total });
        }

        Ok(ForecastSeries {
            points,
            trend,
            seasonal,
        })
    }

    /// Trend in price units.
    fn trend_at(&self, date: NaiveDate) -> f64 {
        let t = (date - self.start).num_days() as f64 / self.span_days;
        let hinges: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(&s, &d)| d * (t - s).max(0.0))
            .sum();
        (self.offset + self.slope * t + hinges) * self.y_scale
    }

    /// Names of the seasonal terms, in fit order.
    pub fn seasonal_terms(&self) -> Vec<&str> {
        self.seasonalities.iter().map(|s| s.spec.name.as_str()).collect()
    }

    /// One full period of a seasonal term, sampled `samples` times.
    ///
    /// Returns `(day within period, contribution in price units)`, starting
    /// at `anchor`. `None` when the model has no term called `name`.
    pub fn seasonality_profile(
        &self,
        name: &str,
        anchor: NaiveDate,
        samples: usize,
    ) -> Option<Vec<(f64, f64)>> {
        let fitted = self.seasonalities.iter().find(|s| s.spec.name == name)?;
        let origin = epoch_days(anchor);
        let step = fitted.spec.period / samples.max(1) as f64;

        let mut buf = Vec::new();
        Some(
            (0..=samples)
                .map(|i| {
                    let offset = i as f64 * step;
                    (offset, fitted.evaluate(origin + offset, &mut buf) * self.y_scale)
                })
                .collect(),
        )
    }

    pub fn period_of(&self, name: &str) -> Option<f64> {
        self.seasonalities
            .iter()
            .find(|s| s.spec.name == name)
            .map(|s| s.spec.period)
    }

    /// Residual standard deviation in price units.
    pub fn sigma(&self) -> f64 {
        self.sigma * self.y_scale
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}
