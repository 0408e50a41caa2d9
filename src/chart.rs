//! Two-panel forecast figure rendered to an in-memory SVG.
//!
//! The top panel overlays history and forecast. The bottom panel shows how
//! the model decomposes the forecast. It prefers the seasonality view (each
//! seasonal term over one period) and falls back to the components view
//! (trend and each term over the whole range) when that is unavailable.

use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::debug;

use crate::error::RenderError;
use crate::model::FittedModel;
use crate::series::{ForecastSeries, HistoricalSeries};

// Jan 1, so the yearly profile reads as day of year
const PROFILE_ANCHOR: (i32, u32, u32) = (2017, 1, 1);
const PROFILE_SAMPLES: usize = 365;

const FONT: &str = "sans-serif";
const COMPONENT_COLOR: RGBColor = RGBColor(0, 114, 178);

type Panel<'a> = DrawingArea<SVGBackend<'a>, Shift>;

impl<E> From<DrawingAreaErrorKind<E>> for RenderError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

/// Optional drawing features available in this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCapabilities {
    pub seasonality_view: bool,
}

impl RenderCapabilities {
    pub fn detect() -> Self {
        Self {
            seasonality_view: cfg!(feature = "seasonality-view"),
        }
    }
}

/// What ended up in the bottom panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionView {
    Seasonality,
    Components,
}

impl DecompositionView {
    pub fn title(self) -> &'static str {
        match self {
            DecompositionView::Seasonality => "Seasonality",
            DecompositionView::Components => "Forecast Components",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub svg: String,
    pub panel_b: DecompositionView,
}

pub struct ChartRenderer {
    size: (u32, u32),
    capabilities: RenderCapabilities,
}

impl ChartRenderer {
    pub fn new(size: (u32, u32), capabilities: RenderCapabilities) -> Self {
        Self { size, capabilities }
    }

    pub fn capabilities(&self) -> RenderCapabilities {
        self.capabilities
    }

    pub fn render(
        &self,
        history: &HistoricalSeries,
        forecast: &ForecastSeries,
        model: &FittedModel,
    ) -> Result<RenderedChart, RenderError> {
        let mut svg = String::new();
        let panel_b = {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            root.fill(&WHITE)?;
            let panels = root.split_evenly((2, 1));

            draw_price_panel(&panels[0], history, forecast)?;

            let view = match self.draw_seasonality(&panels[1], model) {
                Ok(()) => DecompositionView::Seasonality,
                Err(RenderError::Unsupported(what)) => {
                    debug!(view = what, "falling back to forecast components");
                    draw_components(&panels[1], forecast)?;
                    DecompositionView::Components
                }
                Err(err) => return Err(err),
            };

            root.present()?;
            view
        };

        Ok(RenderedChart { svg, panel_b })
    }

    // Unsupported is returned before anything is drawn
    fn draw_seasonality(
        &self,
        area: &Panel<'_>,
        model: &FittedModel,
    ) -> Result<(), RenderError> {
        if !self.capabilities.seasonality_view {
            return Err(RenderError::Unsupported("seasonality"));
        }
        let terms = model.seasonal_terms();
        if terms.is_empty() {
            return Err(RenderError::Unsupported("seasonality"));
        }

        let (y, m, d) = PROFILE_ANCHOR;
        let anchor = NaiveDate::from_ymd_opt(y, m, d)
            .ok_or(RenderError::Unsupported("seasonality"))?;

        let area = area.titled(DecompositionView::Seasonality.title(), (FONT, 24))?;
        let cells = area.split_evenly((1, terms.len()));
        for (name, cell) in terms.iter().zip(&cells) {
            let (Some(profile), Some(period)) = (
                model.seasonality_profile(name, anchor, PROFILE_SAMPLES),
                model.period_of(name),
            ) else {
                return Err(RenderError::Unsupported("seasonality"));
            };
            let (lo, hi) = padded_bounds(profile.iter().map(|&(_, v)| v));

            let mut chart = ChartBuilder::on(cell)
                .caption(*name, (FONT, 18))
                .margin(10)
                .x_label_area_size(35)
                .y_label_area_size(60)
                .build_cartesian_2d(0.0..period, lo..hi)?;
            chart
                .configure_mesh()
                .x_desc(format!("Day of {name} cycle"))
                .y_desc(*name)
                .draw()?;
            chart.draw_series(LineSeries::new(profile, &COMPONENT_COLOR))?;
        }

        Ok(())
    }
}

fn draw_price_panel(
    area: &Panel<'_>,
    history: &HistoricalSeries,
    forecast: &ForecastSeries,
) -> Result<(), RenderError> {
    let (Some(start), Some(end)) = (
        min_date(history.first_date(), forecast.first_date()),
        max_date(history.last_date(), forecast.last_date()),
    ) else {
        return Err(RenderError::Drawing("nothing to plot".into()));
    };
    let (lo, hi) = padded_bounds(history.prices().chain(forecast.points.iter().map(|p| p.price)));

    let mut chart = ChartBuilder::on(area)
        .caption("Stock Price Forecast", (FONT, 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(start..end, lo..hi)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Price")
        .x_labels(10)
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            history.points().iter().map(|p| (p.date, p.price)),
            &BLUE,
        ))?
        .label("Historical Price")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(DashedLineSeries::new(
            forecast.points.iter().map(|p| (p.date, p.price)),
            6,
            4,
            RED.stroke_width(1),
        ))?
        .label("Forecasted Price")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}

fn draw_components(
    area: &Panel<'_>,
    forecast: &ForecastSeries,
) -> Result<(), RenderError> {
    let (Some(start), Some(end)) = (forecast.first_date(), forecast.last_date()) else {
        return Err(RenderError::Drawing("nothing to plot".into()));
    };

    let area = area.titled(DecompositionView::Components.title(), (FONT, 24))?;
    let mut rows: Vec<(&str, &[f64])> = vec![("trend", forecast.trend.as_slice())];
    rows.extend(
        forecast
            .seasonal
            .iter()
            .map(|c| (c.name.as_str(), c.values.as_slice())),
    );
    let cells = area.split_evenly((rows.len(), 1));

    for ((name, values), cell) in rows.iter().zip(&cells) {
        let (lo, hi) = padded_bounds(values.iter().copied());
        let mut chart = ChartBuilder::on(cell)
            .margin(8)
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(start..end, lo..hi)?;
        chart.configure_mesh().x_labels(8).y_desc(*name).draw()?;
        chart.draw_series(LineSeries::new(
            forecast.points.iter().zip(values.iter()).map(|(p, &v)| (p.date, v)),
            &COMPONENT_COLOR,
        ))?;
    }

    Ok(())
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = (hi - lo).abs() * 0.05;
    if pad == 0.0 {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo - pad, hi + pad)
    }
}

fn min_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
