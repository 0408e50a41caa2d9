//! Daily stock price forecasting behind a one-form web page.
//!
//! A request fetches the full daily close history of one ticker, fits an
//! additive seasonal trend model to it, and renders history, forecast and
//! the model's decomposition into a single SVG figure.

pub mod chart;
pub mod config;
pub mod error;
pub mod horizon;
pub mod model;
pub mod pipeline;
pub mod quotes;
pub mod series;
pub mod web;

pub use chart::{ChartRenderer, DecompositionView, RenderCapabilities, RenderedChart};
pub use error::{ConfigError, DataFetchError, ModelFitError, PipelineError, RenderError};
pub use horizon::HorizonChoice;
pub use pipeline::{Outcome, PipelineState, Prediction, Predictor};
pub use quotes::{fetch_history, QuoteSource, YahooQuotes};
pub use series::{ForecastSeries, HistoricalSeries, PricePoint, RawQuote};
