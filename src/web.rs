//! Browser front end: one form, one output area.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use num_format::{Locale, ToFormattedString};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::horizon::HorizonChoice;
use crate::pipeline::{failure_message, Outcome, Prediction, Predictor};
use crate::quotes::QuoteSource;

/// Fields posted by the Predict button.
#[derive(Debug, Deserialize)]
pub struct PredictForm {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub horizon: String,
}

pub fn router<S>(predictor: Arc<Predictor<S>>) -> Router
where
    S: QuoteSource + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict::<S>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(predictor)
}

async fn index() -> Html<String> {
    Html(page("", HorizonChoice::default(), None))
}

async fn predict<S>(
    State(predictor): State<Arc<Predictor<S>>>,
    Form(form): Form<PredictForm>,
) -> Html<String>
where
    S: QuoteSource + 'static,
{
    let (horizon, outcome) = match form.horizon.parse::<HorizonChoice>() {
        Ok(horizon) => (horizon, predictor.predict(&form.ticker, horizon).await),
        Err(err) => (
            HorizonChoice::default(),
            Outcome::Failed(failure_message(&form.ticker, &err)),
        ),
    };
    Html(page(&form.ticker, horizon, Some(&outcome)))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The whole page; `outcome` fills the output area below the form.
pub fn page(ticker: &str, horizon: HorizonChoice, outcome: Option<&Outcome>) -> String {
    let mut options = String::new();
    for choice in HorizonChoice::all() {
        let selected = if choice == horizon { " selected" } else { "" };
        let _ = write!(options, r#"<option value="{choice}"{selected}>{choice}</option>"#);
    }

    let output = match outcome {
        None => String::new(),
        Some(Outcome::Chart(prediction)) => chart_section(prediction),
        Some(Outcome::Failed(message)) => {
            format!(r#"<div class="error">{}</div>"#, escape(message))
        }
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Stock Price Forecast</title>
<style>
body {{ font-family: sans-serif; max-width: 1240px; margin: 2em auto; }}
label {{ display: block; margin-top: 1em; }}
.error {{ margin-top: 1.5em; padding: 1em; color: #7d1a1a; background: #fdecea; }}
.summary {{ margin-top: 1.5em; }}
</style>
</head>
<body>
<form method="post" action="/predict">
<label for="ticker">Enter stock ticker symbol (e.g., INFY.NS):</label>
<input id="ticker" name="ticker" type="text" value="{ticker}">
<label for="horizon">Select the number of forecast days:</label>
<select id="horizon" name="horizon">{options}</select>
<button type="submit">Predict</button>
</form>
{output}
</body>
</html>
"#,
        ticker = escape(ticker),
    )
}

fn chart_section(prediction: &Prediction) -> String {
    format!(
        r#"<p class="summary">{ticker}: fitted on {days} trading days from {start} to {end}; forecast of {final_price:.2} on {forecast_end}.</p>
<div class="chart">{svg}</div>"#,
        ticker = escape(&prediction.ticker),
        days = prediction.observations.to_formatted_string(&Locale::en),
        start = prediction.history_start,
        end = prediction.history_end,
        final_price = prediction.final_price,
        forecast_end = prediction.forecast_end,
        svg = prediction.chart.svg,
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
