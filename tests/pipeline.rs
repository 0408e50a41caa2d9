mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration};

use common::{renderer, trading_days, StalledQuotes, StubQuotes, TrackedQuotes, UnknownSymbol};
use stock_forecast::{
    DecompositionView, HorizonChoice, Outcome, PipelineState, Predictor, YahooQuotes,
};

fn last_trading_day(calendar_days: i64) -> chrono::NaiveDate {
    let last = trading_days(calendar_days).last().unwrap().timestamp;
    DateTime::from_timestamp(last, 0).unwrap().date_naive()
}

fn chart(outcome: Outcome) -> Box<stock_forecast::Prediction> {
    match outcome {
        Outcome::Chart(prediction) => prediction,
        Outcome::Failed(message) => panic!("expected a chart, got: {message}"),
    }
}

fn failure(outcome: Outcome) -> String {
    match outcome {
        Outcome::Failed(message) => message,
        Outcome::Chart(prediction) => panic!("expected a failure, got a chart for {}", prediction.ticker),
    }
}

#[tokio::test]
async fn default_horizon_forecasts_nine_hundred_days_past_history() {
    let predictor = Predictor::new(StubQuotes::new(trading_days(1100)), renderer(true));
    assert_eq!(predictor.state(), PipelineState::Idle);

    let prediction = chart(predictor.predict("AAPL", HorizonChoice::default()).await);

    let history_end = last_trading_day(1100);
    assert_eq!(prediction.ticker, "AAPL");
    assert_eq!(prediction.history_start, common::first_day());
    assert_eq!(prediction.history_end, history_end);
    assert_eq!(prediction.forecast_end, history_end + Duration::days(900));
    assert!(prediction.final_price.is_finite());

    assert_eq!(prediction.chart.panel_b, DecompositionView::Seasonality);
    assert!(prediction.chart.svg.contains("<svg"));
    assert!(prediction.chart.svg.contains("Stock Price Forecast"));
    assert!(prediction.chart.svg.contains("Historical Price"));
    assert!(prediction.chart.svg.contains("Forecasted Price"));

    assert_eq!(predictor.state(), PipelineState::Succeeded);
    assert!(predictor.state().is_ready());
}

#[tokio::test]
async fn components_view_stands_in_without_seasonality_support() {
    let predictor = Predictor::new(StubQuotes::new(trading_days(1100)), renderer(false));

    let prediction = chart(predictor.predict("MSFT", HorizonChoice::new(60).unwrap()).await);

    assert_eq!(prediction.chart.panel_b, DecompositionView::Components);
    assert!(prediction.chart.svg.contains("Forecast Components"));
    assert_eq!(
        prediction.forecast_end,
        last_trading_day(1100) + Duration::days(1800)
    );
}

#[tokio::test]
async fn empty_ticker_reports_provider_error() {
    let predictor = Predictor::new(StubQuotes::new(trading_days(400)), renderer(true));

    let message = failure(predictor.predict("", HorizonChoice::default()).await);

    assert_eq!(
        message,
        "Error processing : provider request for \"\" failed: fetching the data from yahoo! finance failed"
    );
    assert_eq!(predictor.state(), PipelineState::Failed);
}

#[tokio::test]
async fn cancelled_press_leaves_pipeline_ready() {
    let predictor = Arc::new(Predictor::new(StalledQuotes::default(), renderer(true)));

    let press = {
        let predictor = Arc::clone(&predictor);
        tokio::spawn(async move { predictor.predict("AAPL", HorizonChoice::new(360).unwrap()).await })
    };
    predictor.source().entered.notified().await;
    assert_eq!(predictor.state(), PipelineState::Running);

    press.abort();
    assert!(press.await.unwrap_err().is_cancelled());

    assert_eq!(predictor.state(), PipelineState::Failed);
    assert!(predictor.state().is_ready());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn presses_run_one_at_a_time() {
    let predictor = Predictor::new(TrackedQuotes::new(trading_days(400)), renderer(true));

    let (first, second) = tokio::join!(
        predictor.predict("AAPL", HorizonChoice::default()),
        predictor.predict("MSFT", HorizonChoice::default()),
    );

    assert!(matches!(first, Outcome::Chart(_)));
    assert!(matches!(second, Outcome::Chart(_)));
    assert_eq!(predictor.source().peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_symbol_reports_provider_error() {
    let predictor = Predictor::new(UnknownSymbol, renderer(true));

    let message = failure(predictor.predict("ZZZZINVALID", HorizonChoice::default()).await);

    assert!(message.starts_with("Error processing ZZZZINVALID: "), "{message}");
    assert!(message.contains("symbol may be delisted"));
    assert_eq!(predictor.state(), PipelineState::Failed);
}

#[tokio::test]
async fn empty_provider_answer_reports_missing_history() {
    let predictor = Predictor::new(StubQuotes::new(Vec::new()), renderer(true));

    let message = failure(predictor.predict("ZZZZINVALID", HorizonChoice::default()).await);

    assert_eq!(
        message,
        "Error processing ZZZZINVALID: no price history available for \"ZZZZINVALID\""
    );
}

#[tokio::test]
async fn single_observation_reports_fit_error() {
    let mut quotes = trading_days(5);
    quotes.truncate(1);
    let predictor = Predictor::new(StubQuotes::new(quotes), renderer(true));

    let message = failure(predictor.predict("NEWIPO", HorizonChoice::default()).await);

    assert_eq!(
        message,
        "Error processing NEWIPO: need at least 2 observations to fit, got 1"
    );
}

#[tokio::test]
async fn failure_leaves_pipeline_ready_for_next_press() {
    let predictor = Predictor::new(StubQuotes::new(trading_days(400)), renderer(true));

    failure(predictor.predict("", HorizonChoice::default()).await);
    assert!(predictor.state().is_ready());

    let prediction = chart(predictor.predict("IBM", HorizonChoice::default()).await);
    assert_eq!(prediction.ticker, "IBM");
    assert_eq!(predictor.state(), PipelineState::Succeeded);
}

#[tokio::test]
async fn same_input_gives_same_forecast() {
    let predictor = Predictor::new(StubQuotes::new(trading_days(800)), renderer(true));

    let first = chart(predictor.predict("KO", HorizonChoice::default()).await);
    let second = chart(predictor.predict("KO", HorizonChoice::default()).await);

    assert_eq!(first.forecast_end, second.forecast_end);
    assert!((first.final_price - second.final_price).abs() < 1e-9);
}

#[test]
fn blocking_caller_can_drive_the_pipeline() {
    let predictor = Predictor::new(StubQuotes::new(trading_days(400)), renderer(true));

    let outcome = tokio_test::block_on(predictor.predict("INFY.NS", HorizonChoice::default()));

    assert!(matches!(outcome, Outcome::Chart(_)));
}

#[tokio::test]
#[ignore = "requires network access to Yahoo Finance"]
async fn live_aapl_forecast() {
    let predictor = Predictor::new(YahooQuotes::new(), renderer(true));

    let prediction = chart(predictor.predict("AAPL", HorizonChoice::default()).await);

    assert!(prediction.observations > 1_000);
    assert_eq!(
        prediction.forecast_end,
        prediction.history_end + Duration::days(900)
    );
}

#[tokio::test]
#[ignore = "requires network access to Yahoo Finance"]
async fn live_invalid_symbol_fails() {
    let predictor = Predictor::new(YahooQuotes::new(), renderer(true));

    let message = failure(predictor.predict("ZZZZINVALID", HorizonChoice::default()).await);

    assert!(message.starts_with("Error processing ZZZZINVALID: "));
}
