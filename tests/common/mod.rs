#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use stock_forecast::{ChartRenderer, DataFetchError, QuoteSource, RawQuote, RenderCapabilities};

/// Session open on the first trading day, 14:30 UTC.
pub const FIRST_OPEN: i64 = 1_577_975_400; // 2020-01-02
pub const DAY: i64 = 86_400;

pub fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
}

/// Weekday closes with trend, monthly and yearly swings and a little
/// deterministic jitter.
pub fn trading_days(calendar_days: i64) -> Vec<RawQuote> {
    (0..calendar_days)
        .filter_map(|i| {
            let date = first_day() + chrono::Duration::days(i);
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                return None;
            }
            let t = i as f64;
            let close = 150.0
                + 0.05 * t
                + 4.0 * (2.0 * std::f64::consts::PI * t / 30.5).sin()
                + 9.0 * (2.0 * std::f64::consts::PI * t / 365.25).cos()
                + 0.7 * (t * 12.9898).sin();
            Some(RawQuote {
                timestamp: FIRST_OPEN + i * DAY,
                close,
            })
        })
        .collect()
}

/// Serves the same quotes for any non-blank ticker and counts calls.
pub struct StubQuotes {
    quotes: Vec<RawQuote>,
    pub calls: AtomicUsize,
}

impl StubQuotes {
    pub fn new(quotes: Vec<RawQuote>) -> Self {
        Self {
            quotes,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for StubQuotes {
    async fn daily_history(&self, ticker: &str) -> Result<Vec<RawQuote>, DataFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if ticker.is_empty() {
            return Err(not_found(ticker));
        }
        Ok(self.quotes.clone())
    }
}

fn not_found(ticker: &str) -> DataFetchError {
    DataFetchError::Provider {
        ticker: ticker.to_string(),
        message: "fetching the data from yahoo! finance failed".to_string(),
    }
}

/// Never answers; `entered` fires once a request is waiting on it.
#[derive(Default)]
pub struct StalledQuotes {
    pub entered: Notify,
}

#[async_trait]
impl QuoteSource for StalledQuotes {
    async fn daily_history(&self, _ticker: &str) -> Result<Vec<RawQuote>, DataFetchError> {
        self.entered.notify_one();
        std::future::pending().await
    }
}

/// Answers after a short delay and remembers how many requests overlapped.
pub struct TrackedQuotes {
    quotes: Vec<RawQuote>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl TrackedQuotes {
    pub fn new(quotes: Vec<RawQuote>) -> Self {
        Self {
            quotes,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuoteSource for TrackedQuotes {
    async fn daily_history(&self, _ticker: &str) -> Result<Vec<RawQuote>, DataFetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.quotes.clone())
    }
}

/// Behaves like a provider that does not know the symbol.
pub struct UnknownSymbol;

#[async_trait]
impl QuoteSource for UnknownSymbol {
    async fn daily_history(&self, ticker: &str) -> Result<Vec<RawQuote>, DataFetchError> {
        Err(DataFetchError::Provider {
            ticker: ticker.to_string(),
            message: "No data found, symbol may be delisted".to_string(),
        })
    }
}

pub fn renderer(seasonality_view: bool) -> ChartRenderer {
    ChartRenderer::new((900, 900), RenderCapabilities { seasonality_view })
}
