//! Daily price history acquisition.
//!
//! [`QuoteSource`] is the seam to the market data provider. [`YahooQuotes`]
//! is the production implementation; tests plug in canned sources.

use async_trait::async_trait;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

use crate::error::DataFetchError;
use crate::series::{HistoricalSeries, RawQuote};

/// A provider of daily quotes covering the full available history.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn daily_history(&self, ticker: &str) -> Result<Vec<RawQuote>, DataFetchError>;
}

/// Yahoo Finance chart endpoint, daily interval, maximum range.
pub struct YahooQuotes {
    provider: yahoo::YahooConnector,
}

impl YahooQuotes {
    pub fn new() -> Self {
        Self {
            provider: yahoo::YahooConnector::new(),
        }
    }
}

impl Default for YahooQuotes {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for YahooQuotes {
    async fn daily_history(&self, ticker: &str) -> Result<Vec<RawQuote>, DataFetchError> {
        let provider_error = |err: yahoo::YahooError| DataFetchError::Provider {
            ticker: ticker.to_string(),
            message: err.to_string(),
        };

        let response = self
            .provider
            .get_quote_range(ticker, "1d", "max")
            .await
            .map_err(provider_error)?;
        let quotes = response.quotes().map_err(provider_error)?;

        Ok(quotes
            .iter()
            .map(|quote| RawQuote {
                timestamp: quote.timestamp as i64,
                close: quote.close,
            })
            .collect())
    }
}

/// Fetches and normalises the complete daily close history of `ticker`.
///
/// Touches no shared state, so repeated calls for one ticker return the same
/// series as long as the provider has no new trading day in between.
#[instrument(skip(source))]
pub async fn fetch_history<S>(source: &S, ticker: &str) -> Result<HistoricalSeries, DataFetchError>
where
    S: QuoteSource + ?Sized,
{
    let raw = source.daily_history(ticker).await?;
    let series = HistoricalSeries::from_quotes(&raw);
    if series.is_empty() {
        return Err(DataFetchError::EmptyHistory(ticker.to_string()));
    }

    debug!(
        rows = raw.len(),
        days = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "history fetched"
    );
    Ok(series)
}
