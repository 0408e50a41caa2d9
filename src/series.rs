//! Price series flowing through one prediction request.

use chrono::{DateTime, NaiveDate};

/// One row as the provider returned it, before normalisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawQuote {
    /// Seconds since the Unix epoch (UTC).
    pub timestamp: i64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Daily closes, strictly increasing by date, every price finite and positive.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    points: Vec<PricePoint>,
}

impl HistoricalSeries {
    /// Normalises raw quotes into a series.
    ///
    /// Timestamps become plain calendar dates, unusable closes are dropped,
    /// rows are sorted, and when several quotes fall on one date the last
    /// one in provider order wins.
    pub fn from_quotes(quotes: &[RawQuote]) -> Self {
        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .filter_map(|q| {
                DateTime::from_timestamp(q.timestamp, 0).map(|dt| PricePoint {
                    date: dt.date_naive(),
                    price: q.close,
                })
            })
            .collect();

        // stable, so provider order survives within a date
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self { points: deduped }
    }

    /// Builds a series from points that are already clean.
    ///
    /// Returns `None` when dates are not strictly increasing or a price is
    /// not a finite positive number.
    pub fn from_points(points: Vec<PricePoint>) -> Option<Self> {
        let ordered = points.windows(2).all(|w| w[0].date < w[1].date);
        let valid = points.iter().all(|p| p.price.is_finite() && p.price > 0.0);
        (ordered && valid).then_some(Self { points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.price)
    }
}

/// A named additive term of the model, evaluated on every forecast date.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub values: Vec<f64>,
}

/// Model output: fitted values over the history followed by the horizon.
///
/// `trend` and every entry of `seasonal` line up index for index with
/// `points`, and `points[i].price == trend[i] + sum(seasonal[..].values[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    pub points: Vec<PricePoint>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<Component>,
}

impl ForecastSeries {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-02 14:30:00 UTC, a typical US session open
    const JAN_2: i64 = 1_704_205_800;
    const DAY: i64 = 86_400;

    #[test]
    fn from_quotes_sorts_and_strips_time() {
        let quotes = [
            RawQuote { timestamp: JAN_2 + 2 * DAY, close: 12.0 },
            RawQuote { timestamp: JAN_2, close: 10.0 },
            RawQuote { timestamp: JAN_2 + DAY, close: 11.0 },
        ];
        let series = HistoricalSeries::from_quotes(&quotes);

        let dates: Vec<_> = series.dates().collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            ]
        );
        assert_eq!(series.prices().collect::<Vec<_>>(), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn from_quotes_collapses_duplicate_dates() {
        let quotes = [
            RawQuote { timestamp: JAN_2, close: 10.0 },
            RawQuote { timestamp: JAN_2 + 3600, close: 10.5 },
            RawQuote { timestamp: JAN_2 + DAY, close: 11.0 },
        ];
        let series = HistoricalSeries::from_quotes(&quotes);

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].price, 10.5);
    }

    #[test]
    fn from_quotes_drops_unusable_closes() {
        let quotes = [
            RawQuote { timestamp: JAN_2, close: f64::NAN },
            RawQuote { timestamp: JAN_2 + DAY, close: 0.0 },
            RawQuote { timestamp: JAN_2 + 2 * DAY, close: -3.0 },
            RawQuote { timestamp: JAN_2 + 3 * DAY, close: 7.0 },
        ];
        let series = HistoricalSeries::from_quotes(&quotes);

        assert_eq!(series.len(), 1);
        assert_eq!(series.points()[0].price, 7.0);
    }

    #[test]
    fn from_points_rejects_unordered_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let points = vec![
            PricePoint { date: d, price: 1.0 },
            PricePoint { date: d, price: 2.0 },
        ];
        assert!(HistoricalSeries::from_points(points).is_none());
    }
}
