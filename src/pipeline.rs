//! One prediction request: acquisition, forecasting, rendering.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::Mutex as TurnLock;
use tracing::{info, instrument, warn};

use crate::chart::{ChartRenderer, RenderedChart};
use crate::error::PipelineError;
use crate::horizon::HorizonChoice;
use crate::model::{self, ModelConfig};
use crate::quotes::{fetch_history, QuoteSource};

/// Where the pipeline is. A finished run is ready for the next press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_ready(self) -> bool {
        !matches!(self, PipelineState::Running)
    }
}

/// Everything shown after a successful run.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub ticker: String,
    pub horizon: HorizonChoice,
    pub observations: usize,
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub forecast_end: NaiveDate,
    pub final_price: f64,
    pub chart: RenderedChart,
}

/// Either the full chart or a single error message, never both.
#[derive(Debug, Clone)]
pub enum Outcome {
    Chart(Box<Prediction>),
    Failed(String),
}

/// The single user-visible form of every pipeline failure.
pub fn failure_message(ticker: &str, err: &PipelineError) -> String {
    format!("Error processing {ticker}: {err}")
}

pub struct Predictor<S> {
    source: S,
    renderer: Arc<ChartRenderer>,
    config: ModelConfig,
    turn: TurnLock<()>,
    state: Mutex<PipelineState>,
}

impl<S: QuoteSource> Predictor<S> {
    pub fn new(source: S, renderer: ChartRenderer) -> Self {
        Self {
            source,
            renderer: Arc::new(renderer),
            config: ModelConfig::default(),
            turn: TurnLock::new(()),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the whole pipeline for one button press.
    ///
    /// Presses are served one at a time; a second caller waits for the first
    /// to finish. Failures of any stage end the run with a message.
    pub async fn predict(&self, ticker: &str, horizon: HorizonChoice) -> Outcome {
        let _turn = self.turn.lock().await;
        let run = RunGuard::start(&self.state);

        match self.run(ticker, horizon).await {
            Ok(prediction) => {
                info!(
                    ticker,
                    days = horizon.effective_days(),
                    view = prediction.chart.panel_b.title(),
                    "prediction rendered"
                );
                run.finish(PipelineState::Succeeded);
                Outcome::Chart(Box::new(prediction))
            }
            Err(err) => {
                warn!(ticker, error = %err, "prediction failed");
                run.finish(PipelineState::Failed);
                Outcome::Failed(failure_message(ticker, &err))
            }
        }
    }

    #[instrument(skip(self), fields(days = horizon.effective_days()))]
    pub async fn run(&self, ticker: &str, horizon: HorizonChoice) -> Result<Prediction, PipelineError> {
        let history = fetch_history(&self.source, ticker).await?;

        let renderer = Arc::clone(&self.renderer);
        let config = self.config.clone();
        let ticker = ticker.to_string();

        // fitting and drawing are CPU bound
        tokio::task::spawn_blocking(move || -> Result<Prediction, PipelineError> {
            let (fitted, forecast) = model::forecast(&history, &config, horizon.effective_days())?;
            let chart = renderer.render(&history, &forecast, &fitted)?;

            let (Some(history_start), Some(history_end), Some(last)) =
                (history.first_date(), history.last_date(), forecast.points.last())
            else {
                return Err(PipelineError::Task("empty series after forecasting".into()));
            };

            Ok(Prediction {
                ticker,
                horizon,
                observations: history.len(),
                history_start,
                history_end,
                forecast_end: last.date,
                final_price: last.price,
                chart,
            })
        })
        .await
        .map_err(|err| PipelineError::Task(err.to_string()))?
    }
}

/// Holds the state at `Running` for one press. Dropping it unfinished,
/// as happens when the caller goes away mid-run, records `Failed`.
struct RunGuard<'a> {
    state: &'a Mutex<PipelineState>,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn start(state: &'a Mutex<PipelineState>) -> Self {
        let guard = Self {
            state,
            finished: false,
        };
        guard.set(PipelineState::Running);
        guard
    }

    fn finish(mut self, outcome: PipelineState) {
        self.set(outcome);
        self.finished = true;
    }

    fn set(&self, next: PipelineState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("prediction cancelled before it finished");
            self.set(PipelineState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataFetchError, ModelFitError};

    #[test]
    fn failure_message_names_ticker_and_cause() {
        let err = PipelineError::from(DataFetchError::EmptyHistory("ZZZZINVALID".into()));
        assert_eq!(
            failure_message("ZZZZINVALID", &err),
            "Error processing ZZZZINVALID: no price history available for \"ZZZZINVALID\""
        );

        let err = PipelineError::from(ModelFitError::InsufficientData {
            required: 2,
            actual: 1,
        });
        assert!(failure_message("ONE", &err).ends_with("need at least 2 observations to fit, got 1"));
    }

    #[test]
    fn dropped_run_is_recorded_as_failed() {
        let state = Mutex::new(PipelineState::Idle);

        let run = RunGuard::start(&state);
        assert_eq!(*state.lock().unwrap(), PipelineState::Running);
        drop(run);
        assert_eq!(*state.lock().unwrap(), PipelineState::Failed);

        RunGuard::start(&state).finish(PipelineState::Succeeded);
        assert_eq!(*state.lock().unwrap(), PipelineState::Succeeded);
    }

    #[test]
    fn only_running_blocks_the_next_press() {
        assert!(PipelineState::Idle.is_ready());
        assert!(PipelineState::Succeeded.is_ready());
        assert!(PipelineState::Failed.is_ready());
        assert!(!PipelineState::Running.is_ready());
    }
}
