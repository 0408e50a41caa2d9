use thiserror::Error;

/// Failures while acquiring the price history of a ticker.
#[derive(Debug, Error)]
pub enum DataFetchError {
    /// The provider was unreachable or rejected the symbol.
    #[error("provider request for {ticker:?} failed: {message}")]
    Provider { ticker: String, message: String },

    /// The provider answered, but there was no usable close in the answer.
    #[error("no price history available for {0:?}")]
    EmptyHistory(String),
}

/// Failures while fitting the seasonal model or predicting from it.
#[derive(Debug, Error, PartialEq)]
pub enum ModelFitError {
    #[error("need at least {required} observations to fit, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("history has zero variance, nothing to fit")]
    Degenerate,

    #[error("forecast horizon must be at least one day, got {0}")]
    InvalidHorizon(u32),

    #[error("linear solve failed: {0}")]
    Solver(String),

    #[error("optimizer did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Failures while drawing the forecast figure.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The requested view is not available in this build.
    #[error("{0} view is not supported")]
    Unsupported(&'static str),

    #[error("drawing failed: {0}")]
    Drawing(String),
}

/// Any failure of one prediction request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    DataFetch(#[from] DataFetchError),

    #[error(transparent)]
    ModelFit(#[from] ModelFitError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// A blocking worker died before producing a result.
    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
