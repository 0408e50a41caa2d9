use std::error::Error;
use std::sync::Arc;

use stock_forecast::config::Settings;
use stock_forecast::{web, ChartRenderer, Predictor, RenderCapabilities, YahooQuotes};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_forecast=info,main=info,tower_http=info".into()),
        )
        .init();

    // One-time check; the pipeline works either way.
    let capabilities = RenderCapabilities::detect();
    if !capabilities.seasonality_view {
        warn!("seasonality view not compiled in, charts will show forecast components instead");
    }

    let renderer = ChartRenderer::new(settings.chart_size, capabilities);
    let predictor = Arc::new(Predictor::new(YahooQuotes::new(), renderer));
    let app = web::router(predictor);

    let listener = TcpListener::bind(settings.bind_address).await?;
    info!(
        "stock-forecast v{} listening on http://{}",
        env!("CARGO_PKG_VERSION"),
        settings.bind_address
    );
    axum::serve(listener, app).await?;

    Ok(())
}
