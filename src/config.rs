use std::net::SocketAddr;

use crate::error::ConfigError;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8501";
const DEFAULT_CHART_WIDTH: u32 = 1200;
const DEFAULT_CHART_HEIGHT: u32 = 1200;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_address: SocketAddr,
    /// Width and height of the rendered figure in pixels.
    pub chart_size: (u32, u32),
}

impl Settings {
    /// Reads `BIND_ADDRESS`, `CHART_WIDTH` and `CHART_HEIGHT`, after loading
    /// an optional `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDRESS",
            value: bind.clone(),
        })?;

        let width = pixels(&lookup, "CHART_WIDTH", DEFAULT_CHART_WIDTH)?;
        let height = pixels(&lookup, "CHART_HEIGHT", DEFAULT_CHART_HEIGHT)?;

        Ok(Self {
            bind_address,
            chart_size: (width, height),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8501)),
            chart_size: (DEFAULT_CHART_WIDTH, DEFAULT_CHART_HEIGHT),
        }
    }
}

fn pixels<F>(lookup: &F, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}
