use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::measure::FontFamily;

/// Application configuration loaded from environment variables.
/// Every variable is optional; invalid values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Quiet period after the last edit before a session re-paginates.
    pub debounce: Duration,
    /// Font the server-side measurer estimates text with.
    pub measure_font: FontFamily,
    pub measure_font_size_px: f32,
    /// Sessions untouched for this long are closed.
    pub session_idle_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let debounce_ms = env_or("PAGINATION_DEBOUNCE_MS", "300")
            .parse::<u64>()
            .context("PAGINATION_DEBOUNCE_MS must be a whole number of milliseconds")?;

        let measure_font = env_or("MEASURE_FONT", "inter")
            .parse::<FontFamily>()
            .map_err(|e| anyhow!(e))
            .context("MEASURE_FONT is not a supported font family")?;

        let measure_font_size_px = env_or("MEASURE_FONT_SIZE_PX", "14.67")
            .parse::<f32>()
            .context("MEASURE_FONT_SIZE_PX must be a number")?;
        if !(measure_font_size_px.is_finite() && measure_font_size_px > 0.0) {
            return Err(anyhow!("MEASURE_FONT_SIZE_PX must be positive"));
        }

        let idle_secs = env_or("SESSION_IDLE_TTL_SECS", "1800")
            .parse::<u64>()
            .context("SESSION_IDLE_TTL_SECS must be a whole number of seconds")?;
        if idle_secs == 0 {
            return Err(anyhow!("SESSION_IDLE_TTL_SECS must be positive"));
        }

        Ok(Config {
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            debounce: Duration::from_millis(debounce_ms),
            measure_font,
            measure_font_size_px,
            session_idle_ttl: Duration::from_secs(idle_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            debounce: Duration::from_millis(300),
            measure_font: FontFamily::Inter,
            measure_font_size_px: 14.67,
            session_idle_ttl: Duration::from_secs(1800),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
