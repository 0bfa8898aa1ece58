//! Environment configuration, read once at startup.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

/// Default ODPT TripUpdate endpoint.
const DEFAULT_TRIP_UPDATE_URL: &str =
    "https://api-challenge.odpt.org/api/v4/gtfs/realtime/jreast_odpt_train_trip_update";

/// Default OpenTripPlanner GraphQL endpoint.
const DEFAULT_OTP_ENDPOINT: &str = "http://localhost:8080/otp/routers/default/index/graphql";

/// Vite dev server, the fallback CORS origin.
const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    /// ODPT consumer key; empty means every feed fetch degrades to no data.
    pub api_key: String,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    pub database_url: String,
    /// Static corpus root.
    pub data_dir: PathBuf,
    pub trip_update_url: String,
    pub otp_endpoint: String,
    pub bind_addr: String,
    /// Civil timezone of the network.
    pub timezone: Tz,
    /// Total deadline for one feed fetch.
    pub fetch_timeout: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let api_key = std::env::var("ODPT_API_KEY")
            .unwrap_or_default()
            .trim()
            .to_string();
        if api_key.is_empty() {
            warn!("ODPT_API_KEY is not set; position queries will return no data");
        }

        let cors_origins: Vec<String> = std::env::var("FRONTEND_URL")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let cors_origins = if cors_origins.is_empty() {
            vec![DEFAULT_FRONTEND_ORIGIN.to_string()]
        } else {
            cors_origins
        };

        let timezone = match env_or("SERVICE_TZ", "Asia/Tokyo").parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!("SERVICE_TZ is not a valid timezone, using Asia/Tokyo");
                chrono_tz::Asia::Tokyo
            }
        };

        Self {
            api_key,
            cors_origins,
            database_url: env_or("DATABASE_URL", "sqlite:nowtrain.db?mode=rwc"),
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            trip_update_url: env_or("ODPT_TRIP_UPDATE_URL", DEFAULT_TRIP_UPDATE_URL),
            otp_endpoint: env_or("OTP_ENDPOINT", DEFAULT_OTP_ENDPOINT),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),
            timezone,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}
