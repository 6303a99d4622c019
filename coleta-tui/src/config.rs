//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use coleta_core::{
    coordinator::CoordinatorConfig,
    model::{BackendId, Coordinate},
};

/// Catalog backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum Backend {
    /// Collection point service exposing regions, municipalities and points itself
    #[default]
    Rest,
    /// Ecoleta server, with regions from the IBGE localities API
    Ecoleta,
}

impl Backend {
    pub(crate) fn id(self) -> BackendId {
        let id = match self {
            Backend::Rest => coleta_provider_rest::BACKEND_ID,
            Backend::Ecoleta => coleta_provider_ecoleta::BACKEND_ID,
        };
        BackendId(id.to_owned())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "coleta", about = "Find waste collection points by municipality and material")]
pub(crate) struct Config {
    // === Backend ===
    /// Catalog backend
    #[arg(long, env = "COLETA_BACKEND", default_value = "rest", value_enum)]
    pub backend: Backend,

    /// Base URL of the collection point server
    #[arg(long, env = "COLETA_API_URL", default_value = "http://localhost:3333")]
    pub api_url: String,

    /// Localities API used by the ecoleta backend for regions and municipalities
    #[arg(
        long,
        env = "COLETA_LOCALITIES_URL",
        default_value = coleta_provider_ecoleta::IBGE_LOCALITIES_URL
    )]
    pub localities_url: String,

    // === Timing ===
    /// Upper bound for each catalog request (seconds)
    #[arg(long, env = "COLETA_TIMEOUT_SECS", default_value = "10")]
    pub timeout_secs: u64,

    /// Quiet period before a point query is sent (ms)
    #[arg(long, env = "COLETA_DEBOUNCE_MS", default_value = "150")]
    pub debounce_ms: u64,

    // === Device position ===
    /// Latitude of this terminal; without it the map starts unlocated
    #[arg(long, env = "COLETA_LATITUDE", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Longitude of this terminal
    #[arg(long, env = "COLETA_LONGITUDE", allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    // === Logging ===
    /// File receiving the log output (the terminal is taken by the UI)
    #[arg(long, env = "COLETA_LOG_FILE", default_value = "coleta.log")]
    pub log_file: PathBuf,
}

impl Config {
    /// Validate the configuration at startup
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".to_owned());
        }

        if self.api_url.trim().is_empty() {
            return Err("--api-url must not be empty".to_owned());
        }
        if self.backend == Backend::Ecoleta && self.localities_url.trim().is_empty() {
            return Err("backend=ecoleta requires --localities-url".to_owned());
        }

        match (self.latitude, self.longitude) {
            (Some(_), None) | (None, Some(_)) => {
                return Err("--latitude and --longitude must be given together".to_owned());
            }
            (Some(latitude), Some(longitude)) => {
                if !(-90.0..=90.0).contains(&latitude) {
                    return Err(format!("latitude {latitude} is outside [-90, 90]"));
                }
                if !(-180.0..=180.0).contains(&longitude) {
                    return Err(format!("longitude {longitude} is outside [-180, 180]"));
                }
            }
            (None, None) => {}
        }

        Ok(())
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            query_timeout: self.request_timeout(),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    /// Position standing in for the device sensor, when configured.
    pub(crate) fn device_position(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude?, self.longitude?))
    }
}
