use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use tracing::Level;

use crate::BASE_URL;

/// Runtime settings. Every flag falls back to an environment variable, and a `.env`
/// file in the working directory is loaded before parsing.
#[derive(Debug, Clone, Parser)]
#[command(name = "fixture-audit", version, about = "Grades fixture photos with a vision model")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "FIXTURE_AUDIT_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Path of the evaluation endpoint
    #[arg(long, env = "FIXTURE_AUDIT_ROUTE", default_value = "/api/analyze", value_parser = parse_route)]
    pub route: String,

    /// Anthropic API key; requests fail with 500 while it is unset
    #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the Messages API
    #[arg(long, env = "CLAUDE_API_BASE_URL", default_value = BASE_URL)]
    pub base_url: String,
}

impl Config {
    /// Loads `.env` (if any) and parses the command line.
    ///
    /// The outcome of reading `.env` is handed back so it can be logged with
    /// [`report_dotenv`] once tracing is initialised.
    pub fn load() -> (Self, dotenvy::Result<PathBuf>) {
        let dotenv = dotenvy::dotenv();
        (Self::parse(), dotenv)
    }

    /// The API key, treating an empty value as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Logs how reading `.env` went and returns the level it was logged at.
///
/// No file at all is the normal case in deployment and only shows at debug level.
pub fn report_dotenv(result: &dotenvy::Result<PathBuf>) -> Level {
    match result {
        Ok(path) => {
            tracing::info!(".env read successfully from {}", path.display());
            Level::INFO
        }
        Err(e) if e.not_found() => {
            tracing::debug!("no .env file found");
            Level::DEBUG
        }
        Err(e) => {
            tracing::error!("Could not load .env file: {e}");
            Level::ERROR
        }
    }
}

fn parse_route(route: &str) -> Result<String, String> {
    if route.starts_with('/') {
        Ok(route.to_owned())
    } else {
        Err(format!("route must start with '/', got {route:?}"))
    }
}
