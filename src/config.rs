use std::str::FromStr;

use crate::{
    services::{overpass::DEFAULT_OVERPASS_URL, search::DEFAULT_MAX_RESULTS},
    GenericError,
};

pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_id: String,
    pub overpass_url: String,
    pub max_results: usize,
    pub default_radius_km: f64,
    pub bearer_token: String,
    /// `{country_code}{number}`, returned by the `validate` tool.
    pub owner_phone_number: String,
    pub port: u16,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, GenericError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, GenericError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            server_id: text("MCP_SERVER_ID", "near-me-tool"),
            overpass_url: text("OVERPASS_URL", DEFAULT_OVERPASS_URL),
            max_results: parsed(&lookup, "MAX_RESULTS", DEFAULT_MAX_RESULTS)?,
            default_radius_km: parsed(&lookup, "DEFAULT_RADIUS_KM", DEFAULT_RADIUS_KM)?,
            bearer_token: text("BEARER_TOKEN", "abc123token"),
            owner_phone_number: text("OWNER_PHONE_NUMBER", "919876543210"),
            port: parsed(&lookup, "PORT", 3000)?,
        })
    }
}

fn parsed<T, F>(lookup: &F, key: &str, default: T) -> Result<T, GenericError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{key}={raw:?} is not valid: {e}").into()),
        None => Ok(default),
    }
}
