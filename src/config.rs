// src/config.rs
use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SIGNALS_FILE: &str = "signals.json";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_LOOT_MAX: usize = 25;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub signals_file: PathBuf,
    pub static_dir: PathBuf,
    pub mapbox_token: Option<String>,
    pub mapbox_style: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub upstream_timeout: Duration,
    pub session_secret: String,
    pub loot_max: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let session_secret = var("SESSION_SECRET")
            .ok_or_else(|| anyhow!("SESSION_SECRET is required"))?;

        Ok(Self {
            port: parsed(&var, "PORT", DEFAULT_PORT)?,
            signals_file: var("SIGNALS_FILE")
                .unwrap_or_else(|| DEFAULT_SIGNALS_FILE.into())
                .into(),
            static_dir: var("STATIC_DIR").unwrap_or_else(|| "static".into()).into(),
            mapbox_token: var("MAPBOX_TOKEN"),
            mapbox_style: var("MAPBOX_STYLE_URL"),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_base_url: var("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_BASE.into()),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
            upstream_timeout: Duration::from_millis(parsed(
                &var,
                "GEMINI_TIMEOUT_MS",
                DEFAULT_UPSTREAM_TIMEOUT_MS,
            )?),
            session_secret,
            loot_max: parsed(&var, "LOOT_MAX_COUNT", DEFAULT_LOOT_MAX)?.max(1),
        })
    }
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(v) => v.parse().with_context(|| format!("invalid {key}: {v:?}")),
        None => Ok(default),
    }
}
