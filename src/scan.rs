// src/scan.rs
//! Proxy to the external generative-text API.
//!
//! Exactly one upstream attempt per call, bounded by the client timeout. Failures are
//! folded into [`ScanError::Rejected`] or [`ScanError::Lost`] and never retried here.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ScanError;
use crate::types::{Coordinate, ScanReport};

const API_KEY_HEADER: &str = "x-goog-api-key";

const CHAT_PREAMBLE: &str =
    "You are a terse survival radio operator. Answer in at most two short sentences.";

pub struct ScanProxy {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ScanProxy {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// One-sentence environmental report for `coord`.
    pub async fn scan(&self, coord: Coordinate) -> Result<ScanReport, ScanError> {
        let payload = self.generate(&scan_prompt(coord)).await?;
        let text = first_candidate_text(&payload)
            .ok_or_else(|| ScanError::Lost("response has no candidate text".into()))?;
        info!(lat = coord.lat, lng = coord.lng, "scan report generated");
        Ok(ScanReport {
            message: text.trim().to_string(),
        })
    }

    /// Pass-through chat. The caller gets the upstream payload as-is.
    pub async fn chat(&self, message: &str) -> Result<Value, ScanError> {
        self.generate(&format!("{CHAT_PREAMBLE}\n\n{message}")).await
    }

    async fn generate(&self, prompt: &str) -> Result<Value, ScanError> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let res = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            debug!(%status, "upstream rejected generation request");
            return Err(ScanError::Rejected {
                status: status.as_u16(),
            });
        }

        res.json::<Value>().await.map_err(|e| {
            ScanError::Lost(format!("unparseable upstream payload: {}", e.without_url()))
        })
    }
}

fn scan_prompt(coord: Coordinate) -> String {
    format!(
        "You are a survival system AI.\n\
         User location: {}, {}.\n\
         Generate a ONE sentence scan report.\n\
         - Threat: (zombies, radiation, raiders) OR Loot: (supplies, weapon).\n\
         - Gritty, military style.\n\
         - NO city names.",
        coord.lat, coord.lng
    )
}

#[derive(Deserialize)]
struct GenerateRes {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

fn first_candidate_text(payload: &Value) -> Option<String> {
    let res = GenerateRes::deserialize(payload).ok()?;
    res.candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|t| !t.trim().is_empty())
}
