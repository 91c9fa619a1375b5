use super::ImageSearch;
use crate::config::ImageSearchConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// Image search over a JSON HTTP API followed by a plain download.
///
/// The endpoint receives `query` and `per_page=1`; the first result URL is
/// read with a configurable JSON pointer so different providers fit.
pub struct HttpImageSearch {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<(String, String)>,
    result_pointer: String,
}

impl HttpImageSearch {
    pub fn from_config(config: &ImageSearchConfig) -> Result<Self> {
        let api_key = match config.api_key_env.as_deref() {
            Some(var) => {
                let key = std::env::var(var)
                    .with_context(|| format!("read image search API key from ${var}"))?;
                Some((config.api_key_header.clone(), key))
            }
            None => None,
        };
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
            .build();
        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            endpoint: config.endpoint.clone(),
            api_key,
            result_pointer: config.result_pointer.clone(),
        })
    }

    fn first_result_url(&self, query: &str) -> Result<Option<String>> {
        let mut request = self
            .agent
            .get(&self.endpoint)
            .query("query", query)
            .query("per_page", "1");
        if let Some((header, key)) = &self.api_key {
            request = request.header(header.as_str(), key.as_str());
        }
        let mut response = request
            .call()
            .with_context(|| format!("image search request for {query:?}"))?;
        let body: Value = response
            .body_mut()
            .read_json()
            .context("parse image search JSON")?;
        Ok(first_url(&body, &self.result_pointer))
    }
}

impl ImageSearch for HttpImageSearch {
    fn download(&self, query: &str, destination: &Path) -> Result<bool> {
        let start = Instant::now();
        let Some(url) = self.first_result_url(query)? else {
            tracing::debug!(query, "image search returned no results");
            return Ok(false);
        };
        let bytes = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("download {url}"))?
            .body_mut()
            .read_to_vec()
            .with_context(|| format!("read image body from {url}"))?;
        if bytes.is_empty() {
            return Ok(false);
        }
        fs::write(destination, &bytes)
            .with_context(|| format!("write {}", destination.display()))?;
        tracing::debug!(
            query,
            elapsed_ms = start.elapsed().as_millis(),
            bytes = bytes.len(),
            "image downloaded"
        );
        Ok(true)
    }
}

fn first_url(body: &Value, pointer: &str) -> Option<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .map(str::to_string)
}
