//! Generic HTTP generator adapter.
//!
//! POSTs the JSON-encoded [`GenerationRequest`] to a configured endpoint and
//! expects a JSON [`GenerationResponse`] back. Non-2xx replies are provider
//! failures; transport and decoding problems are [`sf_core::Error::Generator`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sf_core::config::ProviderConfig;
use sf_core::{MediaKind, StepType};

use crate::generator::{GenerationRequest, GenerationResponse, Generator};

/// Longest error body kept in a failure message.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    name: String,
    endpoint: String,
    api_key_env: Option<String>,
    download_outputs: bool,
    client: Client,
}

impl HttpGenerator {
    /// Build a generator for `step_type` from its provider section.
    pub fn from_config(step_type: &StepType, config: &ProviderConfig) -> sf_core::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| sf_core::Error::Config(format!("HTTP client for {step_type}: {e}")))?;
        Ok(Self {
            name: format!("http:{step_type}"),
            endpoint: config.endpoint.clone(),
            api_key_env: config.api_key_env.clone(),
            download_outputs: config.download_outputs,
            client,
        })
    }

    fn error(&self, message: impl Into<String>) -> sf_core::Error {
        sf_core::Error::generator(&self.name, message)
    }

    /// Fetch `url` into `<dir>/<stem>.<ext>`.
    async fn download(
        &self,
        url: &str,
        dir: &Path,
        stem: &str,
        kind: Option<MediaKind>,
    ) -> sf_core::Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.error(format!("download {url}: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.error(format!("download {url}: {e}")))?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{stem}.{}", extension_for(url, kind)));
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(url, path = %path.display(), bytes = bytes.len(), "Downloaded output");
        Ok(path)
    }
}

/// File extension from the URL path, else a default for the media kind.
fn extension_for(url: &str, kind: Option<MediaKind>) -> String {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_extension(ext) => ext.to_ascii_lowercase(),
        _ => match kind {
            Some(MediaKind::Video) => "mp4".into(),
            Some(MediaKind::Text) => "txt".into(),
            _ => "png".into(),
        },
    }
}

fn is_extension(ext: &str) -> bool {
    (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> sf_core::Result<GenerationResponse> {
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(var) = &self.api_key_env {
            match std::env::var(var) {
                Ok(key) if !key.is_empty() => builder = builder.bearer_auth(key),
                _ => {
                    return Ok(GenerationResponse::failed(format!(
                        "environment variable {var} is not set"
                    )))
                }
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, %status, "Provider rejected request");
            return Ok(GenerationResponse::failed(format!(
                "HTTP {status}: {}",
                truncate(body.trim())
            )));
        }

        let mut reply: GenerationResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("invalid response body: {e}")))?;

        if self.download_outputs && reply.success && reply.output_path.is_none() {
            if let Some(url) = reply.output_url.clone() {
                match self
                    .download(
                        &url,
                        &request.output_dir,
                        &request.output_name,
                        request.step_type.output_kind(),
                    )
                    .await
                {
                    Ok(path) => reply.output_path = Some(path),
                    Err(e) => tracing::warn!("Keeping remote output only: {e}"),
                }
            }
        }
        Ok(reply)
    }
}
