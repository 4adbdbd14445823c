//! Default `Downloader` (spec §4.3): fetches a remote URL over HTTP or reads
//! a local path whole into memory. The real media-extraction step (yt-dlp or
//! similar) is out of scope (spec §1); this is the minimal adapter the
//! contract needs to be exercised end-to-end.

use async_trait::async_trait;
use resonance_core::error::{Result, ResonanceError};
use resonance_core::ports::{DownloadedAudio, Downloader};

pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch_remote(&self, url: &str) -> Result<DownloadedAudio> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResonanceError::TransientNetwork(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResonanceError::TransientNetwork(format!("{url}: HTTP {}", response.status())));
        }

        let filename = url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("audio.bin").to_string();
        let bytes = response.bytes().await.map_err(|e| ResonanceError::TransientNetwork(e.to_string()))?.to_vec();

        Ok(DownloadedAudio { filename, bytes, duration_seconds: 0.0, sample_rate: 16_000 })
    }

    async fn read_local(&self, path: &str) -> Result<DownloadedAudio> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ResonanceError::InputInvalid(format!("{path}: {e}")))?;
        let filename = std::path::Path::new(path).file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_else(|| "audio.bin".into());

        Ok(DownloadedAudio { filename, bytes, duration_seconds: 0.0, sample_rate: 16_000 })
    }
}
