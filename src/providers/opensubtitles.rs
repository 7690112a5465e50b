use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::file_utils::MediaKind;
use crate::language_utils;
use crate::providers::{build_http_client, error_from_response, SubtitleCandidate, SubtitleSource};

/// Client for the OpenSubtitles v3 addon service
#[derive(Debug)]
pub struct OpenSubtitlesClient {
    /// HTTP client for API requests
    client: Client,
    /// Service base URL
    endpoint: String,
}

/// Search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    subtitles: Vec<SubtitleCandidate>,
}

/// Pick the candidate to translate: the first one already in the target
/// language, otherwise the first one offered.
pub fn select_candidate(candidates: Vec<SubtitleCandidate>, target_language: &str) -> Option<SubtitleCandidate> {
    let preferred = candidates
        .iter()
        .position(|c| language_utils::language_codes_match(&c.lang, target_language));

    match preferred {
        Some(idx) => candidates.into_iter().nth(idx),
        None => candidates.into_iter().next(),
    }
}

impl OpenSubtitlesClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
            endpoint: endpoint.into(),
        }
    }

    /// Search URL for a title; series episodes use `id:season:episode`
    pub fn search_url(&self, kind: MediaKind, title_id: &str, season: Option<u32>, episode: Option<u32>) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match (kind, season, episode) {
            (MediaKind::Series, Some(season), Some(episode)) => {
                format!("{}/subtitles/{}/{}:{}:{}.json", base, kind, title_id, season, episode)
            }
            _ => format!("{}/subtitles/{}/{}.json", base, kind, title_id),
        }
    }
}

#[async_trait]
impl SubtitleSource for OpenSubtitlesClient {
    async fn search(
        &self,
        kind: MediaKind,
        title_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
        target_language: &str,
    ) -> Result<Option<SubtitleCandidate>, ProviderError> {
        let url = self.search_url(kind, title_id, season, episode);
        debug!("Searching subtitles at {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SearchResponse = response.json().await?;
        info!("OpenSubtitles offered {} subtitle(s) for {}", body.subtitles.len(), title_id);
        Ok(select_candidate(body.subtitles, target_language))
    }

    async fn download(&self, candidate: &SubtitleCandidate) -> Result<Vec<u8>, ProviderError> {
        let response = self.client.get(&candidate.url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), candidate.url);
        Ok(bytes.to_vec())
    }
}
