/*!
 * Mock provider implementations for testing.
 *
 * This module provides mocks that simulate different behaviors:
 * - `MockBackend::working()` - Always succeeds, prefixing texts with the target language
 * - `MockBackend::intermittent(n)` - Fails every nth request with a server error
 * - `MockBackend::failing(err)` - Always fails with the given error
 * - `MockBackend::wrong_count()` - Drops the last translation of every batch
 * - `MockSubtitleSource` - Serves a fixed candidate and payload
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::file_utils::MediaKind;
use crate::providers::{SubtitleCandidate, SubtitleSource, TranslationBackend};

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with this error
    Failing(ProviderError),
    /// Returns one translation fewer than requested
    WrongCount,
    /// Succeeds after a delay (for cancellation and concurrency tests)
    Slow { delay_ms: u64 },
}

/// Mock backend for testing translation behavior
#[derive(Debug)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Custom translation function (optional)
    custom_response: Option<fn(&str, &str) -> String>,
    /// Calls currently inside translate_batch, shared between clones
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` reached
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock backend
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock backend that always returns `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Create a mock that merges lines
    pub fn wrong_count() -> Self {
        Self::new(MockBehavior::WrongCount)
    }

    /// Create a mock that answers after `delay_ms`
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom translation function, called with (text, target_language)
    pub fn with_custom_response(mut self, generator: fn(&str, &str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of translate_batch calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Most translate_batch calls that ever overlapped
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn translate_all(&self, texts: &[String], target_language: &str) -> Vec<String> {
        texts
            .iter()
            .map(|text| match self.custom_response {
                Some(generator) => generator(text, target_language),
                None => format!("[{}] {}", target_language, text),
            })
            .collect()
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            request_count: Arc::clone(&self.request_count),
            custom_response: self.custom_response,
            in_flight: Arc::clone(&self.in_flight),
            peak_in_flight: Arc::clone(&self.peak_in_flight),
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let result = self.respond(count, texts, target_language).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MockBackend {
    async fn respond(
        &self,
        count: usize,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        match &self.behavior {
            MockBehavior::Working => Ok(self.translate_all(texts, target_language)),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 500,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(self.translate_all(texts, target_language))
                }
            }

            MockBehavior::Failing(error) => Err(error.clone()),

            MockBehavior::WrongCount => {
                let mut translated = self.translate_all(texts, target_language);
                translated.pop();
                Ok(translated)
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(self.translate_all(texts, target_language))
            }
        }
    }
}

/// Mock subtitle source serving a single fixed subtitle
#[derive(Debug, Clone)]
pub struct MockSubtitleSource {
    /// Candidate returned by every search, or none
    candidate: Option<SubtitleCandidate>,
    /// Payload returned by every download
    payload: Vec<u8>,
    /// Error returned by every download instead of the payload
    download_error: Option<ProviderError>,
    /// Search counter, shared between clones
    search_count: Arc<AtomicUsize>,
}

impl MockSubtitleSource {
    /// A source offering `content` in language `lang`
    pub fn with_subtitle(lang: &str, content: &str) -> Self {
        Self {
            candidate: Some(SubtitleCandidate {
                url: format!("mock://subtitles/{}.srt", lang),
                lang: lang.to_string(),
            }),
            payload: content.as_bytes().to_vec(),
            download_error: None,
            search_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that never finds anything
    pub fn empty() -> Self {
        Self {
            candidate: None,
            payload: Vec::new(),
            download_error: None,
            search_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every download fail
    pub fn with_download_error(mut self, error: ProviderError) -> Self {
        self.download_error = Some(error);
        self
    }

    /// Number of searches so far
    pub fn search_count(&self) -> usize {
        self.search_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtitleSource for MockSubtitleSource {
    async fn search(
        &self,
        _kind: MediaKind,
        _title_id: &str,
        _season: Option<u32>,
        _episode: Option<u32>,
        _target_language: &str,
    ) -> Result<Option<SubtitleCandidate>, ProviderError> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidate.clone())
    }

    async fn download(&self, _candidate: &SubtitleCandidate) -> Result<Vec<u8>, ProviderError> {
        match &self.download_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.payload.clone()),
        }
    }
}
