/*!
 * Cache file state machine.
 *
 * A cache file is either absent, a placeholder telling the viewer what is
 * going on, or a complete translated subtitle. Placeholders open with a
 * zero-length sentinel cue carrying a machine-readable status tag, so the
 * state is never guessed from the human-readable message.
 */

use anyhow::Result;
use log::{debug, warn};
use std::path::Path;

use crate::errors::TranslationError;
use crate::file_utils::FileManager;
use crate::subtitle_processor::{SubtitleBlock, SubtitleDocument};

use super::registry::{JobKey, JobRegistry};

/// Timing line of the sentinel cue; zero length so players never show it
pub const SENTINEL_TIME_RANGE: &str = "00:00:00,000 --> 00:00:00,000";

/// Timing line of the message cue
pub const MESSAGE_TIME_RANGE: &str = "00:00:01,000 --> 00:10:50,000";

const STATUS_PREFIX: &str = "#autosubs:status=";

/// What a placeholder file stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderMarker {
    /// The source offered nothing for this title
    NoSubtitlesFound,
    /// A job is (or was) producing the translation
    Translating,
    /// The last job failed
    TranslationFailed { reason: String },
}

impl PlaceholderMarker {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NoSubtitlesFound => "no-subtitles",
            Self::Translating => "translating",
            Self::TranslationFailed { .. } => "failed",
        }
    }

    /// Text shown to the viewer
    pub fn message(&self) -> String {
        match self {
            Self::NoSubtitlesFound => "No subtitles found on OpenSubtitles".to_string(),
            Self::Translating => "Translating subtitles. Please wait 1 minute and try again.".to_string(),
            Self::TranslationFailed { reason } => reason.clone(),
        }
    }

    /// The placeholder as a two-cue subtitle document
    pub fn to_document(&self) -> SubtitleDocument {
        SubtitleDocument::from_blocks(vec![
            SubtitleBlock::new("1", SENTINEL_TIME_RANGE, format!("{}{}", STATUS_PREFIX, self.tag())),
            SubtitleBlock::new("2", MESSAGE_TIME_RANGE, self.message()),
        ])
    }

    /// Recognise a placeholder document; `None` means real subtitle content
    pub fn from_document(document: &SubtitleDocument) -> Option<Self> {
        let mut blocks = document.blocks();
        let sentinel = blocks.next()?;
        if sentinel.time_range.trim() != SENTINEL_TIME_RANGE {
            return None;
        }
        let tag = sentinel.text.trim().strip_prefix(STATUS_PREFIX)?;

        match tag {
            "no-subtitles" => Some(Self::NoSubtitlesFound),
            "translating" => Some(Self::Translating),
            "failed" => Some(Self::TranslationFailed {
                reason: blocks.next().map(|b| b.text.clone()).unwrap_or_default(),
            }),
            other => {
                warn!("Unknown placeholder tag '{}'", other);
                None
            }
        }
    }
}

/// State of a cache file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Absent,
    Placeholder(PlaceholderMarker),
    Complete,
}

/// What to do with a request, given the cache file and the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// The file holds a finished subtitle
    Serve,
    /// A job for this key is running
    ReportTranslating,
    /// Nothing usable and nobody working on it
    Start,
}

/// Inspect the cache file at `path`.
///
/// A file that exists but holds no recognisable subtitle is reported as
/// absent so it gets regenerated.
pub fn inspect(path: &Path) -> Result<CacheState, TranslationError> {
    if !FileManager::file_exists(path) {
        return Ok(CacheState::Absent);
    }

    let raw = FileManager::read_to_string_lossy(path)
        .map_err(|e| TranslationError::Filesystem(format!("{:#}", e)))?;

    match SubtitleDocument::parse(&raw) {
        Ok(document) => Ok(match PlaceholderMarker::from_document(&document) {
            Some(marker) => CacheState::Placeholder(marker),
            None => CacheState::Complete,
        }),
        Err(e) => {
            warn!("Cache file {:?} is unreadable ({}), treating it as absent", path, e);
            Ok(CacheState::Absent)
        }
    }
}

/// Decide how to answer a request.
///
/// Complete files are served without touching the registry. A placeholder
/// nobody is working on is an orphan and is restarted like an absent file.
pub fn decide(state: &CacheState, registry: &dyn JobRegistry, key: &JobKey) -> Result<CacheDecision> {
    match state {
        CacheState::Complete => Ok(CacheDecision::Serve),
        CacheState::Absent => {
            if registry.is_active(key)? {
                Ok(CacheDecision::ReportTranslating)
            } else {
                Ok(CacheDecision::Start)
            }
        }
        CacheState::Placeholder(marker) => {
            if registry.is_active(key)? {
                Ok(CacheDecision::ReportTranslating)
            } else {
                debug!("Orphaned '{}' placeholder for {}, restarting", marker.tag(), key);
                Ok(CacheDecision::Start)
            }
        }
    }
}

/// Atomically replace the cache file with a placeholder
pub fn write_placeholder(path: &Path, marker: &PlaceholderMarker) -> Result<(), TranslationError> {
    debug!("Writing '{}' placeholder to {:?}", marker.tag(), path);
    FileManager::write_atomic(path, &marker.to_document().render())
        .map_err(|e| TranslationError::Filesystem(format!("{:#}", e)))
}

/// Atomically replace the cache file with a finished document
pub fn write_document(path: &Path, document: &SubtitleDocument) -> Result<(), TranslationError> {
    FileManager::write_atomic(path, &document.render())
        .map_err(|e| TranslationError::Filesystem(format!("{:#}", e)))
}
