use anyhow::{Result, Context};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use url::Url;

// @module: File and cache path utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Read a file to a string, replacing invalid UTF-8 sequences
    pub fn read_to_string_lossy<P: AsRef<Path>>(path: P) -> Result<String> {
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write a string to a file atomically.
    ///
    /// Content goes to a temporary file in the destination directory which is then
    /// renamed over the target, so readers see either the old or the new file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move temporary file into place: {:?}", path))?;

        debug!("Wrote {} bytes to {:?}", content.len(), path);
        Ok(())
    }

    /// Remove a file, logging instead of failing when it cannot be removed
    pub fn remove_quietly<P: AsRef<Path>>(path: P) {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {:?}: {}", path, e),
        }
    }
}

/// Whether a title is a standalone movie or an episode of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

/// Season and episode as they shape the cache layout.
///
/// A series entry needs a positive season and an episode number; anything else
/// is stored like a movie, so `None` is returned and the numbers are ignored.
pub fn episode_slot(kind: MediaKind, season: Option<u32>, episode: Option<u32>) -> Option<(u32, u32)> {
    match (kind, season, episode) {
        (MediaKind::Series, Some(season), Some(episode)) if season > 0 => Some((season, episode)),
        _ => None,
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "series" => Ok(Self::Series),
            _ => Err(anyhow::anyhow!("Invalid media kind: {}", s)),
        }
    }
}

/// Maps a translation request onto its cache file.
///
/// The mapping is part of the on-disk format: every cached subtitle was written
/// at the path this produces, so changing it orphans the whole cache.
#[derive(Debug, Clone)]
pub struct SubtitlePathResolver {
    root: PathBuf,
}

impl SubtitlePathResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache path for a translated subtitle; see [`episode_slot`] for when
    /// the season layout applies.
    pub fn resolve(
        &self,
        provider: &str,
        target_language: &str,
        title_id: &str,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> PathBuf {
        self.root.join(Self::relative_path(provider, target_language, title_id, kind, season, episode))
    }

    /// The resolved path relative to the cache root
    pub fn relative_path(
        provider: &str,
        target_language: &str,
        title_id: &str,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> PathBuf {
        let provider = sanitize_component(provider);
        let language = sanitize_component(target_language);
        let title = sanitize_component(title_id);

        let mut path = PathBuf::from(&provider);
        path.push(&language);
        path.push(&title);

        match episode_slot(kind, season, episode) {
            Some((season, episode)) => {
                path.push(format!("season{}", season));
                path.push(format!("{}-translated-{}-1.srt", title, episode));
            }
            None => {
                path.push(format!("{}-translated-1.srt", title));
            }
        }

        path
    }

    /// Public URL for a cache path, percent-encoding every segment
    pub fn public_url(&self, base_url: &str, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let mut url = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL: {}", base_url))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("Base URL cannot have a path: {}", base_url))?;
            segments.pop_if_empty();
            segments.push("subtitles");
            for component in relative.components() {
                segments.push(&component.as_os_str().to_string_lossy());
            }
        }

        Ok(url.to_string())
    }

    /// Directory used for downloaded source subtitles of one request
    pub fn download_dir(&self, target_language: &str, title_id: &str) -> PathBuf {
        self.root
            .join(".downloads")
            .join(sanitize_component(target_language))
            .join(sanitize_component(title_id))
    }
}

// Keeps user-supplied identifiers from escaping the cache root. Reserved
// characters and '%' are percent-encoded, so distinct identifiers never share
// a path segment.
fn sanitize_component(value: &str) -> String {
    if value.is_empty() {
        // every literal '%' is encoded, so a lone one cannot come from input
        return "%".to_string();
    }
    if value.chars().all(|c| c == '.') {
        return value.replace('.', "%2E");
    }

    let mut cleaned = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => push_encoded(&mut cleaned, c),
            c if c.is_control() => push_encoded(&mut cleaned, c),
            c => cleaned.push(c),
        }
    }
    cleaned
}

fn push_encoded(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{:02X}", byte));
    }
}
