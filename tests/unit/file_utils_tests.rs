/*!
 * Tests for cache path resolution and file helpers
 */

use std::fs;
use std::path::PathBuf;
use anyhow::Result;

use autosubs::file_utils::{FileManager, MediaKind, SubtitlePathResolver};
use crate::common;

#[test]
fn test_relativePath_withSeries_shouldFollowCacheLayout() {
    let path = SubtitlePathResolver::relative_path(
        "Gemini API",
        "de",
        "tt0944947",
        MediaKind::Series,
        Some(2),
        Some(10),
    );

    assert_eq!(
        path,
        PathBuf::from("Gemini API/de/tt0944947/season2/tt0944947-translated-10-1.srt")
    );
}

#[test]
fn test_resolve_withDifferentProviders_shouldNotCollide() {
    let resolver = SubtitlePathResolver::new("cache");
    let google = resolver.resolve("Google Translate", "fr", "tt1", MediaKind::Movie, None, None);
    let deepseek = resolver.resolve("DeepSeek API", "fr", "tt1", MediaKind::Movie, None, None);

    assert_ne!(google, deepseek);
}

#[test]
fn test_publicUrl_withBasePath_shouldAppendSegments() {
    let resolver = SubtitlePathResolver::new("cache");
    let path = resolver.resolve("Google Translate", "fr", "tt1", MediaKind::Movie, None, None);

    let url = resolver.public_url("https://example.org/addon/", &path).unwrap();
    assert_eq!(
        url,
        "https://example.org/addon/subtitles/Google%20Translate/fr/tt1/tt1-translated-1.srt"
    );
}

#[test]
fn test_publicUrl_withInvalidBase_shouldFail() {
    let resolver = SubtitlePathResolver::new("cache");
    let path = resolver.resolve("Google Translate", "fr", "tt1", MediaKind::Movie, None, None);

    assert!(resolver.public_url("not a url", &path).is_err());
}

#[test]
fn test_downloadDir_shouldStayUnderRoot() {
    let resolver = SubtitlePathResolver::new("cache");
    let dir = resolver.download_dir("pt", "tt1234567");

    assert_eq!(dir, PathBuf::from("cache/.downloads/pt/tt1234567"));
}

#[test]
fn test_mediaKind_fromStr_shouldAcceptKnownKinds() {
    assert_eq!("movie".parse::<MediaKind>().unwrap(), MediaKind::Movie);
    assert_eq!("Series".parse::<MediaKind>().unwrap(), MediaKind::Series);
    assert!("episode".parse::<MediaKind>().is_err());
}

#[test]
fn test_readToStringLossy_withInvalidUtf8_shouldReplaceBytes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("latin1.srt");
    fs::write(&path, b"1\n00:00:01,000 --> 00:00:02,000\nCaf\xe9\n")?;

    let content = FileManager::read_to_string_lossy(&path)?;
    assert!(content.contains("Caf\u{fffd}"));
    Ok(())
}

#[test]
fn test_ensureDir_andFileExists_shouldReflectDisk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("x/y");
    FileManager::ensure_dir(&nested)?;

    let file = common::create_test_file(&nested, "a.srt", "content")?;
    assert!(FileManager::file_exists(&file));

    FileManager::remove_quietly(&file);
    assert!(!FileManager::file_exists(&file));
    Ok(())
}
