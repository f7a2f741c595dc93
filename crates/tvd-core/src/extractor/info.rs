//! Media metadata as reported by `yt-dlp --dump-single-json --flat-playlist`.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ExtractorError;

/// One downloadable stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
    #[serde(default)]
    pub format_note: Option<String>,
}

impl RawFormat {
    /// Only an explicit `none` rules a stream out; many extractors omit codecs.
    fn has_codec(c: &Option<String>) -> bool {
        c.as_deref() != Some("none")
    }

    /// Carries both audio and video (no merge required).
    pub fn is_progressive(&self) -> bool {
        Self::has_codec(&self.vcodec) && Self::has_codec(&self.acodec)
    }

    /// Exact size if known, else the approximation.
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize
            .or(self.filesize_approx)
            .filter(|s| *s > 0.0)
            .map(|s| s as u64)
    }
}

/// Flat playlist entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl PlaylistEntry {
    /// URL to download this entry from, if the extractor reported one.
    pub fn download_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.webpage_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_type")]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Option<Vec<RawFormat>>,
    #[serde(default)]
    entries: Option<Vec<Option<PlaylistEntry>>>,
    #[serde(default)]
    subtitles: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    automatic_captions: Option<BTreeMap<String, serde_json::Value>>,
}

/// Normalised metadata for one URL.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: String,
    pub uploader: Option<String>,
    /// Seconds.
    pub duration: Option<u64>,
    pub webpage_url: Option<String>,
    pub thumbnail: Option<String>,
    pub formats: Vec<RawFormat>,
    pub entries: Vec<PlaylistEntry>,
    pub is_playlist: bool,
    pub subtitle_langs: Vec<String>,
    pub auto_caption_langs: Vec<String>,
}

impl MediaInfo {
    pub fn from_json(json: &str) -> Result<Self, ExtractorError> {
        let raw: RawInfo = serde_json::from_str(json)?;
        let entries: Vec<PlaylistEntry> = raw.entries.unwrap_or_default().into_iter().flatten().collect();
        let is_playlist = raw.kind.as_deref() == Some("playlist") || !entries.is_empty();
        Ok(MediaInfo {
            id: raw.id,
            title: raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Unknown title".to_string()),
            uploader: raw.uploader.or(raw.channel),
            duration: raw.duration.filter(|d| *d > 0.0).map(|d| d.round() as u64),
            webpage_url: raw.webpage_url,
            thumbnail: raw.thumbnail,
            formats: raw.formats.unwrap_or_default(),
            entries,
            is_playlist,
            subtitle_langs: raw.subtitles.map(|m| m.into_keys().collect()).unwrap_or_default(),
            auto_caption_langs: raw
                .automatic_captions
                .map(|m| m.into_keys().collect())
                .unwrap_or_default(),
        })
    }

    /// A probe that lists more than one entry is handled as a playlist.
    pub fn has_multiple_entries(&self) -> bool {
        self.entries.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_video() {
        let json = r#"{
            "id": "abc", "title": "Clip", "uploader": "Chan", "duration": 125.4,
            "webpage_url": "https://youtu.be/abc",
            "formats": [
                {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a", "height": 360, "filesize": 1048576},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a", "filesize_approx": 2048.0}
            ],
            "subtitles": {"en": []},
            "automatic_captions": {"ar": [], "fr": []}
        }"#;
        let info = MediaInfo::from_json(json).unwrap();
        assert_eq!(info.title, "Clip");
        assert_eq!(info.duration, Some(125));
        assert_eq!(info.formats.len(), 2);
        assert!(info.formats[0].is_progressive());
        assert!(!info.formats[1].is_progressive());
        assert_eq!(info.formats[1].effective_size(), Some(2048));
        assert!(!info.is_playlist);
        assert_eq!(info.subtitle_langs, vec!["en"]);
        assert_eq!(info.auto_caption_langs, vec!["ar", "fr"]);
    }

    #[test]
    fn parses_flat_playlist_and_skips_null_entries() {
        let json = r#"{
            "_type": "playlist", "title": "Mix", "channel": "Someone",
            "entries": [
                {"id": "a", "url": "https://www.youtube.com/watch?v=a", "title": "A"},
                null,
                {"id": "b", "webpage_url": "https://www.youtube.com/watch?v=b"},
                {"id": "c"}
            ]
        }"#;
        let info = MediaInfo::from_json(json).unwrap();
        assert!(info.is_playlist);
        assert!(info.has_multiple_entries());
        assert_eq!(info.entries.len(), 3);
        assert_eq!(info.uploader.as_deref(), Some("Someone"));
        assert_eq!(info.entries[1].download_url(), Some("https://www.youtube.com/watch?v=b"));
        assert_eq!(info.entries[2].download_url(), None);
    }

    #[test]
    fn missing_title_gets_placeholder() {
        let info = MediaInfo::from_json(r#"{"id": "x", "title": "  "}"#).unwrap();
        assert_eq!(info.title, "Unknown title");
        assert!(info.duration.is_none());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            MediaInfo::from_json("not json"),
            Err(ExtractorError::Parse(_))
        ));
    }
}
