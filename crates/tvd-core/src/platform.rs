//! URL intake: validation, platform classification, and content-kind guess.
//!
//! Accepts only `http`/`https` URLs whose host contains one of the configured
//! platform entries. The guess made here is refined by the probe: a probe that
//! returns several entries is always treated as a playlist.

use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use crate::error::BotError;

/// Media platform a URL belongs to. Stored in the database by `label()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    YouTube,
    Twitter,
    Instagram,
    Facebook,
    TikTok,
    Vimeo,
    Dailymotion,
    Twitch,
    Reddit,
    Bilibili,
    NicoVideo,
    Other(String),
}

impl Platform {
    /// Map a lowercase host to a platform.
    pub fn from_host(host: &str) -> Self {
        let host = host.trim_start_matches("www.").trim_start_matches("m.");
        let is = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));
        if is("youtube.com") || is("youtu.be") {
            Platform::YouTube
        } else if is("twitter.com") || is("x.com") {
            Platform::Twitter
        } else if is("instagram.com") {
            Platform::Instagram
        } else if is("facebook.com") || is("fb.watch") {
            Platform::Facebook
        } else if is("tiktok.com") {
            Platform::TikTok
        } else if is("vimeo.com") {
            Platform::Vimeo
        } else if is("dailymotion.com") {
            Platform::Dailymotion
        } else if is("twitch.tv") {
            Platform::Twitch
        } else if is("reddit.com") || is("redd.it") {
            Platform::Reddit
        } else if is("bilibili.com") {
            Platform::Bilibili
        } else if is("nicovideo.jp") {
            Platform::NicoVideo
        } else {
            Platform::Other(host.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
            Platform::Vimeo => "vimeo",
            Platform::Dailymotion => "dailymotion",
            Platform::Twitch => "twitch",
            Platform::Reddit => "reddit",
            Platform::Bilibili => "bilibili",
            Platform::NicoVideo => "nicovideo",
            Platform::Other(host) => host,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the URL most likely points at, before probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Video,
    Short,
    Playlist,
}

/// A validated URL ready to be probed.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub host: String,
    pub platform: Platform,
    pub kind: ContentKind,
}

/// Validate `input` and classify it against the supported host list.
pub fn classify(input: &str, supported: &[String]) -> Result<Target, BotError> {
    let trimmed = input.trim();
    let parsed =
        Url::parse(trimmed).map_err(|_| BotError::UnsupportedPlatform(trimmed.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(BotError::UnsupportedPlatform(trimmed.to_string()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| BotError::UnsupportedPlatform(trimmed.to_string()))?
        .to_ascii_lowercase();

    if !is_supported_host(&host, supported) {
        return Err(BotError::UnsupportedPlatform(trimmed.to_string()));
    }

    let platform = Platform::from_host(&host);
    let kind = guess_kind(&parsed, &platform);
    Ok(Target {
        url: parsed.to_string(),
        host,
        platform,
        kind,
    })
}

/// Substring match of the host against configured entries.
pub fn is_supported_host(host: &str, supported: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    supported
        .iter()
        .map(|p| p.trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .any(|p| host.contains(&p))
}

fn guess_kind(url: &Url, platform: &Platform) -> ContentKind {
    let path = url.path().to_ascii_lowercase();
    match platform {
        Platform::YouTube => {
            if path.starts_with("/shorts/") {
                ContentKind::Short
            } else if path.starts_with("/playlist") || url.query_pairs().any(|(k, _)| k == "list") {
                ContentKind::Playlist
            } else {
                ContentKind::Video
            }
        }
        Platform::TikTok => ContentKind::Short,
        Platform::Instagram if path.starts_with("/reel") => ContentKind::Short,
        _ => ContentKind::Video,
    }
}

/// Short stable key for a URL, used to bind callback buttons to it.
pub fn url_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..6])
}
