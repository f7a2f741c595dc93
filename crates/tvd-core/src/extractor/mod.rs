//! Extractor adapter.
//!
//! The bot never parses media sites itself: every probe, download, and
//! subtitle fetch is delegated to an external extraction tool behind the
//! `Extractor` trait. `YtDlp` is the production implementation; tests plug in
//! in-process fakes.

mod info;
mod ytdlp;

pub use info::{MediaInfo, PlaylistEntry, RawFormat};
pub use ytdlp::{collect_subtitles, download_args, YtDlp};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::ExtractorError;
use crate::progress::ProgressStats;

/// One download to perform.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Format expression passed to `-f`.
    pub format: String,
    /// Extract audio and transcode to MP3.
    pub audio_only: bool,
    pub output_dir: PathBuf,
    /// Refuse results larger than this many bytes.
    pub max_filesize: Option<u64>,
}

/// Result of a finished download.
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    pub path: PathBuf,
    pub size: u64,
}

/// A subtitle file written by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFile {
    pub lang: String,
    pub path: PathBuf,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolve metadata (formats, playlist entries, subtitle languages) without downloading.
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError>;

    /// Download (and optionally transcode) one item. Progress snapshots are sent
    /// best-effort; setting `abort` stops the transfer.
    async fn download(
        &self,
        req: &DownloadRequest,
        progress: Option<mpsc::Sender<ProgressStats>>,
        abort: Arc<AtomicBool>,
    ) -> Result<DownloadOutput, ExtractorError>;

    /// Fetch subtitles (uploaded and automatic) for the given languages into `out_dir`.
    async fn subtitles(
        &self,
        url: &str,
        langs: &[String],
        out_dir: &Path,
    ) -> Result<Vec<SubtitleFile>, ExtractorError>;
}
