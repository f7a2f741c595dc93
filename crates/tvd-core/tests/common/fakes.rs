//! In-memory stand-ins for the extractor and the chat gateway.
//!
//! `FakeExtractor` writes files of a fixed size into the requested directory
//! instead of running yt-dlp; `RecordingMessenger` keeps every outgoing call.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use tvd_core::error::{ExtractorError, ExtractorErrorKind};
use tvd_core::extractor::{
    DownloadOutput, DownloadRequest, Extractor, MediaInfo, PlaylistEntry, RawFormat, SubtitleFile,
};
use tvd_core::gateway::{ChatId, Keyboard, MessageRef, Messenger};
use tvd_core::progress::ProgressStats;

pub fn single_video(title: &str) -> MediaInfo {
    let format = |id: &str, height: u32, size: f64| RawFormat {
        format_id: id.to_string(),
        ext: Some("mp4".into()),
        vcodec: Some("avc1".into()),
        acodec: Some("mp4a".into()),
        height: Some(height),
        filesize: Some(size),
        ..Default::default()
    };
    MediaInfo {
        id: Some("abc".into()),
        title: title.to_string(),
        uploader: Some("Channel".into()),
        duration: Some(125),
        formats: vec![format("18", 360, 1_000_000.0), format("22", 720, 4_000_000.0)],
        subtitle_langs: vec!["en".into()],
        ..Default::default()
    }
}

pub fn playlist(title: &str, n: usize) -> MediaInfo {
    MediaInfo {
        title: title.to_string(),
        uploader: Some("Channel".into()),
        is_playlist: true,
        entries: (0..n)
            .map(|i| PlaylistEntry {
                id: Some(format!("v{i}")),
                url: Some(format!("https://www.youtube.com/watch?v=v{i}")),
                title: Some(format!("Entry {i}")),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub struct FakeExtractor {
    pub info: Mutex<Option<MediaInfo>>,
    /// Size of every downloaded file.
    pub file_size: usize,
    /// Languages for which `subtitles` produces a file.
    pub subtitle_langs: Vec<String>,
    /// URLs whose download fails as unavailable.
    pub failing_urls: Vec<String>,
    pub downloads: Mutex<Vec<DownloadRequest>>,
}

impl FakeExtractor {
    pub fn new(info: MediaInfo) -> Self {
        Self {
            info: Mutex::new(Some(info)),
            file_size: 2048,
            subtitle_langs: vec!["en".into()],
            failing_urls: Vec::new(),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Probes fail as unavailable.
    pub fn broken() -> Self {
        let f = Self::new(MediaInfo::default());
        *f.info.lock().unwrap() = None;
        f
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn probe(&self, _url: &str) -> Result<MediaInfo, ExtractorError> {
        self.info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ExtractorError::Failed {
                kind: ExtractorErrorKind::Unavailable,
                message: "Private video".into(),
            })
    }

    async fn download(
        &self,
        req: &DownloadRequest,
        progress: Option<mpsc::Sender<ProgressStats>>,
        abort: Arc<AtomicBool>,
    ) -> Result<DownloadOutput, ExtractorError> {
        if abort.load(Ordering::Relaxed) {
            return Err(ExtractorError::Aborted);
        }
        let n = {
            let mut downloads = self.downloads.lock().unwrap();
            downloads.push(req.clone());
            downloads.len()
        };
        if self.failing_urls.contains(&req.url) {
            return Err(ExtractorError::Failed {
                kind: ExtractorErrorKind::Unavailable,
                message: "Video unavailable".into(),
            });
        }
        if let Some(max) = req.max_filesize {
            if self.file_size as u64 > max {
                return Err(ExtractorError::Failed {
                    kind: ExtractorErrorKind::TooLarge,
                    message: "File is larger than max-filesize".into(),
                });
            }
        }
        if let Some(tx) = progress {
            let _ = tx
                .send(ProgressStats {
                    percent: 100.0,
                    total_bytes: Some(self.file_size as u64),
                    ..Default::default()
                })
                .await;
        }
        tokio::fs::create_dir_all(&req.output_dir).await.map_err(ExtractorError::Io)?;
        let ext = if req.audio_only { "mp3" } else { "mp4" };
        let path = req.output_dir.join(format!("file-{n}.{ext}"));
        tokio::fs::write(&path, vec![7u8; self.file_size])
            .await
            .map_err(ExtractorError::Io)?;
        Ok(DownloadOutput {
            path,
            size: self.file_size as u64,
        })
    }

    async fn subtitles(
        &self,
        _url: &str,
        langs: &[String],
        out_dir: &Path,
    ) -> Result<Vec<SubtitleFile>, ExtractorError> {
        tokio::fs::create_dir_all(out_dir).await.map_err(ExtractorError::Io)?;
        let mut out = Vec::new();
        for lang in langs.iter().filter(|l| self.subtitle_langs.contains(l)) {
            let path = out_dir.join(format!("video.{lang}.srt"));
            tokio::fs::write(&path, "1\n00:00:00,000 --> 00:00:01,000\nhi\n")
                .await
                .map_err(ExtractorError::Io)?;
            out.push(SubtitleFile {
                lang: lang.clone(),
                path,
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        msg: MessageRef,
        text: String,
        callbacks: Vec<String>,
    },
    Edit {
        msg: MessageRef,
        text: String,
        callbacks: Vec<String>,
    },
    Delete(MessageRef),
    Document {
        chat: ChatId,
        name: String,
        caption: Option<String>,
    },
    Answer(String),
}

#[derive(Default)]
pub struct RecordingMessenger {
    next_id: AtomicI32,
    pub log: Mutex<Vec<Sent>>,
    pub fail_uploads: AtomicBool,
}

fn callbacks(kb: Option<&Keyboard>) -> Vec<String> {
    kb.map(|k| k.callbacks().into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

impl RecordingMessenger {
    pub fn events(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    /// Text of the latest send or edit.
    pub fn last_text(&self) -> String {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Message and buttons of the latest send or edit.
    pub fn last_menu(&self) -> (MessageRef, Vec<String>) {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Sent::Text { msg, callbacks, .. } | Sent::Edit { msg, callbacks, .. } => {
                    Some((msg, callbacks))
                }
                _ => None,
            })
            .expect("no message sent")
    }

    pub fn documents(&self) -> Vec<(String, Option<String>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Sent::Document { name, caption, .. } => Some((name, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat: ChatId, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageRef> {
        let msg = MessageRef {
            chat_id: chat,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.log.lock().unwrap().push(Sent::Text {
            msg,
            text: text.to_string(),
            callbacks: callbacks(keyboard),
        });
        Ok(msg)
    }

    async fn edit_text(&self, msg: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Edit {
            msg,
            text: text.to_string(),
            callbacks: callbacks(keyboard),
        });
        Ok(())
    }

    async fn delete(&self, msg: MessageRef) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Delete(msg));
        Ok(())
    }

    async fn send_document(&self, chat: ChatId, path: &Path, caption: Option<&str>) -> Result<()> {
        if self.fail_uploads.load(Ordering::Relaxed) {
            anyhow::bail!("Request Entity Too Large");
        }
        anyhow::ensure!(path.exists(), "missing upload {}", path.display());
        self.log.lock().unwrap().push(Sent::Document {
            chat,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            caption: caption.map(str::to_string),
        });
        Ok(())
    }

    async fn answer_callback(&self, id: &str, _text: Option<&str>) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Answer(id.to_string()));
        Ok(())
    }
}
