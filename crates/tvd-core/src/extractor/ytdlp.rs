//! `yt-dlp` subprocess implementation of [`Extractor`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{DownloadOutput, DownloadRequest, Extractor, MediaInfo, SubtitleFile};
use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::progress::ProgressStats;

/// How often a running download checks its abort token.
const ABORT_POLL: Duration = Duration::from_millis(250);

/// Output template: title capped at 80 chars plus the id keeps names unique and short.
const OUTPUT_TEMPLATE: &str = "%(title).80s [%(id)s].%(ext)s";

#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
    probe_timeout: Duration,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            probe_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> ExtractorError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractorError::NotFound(self.bin.clone())
        } else {
            ExtractorError::Spawn(e)
        }
    }

    /// Run to completion with a deadline, returning stdout on success.
    async fn run_captured(&self, args: Vec<String>, timeout: Duration) -> Result<String, ExtractorError> {
        tracing::debug!(bin = %self.bin, ?args, "running extractor");
        let child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractorError::Timeout(timeout.as_secs()))?
            .map_err(ExtractorError::Io)?;
        if !output.status.success() {
            return Err(ExtractorError::from_stderr(&String::from_utf8_lossy(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Arguments for a single download. Kept pure so the command line is testable.
pub fn download_args(req: &DownloadRequest) -> Vec<String> {
    let mut args: Vec<String> = [
        "--newline",
        "--progress",
        "--no-warnings",
        "--no-playlist",
        "--no-simulate",
        "--print",
        "after_move:filepath",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push("-o".into());
    args.push(req.output_dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned());
    args.push("-f".into());
    args.push(req.format.clone());
    if let Some(max) = req.max_filesize {
        args.push("--max-filesize".into());
        args.push(max.to_string());
    }
    if req.audio_only {
        args.extend(
            ["-x", "--audio-format", "mp3", "--audio-quality", "320K"]
                .iter()
                .map(|s| s.to_string()),
        );
    } else {
        args.push("--merge-output-format".into());
        args.push("mp4".into());
    }
    args.push(req.url.clone());
    args
}

fn subtitle_args(url: &str, langs: &[String], out_dir: &Path) -> Vec<String> {
    let sub_langs = if langs.iter().any(|l| l == "all") || langs.is_empty() {
        "all".to_string()
    } else {
        langs.join(",")
    };
    vec![
        "--skip-download".into(),
        "--write-subs".into(),
        "--write-auto-subs".into(),
        "--sub-langs".into(),
        sub_langs,
        "--convert-subs".into(),
        "srt".into(),
        "--no-warnings".into(),
        "--no-playlist".into(),
        "-o".into(),
        out_dir.join("%(title).80s.%(ext)s").to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

/// Lines printed by `--print after_move:filepath` are bare paths; everything
/// else yt-dlp emits is bracket-tagged or a WARNING/ERROR.
fn looks_like_path(line: &str) -> bool {
    let l = line.trim();
    !l.is_empty() && !l.starts_with('[') && !l.starts_with("WARNING:") && !l.starts_with("ERROR:")
}

/// Scan `dir` for `<stem>.<lang>.srt` files written by a subtitle run.
pub fn collect_subtitles(dir: &Path) -> std::io::Result<Vec<SubtitleFile>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".srt") else {
            continue;
        };
        let Some((_, lang)) = stem.rsplit_once('.') else {
            continue;
        };
        if lang.is_empty() {
            continue;
        }
        out.push(SubtitleFile {
            lang: lang.to_string(),
            path: path.clone(),
        });
    }
    out.sort_by(|a, b| a.lang.cmp(&b.lang).then_with(|| a.path.cmp(&b.path)));
    Ok(out)
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError> {
        let args = vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];
        let stdout = self.run_captured(args, self.probe_timeout).await?;
        MediaInfo::from_json(&stdout)
    }

    async fn download(
        &self,
        req: &DownloadRequest,
        progress: Option<mpsc::Sender<ProgressStats>>,
        abort: Arc<AtomicBool>,
    ) -> Result<DownloadOutput, ExtractorError> {
        tokio::fs::create_dir_all(&req.output_dir)
            .await
            .map_err(ExtractorError::Io)?;

        let args = download_args(req);
        tracing::debug!(bin = %self.bin, ?args, "starting download");
        let mut child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;
        let stdout = child.stdout.take().ok_or(ExtractorError::NoOutput)?;
        let mut stderr = child.stderr.take().ok_or(ExtractorError::NoOutput)?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut tick = tokio::time::interval(ABORT_POLL);
        let mut output_path: Option<PathBuf> = None;
        let mut too_large: Option<String> = None;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.map_err(ExtractorError::Io)? else {
                        break;
                    };
                    if let Some(stats) = ProgressStats::parse_line(&line) {
                        if let Some(tx) = &progress {
                            // Dropped snapshots are fine; the next one supersedes them.
                            let _ = tx.try_send(stats);
                        }
                    } else if ExtractorErrorKind::classify(&line) == ExtractorErrorKind::TooLarge {
                        too_large = Some(line.trim().to_string());
                    } else if looks_like_path(&line) {
                        output_path = Some(PathBuf::from(line.trim()));
                    }
                }
                _ = tick.tick() => {
                    if abort.load(Ordering::Relaxed) {
                        let _ = child.kill().await;
                        stderr_task.abort();
                        return Err(ExtractorError::Aborted);
                    }
                }
            }
        }

        let status = child.wait().await.map_err(ExtractorError::Io)?;
        let stderr = stderr_task.await.unwrap_or_default();
        if abort.load(Ordering::Relaxed) {
            return Err(ExtractorError::Aborted);
        }
        if let Some(message) = too_large {
            return Err(ExtractorError::Failed {
                kind: ExtractorErrorKind::TooLarge,
                message,
            });
        }
        if !status.success() {
            return Err(ExtractorError::from_stderr(&stderr));
        }

        let path = output_path.ok_or(ExtractorError::NoOutput)?;
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(ExtractorError::Io)?
            .len();
        Ok(DownloadOutput { path, size })
    }

    async fn subtitles(
        &self,
        url: &str,
        langs: &[String],
        out_dir: &Path,
    ) -> Result<Vec<SubtitleFile>, ExtractorError> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(ExtractorError::Io)?;
        let args = subtitle_args(url, langs, out_dir);
        self.run_captured(args, self.probe_timeout * 2).await?;
        collect_subtitles(out_dir).map_err(ExtractorError::Io)
    }
}
