//! Job execution: download, checksum, deliver, and log one queued job.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use super::{App, DEFAULT_SUBTITLE_LANGS};
use crate::checksum::sha256_file;
use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::extractor::{DownloadOutput, DownloadRequest};
use crate::formats::format_spec;
use crate::gateway::MessageRef;
use crate::platform_policy::JobOutcome;
use crate::progress::{PlaylistProgress, ProgressStats, ProgressThrottle};
use crate::queue::JobSpec;
use crate::render;
use crate::retry::run_with_retry;
use crate::store::{DownloadRecord, DownloadStatus, JobDetails, JobState};
use crate::worker::{JobReport, JobRunner};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Per-job context shared by the flows below.
struct JobCtx {
    job: JobDetails,
    title: String,
    status: MessageRef,
    abort: Arc<AtomicBool>,
    work_dir: PathBuf,
}

impl JobCtx {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    fn record(&self, status: DownloadStatus, error: Option<String>) -> DownloadRecord {
        let mut rec = match status {
            DownloadStatus::Completed => {
                DownloadRecord::completed(self.job.user_id, &self.job.url, &self.job.platform)
            }
            DownloadStatus::Failed => DownloadRecord::failed(
                self.job.user_id,
                &self.job.url,
                &self.job.platform,
                error.unwrap_or_default(),
            ),
        };
        rec.title = Some(self.title.clone());
        rec
    }
}

/// Outcome of one playlist entry.
struct EntryResult {
    index: usize,
    url: String,
    title: String,
    result: Result<DownloadOutput, ExtractorError>,
}

#[async_trait]
impl JobRunner for App {
    async fn run_job(&self, job: JobDetails, abort: Arc<AtomicBool>) -> Result<JobReport> {
        let spec = JobSpec::from_json(&job.spec_json)?;
        let status = self.status_message(&job).await?;
        let ctx = JobCtx {
            title: job.title.clone().unwrap_or_else(|| "video".to_string()),
            work_dir: self.download_dir.join(format!("job-{}", job.id)),
            job,
            status,
            abort,
        };
        if ctx.aborted() {
            self.edit(ctx.status, &render::job_cancelled(), None).await;
            return Ok(JobReport::cancelled());
        }
        tokio::fs::create_dir_all(&ctx.work_dir).await?;
        tracing::info!(job_id = ctx.job.id, user_id = ctx.job.user_id, kind = spec.label(), "job started");

        let report = match &spec {
            JobSpec::Video { format_id } => self.run_media(&ctx, format_id.as_deref(), false).await?,
            JobSpec::Audio => self.run_media(&ctx, None, true).await?,
            JobSpec::Subtitles { langs } => self.run_subtitles(&ctx, langs).await?,
            JobSpec::All { format_id, langs } => {
                let media = self.run_media(&ctx, format_id.as_deref(), false).await?;
                if media.state != JobState::Completed {
                    media
                } else {
                    let subs = self.run_subtitles(&ctx, langs).await?;
                    JobReport::completed(media.bytes + subs.bytes)
                }
            }
            JobSpec::Playlist { max_videos } => self.run_playlist(&ctx, *max_videos).await?,
        };

        // Only succeeds when nothing was kept on disk.
        let _ = tokio::fs::remove_dir(&ctx.work_dir).await;
        tracing::info!(job_id = ctx.job.id, state = report.state.as_str(), bytes = report.bytes, "job finished");
        Ok(report)
    }
}

impl App {
    /// The job's status message, posting a fresh one if it has none.
    async fn status_message(&self, job: &JobDetails) -> Result<MessageRef> {
        if let Some(message_id) = job.message_id {
            return Ok(MessageRef {
                chat_id: job.chat_id,
                message_id,
            });
        }
        let spec_label = JobSpec::from_json(&job.spec_json)
            .map(|s| s.label())
            .unwrap_or("media");
        let msg = self
            .send(job.chat_id, &render::queued(spec_label), Some(&render::cancel_keyboard()))
            .await?;
        self.store.set_job_message(job.id, msg.message_id).await?;
        Ok(msg)
    }

    async fn run_media(&self, ctx: &JobCtx, format_id: Option<&str>, audio: bool) -> Result<JobReport> {
        let settings = self.store.user_settings(ctx.job.user_id).await?;
        let req = DownloadRequest {
            url: ctx.job.url.clone(),
            format: format_spec(
                format_id,
                audio,
                settings.preferred_height,
                &self.cfg.default_format,
            ),
            audio_only: audio,
            output_dir: ctx.work_dir.clone(),
            max_filesize: None,
        };
        match self.download_with_progress(ctx, &req).await {
            Ok(out) => self.deliver(ctx, out).await,
            Err(e) => self.download_error(ctx, e).await,
        }
    }

    /// Run the download, mirroring throttled progress into the status message.
    async fn download_with_progress(
        &self,
        ctx: &JobCtx,
        req: &DownloadRequest,
    ) -> Result<DownloadOutput, ExtractorError> {
        let (tx, mut rx) = mpsc::channel::<ProgressStats>(16);
        let mut throttle = ProgressThrottle::new(self.cfg.progress_interval());
        let keyboard = render::cancel_keyboard();
        let extractor = &self.extractor;
        let download = run_with_retry(&self.retry, || {
            extractor.download(req, Some(tx.clone()), Arc::clone(&ctx.abort))
        });
        tokio::pin!(download);
        loop {
            tokio::select! {
                res = &mut download => return res,
                Some(stats) = rx.recv() => {
                    if throttle.should_emit(&stats, Instant::now()) {
                        self.edit(ctx.status, &render::progress(&ctx.title, &stats), Some(&keyboard)).await;
                    }
                }
            }
        }
    }

    /// Upload a finished file, or report where it was kept when it is over the limit.
    async fn deliver(&self, ctx: &JobCtx, out: DownloadOutput) -> Result<JobReport> {
        let sha256 = match sha256_file(&out.path).await {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(job_id = ctx.job.id, "checksum failed: {:#}", e);
                None
            }
        };
        let mut record = ctx.record(DownloadStatus::Completed, None);
        record.file_size = Some(out.size as i64);
        record.sha256 = sha256;

        let limit = self.cfg.max_file_size_bytes();
        if out.size > limit {
            tracing::info!(job_id = ctx.job.id, size = out.size, limit, "file over upload limit, kept on disk");
            self.store.log_download(&record).await?;
            let path = out.path.display().to_string();
            self.edit(ctx.status, &render::too_large(&path, out.size, limit), None)
                .await;
            return Ok(JobReport::completed(out.size));
        }

        self.edit(ctx.status, &render::uploading(&ctx.title), None).await;
        let caption = render::done_caption(&ctx.title, out.size);
        let sent = self
            .messenger
            .send_document(ctx.job.chat_id, &out.path, Some(&caption))
            .await;
        remove_file_logged(&out.path).await;
        match sent {
            Ok(()) => {
                self.store.log_download(&record).await?;
                // The document caption carries the result; the status message goes away.
                if let Err(e) = self.messenger.delete(ctx.status).await {
                    tracing::debug!(job_id = ctx.job.id, "status delete failed: {:#}", e);
                    self.edit(ctx.status, &render::delivered(&ctx.title), None).await;
                }
                Ok(JobReport::completed(out.size))
            }
            Err(e) => {
                let reason = format!("upload failed: {e:#}");
                tracing::warn!(job_id = ctx.job.id, "{}", reason);
                record.status = DownloadStatus::Failed;
                record.error_msg = Some(reason.clone());
                self.store.log_download(&record).await?;
                self.edit(ctx.status, &render::download_failed(&reason), None).await;
                Ok(JobReport::failed(JobOutcome::Error, reason))
            }
        }
    }

    /// Log and report a failed download; aborts become cancellations.
    async fn download_error(&self, ctx: &JobCtx, e: ExtractorError) -> Result<JobReport> {
        if matches!(e, ExtractorError::Aborted) {
            self.edit(ctx.status, &render::job_cancelled(), None).await;
            return Ok(JobReport::cancelled());
        }
        let reason = e.to_string();
        tracing::warn!(job_id = ctx.job.id, url = %ctx.job.url, "download failed: {}", reason);
        self.store
            .log_download(&ctx.record(DownloadStatus::Failed, Some(reason.clone())))
            .await?;
        self.edit(ctx.status, &render::download_failed(&reason), None).await;
        Ok(JobReport::failed(outcome_for(&e), reason))
    }

    async fn run_subtitles(&self, ctx: &JobCtx, langs: &[String]) -> Result<JobReport> {
        let langs: Vec<String> = if langs.is_empty() {
            DEFAULT_SUBTITLE_LANGS.iter().map(|l| l.to_string()).collect()
        } else {
            langs.to_vec()
        };
        let dir = ctx.work_dir.join("subs");
        self.edit(ctx.status, &render::fetching_subtitles(), None).await;

        let extractor = &self.extractor;
        let url = ctx.job.url.as_str();
        let files = match run_with_retry(&self.retry, || extractor.subtitles(url, &langs, &dir)).await {
            Ok(files) => files,
            Err(e) => return self.download_error(ctx, e).await,
        };

        if files.is_empty() {
            let mut record = ctx.record(DownloadStatus::Failed, Some("no subtitles found".into()));
            record.title = Some(format!("{} (subtitles)", ctx.title));
            self.store.log_download(&record).await?;
            self.edit(ctx.status, &render::subtitles_none(), None).await;
            let _ = tokio::fs::remove_dir(&dir).await;
            return Ok(JobReport::completed(0));
        }

        let mut sent = 0usize;
        let mut bytes = 0u64;
        for file in &files {
            if ctx.aborted() {
                break;
            }
            bytes += tokio::fs::metadata(&file.path).await.map(|m| m.len()).unwrap_or(0);
            let caption = render::subtitle_caption(&file.lang);
            match self
                .messenger
                .send_document(ctx.job.chat_id, &file.path, Some(&caption))
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(job_id = ctx.job.id, lang = %file.lang, "subtitle upload failed: {:#}", e),
            }
        }
        for file in &files {
            remove_file_logged(&file.path).await;
        }
        let _ = tokio::fs::remove_dir(&dir).await;

        if ctx.aborted() {
            self.edit(ctx.status, &render::job_cancelled(), None).await;
            return Ok(JobReport::cancelled());
        }
        let mut record = if sent > 0 {
            ctx.record(DownloadStatus::Completed, None)
        } else {
            ctx.record(DownloadStatus::Failed, Some("subtitle upload failed".into()))
        };
        record.title = Some(format!("{} (subtitles)", ctx.title));
        record.file_size = Some(bytes as i64);
        self.store.log_download(&record).await?;
        self.edit(ctx.status, &render::subtitles_sent(sent), None).await;
        if sent == 0 {
            return Ok(JobReport::failed(JobOutcome::Error, "subtitle upload failed"));
        }
        Ok(JobReport::completed(bytes))
    }

    async fn run_playlist(&self, ctx: &JobCtx, max_videos: usize) -> Result<JobReport> {
        self.edit(ctx.status, &render::analyzing(), None).await;
        let extractor = &self.extractor;
        let url = ctx.job.url.as_str();
        let info = match run_with_retry(&self.retry, || extractor.probe(url)).await {
            Ok(info) => info,
            Err(e) => return self.download_error(ctx, e).await,
        };

        let cap = max_videos.min(self.cfg.playlist_max_videos).max(1);
        let entries: Vec<_> = info.entries.into_iter().take(cap).collect();
        let mut progress = PlaylistProgress::new(entries.len());
        self.edit(
            ctx.status,
            &render::playlist_progress(&ctx.title, &progress),
            Some(&render::cancel_keyboard()),
        )
        .await;

        let settings = self.store.user_settings(ctx.job.user_id).await?;
        let format = format_spec(None, false, settings.preferred_height, &self.cfg.default_format);
        let max_filesize = self.cfg.max_file_size_bytes();
        let permits = Arc::new(Semaphore::new(self.cfg.playlist_parallelism.max(1)));
        let mut set = JoinSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let entry_url = entry.download_url().map(str::to_string);
            let title = entry
                .title
                .clone()
                .unwrap_or_else(|| format!("#{}", index + 1));
            let extractor = Arc::clone(&self.extractor);
            let permits = Arc::clone(&permits);
            let abort = Arc::clone(&ctx.abort);
            let retry = self.retry;
            let req = entry_url.clone().map(|url| DownloadRequest {
                url,
                format: format.clone(),
                audio_only: false,
                output_dir: ctx.work_dir.clone(),
                max_filesize: Some(max_filesize),
            });
            set.spawn(async move {
                let result = match req {
                    None => Err(ExtractorError::Failed {
                        kind: ExtractorErrorKind::Unavailable,
                        message: "playlist entry has no URL".to_string(),
                    }),
                    Some(req) => match permits.acquire_owned().await {
                        Err(_) => Err(ExtractorError::Aborted),
                        Ok(_permit) if abort.load(Ordering::Relaxed) => Err(ExtractorError::Aborted),
                        Ok(_permit) => {
                            run_with_retry(&retry, || {
                                extractor.download(&req, None, Arc::clone(&abort))
                            })
                            .await
                        }
                    },
                };
                EntryResult {
                    index,
                    url: entry_url.unwrap_or_default(),
                    title,
                    result,
                }
            });
        }

        let mut throttle = ProgressThrottle::new(self.cfg.progress_interval());
        let mut finished: Vec<(usize, String, DownloadOutput)> = Vec::new();
        let mut throttled = false;
        while let Some(joined) = set.join_next().await {
            let entry = match joined {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(job_id = ctx.job.id, "playlist entry task failed: {}", e);
                    progress.record(false);
                    continue;
                }
            };
            match entry.result {
                Ok(out) => {
                    progress.record(true);
                    let mut record =
                        DownloadRecord::completed(ctx.job.user_id, &entry.url, &ctx.job.platform);
                    record.title = Some(entry.title.clone());
                    record.file_size = Some(out.size as i64);
                    record.sha256 = sha256_file(&out.path).await.ok();
                    self.store.log_download(&record).await?;
                    finished.push((entry.index, entry.title, out));
                }
                Err(ExtractorError::Aborted) => progress.record(false),
                Err(e) => {
                    progress.record(false);
                    throttled |= e.kind() == Some(ExtractorErrorKind::Throttled);
                    tracing::warn!(job_id = ctx.job.id, index = entry.index, "playlist entry failed: {}", e);
                    let mut record = DownloadRecord::failed(
                        ctx.job.user_id,
                        &entry.url,
                        &ctx.job.platform,
                        e.to_string(),
                    );
                    record.title = Some(entry.title);
                    self.store.log_download(&record).await?;
                }
            }
            let snapshot = ProgressStats {
                percent: progress.percent(),
                ..Default::default()
            };
            if throttle.should_emit(&snapshot, Instant::now()) {
                self.edit(
                    ctx.status,
                    &render::playlist_progress(&ctx.title, &progress),
                    Some(&render::cancel_keyboard()),
                )
                .await;
            }
        }

        if ctx.aborted() {
            for (_, _, out) in &finished {
                remove_file_logged(&out.path).await;
            }
            self.edit(ctx.status, &render::job_cancelled(), None).await;
            return Ok(JobReport::cancelled());
        }

        finished.sort_by_key(|(index, _, _)| *index);
        let send_max = self.cfg.playlist_send_max_mb.saturating_mul(BYTES_PER_MB);
        let mut sent = 0usize;
        let mut kept = 0usize;
        let mut bytes = 0u64;
        for (_, title, out) in &finished {
            bytes += out.size;
            if sent < self.cfg.playlist_send_limit && out.size <= send_max {
                let caption = render::done_caption(title, out.size);
                match self
                    .messenger
                    .send_document(ctx.job.chat_id, &out.path, Some(&caption))
                    .await
                {
                    Ok(()) => {
                        sent += 1;
                        remove_file_logged(&out.path).await;
                        continue;
                    }
                    Err(e) => tracing::warn!(job_id = ctx.job.id, "playlist upload failed: {:#}", e),
                }
            }
            kept += 1;
        }

        self.edit(
            ctx.status,
            &render::playlist_summary(&ctx.title, &progress, sent, kept),
            None,
        )
        .await;

        if progress.total > 0 && progress.completed == 0 {
            let outcome = if throttled { JobOutcome::Throttled } else { JobOutcome::Error };
            return Ok(JobReport::failed(outcome, "no playlist entries could be downloaded"));
        }
        Ok(JobReport::completed(bytes))
    }
}

fn outcome_for(e: &ExtractorError) -> JobOutcome {
    match e.kind() {
        Some(ExtractorErrorKind::Throttled) => JobOutcome::Throttled,
        _ => JobOutcome::Error,
    }
}

async fn remove_file_logged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), "remove failed: {}", e);
    }
}
