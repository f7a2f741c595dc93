//! Integration test: full request lifecycle against a fake extractor and a
//! recording messenger. Covers intake, menus, queueing, job execution, and
//! delivery, plus the worker pool end to end.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use common::fakes::{playlist, single_video, FakeExtractor, RecordingMessenger, Sent};
use tempfile::{tempdir, TempDir};
use tvd_core::action::Action;
use tvd_core::app::{App, IncomingCallback, IncomingMessage};
use tvd_core::config::{RetryConfig, TvdConfig};
use tvd_core::gateway::MessageRef;
use tvd_core::platform::url_key;
use tvd_core::platform_policy::PlatformPolicy;
use tvd_core::queue::JobSpec;
use tvd_core::store::{JobState, Store};
use tvd_core::worker::{JobReport, JobRunner};

const ADMIN: i64 = 900;
const VIDEO_URL: &str = "https://www.youtube.com/watch?v=abc";
const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=PL1";

struct Harness {
    app: Arc<App>,
    messenger: Arc<RecordingMessenger>,
    extractor: Arc<FakeExtractor>,
    store: Store,
    dir: TempDir,
}

fn test_config() -> TvdConfig {
    TvdConfig {
        admin_ids: vec![ADMIN],
        progress_interval_ms: 0,
        retry: Some(RetryConfig {
            max_attempts: 1,
            base_delay_secs: 0.0,
            max_delay_secs: 0,
        }),
        ..TvdConfig::default()
    }
}

async fn harness(cfg: TvdConfig, extractor: FakeExtractor) -> Harness {
    let dir = tempdir().unwrap();
    let store = Store::open_memory().await.unwrap();
    let messenger = Arc::new(RecordingMessenger::default());
    let extractor = Arc::new(extractor);
    let app = App::new(
        cfg,
        store.clone(),
        extractor.clone(),
        messenger.clone(),
        dir.path().join("downloads"),
    );
    Harness {
        app: Arc::new(app),
        messenger,
        extractor,
        store,
        dir,
    }
}

fn text(user: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        user_id: user,
        chat_id: user,
        username: Some("tester".into()),
        first_name: Some("Test".into()),
        text: text.into(),
    }
}

fn press(user: i64, msg: MessageRef, action: &Action) -> IncomingCallback {
    IncomingCallback {
        id: "cb-1".into(),
        user_id: user,
        chat_id: msg.chat_id,
        message: Some(msg),
        data: action.encode(),
    }
}

impl Harness {
    async fn say(&self, user: i64, msg: &str) {
        self.app.handle_message(text(user, msg)).await.unwrap();
    }

    /// Press `action` on the most recent menu.
    async fn press(&self, user: i64, action: Action) {
        let (msg, callbacks) = self.messenger.last_menu();
        let data = action.encode();
        assert!(
            callbacks.contains(&data),
            "button {data} not offered; menu has {callbacks:?}"
        );
        self.app.handle_callback(press(user, msg, &action)).await.unwrap();
    }

    async fn run_next(&self) -> JobReport {
        let id = self
            .store
            .claim_next_queued_job(10, &[])
            .await
            .unwrap()
            .expect("a queued job");
        let job = self.store.get_job(id).await.unwrap().unwrap();
        self.app
            .run_job(job, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn start_registers_user_and_shows_main_menu() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    h.say(1, "/start").await;

    let user = h.store.get_user(1).await.unwrap().expect("registered");
    assert_eq!(user.username.as_deref(), Some("tester"));
    let (_, callbacks) = h.messenger.last_menu();
    assert!(callbacks.contains(&Action::Help.encode()));
    assert!(callbacks.contains(&Action::Settings.encode()));
    assert!(h.messenger.last_text().contains("Hi Test"));
}

#[tokio::test]
async fn unsupported_link_is_rejected_without_probing() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    h.say(1, "https://example.com/video.mp4").await;
    assert!(h.messenger.last_text().contains("Unsupported link"));
    assert_eq!(h.extractor.download_count(), 0);
}

#[tokio::test]
async fn probe_failure_is_reported_and_logged() {
    let h = harness(test_config(), FakeExtractor::broken()).await;
    h.say(1, VIDEO_URL).await;

    assert!(h.messenger.last_text().contains("Could not analyze"));
    let failures = h.store.recent_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].platform, "youtube");
}

#[tokio::test]
async fn video_flow_downloads_selected_format_and_uploads() {
    let h = harness(test_config(), FakeExtractor::new(single_video("My Clip"))).await;
    let key = url_key(VIDEO_URL);

    h.say(1, VIDEO_URL).await;
    assert!(h.messenger.last_text().contains("My Clip"));
    h.press(1, Action::Video { key: key.clone() }).await;
    h.press(
        1,
        Action::Format {
            key: key.clone(),
            format_id: "22".into(),
        },
    )
    .await;
    assert!(h.messenger.last_text().contains("queued"));

    let jobs = h.store.list_jobs(10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Queued);

    let report = h.run_next().await;
    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.bytes, 2048);

    let downloads = h.extractor.downloads.lock().unwrap().clone();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].format, "22");
    assert!(!downloads[0].audio_only);

    let docs = h.messenger.documents();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].1.as_deref().unwrap_or("").contains("My Clip"));
    assert!(
        h.messenger.events().iter().any(|e| matches!(e, Sent::Delete(_))),
        "status message should be removed once the file is sent"
    );

    let stats = h.store.user_stats(1).await.unwrap().unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.downloads_count, 1);
    assert!(
        !h.dir.path().join("downloads").join(format!("job-{}", jobs[0].id)).exists(),
        "job directory should be cleaned up after upload"
    );
}

#[tokio::test]
async fn audio_uses_mp3_extraction() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Song"))).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Audio { key }).await;

    let report = h.run_next().await;
    assert_eq!(report.state, JobState::Completed);
    let downloads = h.extractor.downloads.lock().unwrap().clone();
    assert!(downloads[0].audio_only);
    assert_eq!(downloads[0].format, "bestaudio/best");
    assert!(h.messenger.documents()[0].0.ends_with(".mp3"));
}

#[tokio::test]
async fn preferred_quality_shapes_default_format() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    h.say(1, "/settings").await;
    h.press(1, Action::SetQuality(Some(480))).await;
    assert_eq!(
        h.store.user_settings(1).await.unwrap().preferred_height,
        Some(480)
    );

    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::All { key }).await;
    h.run_next().await;
    let downloads = h.extractor.downloads.lock().unwrap().clone();
    assert_eq!(downloads[0].format, "best[height<=480]/best");
    // Video plus the English subtitle the fake provides.
    assert_eq!(h.messenger.documents().len(), 2);
}

#[tokio::test]
async fn oversized_file_is_kept_and_path_reported() {
    let mut extractor = FakeExtractor::new(single_video("Big"));
    extractor.file_size = 2 * 1024 * 1024;
    let cfg = TvdConfig {
        max_file_size_mb: 1,
        ..test_config()
    };
    let h = harness(cfg, extractor).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Audio { key }).await;

    let report = h.run_next().await;
    assert_eq!(report.state, JobState::Completed);
    assert!(h.messenger.documents().is_empty());
    assert!(h.messenger.last_text().contains("upload limit"));
    let job_dir = h.dir.path().join("downloads").join("job-1");
    assert!(job_dir.exists(), "oversized file stays on disk");
}

#[tokio::test]
async fn failed_upload_marks_job_failed() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    h.messenger
        .fail_uploads
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Audio { key }).await;

    let report = h.run_next().await;
    assert_eq!(report.state, JobState::Failed);
    assert!(report.error.unwrap().contains("upload failed"));
    let stats = h.store.user_stats(1).await.unwrap().unwrap();
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.total_attempts, 1);
}

#[tokio::test]
async fn rate_limit_applies_to_users_but_not_admins() {
    let cfg = TvdConfig {
        rate_limit_per_hour: 1,
        ..test_config()
    };
    let h = harness(cfg, FakeExtractor::new(single_video("Clip"))).await;

    h.say(1, VIDEO_URL).await;
    assert!(h.messenger.last_text().contains("Clip"));
    h.say(1, VIDEO_URL).await;
    assert!(h.messenger.last_text().contains("1 requests per hour"));

    h.say(ADMIN, VIDEO_URL).await;
    h.say(ADMIN, VIDEO_URL).await;
    assert!(h.messenger.last_text().contains("Clip"));
}

#[tokio::test]
async fn ban_requires_admin_and_blocks_user() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;

    h.say(2, "/ban 5").await;
    assert!(h.messenger.last_text().contains("administrators only"));
    assert!(!h.store.is_banned(5).await.unwrap());

    h.say(ADMIN, "/ban").await;
    assert!(h.messenger.last_text().contains("/ban"));

    h.say(ADMIN, "/ban 5").await;
    assert!(h.store.is_banned(5).await.unwrap());
    h.say(5, VIDEO_URL).await;
    assert!(h.messenger.last_text().contains("not allowed"));

    h.say(ADMIN, "/unban 5").await;
    assert!(!h.store.is_banned(5).await.unwrap());
}

#[tokio::test]
async fn stale_button_reports_expired_session() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    h.say(1, VIDEO_URL).await;
    let (msg, _) = h.messenger.last_menu();
    let stale = Action::Audio {
        key: "ffffffffffff".into(),
    };
    h.app.handle_callback(press(1, msg, &stale)).await.unwrap();

    assert!(h.messenger.last_text().contains("expired"));
    assert!(h.store.list_jobs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_callback_data_is_ignored() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    let cb = IncomingCallback {
        id: "cb-9".into(),
        user_id: 1,
        chat_id: 1,
        message: Some(MessageRef {
            chat_id: 1,
            message_id: 1,
        }),
        data: "definitely:not:an-action".into(),
    };
    h.app.handle_callback(cb).await.unwrap();
    assert!(h.messenger.texts().is_empty());
}

#[tokio::test]
async fn subtitle_selection_is_queued_and_delivered() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Talk"))).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Subs { key: key.clone() }).await;
    h.press(
        1,
        Action::ToggleLang {
            key: key.clone(),
            lang: "en".into(),
        },
    )
    .await;
    assert!(h.messenger.last_text().contains("Selected: en"));
    h.press(1, Action::SubsConfirm { key }).await;

    let job = h.store.get_job(1).await.unwrap().unwrap();
    assert_eq!(
        JobSpec::from_json(&job.spec_json).unwrap(),
        JobSpec::Subtitles {
            langs: vec!["en".into()]
        }
    );

    let report = h.run_next().await;
    assert_eq!(report.state, JobState::Completed);
    let docs = h.messenger.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].0, "video.en.srt");
}

#[tokio::test]
async fn missing_subtitles_are_reported() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Talk"))).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Subs { key: key.clone() }).await;
    h.press(
        1,
        Action::ToggleLang {
            key: key.clone(),
            lang: "fr".into(),
        },
    )
    .await;
    h.press(1, Action::SubsConfirm { key }).await;

    h.run_next().await;
    assert!(h.messenger.documents().is_empty());
    assert!(h.messenger.last_text().contains("No subtitles"));
}

#[tokio::test]
async fn old_subtitle_menu_refuses_after_a_new_link() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Talk"))).await;
    let old_key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Subs { key: old_key.clone() }).await;
    let (old_menu, _) = h.messenger.last_menu();

    h.say(1, "https://www.youtube.com/watch?v=other").await;
    let confirm = Action::SubsConfirm { key: old_key.clone() };
    h.app
        .handle_callback(press(1, old_menu, &confirm))
        .await
        .unwrap();
    assert!(h.messenger.last_text().contains("expired"));

    let toggle = Action::ToggleLang {
        key: old_key,
        lang: "en".into(),
    };
    h.app
        .handle_callback(press(1, old_menu, &toggle))
        .await
        .unwrap();
    assert!(h.messenger.last_text().contains("expired"));
    assert!(h.store.list_jobs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn single_video_actions_refuse_on_a_playlist_session() {
    let h = harness(test_config(), FakeExtractor::new(playlist("Mix", 3))).await;
    let key = url_key(PLAYLIST_URL);
    h.say(1, PLAYLIST_URL).await;
    let (menu, _) = h.messenger.last_menu();

    for action in [
        Action::SubsConfirm { key: key.clone() },
        Action::Audio { key: key.clone() },
    ] {
        h.app
            .handle_callback(press(1, menu, &action))
            .await
            .unwrap();
        assert!(h.messenger.last_text().contains("expired"));
    }
    assert!(h.store.list_jobs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn back_from_quality_menu_shows_options_again() {
    let h = harness(test_config(), FakeExtractor::new(single_video("My Clip"))).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    let (_, options) = h.messenger.last_menu();

    h.press(1, Action::Video { key: key.clone() }).await;
    assert!(h.messenger.last_text().contains("Choose a quality"));
    h.press(1, Action::BackOptions { key: key.clone() }).await;
    assert!(h.messenger.last_text().contains("What would you like to download?"));
    assert_eq!(h.messenger.last_menu().1, options);

    h.press(1, Action::Subs { key: key.clone() }).await;
    h.press(1, Action::BackOptions { key }).await;
    assert_eq!(h.messenger.last_menu().1, options);
}

#[tokio::test]
async fn playlist_flow_downloads_in_parallel_and_sends_first_files() {
    let mut extractor = FakeExtractor::new(playlist("Mix", 7));
    extractor.failing_urls = vec!["https://www.youtube.com/watch?v=v1".into()];
    let cfg = TvdConfig {
        playlist_send_limit: 3,
        ..test_config()
    };
    let h = harness(cfg, extractor).await;
    let key = url_key(PLAYLIST_URL);

    h.say(1, PLAYLIST_URL).await;
    assert!(h.messenger.last_text().contains("7 videos"));
    h.press(
        1,
        Action::Playlist {
            key: key.clone(),
            count: 5,
        },
    )
    .await;
    assert!(h.messenger.last_text().contains("Videos: 5"));
    h.press(1, Action::PlaylistConfirm { key, count: 5 }).await;

    let report = h.run_next().await;
    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.bytes, 4 * 2048);
    assert_eq!(h.extractor.download_count(), 5);
    assert!(h
        .extractor
        .downloads
        .lock()
        .unwrap()
        .iter()
        .all(|r| r.max_filesize.is_some()));

    assert_eq!(h.messenger.documents().len(), 3);
    let summary = h.messenger.last_text();
    assert!(summary.contains("4 downloaded"), "{summary}");
    assert!(summary.contains("1 failed"), "{summary}");
    assert!(summary.contains("1 files kept"), "{summary}");

    let stats = h.store.user_stats(1).await.unwrap().unwrap();
    assert_eq!(stats.total_attempts, 5);
    assert_eq!(stats.completed, 4);
}

#[tokio::test]
async fn playlists_can_be_disabled() {
    let cfg = TvdConfig {
        enable_playlists: false,
        ..test_config()
    };
    let h = harness(cfg, FakeExtractor::new(playlist("Mix", 3))).await;
    h.say(1, PLAYLIST_URL).await;
    assert!(h.messenger.last_text().contains("disabled"));
}

#[tokio::test]
async fn cancel_drops_queued_jobs() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Audio { key }).await;

    h.say(1, "/cancel").await;
    assert!(h.messenger.last_text().contains("1 queued"));
    let job = h.store.get_job(1).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Cancelled);
}

#[tokio::test]
async fn admin_panel_lists_users() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    h.say(1, "/start").await;
    h.say(ADMIN, "/admin").await;
    assert!(h.messenger.last_text().contains("Admin panel"));
    h.press(ADMIN, Action::Admin(tvd_core::action::AdminView::Users))
        .await;
    assert!(h.messenger.last_text().contains("tester"));
}

#[tokio::test]
async fn worker_pool_runs_submitted_job() {
    let h = harness(test_config(), FakeExtractor::new(single_video("Clip"))).await;
    let key = url_key(VIDEO_URL);
    h.say(1, VIDEO_URL).await;
    h.press(1, Action::Audio { key }).await;

    let policy = Arc::new(tokio::sync::Mutex::new(PlatformPolicy::new(1, 4)));
    let pool = h.app.worker_pool(policy.clone());
    let runner: Arc<dyn JobRunner> = h.app.clone();
    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { pool.run(runner, rx).await });

    let store = h.store.clone();
    tokio::time::timeout(Duration::from_secs(10), async move {
        loop {
            let job = store.get_job(1).await.unwrap().unwrap();
            if job.state == JobState::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job completes");

    tx.send(true).unwrap();
    let ran = handle.await.unwrap();
    assert_eq!(ran, 1);
    assert_eq!(h.messenger.documents().len(), 1);
    assert!(policy.lock().await.get("youtube").is_some());
}
