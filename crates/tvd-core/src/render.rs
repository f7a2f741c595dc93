//! Chat texts (Telegram HTML) and the inline keyboards that go with them.
//!
//! Everything that came from a user or a remote site passes through
//! [`escape`] before it is interpolated.

use crate::action::{Action, AdminView};
use crate::config::TvdConfig;
use crate::error::{BotError, ExtractorError, ExtractorErrorKind};
use crate::extractor::MediaInfo;
use crate::formats::{FormatOption, MENU_FORMATS};
use crate::gateway::{Button, Keyboard};
use crate::platform::Platform;
use crate::progress::{render_bar, PlaylistProgress, ProgressStats};
use crate::store::{FailureRecord, GlobalStats, UserRecord, UserSettings, UserStats};

/// Languages offered in the subtitle menu.
pub const SUBTITLE_LANGS: &[(&str, &str)] = &[
    ("ar", "🇸🇦 Arabic"),
    ("en", "🇬🇧 English"),
    ("fr", "🇫🇷 French"),
    ("es", "🇪🇸 Spanish"),
    ("de", "🇩🇪 German"),
    ("ru", "🇷🇺 Russian"),
    ("all", "🌐 All available"),
];

/// Entry counts offered for playlists.
pub const PLAYLIST_CHOICES: &[usize] = &[5, 10, 20];

/// Heights offered in the settings menu.
pub const QUALITY_CHOICES: &[u32] = &[360, 480, 720, 1080];

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Cut to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// `m:ss`, or "unknown".
pub fn format_duration(secs: Option<u64>) -> String {
    match secs {
        Some(s) => format!("{}:{:02}", s / 60, s % 60),
        None => "unknown".to_string(),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }
    format!("{value:.1} {unit}")
}

/// Calendar date of a unix timestamp (UTC).
pub fn format_date(ts: i64) -> String {
    match time::OffsetDateTime::from_unix_timestamp(ts) {
        Ok(dt) => {
            let d = dt.date();
            format!("{}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
        }
        Err(_) => "unknown".to_string(),
    }
}

/// Experience level by completed downloads.
pub fn user_level(downloads: i64) -> &'static str {
    match downloads {
        n if n < 10 => "🌱 Beginner",
        n if n < 50 => "⭐ Intermediate",
        n if n < 100 => "🔥 Advanced",
        _ => "👑 Pro",
    }
}

fn back_row() -> Vec<Button> {
    vec![Button::action("⬅️ Back", &Action::BackMain)]
}

fn cancel_row() -> Vec<Button> {
    vec![Button::action("❌ Cancel", &Action::Cancel)]
}

/// Back to the options of the analysed link, plus Cancel.
fn options_nav_row(key: &str) -> Vec<Button> {
    vec![
        Button::action("🔙 Back", &Action::BackOptions { key: key.to_string() }),
        Button::action("❌ Cancel", &Action::Cancel),
    ]
}

pub fn back_keyboard() -> Keyboard {
    Keyboard::new().row(back_row())
}

pub fn cancel_keyboard() -> Keyboard {
    Keyboard::new().row(cancel_row())
}

// ---------------------------------------------------------------------------
// Menus

pub fn welcome(first_name: Option<&str>) -> String {
    let name = first_name.map(escape).unwrap_or_else(|| "there".to_string());
    format!(
        "👋 Hi {name}!\n\n\
         Send me a link from YouTube, TikTok, Instagram, X and more, and I'll \
         fetch the video, the audio, or the subtitles for you.\n\n\
         Use the buttons below to learn more."
    )
}

pub fn main_menu() -> Keyboard {
    Keyboard::new()
        .row(vec![
            Button::action("❓ Help", &Action::Help),
            Button::action("✨ Features", &Action::Features),
        ])
        .row(vec![
            Button::action("📊 My stats", &Action::Stats),
            Button::action("⚙️ Settings", &Action::Settings),
        ])
}

pub fn help(cfg: &TvdConfig) -> String {
    format!(
        "<b>How to use</b>\n\n\
         1. Send a video or playlist link.\n\
         2. Pick video, audio (MP3), subtitles, or everything.\n\
         3. Wait for the file.\n\n\
         <b>Commands</b>\n\
         /start - main menu\n\
         /stats - your statistics\n\
         /settings - preferred quality\n\
         /cancel - stop your downloads\n\n\
         Limits: {} requests per hour, files up to {} MB.",
        cfg.rate_limit_per_hour, cfg.max_file_size_mb
    )
}

pub fn features(cfg: &TvdConfig) -> String {
    let playlists = if cfg.enable_playlists {
        format!("up to {} videos", cfg.playlist_max_videos)
    } else {
        "disabled".to_string()
    };
    format!(
        "<b>Features</b>\n\n\
         🎬 Video in the quality you choose\n\
         🎵 Audio as MP3 320 kbps\n\
         📝 Subtitles in several languages\n\
         📦 Video and subtitles together\n\
         📋 Playlists: {playlists}\n\
         ⚡ Live progress while downloading\n\n\
         <b>Supported sites</b>\n{}",
        supported_list(cfg)
    )
}

fn supported_list(cfg: &TvdConfig) -> String {
    cfg.supported_platforms
        .iter()
        .map(|p| format!("• {}", escape(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn settings_menu(settings: &UserSettings) -> (String, Keyboard) {
    let current = settings
        .preferred_height
        .map(|h| format!("{h}p"))
        .unwrap_or_else(|| "automatic".to_string());
    let text = format!(
        "<b>Settings</b>\n\nPreferred video quality: <b>{current}</b>\n\
         Applies when you don't pick a format yourself."
    );
    let mark = |selected: bool, label: String| {
        if selected {
            format!("✅ {label}")
        } else {
            label
        }
    };
    let mut row: Vec<Button> = QUALITY_CHOICES
        .iter()
        .map(|h| {
            Button::action(
                mark(settings.preferred_height == Some(*h), format!("{h}p")),
                &Action::SetQuality(Some(*h)),
            )
        })
        .collect();
    row.push(Button::action(
        mark(settings.preferred_height.is_none(), "Auto".to_string()),
        &Action::SetQuality(None),
    ));
    (text, Keyboard::new().row(row).row(back_row()))
}

// ---------------------------------------------------------------------------
// URL intake

pub fn unsupported_platform(cfg: &TvdConfig) -> String {
    format!(
        "❌ <b>Unsupported link</b>\n\nI can only download from:\n{}",
        supported_list(cfg)
    )
}

pub fn rate_limited(limit: u32) -> String {
    format!("⏳ You reached the limit of {limit} requests per hour. Please try again later.")
}

pub fn banned() -> String {
    "🚫 You are not allowed to use this bot.".to_string()
}

/// Reply for a refused request.
pub fn refusal(err: &BotError, cfg: &TvdConfig) -> String {
    match err {
        BotError::UnsupportedPlatform(_) => unsupported_platform(cfg),
        BotError::RateLimited { limit } => rate_limited(*limit),
        BotError::Banned => banned(),
        BotError::SessionExpired => session_expired(),
        BotError::PlaylistsDisabled => playlists_disabled(),
        BotError::QueueFull { active } => queue_full(*active),
    }
}

pub fn analyzing() -> String {
    "🔍 Analyzing the link…".to_string()
}

pub fn probe_failed(err: &ExtractorError) -> String {
    let reason = match err.kind() {
        Some(ExtractorErrorKind::Unsupported) => "this link is not supported by the extractor",
        Some(ExtractorErrorKind::Unavailable) => "the media is private, removed, or blocked",
        Some(ExtractorErrorKind::Throttled) => "the site is rate limiting us, try again in a few minutes",
        Some(ExtractorErrorKind::Network) => "the site could not be reached",
        _ => match err {
            ExtractorError::Timeout(_) => "the site took too long to answer",
            ExtractorError::NotFound(_) => "the downloader is not installed on the server",
            _ => "the link could not be analyzed",
        },
    };
    format!("❌ <b>Could not analyze the link</b>\n\nReason: {reason}.")
}

pub fn playlists_disabled() -> String {
    "📋 Playlist downloads are disabled on this bot. Send a single video link instead.".to_string()
}

pub fn session_expired() -> String {
    "⌛ This menu has expired. Please send the link again.".to_string()
}

pub fn video_options(info: &MediaInfo, platform: &Platform, host: &str, key: &str) -> (String, Keyboard) {
    let uploader = info.uploader.as_deref().map(escape).unwrap_or_else(|| "unknown".into());
    let text = format!(
        "🎬 <b>{}</b>\n\n👤 {uploader}\n⏱ {}\n🌐 {} ({})\n\nWhat would you like to download?",
        escape(&truncate(&info.title, 50)),
        format_duration(info.duration),
        escape(platform.label()),
        escape(host),
    );
    let key = key.to_string();
    let kb = Keyboard::new()
        .row(vec![
            Button::action("🎬 Video", &Action::Video { key: key.clone() }),
            Button::action("🎵 Audio (MP3)", &Action::Audio { key: key.clone() }),
        ])
        .row(vec![
            Button::action("📝 Subtitles", &Action::Subs { key: key.clone() }),
            Button::action("📦 Everything", &Action::All { key }),
        ])
        .row(cancel_row());
    (text, kb)
}

pub fn quality_menu(title: &str, formats: &[FormatOption], key: &str) -> (String, Keyboard) {
    let text = format!(
        "🎬 <b>{}</b>\n\nChoose a quality:",
        escape(&truncate(title, 50))
    );
    let mut kb = Keyboard::new();
    for f in formats.iter().take(MENU_FORMATS) {
        let action = Action::Format {
            key: key.to_string(),
            format_id: f.format_id.clone(),
        };
        if !action.fits() {
            continue;
        }
        let size = f
            .size_mb
            .map(|mb| format!(" ({mb:.1} MB)"))
            .unwrap_or_default();
        let label = format!("{} {}{}", f.quality_label, f.ext, size);
        kb = kb.row(vec![Button::action(label, &action)]);
    }
    (text, kb.row(options_nav_row(key)))
}

pub fn no_formats(key: &str) -> (String, Keyboard) {
    (
        "😕 No combined video formats were found for this link. Try audio or subtitles instead."
            .to_string(),
        Keyboard::new().row(options_nav_row(key)),
    )
}

pub fn subtitle_menu(selected: &[String], key: &str) -> (String, Keyboard) {
    let chosen = if selected.is_empty() {
        "none (Arabic and English will be used)".to_string()
    } else {
        selected.iter().map(|l| escape(l)).collect::<Vec<_>>().join(", ")
    };
    let text = format!("📝 <b>Subtitles</b>\n\nTap languages to select them.\nSelected: {chosen}");
    let mut kb = Keyboard::new();
    for pair in SUBTITLE_LANGS.chunks(2) {
        let row = pair
            .iter()
            .map(|(code, label)| {
                let mark = if selected.iter().any(|s| s == code) { "✅ " } else { "" };
                let action = Action::ToggleLang {
                    key: key.to_string(),
                    lang: code.to_string(),
                };
                Button::action(format!("{mark}{label}"), &action)
            })
            .collect();
        kb = kb.row(row);
    }
    let kb = kb
        .row(vec![Button::action(
            "✔️ Download subtitles",
            &Action::SubsConfirm { key: key.to_string() },
        )])
        .row(options_nav_row(key));
    (text, kb)
}

pub fn playlist_options(info: &MediaInfo, key: &str, max_videos: usize) -> (String, Keyboard) {
    let total = info.entries.len();
    let cap = total.min(max_videos);
    let text = format!(
        "📋 <b>{}</b>\n\n👤 {}\n🎞 {total} videos\n\nHow many should I download?",
        escape(&truncate(&info.title, 50)),
        info.uploader.as_deref().map(escape).unwrap_or_else(|| "unknown".into()),
    );
    let mut row: Vec<Button> = PLAYLIST_CHOICES
        .iter()
        .copied()
        .filter(|n| *n < cap)
        .map(|n| {
            Button::action(
                format!("First {n}"),
                &Action::Playlist {
                    key: key.to_string(),
                    count: n,
                },
            )
        })
        .collect();
    if cap > 0 {
        row.push(Button::action(
            format!("All ({cap})"),
            &Action::Playlist {
                key: key.to_string(),
                count: cap,
            },
        ));
    }
    (text, Keyboard::new().row(row).row(cancel_row()))
}

/// Rough time and size estimate: 2-5 minutes and 100-500 MB per video.
pub fn playlist_confirm(title: &str, count: usize, key: &str) -> (String, Keyboard) {
    let text = format!(
        "📋 <b>{}</b>\n\nVideos: {count}\n⏱ Estimated time: {}-{} minutes\n💾 Estimated size: {}-{} MB\n\nStart the download?",
        escape(&truncate(title, 50)),
        count * 2,
        count * 5,
        count * 100,
        count * 500,
    );
    let kb = Keyboard::new()
        .row(vec![Button::action(
            "✅ Start",
            &Action::PlaylistConfirm {
                key: key.to_string(),
                count,
            },
        )])
        .row(cancel_row());
    (text, kb)
}

// ---------------------------------------------------------------------------
// Jobs

pub fn queued(kind: &str) -> String {
    format!("⏳ Your {kind} download is queued…")
}

pub fn queue_full(active: i64) -> String {
    format!("🚦 You already have {active} downloads pending. Wait for them to finish or use /cancel.")
}

pub fn progress(title: &str, stats: &ProgressStats) -> String {
    let speed = stats
        .speed_bps
        .map(|s| format!("{}/s", format_bytes(s as u64)))
        .unwrap_or_else(|| "-".into());
    let eta = stats
        .eta_secs
        .map(|s| format_duration(Some(s)))
        .unwrap_or_else(|| "-".into());
    let size = match (stats.bytes_done(), stats.total_bytes) {
        (Some(done), Some(total)) => format!("\n💾 {} / {}", format_bytes(done), format_bytes(total)),
        _ => String::new(),
    };
    format!(
        "⬇️ <b>Downloading</b>\n{}\n\n{} {:.1}%{size}\n⚡ {speed}\n⏱ ETA {eta}",
        escape(&truncate(title, 50)),
        render_bar(stats.percent),
        stats.percent,
    )
}

pub fn playlist_progress(title: &str, p: &PlaylistProgress) -> String {
    format!(
        "📋 <b>{}</b>\n\n{} {}/{}\n✅ {} ❌ {}\n⏱ {:.1} min",
        escape(&truncate(title, 50)),
        render_bar(p.percent()),
        p.done(),
        p.total,
        p.completed,
        p.failed,
        p.elapsed_minutes(),
    )
}

pub fn uploading(title: &str) -> String {
    format!("📤 Uploading <b>{}</b>…", escape(&truncate(title, 50)))
}

pub fn done_caption(title: &str, size: u64) -> String {
    format!("✅ {} ({})", escape(&truncate(title, 50)), format_bytes(size))
}

pub fn download_failed(reason: &str) -> String {
    format!("❌ <b>Download failed</b>\n\n{}", escape(&truncate(reason, 300)))
}

pub fn too_large(path: &str, size: u64, limit: u64) -> String {
    format!(
        "⚠️ The file is {} which is over the {} upload limit.\n\nIt was saved on the server as:\n<code>{}</code>",
        format_bytes(size),
        format_bytes(limit),
        escape(path)
    )
}

pub fn delivered(title: &str) -> String {
    format!("✅ <b>{}</b> sent.", escape(&truncate(title, 50)))
}

pub fn fetching_subtitles() -> String {
    "📝 Fetching subtitles…".to_string()
}

pub fn subtitles_sent(count: usize) -> String {
    format!("📝 Sent {count} subtitle file(s).")
}

pub fn subtitles_none() -> String {
    "📝 No subtitles were found in the selected languages.".to_string()
}

pub fn subtitle_caption(lang: &str) -> String {
    format!("📝 Subtitles: {}", escape(lang))
}

pub fn playlist_summary(title: &str, p: &PlaylistProgress, sent: usize, kept: usize) -> String {
    let mut text = format!(
        "📋 <b>{}</b> finished\n\n✅ {} downloaded\n❌ {} failed\n📤 {sent} sent\n⏱ {:.1} min",
        escape(&truncate(title, 50)),
        p.completed,
        p.failed,
        p.elapsed_minutes(),
    );
    if kept > 0 {
        text.push_str(&format!("\n💾 {kept} files kept on the server"));
    }
    text
}

pub fn cancelled(running: usize, queued: u64) -> String {
    if running == 0 && queued == 0 {
        "Nothing to cancel.".to_string()
    } else {
        format!("🛑 Cancelled {running} running and {queued} queued downloads.")
    }
}

pub fn job_cancelled() -> String {
    "🛑 Download cancelled.".to_string()
}

// ---------------------------------------------------------------------------
// Stats and admin

pub fn user_stats(user: &UserRecord, stats: &UserStats) -> String {
    let premium = if user.is_premium { "\n💎 Premium" } else { "" };
    format!(
        "📊 <b>Your statistics</b>\n\n\
         📥 Downloads: {}\n\
         🔁 Attempts: {}\n\
         ✅ Success rate: {:.1}%\n\
         💾 Total size: {}\n\
         📅 Member since: {}\n\
         🏅 Level: {}{premium}",
        stats.downloads_count,
        stats.total_attempts,
        stats.success_rate,
        format_bytes(stats.total_bytes.max(0) as u64),
        format_date(stats.joined_at),
        user_level(stats.downloads_count),
    )
}

pub fn not_admin() -> String {
    "🚫 This command is for administrators only.".to_string()
}

pub fn admin_panel(g: &GlobalStats, cfg: &TvdConfig) -> (String, Keyboard) {
    let text = format!(
        "🛠 <b>Admin panel</b>\n\n\
         👥 Users: {} ({} banned)\n\
         📥 Downloads today: {}\n\
         ✅ Completed today: {}\n\
         📦 All-time attempts: {}\n\n\
         <b>Limits</b>\n\
         Max file size: {} MB\n\
         Concurrent downloads: {}\n\
         Requests per hour: {}\n\
         Playlists: {}",
        g.total_users,
        g.banned_users,
        g.downloads_24h,
        g.completed_24h,
        g.total_downloads,
        cfg.max_file_size_mb,
        cfg.max_concurrent_downloads,
        cfg.rate_limit_per_hour,
        if cfg.enable_playlists { "on" } else { "off" },
    );
    let kb = Keyboard::new()
        .row(vec![
            Button::action("📈 Detailed stats", &Action::Admin(AdminView::Stats)),
            Button::action("⚠️ Failures", &Action::Admin(AdminView::Failures)),
        ])
        .row(vec![Button::action("👥 Top users", &Action::Admin(AdminView::Users))]);
    (text, kb)
}

pub fn admin_detailed(g: &GlobalStats) -> String {
    let mut text = format!(
        "📈 <b>Detailed statistics</b>\n\nTotal attempts: {}\nLast 24h: {} ({} completed)\n\n<b>By platform</b>",
        g.total_downloads, g.downloads_24h, g.completed_24h
    );
    if g.per_platform.is_empty() {
        text.push_str("\nno downloads yet");
    }
    for (platform, n) in &g.per_platform {
        text.push_str(&format!("\n• {}: {n}", escape(platform)));
    }
    text
}

pub fn admin_failures(failures: &[FailureRecord]) -> String {
    if failures.is_empty() {
        return "✅ No failed downloads recorded.".to_string();
    }
    let mut text = "⚠️ <b>Recent failures</b>\n".to_string();
    for f in failures {
        text.push_str(&format!(
            "\n{} · user {} · {}\n<code>{}</code>\n{}\n",
            format_date(f.created_at),
            f.user_id,
            escape(&f.platform),
            escape(&truncate(&f.url, 60)),
            escape(&truncate(f.error_msg.as_deref().unwrap_or("unknown error"), 120)),
        ));
    }
    text
}

pub fn admin_users(users: &[UserRecord]) -> String {
    if users.is_empty() {
        return "No users yet.".to_string();
    }
    let mut text = "👥 <b>Top users</b>\n".to_string();
    for u in users {
        let name = u
            .username
            .as_deref()
            .map(|n| format!("@{}", escape(n)))
            .or_else(|| u.first_name.as_deref().map(escape))
            .unwrap_or_else(|| "-".into());
        let flags = match (u.is_banned, u.is_premium) {
            (true, _) => " 🚫",
            (false, true) => " 💎",
            _ => "",
        };
        text.push_str(&format!(
            "\n<code>{}</code> {name}: {}{flags}",
            u.user_id, u.downloads_count
        ));
    }
    text
}

pub fn ban_result(user_id: i64, banned: bool) -> String {
    if banned {
        format!("🚫 User <code>{user_id}</code> banned.")
    } else {
        format!("✅ User <code>{user_id}</code> unbanned.")
    }
}

pub fn usage(text: &str) -> String {
    format!("Usage: <code>{}</code>", escape(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PlaylistEntry;

    #[test]
    fn escape_html() {
        assert_eq!(escape(r#"<b>"Tom" & Jerry</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; Jerry&lt;/b&gt;");
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("ééééé", 5), "ééééé");
    }

    #[test]
    fn durations_sizes_dates() {
        assert_eq!(format_duration(Some(125)), "2:05");
        assert_eq!(format_duration(Some(3725)), "62:05");
        assert_eq!(format_duration(None), "unknown");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_date(0), "1970-01-01");
        assert_eq!(format_date(1_700_000_000), "2023-11-14");
    }

    #[test]
    fn levels() {
        assert_eq!(user_level(0), "🌱 Beginner");
        assert_eq!(user_level(10), "⭐ Intermediate");
        assert_eq!(user_level(99), "🔥 Advanced");
        assert_eq!(user_level(100), "👑 Pro");
    }

    #[test]
    fn video_options_escape_title_and_bind_key() {
        let info = MediaInfo {
            title: "<script>".into(),
            duration: Some(61),
            ..Default::default()
        };
        let (text, kb) = video_options(&info, &Platform::YouTube, "youtu.be", "k1");
        assert!(text.contains("&lt;script&gt;"));
        assert!(text.contains("1:01"));
        assert_eq!(kb.callbacks(), vec!["video:k1", "audio:k1", "subs:k1", "all:k1", "cancel"]);
    }

    #[test]
    fn quality_menu_shows_at_most_eight() {
        let formats: Vec<FormatOption> = (0..12)
            .map(|i| FormatOption {
                format_id: format!("f{i}"),
                ext: "mp4".into(),
                height: Some(100 * (12 - i)),
                quality_label: format!("{}p", 100 * (12 - i)),
                size_mb: Some(1.5),
                note: None,
                filesize: None,
            })
            .collect();
        let (_, kb) = quality_menu("t", &formats, "k");
        let cbs = kb.callbacks();
        assert_eq!(cbs.len(), MENU_FORMATS + 2);
        assert_eq!(cbs[0], "fmt:k:f0");
        assert_eq!(&cbs[MENU_FORMATS..], &["back:k", "cancel"]);
        assert!(kb.rows[0][0].label.contains("1.5 MB"));
    }

    #[test]
    fn subtitle_menu_marks_selection() {
        let (text, kb) = subtitle_menu(&["en".to_string()], "k");
        assert!(text.contains("Selected: en"));
        let labels: Vec<&str> = kb.rows.iter().flatten().map(|b| b.label.as_str()).collect();
        assert!(labels.contains(&"✅ 🇬🇧 English"));
        assert!(labels.contains(&"🇸🇦 Arabic"));
        assert!(kb.callbacks().contains(&"lang:k:all"));
        assert!(kb.callbacks().contains(&"subs_ok:k"));
        assert!(kb.callbacks().contains(&"back:k"));
    }

    #[test]
    fn every_refusal_has_a_reply() {
        let cfg = TvdConfig::default();
        assert!(refusal(&BotError::RateLimited { limit: 7 }, &cfg).contains("7 requests"));
        assert!(refusal(&BotError::UnsupportedPlatform("x".into()), &cfg).contains("youtube"));
        assert_eq!(refusal(&BotError::Banned, &cfg), banned());
        assert_eq!(refusal(&BotError::SessionExpired, &cfg), session_expired());
        assert_eq!(refusal(&BotError::PlaylistsDisabled, &cfg), playlists_disabled());
        assert!(refusal(&BotError::QueueFull { active: 3 }, &cfg).contains("3 downloads"));
    }

    #[test]
    fn playlist_options_cap_choices() {
        let info = MediaInfo {
            title: "Mix".into(),
            entries: vec![PlaylistEntry::default(); 12],
            is_playlist: true,
            ..Default::default()
        };
        let (text, kb) = playlist_options(&info, "k", 50);
        assert!(text.contains("12 videos"));
        assert_eq!(kb.callbacks(), vec!["pl:k:5", "pl:k:10", "pl:k:12", "cancel"]);

        let (_, kb) = playlist_options(&info, "k", 8);
        assert_eq!(kb.callbacks(), vec!["pl:k:5", "pl:k:8", "cancel"]);
    }

    #[test]
    fn playlist_estimates() {
        let (text, kb) = playlist_confirm("Mix", 10, "k");
        assert!(text.contains("20-50 minutes"));
        assert!(text.contains("1000-5000 MB"));
        assert_eq!(kb.callbacks(), vec!["plok:k:10", "cancel"]);
    }

    #[test]
    fn progress_text_has_bar_and_numbers() {
        let stats = ProgressStats {
            percent: 50.0,
            total_bytes: Some(10 * 1024 * 1024),
            speed_bps: Some(1024.0 * 1024.0),
            eta_secs: Some(5),
        };
        let text = progress("Clip", &stats);
        assert!(text.contains("50.0%"));
        assert!(text.contains("5.0 MB / 10.0 MB"));
        assert!(text.contains("1.0 MB/s"));
        assert!(text.contains("0:05"));
        assert!(text.contains(&render_bar(50.0)));
    }

    #[test]
    fn settings_menu_marks_current() {
        let (text, kb) = settings_menu(&UserSettings {
            preferred_height: Some(480),
            subtitle_langs: vec![],
        });
        assert!(text.contains("480p"));
        assert_eq!(kb.rows[0][1].label, "✅ 480p");
        assert_eq!(kb.rows[0][4].label, "Auto");
        assert_eq!(
            kb.callbacks(),
            vec!["setq:360", "setq:480", "setq:720", "setq:1080", "setq:auto", "back_main"]
        );
    }

    #[test]
    fn admin_texts() {
        let g = GlobalStats {
            total_users: 3,
            banned_users: 1,
            total_downloads: 9,
            downloads_24h: 4,
            completed_24h: 2,
            per_platform: vec![("youtube".into(), 7)],
        };
        let (text, kb) = admin_panel(&g, &TvdConfig::default());
        assert!(text.contains("Users: 3 (1 banned)"));
        assert!(text.contains("Downloads today: 4"));
        assert_eq!(kb.callbacks(), vec!["adm:stats", "adm:failures", "adm:users"]);
        assert!(admin_detailed(&g).contains("youtube: 7"));
        assert!(admin_failures(&[]).contains("No failed"));
    }
}
