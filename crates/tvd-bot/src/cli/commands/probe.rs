//! `tvd probe <url>` – run the extractor's metadata probe and print formats.

use anyhow::Result;
use tvd_core::config::TvdConfig;
use tvd_core::extractor::{Extractor, YtDlp};
use tvd_core::formats::available_formats;
use tvd_core::platform;
use tvd_core::render::{format_duration, SUBTITLE_LANGS};

pub async fn run_probe(cfg: &TvdConfig, url: &str) -> Result<()> {
    let target = platform::classify(url, &cfg.supported_platforms)?;
    let ytdlp = YtDlp::new(cfg.ytdlp_path.clone());
    let info = ytdlp.probe(&target.url).await?;

    println!("Title:     {}", info.title);
    println!("Platform:  {} ({:?})", target.platform, target.kind);
    println!("Uploader:  {}", info.uploader.as_deref().unwrap_or("-"));
    println!("Duration:  {}", format_duration(info.duration));
    if info.has_multiple_entries() {
        println!("Playlist:  {} entries", info.entries.len());
        return Ok(());
    }

    let formats = available_formats(&info);
    if formats.is_empty() {
        println!("No progressive formats.");
    } else {
        println!();
        println!("{:<12} {:<6} {:<10} {}", "FORMAT", "EXT", "QUALITY", "SIZE");
        for f in formats {
            let size = f
                .size_mb
                .map(|mb| format!("{mb} MB"))
                .unwrap_or_else(|| "-".to_string());
            println!("{:<12} {:<6} {:<10} {}", f.format_id, f.ext, f.quality_label, size);
        }
    }

    let known: Vec<&str> = SUBTITLE_LANGS
        .iter()
        .map(|(code, _)| *code)
        .filter(|code| {
            info.subtitle_langs
                .iter()
                .chain(&info.auto_caption_langs)
                .any(|l| l.as_str() == *code)
        })
        .collect();
    if !known.is_empty() {
        println!();
        println!("Subtitles: {}", known.join(", "));
    }
    Ok(())
}
