//! Quality menu: which formats to offer and which `-f` expression to run.

use crate::extractor::MediaInfo;

/// Number of formats shown in the quality menu.
pub const MENU_FORMATS: usize = 8;

/// A progressive (audio+video) format offered to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOption {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    /// `720p`, or `Unknown` when the height is not reported.
    pub quality_label: String,
    /// Size in MB rounded to one decimal; None when unknown.
    pub size_mb: Option<f64>,
    pub note: Option<String>,
    pub filesize: Option<u64>,
}

/// Progressive formats of `info`, best first. Formats without a height sort last.
pub fn available_formats(info: &MediaInfo) -> Vec<FormatOption> {
    let mut out: Vec<FormatOption> = info
        .formats
        .iter()
        .filter(|f| f.is_progressive())
        .map(|f| {
            let filesize = f.effective_size();
            FormatOption {
                format_id: f.format_id.clone(),
                ext: f.ext.clone().unwrap_or_else(|| "mp4".to_string()),
                height: f.height,
                quality_label: f
                    .height
                    .map(|h| format!("{h}p"))
                    .unwrap_or_else(|| "Unknown".to_string()),
                size_mb: filesize.map(|b| (b as f64 / (1024.0 * 1024.0) * 10.0).round() / 10.0),
                note: f.format_note.clone().filter(|n| !n.is_empty()),
                filesize,
            }
        })
        .collect();
    out.sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
    out
}

/// Format expression for a download.
///
/// An explicit format id wins; audio takes the best audio stream; otherwise the
/// user's preferred height caps the selection, falling back to `default`.
pub fn format_spec(
    format_id: Option<&str>,
    audio: bool,
    preferred_height: Option<u32>,
    default: &str,
) -> String {
    if let Some(id) = format_id.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    if audio {
        return "bestaudio/best".to_string();
    }
    match preferred_height {
        Some(h) => format!("best[height<={h}]/best"),
        None => default.to_string(),
    }
}
