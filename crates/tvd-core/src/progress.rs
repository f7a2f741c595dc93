//! Progress reporting for downloads (percent, rate, ETA).
//!
//! The extractor turns yt-dlp `--newline` output into `ProgressStats`; the job
//! runner throttles those into chat message edits.

use std::time::{Duration, Instant};

/// Snapshot of download progress for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressStats {
    /// Percent complete in [0, 100].
    pub percent: f64,
    /// Total size in bytes, when the extractor knows it.
    pub total_bytes: Option<u64>,
    /// Current rate in bytes per second.
    pub speed_bps: Option<f64>,
    /// Estimated seconds remaining.
    pub eta_secs: Option<u64>,
}

impl ProgressStats {
    /// Bytes written so far, derived from percent and total.
    pub fn bytes_done(&self) -> Option<u64> {
        self.total_bytes
            .map(|t| (t as f64 * (self.percent / 100.0)).round() as u64)
    }

    pub fn is_finished(&self) -> bool {
        self.percent >= 100.0
    }

    /// Parse one line of yt-dlp output, e.g.
    /// `[download]  45.3% of ~ 10.00MiB at  1.20MiB/s ETA 00:05`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix("[download]")?;
        let parts: Vec<&str> = rest.split_whitespace().collect();
        let first = parts.first()?;
        let percent = first.strip_suffix('%')?.parse::<f64>().ok()?;

        let mut stats = ProgressStats {
            percent: percent.clamp(0.0, 100.0),
            ..Default::default()
        };

        let mut i = 1;
        while i < parts.len() {
            match parts[i] {
                "of" => {
                    let mut j = i + 1;
                    if parts.get(j) == Some(&"~") {
                        j += 1;
                    }
                    if let Some(size) = parts.get(j) {
                        stats.total_bytes = parse_size(size.trim_start_matches('~'));
                    }
                    i = j;
                }
                "at" => {
                    if let Some(speed) = parts.get(i + 1) {
                        stats.speed_bps = parse_size(speed.trim_end_matches("/s")).map(|b| b as f64);
                    }
                    i += 1;
                }
                "ETA" => {
                    if let Some(eta) = parts.get(i + 1) {
                        stats.eta_secs = parse_eta(eta);
                    }
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        Some(stats)
    }
}

/// Parse a human size such as `10.00MiB`, `512KiB`, `1.2GB`, `300B` into bytes.
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let split = s.find(|c: char| c.is_ascii_alphabetic())?;
    let (num, unit) = s.split_at(split);
    let value: f64 = num.trim().parse().ok()?;
    let mult: f64 = match unit {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" | "kB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return None,
    };
    if value < 0.0 {
        return None;
    }
    Some((value * mult).round() as u64)
}

/// Parse `SS`, `MM:SS`, or `HH:MM:SS` into seconds. `Unknown` and `--:--` yield None.
pub fn parse_eta(s: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut fields = 0;
    for part in s.trim().split(':') {
        let v: u64 = part.parse().ok()?;
        total = total.checked_mul(60)?.checked_add(v)?;
        fields += 1;
    }
    if fields == 0 || fields > 3 {
        return None;
    }
    Some(total)
}

/// 20-cell text progress bar.
pub fn render_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 5.0).floor() as usize).min(20);
    format!("{}{}", "▓".repeat(filled), "░".repeat(20 - filled))
}

/// Rate limiter for progress edits: at most one per interval, but a finished
/// snapshot always passes.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn should_emit(&mut self, stats: &ProgressStats, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due || stats.is_finished() {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}

/// Aggregate progress of a playlist job.
#[derive(Debug, Clone)]
pub struct PlaylistProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub started: Instant,
}

impl PlaylistProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, ok: bool) {
        if ok {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn done(&self) -> usize {
        self.completed + self.failed
    }

    /// Percent of entries finished (either way).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.done() as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.started.elapsed().as_secs_f64() / 60.0
    }
}
