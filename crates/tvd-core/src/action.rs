//! Callback-button actions and their compact string encoding.
//!
//! Telegram limits callback data to 64 bytes, so actions are encoded as short
//! `verb[:arg[:arg]]` strings. Buttons tied to an analysed URL carry its
//! `url_key` so a press on an outdated menu can be detected.

/// Maximum callback data length accepted by the chat API.
pub const MAX_CALLBACK_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    Stats,
    Failures,
    Users,
}

impl AdminView {
    fn as_str(self) -> &'static str {
        match self {
            AdminView::Stats => "stats",
            AdminView::Failures => "failures",
            AdminView::Users => "users",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Help,
    Settings,
    Stats,
    Features,
    BackMain,
    Cancel,
    /// Open the quality menu.
    Video { key: String },
    Audio { key: String },
    /// Open the subtitle language menu.
    Subs { key: String },
    /// Video plus subtitles in the configured languages.
    All { key: String },
    Format { key: String, format_id: String },
    ToggleLang { key: String, lang: String },
    SubsConfirm { key: String },
    /// Back from a sub-menu to the link's options.
    BackOptions { key: String },
    /// Show the confirmation screen for the first `count` playlist entries.
    Playlist { key: String, count: usize },
    PlaylistConfirm { key: String, count: usize },
    /// Preferred height; None resets to the default format.
    SetQuality(Option<u32>),
    Admin(AdminView),
}

fn valid_token(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 48
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
}

impl Action {
    /// Parse callback data; unknown or malformed data yields None.
    pub fn parse(data: &str) -> Option<Action> {
        let mut parts = data.splitn(3, ':');
        let verb = parts.next()?;
        let a = parts.next();
        let b = parts.next();
        let key = || a.filter(|k| valid_token(k)).map(str::to_string);

        let action = match (verb, a, b) {
            ("help", None, None) => Action::Help,
            ("settings", None, None) => Action::Settings,
            ("stats", None, None) => Action::Stats,
            ("features", None, None) => Action::Features,
            ("back_main", None, None) => Action::BackMain,
            ("cancel", None, None) => Action::Cancel,
            ("subs_ok", Some(_), None) => Action::SubsConfirm { key: key()? },
            ("back", Some(_), None) => Action::BackOptions { key: key()? },
            ("video", Some(_), None) => Action::Video { key: key()? },
            ("audio", Some(_), None) => Action::Audio { key: key()? },
            ("subs", Some(_), None) => Action::Subs { key: key()? },
            ("all", Some(_), None) => Action::All { key: key()? },
            ("fmt", Some(_), Some(id)) if valid_token(id) => Action::Format {
                key: key()?,
                format_id: id.to_string(),
            },
            ("lang", Some(_), Some(code)) if valid_token(code) => Action::ToggleLang {
                key: key()?,
                lang: code.to_string(),
            },
            ("pl", Some(_), Some(n)) => Action::Playlist {
                key: key()?,
                count: n.parse().ok().filter(|n| *n > 0)?,
            },
            ("plok", Some(_), Some(n)) => Action::PlaylistConfirm {
                key: key()?,
                count: n.parse().ok().filter(|n| *n > 0)?,
            },
            ("setq", Some("auto"), None) => Action::SetQuality(None),
            ("setq", Some(h), None) => Action::SetQuality(Some(h.parse().ok().filter(|h| *h > 0)?)),
            ("adm", Some("stats"), None) => Action::Admin(AdminView::Stats),
            ("adm", Some("failures"), None) => Action::Admin(AdminView::Failures),
            ("adm", Some("users"), None) => Action::Admin(AdminView::Users),
            _ => return None,
        };
        Some(action)
    }

    pub fn encode(&self) -> String {
        match self {
            Action::Help => "help".into(),
            Action::Settings => "settings".into(),
            Action::Stats => "stats".into(),
            Action::Features => "features".into(),
            Action::BackMain => "back_main".into(),
            Action::Cancel => "cancel".into(),
            Action::SubsConfirm { key } => format!("subs_ok:{key}"),
            Action::BackOptions { key } => format!("back:{key}"),
            Action::Video { key } => format!("video:{key}"),
            Action::Audio { key } => format!("audio:{key}"),
            Action::Subs { key } => format!("subs:{key}"),
            Action::All { key } => format!("all:{key}"),
            Action::Format { key, format_id } => format!("fmt:{key}:{format_id}"),
            Action::ToggleLang { key, lang } => format!("lang:{key}:{lang}"),
            Action::Playlist { key, count } => format!("pl:{key}:{count}"),
            Action::PlaylistConfirm { key, count } => format!("plok:{key}:{count}"),
            Action::SetQuality(None) => "setq:auto".into(),
            Action::SetQuality(Some(h)) => format!("setq:{h}"),
            Action::Admin(view) => format!("adm:{}", view.as_str()),
        }
    }

    /// Whether the encoded form fits in a callback button.
    pub fn fits(&self) -> bool {
        self.encode().len() <= MAX_CALLBACK_LEN
    }

    /// The url key this action is bound to, if any.
    pub fn url_key(&self) -> Option<&str> {
        match self {
            Action::Video { key }
            | Action::Audio { key }
            | Action::Subs { key }
            | Action::All { key }
            | Action::Format { key, .. }
            | Action::ToggleLang { key, .. }
            | Action::SubsConfirm { key }
            | Action::BackOptions { key }
            | Action::Playlist { key, .. }
            | Action::PlaylistConfirm { key, .. } => Some(key),
            _ => None,
        }
    }
}
