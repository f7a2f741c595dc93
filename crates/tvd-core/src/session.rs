//! Pending conversations: the last analysed URL per user, which callback
//! buttons act on until it expires or is replaced.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::extractor::MediaInfo;
use crate::formats::FormatOption;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Single,
    Playlist,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub url: String,
    /// `platform::url_key(url)`; callbacks carrying another key are stale.
    pub url_key: String,
    pub platform: Platform,
    pub host: String,
    pub info: MediaInfo,
    pub formats: Vec<FormatOption>,
    pub kind: SessionKind,
    /// Languages ticked in the subtitle menu.
    pub selected_langs: Vec<String>,
    pub created_at: Instant,
}

impl Session {
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }
}

pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Session>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the user's session.
    pub fn put(&self, user_id: i64, session: Session) {
        self.lock().insert(user_id, session);
    }

    pub fn get(&self, user_id: i64) -> Option<Session> {
        self.get_at(user_id, Instant::now())
    }

    /// Live session for `user_id`; an expired one is dropped and None returned.
    pub fn get_at(&self, user_id: i64, now: Instant) -> Option<Session> {
        let mut map = self.lock();
        let expired = map.get(&user_id)?.is_expired(self.ttl, now);
        if expired {
            map.remove(&user_id);
            return None;
        }
        map.get(&user_id).cloned()
    }

    /// Tick or untick `lang`; returns the new selection, or None without a live session.
    pub fn toggle_lang(&self, user_id: i64, lang: &str) -> Option<Vec<String>> {
        let now = Instant::now();
        let mut map = self.lock();
        let session = map.get_mut(&user_id).filter(|s| !s.is_expired(self.ttl, now))?;
        if let Some(pos) = session.selected_langs.iter().position(|l| l == lang) {
            session.selected_langs.remove(pos);
        } else {
            session.selected_langs.push(lang.to_string());
        }
        Some(session.selected_langs.clone())
    }

    pub fn clear(&self, user_id: i64) -> bool {
        self.lock().remove(&user_id).is_some()
    }

    /// Drop every expired session; returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, s| !s.is_expired(self.ttl, now));
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
