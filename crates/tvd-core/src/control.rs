//! Job control for cancellation: shared abort tokens keyed by job id.
//!
//! The worker pool registers every running job here; `/cancel` (or shutdown)
//! sets the tokens and the extractor stops the subprocess on its next poll.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::JobId;

struct Registered {
    user_id: i64,
    token: Arc<AtomicBool>,
}

/// Registry of running job id -> (owner, abort token).
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<JobId, Registered>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking holder cannot leave the map half-updated, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Registered>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Registered>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a running job; returns the abort token to hand to the download.
    pub fn register(&self, job_id: JobId, user_id: i64) -> Arc<AtomicBool> {
        let token = Arc::new(AtomicBool::new(false));
        self.write().insert(
            job_id,
            Registered {
                user_id,
                token: Arc::clone(&token),
            },
        );
        token
    }

    /// Unregister a job (call when the job finishes, success or failure).
    pub fn unregister(&self, job_id: JobId) {
        self.write().remove(&job_id);
    }

    /// Request abort for one job. Returns false if it is not running.
    pub fn request_abort(&self, job_id: JobId) -> bool {
        match self.read().get(&job_id) {
            Some(r) => {
                r.token.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Abort every running job of `user_id`; returns how many were signalled.
    pub fn abort_user(&self, user_id: i64) -> usize {
        let jobs = self.read();
        let mut n = 0;
        for r in jobs.values().filter(|r| r.user_id == user_id) {
            r.token.store(true, Ordering::Relaxed);
            n += 1;
        }
        n
    }

    /// Abort everything (shutdown).
    pub fn abort_all(&self) -> usize {
        let jobs = self.read();
        for r in jobs.values() {
            r.token.store(true, Ordering::Relaxed);
        }
        jobs.len()
    }

    pub fn running_count(&self) -> usize {
        self.read().len()
    }
}
