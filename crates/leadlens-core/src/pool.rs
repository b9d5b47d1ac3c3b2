//! Credential pool: an ordered set of identities with a single active
//! index, rotated on transient failures.
//!
//! The pool is an explicit shared handle passed to the client, never
//! module-level state, so concurrent jobs in one process cannot
//! interfere through hidden globals. All operations take the lock for
//! the duration of one synchronous mutation; there is no await point
//! between reading and writing the active index or the counters.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::error::AppError;
use crate::models::{Identity, IdentityStatus};

/// Consecutive failures before an identity's status flips to `Error`.
const DEFAULT_FAILURE_THRESHOLD: u64 = 5;

#[derive(Debug)]
struct PoolInner {
    identities: Vec<Identity>,
    active: usize,
    /// Consecutive failure count per identity, reset on success.
    streaks: Vec<u64>,
}

/// Shared, thread-safe pool of rotating identities.
#[derive(Clone)]
pub struct CredentialPool {
    inner: Arc<Mutex<PoolInner>>,
    failure_threshold: u64,
}

impl CredentialPool {
    /// Build a pool from at least one identity.
    pub fn new(identities: Vec<Identity>) -> Result<Self, AppError> {
        if identities.is_empty() {
            return Err(AppError::Validation(
                "credential pool requires at least one identity".into(),
            ));
        }
        let streaks = vec![0; identities.len()];
        Ok(Self {
            inner: Arc::new(Mutex::new(PoolInner {
                identities,
                active: 0,
                streaks,
            })),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        })
    }

    /// Convenience constructor for a singleton pool.
    pub fn single(identity: Identity) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                identities: vec![identity],
                active: 0,
                streaks: vec![0],
            })),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u64) -> Self {
        self.failure_threshold = threshold;
        self
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned pool mutex");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.lock().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        false // construction requires at least one identity
    }

    /// Snapshot of the current active identity. Never blocks on I/O.
    pub fn active(&self) -> Identity {
        let inner = self.lock();
        inner.identities[inner.active].clone()
    }

    /// Snapshot of the active identity, recording the use: bumps its
    /// request counter and stamps `last_used_at`.
    pub fn active_for_request(&self) -> Identity {
        let mut inner = self.lock();
        let idx = inner.active;
        let identity = &mut inner.identities[idx];
        identity.request_count += 1;
        identity.last_used_at = Some(Utc::now());
        identity.clone()
    }

    /// Advance the active index `(current + 1) % len`. Rotating a
    /// singleton pool is a no-op that still counts as an attempt for
    /// the caller's bookkeeping.
    pub fn rotate(&self) {
        let mut inner = self.lock();
        let from = inner.active;
        inner.active = (inner.active + 1) % inner.identities.len();
        let to = inner.active;
        tracing::info!(
            from = %inner.identities[from].label,
            to = %inner.identities[to].label,
            "Rotated active identity"
        );
    }

    /// Index of the active identity (for tests and diagnostics).
    pub fn active_index(&self) -> usize {
        self.lock().active
    }

    pub fn record_success(&self, identity_id: &str) {
        let mut inner = self.lock();
        if let Some(pos) = inner.identities.iter().position(|i| i.id == identity_id) {
            inner.streaks[pos] = 0;
            if inner.identities[pos].status == IdentityStatus::Error {
                inner.identities[pos].status = IdentityStatus::Active;
            }
        }
    }

    pub fn record_failure(&self, identity_id: &str) {
        let threshold = self.failure_threshold;
        let mut inner = self.lock();
        if let Some(pos) = inner.identities.iter().position(|i| i.id == identity_id) {
            inner.identities[pos].error_count += 1;
            inner.streaks[pos] += 1;
            if inner.streaks[pos] >= threshold {
                inner.identities[pos].status = IdentityStatus::Error;
                tracing::warn!(
                    identity = %inner.identities[pos].label,
                    consecutive_failures = inner.streaks[pos],
                    "Identity marked as errored"
                );
            }
        }
    }

    /// Add an identity to the end of the rotation order.
    pub fn add(&self, identity: Identity) {
        let mut inner = self.lock();
        inner.identities.push(identity);
        inner.streaks.push(0);
    }

    /// Explicit admin removal. Refuses to empty the pool; fixes up the
    /// active index so it stays in bounds.
    pub fn remove(&self, identity_id: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if inner.identities.len() == 1 {
            return Err(AppError::Validation(
                "cannot remove the last identity from the pool".into(),
            ));
        }
        let Some(pos) = inner.identities.iter().position(|i| i.id == identity_id) else {
            return Err(AppError::NotFound(format!("identity {identity_id}")));
        };
        inner.identities.remove(pos);
        inner.streaks.remove(pos);
        if inner.active >= inner.identities.len() {
            inner.active = 0;
        } else if inner.active > pos {
            inner.active -= 1;
        }
        Ok(())
    }

    /// Snapshot of all identities, in rotation order.
    pub fn identities(&self) -> Vec<Identity> {
        self.lock().identities.clone()
    }
}
