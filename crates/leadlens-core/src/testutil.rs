//! Scripted in-memory sources and reporters shared across unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{CandidateId, Entity, Identity, Page};
use crate::progress::{CandidateStatus, ProgressEvent, ProgressReporter};
use crate::traits::{IdentitySource, ListTarget, RemoteSource};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

pub fn make_entity(id: &str, handle: &str, followers: u64, is_private: bool) -> Entity {
    Entity {
        id: id.to_string(),
        handle: handle.to_string(),
        display_name: format!("{handle} display"),
        follower_count: followers,
        is_private,
        biography: String::new(),
        profile_image_url: Some(format!("https://cdn.test/{handle}.jpg")),
        profile_url: format!("https://remote.test/{handle}"),
    }
}

/// [`IdentitySource`] whose behavior depends on which identity makes
/// the call: identities registered via `failing_identity` always raise
/// a transient auth error, everyone else serves the scripted data.
#[derive(Clone, Default)]
pub struct ScriptedIdentitySource {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    failing: Mutex<HashSet<String>>,
    entities: Mutex<HashMap<String, Entity>>,
    resolutions: Mutex<HashMap<String, CandidateId>>,
    resolve_calls: AtomicUsize,
}

impl ScriptedIdentitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_identity(self, label: &str) -> Self {
        lock(&self.inner.failing).insert(label.to_string());
        self
    }

    pub fn insert_entity(&self, id: &str, entity: Entity) {
        lock(&self.inner.entities).insert(id.to_string(), entity);
    }

    pub fn insert_resolution(&self, handle: &str, id: &str) {
        lock(&self.inner.resolutions).insert(handle.to_ascii_lowercase(), id.to_string());
    }

    pub fn resolve_calls(&self) -> usize {
        self.inner.resolve_calls.load(Ordering::SeqCst)
    }

    fn check_identity(&self, identity: &Identity) -> Result<(), AppError> {
        if lock(&self.inner.failing).contains(&identity.label) {
            return Err(AppError::AuthRejected {
                identity: identity.label.clone(),
            });
        }
        Ok(())
    }
}

impl IdentitySource for ScriptedIdentitySource {
    async fn resolve_handle(
        &self,
        identity: &Identity,
        handle: &str,
    ) -> Result<CandidateId, AppError> {
        self.inner.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.check_identity(identity)?;
        lock(&self.inner.resolutions)
            .get(&handle.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("handle {handle}")))
    }

    async fn fetch_entity(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<Option<Entity>, AppError> {
        self.check_identity(identity)?;
        Ok(lock(&self.inner.entities).get(id).cloned())
    }

    async fn fetch_list_page(
        &self,
        identity: &Identity,
        _target: &ListTarget,
        _cursor: Option<&str>,
    ) -> Result<Page, AppError> {
        self.check_identity(identity)?;
        Ok(Page {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        })
    }

    async fn fetch_engagement_sample(
        &self,
        identity: &Identity,
        _id: &str,
    ) -> Result<Vec<u64>, AppError> {
        self.check_identity(identity)?;
        Ok(Vec::new())
    }

    async fn fetch_text_corpus(
        &self,
        identity: &Identity,
        _handle: &str,
    ) -> Result<String, AppError> {
        self.check_identity(identity)?;
        Ok(String::new())
    }
}

/// [`RemoteSource`] with a scripted page queue and per-id entity,
/// engagement, and corpus tables. Every call passes through an
/// in-flight gauge so tests can assert concurrency bounds.
#[derive(Clone, Default)]
pub struct MockSource {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    pages: Mutex<VecDeque<Result<Page, AppError>>>,
    last_page: Mutex<Option<Page>>,
    repeat_last: AtomicBool,
    cursors_seen: Mutex<Vec<Option<String>>>,
    page_calls: AtomicUsize,

    entities: Mutex<HashMap<String, Entity>>,
    failing_entities: Mutex<HashSet<String>>,
    engagement: Mutex<HashMap<String, Vec<u64>>>,
    corpus: Mutex<HashMap<String, String>>,
    resolutions: Mutex<HashMap<String, CandidateId>>,

    entity_calls: AtomicUsize,
    engagement_calls: AtomicUsize,

    call_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call open for `delay` so overlap is observable.
    pub fn with_call_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.call_delay) = delay;
        self
    }

    pub fn push_page(&self, page: Result<Page, AppError>) {
        lock(&self.inner.pages).push_back(page);
    }

    /// After the queue drains, keep serving the last successful page.
    pub fn repeat_last_page(&self) {
        self.inner.repeat_last.store(true, Ordering::SeqCst);
    }

    pub fn insert_entity(&self, id: &str, entity: Entity) {
        lock(&self.inner.entities).insert(id.to_string(), entity);
    }

    /// Make `fetch_entity` for this id raise a network error.
    pub fn fail_entity(&self, id: &str) {
        lock(&self.inner.failing_entities).insert(id.to_string());
    }

    pub fn insert_engagement(&self, id: &str, sample: Vec<u64>) {
        lock(&self.inner.engagement).insert(id.to_string(), sample);
    }

    pub fn insert_corpus(&self, handle: &str, text: &str) {
        lock(&self.inner.corpus).insert(handle.to_string(), text.to_string());
    }

    pub fn insert_resolution(&self, handle: &str, id: &str) {
        lock(&self.inner.resolutions).insert(handle.to_ascii_lowercase(), id.to_string());
    }

    pub fn page_calls(&self) -> usize {
        self.inner.page_calls.load(Ordering::SeqCst)
    }

    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        lock(&self.inner.cursors_seen).clone()
    }

    pub fn entity_calls(&self) -> usize {
        self.inner.entity_calls.load(Ordering::SeqCst)
    }

    pub fn engagement_calls(&self) -> usize {
        self.inner.engagement_calls.load(Ordering::SeqCst)
    }

    /// Peak number of simultaneously in-flight calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    async fn tracked<T>(&self, result: T) -> T {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *lock(&self.inner.call_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl RemoteSource for MockSource {
    async fn resolve_handle(&self, handle: &str) -> Result<CandidateId, AppError> {
        let result = lock(&self.inner.resolutions)
            .get(&handle.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("handle {handle}")));
        self.tracked(result).await
    }

    async fn fetch_entity(&self, id: &str) -> Result<Option<Entity>, AppError> {
        self.inner.entity_calls.fetch_add(1, Ordering::SeqCst);
        let result = if lock(&self.inner.failing_entities).contains(id) {
            Err(AppError::Network(format!("scripted failure for {id}")))
        } else {
            Ok(lock(&self.inner.entities).get(id).cloned())
        };
        self.tracked(result).await
    }

    async fn fetch_list_page(
        &self,
        _target: &ListTarget,
        cursor: Option<&str>,
    ) -> Result<Page, AppError> {
        self.inner.page_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.cursors_seen).push(cursor.map(String::from));

        let result = match lock(&self.inner.pages).pop_front() {
            Some(script) => {
                if let Ok(page) = &script {
                    *lock(&self.inner.last_page) = Some(page.clone());
                }
                script
            }
            None if self.inner.repeat_last.load(Ordering::SeqCst) => {
                lock(&self.inner.last_page)
                    .clone()
                    .ok_or_else(|| AppError::Http("page script exhausted".into()))
            }
            None => Err(AppError::Http("page script exhausted".into())),
        };
        self.tracked(result).await
    }

    async fn fetch_engagement_sample(&self, id: &str) -> Result<Vec<u64>, AppError> {
        self.inner.engagement_calls.fetch_add(1, Ordering::SeqCst);
        let result = Ok(lock(&self.inner.engagement)
            .get(id)
            .cloned()
            .unwrap_or_default());
        self.tracked(result).await
    }

    async fn fetch_text_corpus(&self, handle: &str) -> Result<String, AppError> {
        let result = Ok(lock(&self.inner.corpus)
            .get(handle)
            .cloned()
            .unwrap_or_default());
        self.tracked(result).await
    }
}

/// Reporter that records everything it sees, for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    page_totals: Mutex<Vec<usize>>,
    candidates: Mutex<Vec<(usize, CandidateStatus)>>,
    finished: Mutex<Vec<(String, usize, bool)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running `collected` totals from page events, in arrival order.
    pub fn page_totals(&self) -> Vec<usize> {
        lock(&self.page_totals).clone()
    }

    /// `processed` values from every candidate event, in arrival order.
    pub fn processed_counts(&self) -> Vec<usize> {
        lock(&self.candidates).iter().map(|(n, _)| *n).collect()
    }

    /// Final statuses only, `Processing` markers excluded.
    pub fn settled_statuses(&self) -> Vec<CandidateStatus> {
        lock(&self.candidates)
            .iter()
            .filter(|(_, s)| *s != CandidateStatus::Processing)
            .map(|(_, s)| *s)
            .collect()
    }

    /// `(target, records, complete)` per finished target.
    pub fn finished_targets(&self) -> Vec<(String, usize, bool)> {
        lock(&self.finished).clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::TargetStarted { .. } => {}
            ProgressEvent::PageFetched { collected, .. } => {
                lock(&self.page_totals).push(collected);
            }
            ProgressEvent::Candidate {
                processed, status, ..
            } => {
                lock(&self.candidates).push((processed, status));
            }
            ProgressEvent::TargetFinished {
                target,
                records,
                complete,
            } => {
                lock(&self.finished).push((target.to_string(), records, complete));
            }
        }
    }
}
