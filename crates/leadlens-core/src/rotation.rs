//! Rotation-retry layer over a single-attempt source.
//!
//! `RotatingSource` wraps any [`IdentitySource`] and a
//! [`CredentialPool`], turning per-identity attempts into the public
//! [`RemoteSource`] contract: on a transient (auth/rate-limit class)
//! failure it rotates the active identity and retries the same
//! logical call, at most `pool.len()` attempts total. Structural
//! failures, like a resource that does not exist, surface immediately,
//! since rotating identities cannot fix those.
//!
//! The retry is an explicit bounded loop, not recursion, so the
//! attempt budget never depends on call-stack depth.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;

use crate::error::AppError;
use crate::models::{CandidateId, Entity, Identity, Page};
use crate::pool::CredentialPool;
use crate::traits::{IdentitySource, ListTarget, RemoteSource};

const RESOLVE_CACHE_CAPACITY: u64 = 10_000;
const RESOLVE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// The public client: a single-attempt source plus the rotation policy.
#[derive(Clone)]
pub struct RotatingSource<S: IdentitySource> {
    inner: S,
    pool: CredentialPool,
    /// Handle → id; resolutions are stable enough to cache across
    /// identities within a run.
    resolve_cache: Cache<String, CandidateId>,
}

impl<S: IdentitySource> RotatingSource<S> {
    pub fn new(inner: S, pool: CredentialPool) -> Self {
        Self {
            inner,
            pool,
            resolve_cache: Cache::builder()
                .max_capacity(RESOLVE_CACHE_CAPACITY)
                .time_to_live(RESOLVE_CACHE_TTL)
                .build(),
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Run one logical call, rotating through the pool on transient
    /// failures. Counter updates and the index advance are atomic per
    /// operation on the pool's lock.
    async fn with_rotation<T, F, Fut>(&self, op: F) -> Result<T, AppError>
    where
        F: Fn(Identity) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let attempts = self.pool.len();
        let mut last_error = None;

        for attempt in 1..=attempts {
            let identity = self.pool.active_for_request();
            match op(identity.clone()).await {
                Ok(value) => {
                    self.pool.record_success(&identity.id);
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        identity = %identity.label,
                        fingerprint = %identity.fingerprint(),
                        attempt,
                        attempts,
                        error = %e,
                        "Transient failure, rotating identity"
                    );
                    self.pool.record_failure(&identity.id);
                    self.pool.rotate();
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::PoolExhausted {
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".into()),
        })
    }
}

impl<S: IdentitySource> RemoteSource for RotatingSource<S> {
    async fn resolve_handle(&self, handle: &str) -> Result<CandidateId, AppError> {
        let key = handle.to_ascii_lowercase();
        if let Some(hit) = self.resolve_cache.get(&key).await {
            tracing::debug!(%handle, id = %hit, "Resolve cache hit");
            return Ok(hit);
        }
        let id = self
            .with_rotation(|identity| async move {
                self.inner.resolve_handle(&identity, handle).await
            })
            .await?;
        self.resolve_cache.insert(key, id.clone()).await;
        Ok(id)
    }

    async fn fetch_entity(&self, id: &str) -> Result<Option<Entity>, AppError> {
        self.with_rotation(|identity| async move { self.inner.fetch_entity(&identity, id).await })
            .await
    }

    async fn fetch_list_page(
        &self,
        target: &ListTarget,
        cursor: Option<&str>,
    ) -> Result<Page, AppError> {
        self.with_rotation(|identity| async move {
            self.inner.fetch_list_page(&identity, target, cursor).await
        })
        .await
    }

    async fn fetch_engagement_sample(&self, id: &str) -> Result<Vec<u64>, AppError> {
        self.with_rotation(|identity| async move {
            self.inner.fetch_engagement_sample(&identity, id).await
        })
        .await
    }

    async fn fetch_text_corpus(&self, handle: &str) -> Result<String, AppError> {
        self.with_rotation(|identity| async move {
            self.inner.fetch_text_corpus(&identity, handle).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthMaterial;
    use crate::testutil::ScriptedIdentitySource;

    #[tokio::test]
    async fn succeeds_after_exactly_one_rotation() {
        // Identity #1 always raises a transient error, #2 succeeds.
        let source = ScriptedIdentitySource::new().failing_identity("acct-0");
        let pool = CredentialPool::new(vec![
            Identity::new("acct-0", AuthMaterial::from_cookie("csrftoken=a")),
            Identity::new("acct-1", AuthMaterial::from_cookie("csrftoken=b")),
        ])
        .unwrap();
        source.insert_entity("77", crate::testutil::make_entity("77", "target", 5_000, false));

        let client = RotatingSource::new(source.clone(), pool);
        let entity = client.fetch_entity("77").await.unwrap().unwrap();

        assert_eq!(entity.handle, "target");
        assert_eq!(client.pool().active_index(), 1, "exactly one rotation");
        let identities = client.pool().identities();
        assert_eq!(identities[0].error_count, 1);
        assert_eq!(identities[0].request_count, 1);
        assert_eq!(identities[1].request_count, 1);
    }

    #[tokio::test]
    async fn exhausting_the_pool_surfaces_the_last_error() {
        let source = ScriptedIdentitySource::new()
            .failing_identity("acct-0")
            .failing_identity("acct-1");
        let pool = CredentialPool::new(vec![
            Identity::new("acct-0", AuthMaterial::from_cookie("csrftoken=a")),
            Identity::new("acct-1", AuthMaterial::from_cookie("csrftoken=b")),
        ])
        .unwrap();
        source.insert_entity("77", crate::testutil::make_entity("77", "target", 5_000, false));

        let client = RotatingSource::new(source, pool);
        let err = client.fetch_entity("77").await.unwrap_err();

        match err {
            AppError::PoolExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected PoolExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn structural_errors_do_not_rotate() {
        let source = ScriptedIdentitySource::new();
        let pool = CredentialPool::new(vec![
            Identity::new("acct-0", AuthMaterial::from_cookie("csrftoken=a")),
            Identity::new("acct-1", AuthMaterial::from_cookie("csrftoken=b")),
        ])
        .unwrap();

        let client = RotatingSource::new(source, pool);
        let err = client.resolve_handle("nobody_here").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(client.pool().active_index(), 0, "no rotation on NotFound");
    }

    #[tokio::test]
    async fn resolved_handles_are_cached() {
        let source = ScriptedIdentitySource::new();
        source.insert_resolution("Somebody", "901");
        let pool = CredentialPool::single(Identity::new(
            "only",
            AuthMaterial::from_cookie("csrftoken=x"),
        ));

        let client = RotatingSource::new(source.clone(), pool);
        assert_eq!(client.resolve_handle("Somebody").await.unwrap(), "901");
        assert_eq!(client.resolve_handle("somebody").await.unwrap(), "901");
        assert_eq!(source.resolve_calls(), 1, "second lookup served from cache");
    }

    #[tokio::test]
    async fn singleton_pool_gets_a_single_attempt() {
        let source = ScriptedIdentitySource::new().failing_identity("only");
        let pool = CredentialPool::single(Identity::new(
            "only",
            AuthMaterial::from_cookie("csrftoken=x"),
        ));
        source.insert_entity("77", crate::testutil::make_entity("77", "t", 1, false));

        let client = RotatingSource::new(source, pool);
        let err = client.fetch_entity("77").await.unwrap_err();
        assert!(matches!(err, AppError::PoolExhausted { attempts: 1, .. }));
    }
}
