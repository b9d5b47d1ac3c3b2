use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{CandidateId, Entity, Identity, Page};

/// Which listing a pagination sequence walks.
///
/// The remote exposes three list endpoints that differ only in
/// request shaping; consumers treat them through this single
/// parameterization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListTarget {
    Followers(CandidateId),
    Following(CandidateId),
    Hashtag(String),
}

impl ListTarget {
    pub fn label(&self) -> String {
        match self {
            ListTarget::Followers(id) => format!("followers of {id}"),
            ListTarget::Following(id) => format!("following of {id}"),
            ListTarget::Hashtag(tag) => format!("#{tag}"),
        }
    }
}

/// One attempt against the remote with an explicit identity.
///
/// Implementations make exactly one logical request per call: no
/// retry, no rotation. [`RotatingSource`](crate::rotation::RotatingSource)
/// layers the retry/rotation policy on top.
pub trait IdentitySource: Send + Sync + Clone {
    /// Resolve a handle to the remote's id via search. Fails with
    /// `NotFound` when no exact case-insensitive match exists (unless
    /// the implementation is configured to fall back to the first
    /// result).
    fn resolve_handle(
        &self,
        identity: &Identity,
        handle: &str,
    ) -> impl Future<Output = Result<CandidateId, AppError>> + Send;

    /// Fetch a profile snapshot. `Ok(None)` on a remote "not found";
    /// transient errors on auth/rate-limit class failures.
    fn fetch_entity(
        &self,
        identity: &Identity,
        id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, AppError>> + Send;

    /// Fetch a single listing page. The cursor is opaque and must be
    /// threaded through unchanged.
    fn fetch_list_page(
        &self,
        identity: &Identity,
        target: &ListTarget,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, AppError>> + Send;

    /// Per-content interaction counts for an entity. Empty when the
    /// entity has no qualifying content, which is never an error.
    fn fetch_engagement_sample(
        &self,
        identity: &Identity,
        id: &str,
    ) -> impl Future<Output = Result<Vec<u64>, AppError>> + Send;

    /// Concatenated recent textual content for language/email
    /// detection. Empty string on failure.
    fn fetch_text_corpus(
        &self,
        identity: &Identity,
        handle: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// The public remote-source contract consumed by the paginator and
/// the enrichment pipeline. Identity selection, rotation, and
/// bounded retry happen behind this trait.
pub trait RemoteSource: Send + Sync + Clone {
    fn resolve_handle(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<CandidateId, AppError>> + Send;

    fn fetch_entity(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, AppError>> + Send;

    fn fetch_list_page(
        &self,
        target: &ListTarget,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page, AppError>> + Send;

    fn fetch_engagement_sample(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<u64>, AppError>> + Send;

    fn fetch_text_corpus(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}
