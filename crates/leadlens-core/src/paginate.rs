//! Cursor-following pagination with a hard page ceiling and jittered
//! inter-page delays.

use std::time::Duration;

use crate::progress::{ProgressEvent, ProgressReporter};
use crate::traits::{ListTarget, RemoteSource};
use crate::util::jitter_between;

/// Tuning for one pagination sequence.
#[derive(Debug, Clone)]
pub struct PageWalkConfig {
    /// Hard safety ceiling on page count. Stops runaway loops against
    /// a misbehaving or adversarial remote.
    pub page_ceiling: u32,

    /// Randomized delay window between consecutive page fetches.
    /// Applied between pages, never before the first.
    pub delay_min: Duration,
    pub delay_max: Duration,
}

impl Default for PageWalkConfig {
    fn default() -> Self {
        Self {
            page_ceiling: 50,
            delay_min: Duration::from_millis(500),
            delay_max: Duration::from_millis(1200),
        }
    }
}

/// Result of a pagination sequence. `complete == false` means a page
/// failure stopped the walk early and the list may be incomplete;
/// the accumulated partial results are still returned, because a
/// partial candidate list is more useful than none.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub ids: Vec<crate::models::CandidateId>,
    pub complete: bool,
}

/// Walks a listing's cursor chain, accumulating candidate ids.
///
/// Pages within one sequence are strictly sequential; the cursor
/// dependency forbids overlapping fetches. Duplicate items across
/// pages pass through uncorrected; dedup is the caller's concern.
#[derive(Clone)]
pub struct Paginator<S: RemoteSource> {
    source: S,
    config: PageWalkConfig,
}

impl<S: RemoteSource> Paginator<S> {
    pub fn new(source: S, config: PageWalkConfig) -> Self {
        Self { source, config }
    }

    /// Collect up to `limit` candidate ids from the target's listing.
    pub async fn collect<R: ProgressReporter>(
        &self,
        target: &ListTarget,
        limit: usize,
        reporter: &R,
    ) -> PageOutcome {
        if limit == 0 {
            return PageOutcome {
                ids: Vec::new(),
                complete: true,
            };
        }

        let label = target.label();
        let mut ids: Vec<crate::models::CandidateId> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count: u32 = 0;
        let mut complete = true;

        loop {
            match self
                .source
                .fetch_list_page(target, cursor.as_deref())
                .await
            {
                Ok(page) => {
                    page_count += 1;
                    ids.extend(page.items);
                    reporter.report(ProgressEvent::PageFetched {
                        target: &label,
                        page: page_count,
                        collected: ids.len(),
                    });

                    if !page.has_more || ids.len() >= limit {
                        break;
                    }
                    if page_count >= self.config.page_ceiling {
                        tracing::warn!(
                            target = %label,
                            pages = page_count,
                            "Page ceiling reached, stopping pagination"
                        );
                        break;
                    }

                    cursor = page.next_cursor;
                    tokio::time::sleep(jitter_between(
                        self.config.delay_min,
                        self.config.delay_max,
                    ))
                    .await;
                }
                Err(e) => {
                    // Fail open: keep whatever was accumulated.
                    tracing::warn!(
                        target = %label,
                        page = page_count + 1,
                        error = %e,
                        "Page fetch failed, returning partial results"
                    );
                    complete = false;
                    break;
                }
            }
        }

        ids.truncate(limit);
        PageOutcome { ids, complete }
    }
}
