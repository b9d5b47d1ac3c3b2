//! Concurrency-bounded candidate enrichment.
//!
//! Each candidate id becomes at most one [`EnrichedRecord`]: fetch the
//! entity, apply the inclusion filter, then gather the engagement
//! sample and text corpus for accepted candidates. Everything runs
//! under an explicit semaphore so at most the configured budget of
//! candidates holds an in-flight network call at any instant, and any
//! per-candidate failure discards only that candidate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::AppError;
use crate::models::{
    CandidateId, EnrichedRecord, Entity, FilterCriteria, format_average, format_count,
};
use crate::progress::{CandidateStatus, ProgressEvent, ProgressReporter};
use crate::traits::RemoteSource;
use crate::util::{detect_language, extract_email, jitter_between};

/// Tuning for one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Maximum simultaneous in-flight candidate tasks.
    pub concurrency: usize,

    /// Jittered pre-delay window applied per candidate before its
    /// first network call. Spreads burst load even at full
    /// concurrency.
    pub predelay_min: Duration,
    pub predelay_max: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            predelay_min: Duration::from_millis(300),
            predelay_max: Duration::from_millis(1200),
        }
    }
}

#[derive(Clone)]
pub struct EnrichmentPipeline<S: RemoteSource> {
    source: S,
    config: EnrichConfig,
}

impl<S: RemoteSource + 'static> EnrichmentPipeline<S> {
    pub fn new(source: S, config: EnrichConfig) -> Self {
        Self { source, config }
    }

    /// Enrich `candidate_ids` (truncated to the filter's target limit)
    /// and return the accepted records sorted descending by raw
    /// average engagement.
    ///
    /// Only parameter validation is fatal; network and parse failures
    /// discard individual candidates and never abort the batch.
    pub async fn process<R>(
        &self,
        candidate_ids: &[CandidateId],
        filter: &FilterCriteria,
        reporter: Arc<R>,
    ) -> Result<Vec<EnrichedRecord>, AppError>
    where
        R: ProgressReporter + 'static,
    {
        filter.validate()?;

        let total = candidate_ids.len().min(filter.target_limit);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        // Reports happen while holding this lock so the processed
        // count is non-decreasing in the order the reporter sees it.
        let settled: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
        let mut tasks: JoinSet<Option<EnrichedRecord>> = JoinSet::new();

        for id in candidate_ids.iter().take(total).cloned() {
            let source = self.source.clone();
            let filter = filter.clone();
            let config = self.config.clone();
            let semaphore = Arc::clone(&semaphore);
            let settled = Arc::clone(&settled);
            let reporter = Arc::clone(&reporter);

            tasks.spawn(async move {
                // Acquire only fails if the semaphore is closed,
                // which never happens here.
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };

                {
                    let count = settled.lock().unwrap_or_else(|p| p.into_inner());
                    reporter.report(ProgressEvent::Candidate {
                        processed: *count,
                        total,
                        label: Some(&id),
                        status: CandidateStatus::Processing,
                    });
                }

                tokio::time::sleep(jitter_between(config.predelay_min, config.predelay_max)).await;

                let (status, label, record) = enrich_candidate(&source, &id, &filter).await;

                {
                    let mut count = settled.lock().unwrap_or_else(|p| p.into_inner());
                    *count += 1;
                    reporter.report(ProgressEvent::Candidate {
                        processed: *count,
                        total,
                        label: label.as_deref(),
                        status,
                    });
                }

                record
            });
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Enrichment task aborted"),
            }
        }

        // Secondary keys keep re-runs over the same input deterministic.
        records.sort_by(|a, b| {
            b.raw_average_engagement
                .total_cmp(&a.raw_average_engagement)
                .then_with(|| b.raw_follower_count.cmp(&a.raw_follower_count))
                .then_with(|| a.handle.cmp(&b.handle))
        });
        Ok(records)
    }
}

/// Process one candidate end to end. Never panics and never
/// propagates; every failure maps to a status for the progress
/// stream.
async fn enrich_candidate<S: RemoteSource>(
    source: &S,
    id: &str,
    filter: &FilterCriteria,
) -> (CandidateStatus, Option<String>, Option<EnrichedRecord>) {
    let entity = match source.fetch_entity(id).await {
        Ok(Some(entity)) => entity,
        Ok(None) => return (CandidateStatus::Skipped, None, None),
        Err(e) => {
            tracing::warn!(candidate = %id, error = %e, "Entity fetch failed");
            return (CandidateStatus::Error, None, None);
        }
    };

    let handle = entity.handle.clone();
    if entity.is_private {
        return (CandidateStatus::Private, Some(handle), None);
    }
    if entity.follower_count < filter.min_followers {
        return (CandidateStatus::BelowMinFollowers, Some(handle), None);
    }
    if entity.follower_count >= filter.effective_max() {
        return (CandidateStatus::AboveMaxFollowers, Some(handle), None);
    }

    let (sample, corpus) = tokio::join!(
        source.fetch_engagement_sample(&entity.id),
        source.fetch_text_corpus(&entity.handle),
    );
    let (sample, corpus) = match (sample, corpus) {
        (Ok(sample), Ok(corpus)) => (sample, corpus),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(candidate = %handle, error = %e, "Enrichment fetch failed");
            return (CandidateStatus::Error, Some(handle), None);
        }
    };

    let record = build_record(entity, &sample, &corpus);
    (CandidateStatus::Processed, Some(handle), Some(record))
}

fn build_record(entity: Entity, sample: &[u64], corpus: &str) -> EnrichedRecord {
    let average = if sample.is_empty() {
        0.0
    } else {
        sample.iter().sum::<u64>() as f64 / sample.len() as f64
    };

    // Biography takes precedence for contact extraction; the corpus
    // is richer for language detection.
    let contact_email =
        extract_email(&entity.biography).or_else(|| extract_email(corpus));
    let detected_language =
        detect_language(corpus).or_else(|| detect_language(&entity.biography));

    EnrichedRecord {
        handle: entity.handle,
        display_name: entity.display_name,
        follower_count: format_count(entity.follower_count),
        raw_follower_count: entity.follower_count,
        profile_image_ref: entity.profile_image_url,
        profile_url: entity.profile_url,
        contact_email,
        average_engagement: format_average(average),
        raw_average_engagement: average,
        detected_language,
        is_private: entity.is_private,
        biography: entity.biography,
    }
}
