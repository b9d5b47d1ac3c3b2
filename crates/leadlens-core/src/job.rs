//! Multi-target job orchestration: resolve, paginate, enrich, report.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::enrich::{EnrichConfig, EnrichmentPipeline};
use crate::error::AppError;
use crate::models::{EnrichedRecord, FilterCriteria};
use crate::paginate::{PageWalkConfig, Paginator};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::traits::{ListTarget, RemoteSource};

/// One scrape target as the caller names it, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Handle(String),
    Hashtag(String),
}

impl Target {
    pub fn label(&self) -> String {
        match self {
            Target::Handle(handle) => handle.clone(),
            Target::Hashtag(tag) => format!("#{tag}"),
        }
    }
}

/// Which listing to walk for handle targets. Hashtag targets ignore
/// this and walk the tag's content listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListKind {
    #[default]
    Followers,
    Following,
}

#[derive(Debug, Clone)]
pub struct LeadJob {
    pub targets: Vec<Target>,
    pub list_kind: ListKind,
    pub filter: FilterCriteria,
}

/// Outcome for one target. `warning` carries a resolve or pagination
/// failure that did not stop sibling targets.
#[derive(Debug)]
pub struct TargetReport {
    pub target: String,
    pub records: Vec<EnrichedRecord>,
    pub complete: bool,
    pub warning: Option<String>,
}

/// Runs a [`LeadJob`] target by target. Only filter validation is
/// fatal; everything else degrades to per-target warnings.
pub struct JobRunner<S: RemoteSource + 'static> {
    source: S,
    walk: PageWalkConfig,
    enrich: EnrichConfig,
}

impl<S: RemoteSource + 'static> JobRunner<S> {
    pub fn new(source: S, walk: PageWalkConfig, enrich: EnrichConfig) -> Self {
        Self {
            source,
            walk,
            enrich,
        }
    }

    /// Cancellation is honored between targets so in-flight work
    /// settles instead of being killed mid-request.
    pub async fn run<R>(
        &self,
        job: &LeadJob,
        cancel: &CancellationToken,
        reporter: Arc<R>,
    ) -> Result<Vec<TargetReport>, AppError>
    where
        R: ProgressReporter + 'static,
    {
        job.filter.validate()?;

        let paginator = Paginator::new(self.source.clone(), self.walk.clone());
        let pipeline = EnrichmentPipeline::new(self.source.clone(), self.enrich.clone());
        let mut reports = Vec::with_capacity(job.targets.len());

        for target in &job.targets {
            if cancel.is_cancelled() {
                tracing::info!(
                    remaining = job.targets.len() - reports.len(),
                    "Job cancelled, skipping remaining targets"
                );
                break;
            }

            let label = target.label();
            reporter.report(ProgressEvent::TargetStarted { target: &label });

            let list_target = match self.resolve_target(target, job.list_kind).await {
                Ok(list_target) => list_target,
                Err(e) => {
                    tracing::warn!(target = %label, error = %e, "Target resolution failed");
                    reports.push(TargetReport {
                        target: label,
                        records: Vec::new(),
                        complete: false,
                        warning: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let outcome = paginator
                .collect(&list_target, job.filter.target_limit, reporter.as_ref())
                .await;
            let warning = (!outcome.complete)
                .then(|| format!("pagination stopped early after {} candidates", outcome.ids.len()));

            let records = pipeline
                .process(&outcome.ids, &job.filter, Arc::clone(&reporter))
                .await?;

            reporter.report(ProgressEvent::TargetFinished {
                target: &label,
                records: records.len(),
                complete: outcome.complete,
            });
            reports.push(TargetReport {
                target: label,
                records,
                complete: outcome.complete,
                warning,
            });
        }

        Ok(reports)
    }

    async fn resolve_target(
        &self,
        target: &Target,
        list_kind: ListKind,
    ) -> Result<ListTarget, AppError> {
        match target {
            Target::Hashtag(tag) => Ok(ListTarget::Hashtag(tag.clone())),
            Target::Handle(handle) => {
                let id = self.source.resolve_handle(handle).await?;
                Ok(match list_kind {
                    ListKind::Followers => ListTarget::Followers(id),
                    ListKind::Following => ListTarget::Following(id),
                })
            }
        }
    }
}
