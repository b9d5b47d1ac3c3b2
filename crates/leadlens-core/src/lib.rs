pub mod enrich;
pub mod error;
pub mod job;
pub mod models;
pub mod paginate;
pub mod pool;
pub mod progress;
pub mod rotation;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use enrich::{EnrichConfig, EnrichmentPipeline};
pub use error::AppError;
pub use job::{JobRunner, LeadJob, ListKind, Target, TargetReport};
pub use models::{
    AuthMaterial, CandidateId, EnrichedRecord, Entity, FilterCriteria, Identity, IdentityStatus,
    Page,
};
pub use paginate::{PageOutcome, PageWalkConfig, Paginator};
pub use pool::CredentialPool;
pub use progress::{CandidateStatus, ProgressEvent, ProgressReporter, TracingReporter};
pub use rotation::RotatingSource;
pub use traits::{IdentitySource, ListTarget, RemoteSource};
