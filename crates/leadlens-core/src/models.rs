use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque external identifier for a prospective subject.
pub type CandidateId = String;

/// Lifecycle state of a pooled identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Active,
    Inactive,
    Error,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::Active => "active",
            IdentityStatus::Inactive => "inactive",
            IdentityStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credential blob plus the tokens derived from it.
///
/// The cookie header is the source of truth; the csrf token and
/// session user id are extracted from it at load time so the HTTP
/// layer never has to re-parse per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthMaterial {
    pub cookie: String,
    pub csrf_token: String,
    pub session_user_id: String,
}

impl AuthMaterial {
    /// Parse a raw cookie header, extracting the derived tokens.
    pub fn from_cookie(cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        let csrf_token = cookie_value(&cookie, "csrftoken").unwrap_or_default();
        let session_user_id = cookie_value(&cookie, "ds_user_id").unwrap_or_default();
        Self {
            cookie,
            csrf_token,
            session_user_id,
        }
    }
}

/// Extract a single value from a `name=value; ...` cookie header.
fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// One credential bundle in the pool.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub label: String,
    pub auth: AuthMaterial,
    pub request_count: u64,
    pub error_count: u64,
    pub status: IdentityStatus,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(label: impl Into<String>, auth: AuthMaterial) -> Self {
        let label = label.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            auth,
            request_count: 0,
            error_count: 0,
            status: IdentityStatus::Active,
            last_used_at: None,
        }
    }

    /// Short stable digest of the credential blob, safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.auth.cookie.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }
}

/// The remote service's profile snapshot for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: CandidateId,
    pub handle: String,
    pub display_name: String,
    pub follower_count: u64,
    pub is_private: bool,
    pub biography: String,
    pub profile_image_url: Option<String>,
    /// Canonical public URL for the profile, built by the client from
    /// its request profile.
    pub profile_url: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<CandidateId>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Final per-candidate output row, ordered descending by
/// `raw_average_engagement` before export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub handle: String,
    pub display_name: String,
    pub follower_count: String,
    pub raw_follower_count: u64,
    pub profile_image_ref: Option<String>,
    pub profile_url: String,
    pub contact_email: Option<String>,
    pub average_engagement: String,
    pub raw_average_engagement: f64,
    pub detected_language: Option<String>,
    pub is_private: bool,
    pub biography: String,
}

/// Inclusion filter for one run.
///
/// Boundary semantics: inclusive minimum, exclusive maximum. A
/// candidate is accepted iff `min_followers <= count < max_followers`
/// (with `max_followers == 0` meaning unbounded).
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    pub min_followers: u64,
    /// 0 means unbounded (mapped to `u64::MAX`).
    pub max_followers: u64,
    pub target_limit: usize,
}

impl FilterCriteria {
    pub fn new(min_followers: u64, max_followers: u64, target_limit: usize) -> Self {
        Self {
            min_followers,
            max_followers,
            target_limit,
        }
    }

    /// Reject invalid bounds before any network activity.
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.max_followers != 0 && self.max_followers <= self.min_followers {
            return Err(crate::error::AppError::Validation(format!(
                "max_followers ({}) must exceed min_followers ({}) or be 0 for unbounded",
                self.max_followers, self.min_followers
            )));
        }
        Ok(())
    }

    /// The effective upper bound with the unbounded sentinel applied.
    pub fn effective_max(&self) -> u64 {
        if self.max_followers == 0 {
            u64::MAX
        } else {
            self.max_followers
        }
    }

    /// Whether a follower count falls inside `[min, max)`.
    pub fn admits(&self, follower_count: u64) -> bool {
        follower_count >= self.min_followers && follower_count < self.effective_max()
    }
}

///// Human-friendly count formatting: 1_234_567 → "1.2M", 3_400 → "3.4k".
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        trim_zero(format!("{:.1}", n as f64 / 1_000_000.0)) + "M"
    } else if n >= 1_000 {
        trim_zero(format!("{:.1}", n as f64 / 1_000.0)) + "k"
    } else {
        n.to_string()
    }
}

/// Same formatting for fractional engagement averages.
pub fn format_average(avg: f64) -> String {
    if avg >= 1_000_000.0 {
        trim_zero(format!("{:.1}", avg / 1_000_000.0)) + "M"
    } else if avg >= 1_000.0 {
        trim_zero(format!("{:.1}", avg / 1_000.0)) + "k"
    } else {
        trim_zero(format!("{avg:.2}"))
    }
}

fn trim_zero(s: String) -> String {
    s.trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
