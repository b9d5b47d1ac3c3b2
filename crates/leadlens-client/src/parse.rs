//! Pure response parsers, one per endpoint family.
//!
//! Each takes a raw body and returns domain types. The remote serves
//! soft-blocks as success statuses with a missing or reshaped `data`
//! envelope, so envelope-level mismatches map to the transient
//! `MalformedPayload` rather than a structural failure.

use serde::Deserialize;
use serde_json::Value;

use leadlens_core::error::AppError;
use leadlens_core::models::{CandidateId, Entity, Page};

use crate::profile::{MatchFallback, RequestProfile};

fn malformed<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> AppError + '_ {
    move |e| AppError::MalformedPayload(format!("{context}: {e}"))
}

/// `pk`/`id` fields arrive as either JSON strings or numbers
/// depending on the endpoint revision.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Entity (profile snapshot)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EntityEnvelope {
    data: Option<EntityData>,
}

#[derive(Deserialize)]
struct EntityData {
    user: Option<WireUser>,
}

#[derive(Deserialize)]
struct WireUser {
    id: Value,
    username: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    follower_count: Option<u64>,
    #[serde(default)]
    is_private: Option<bool>,
    #[serde(default)]
    biography: Option<String>,
    #[serde(default)]
    profile_pic_url: Option<String>,
}

/// `Ok(None)` when the envelope is intact but carries no user (the
/// account is gone); `MalformedPayload` when the envelope itself is
/// missing.
pub fn parse_entity(body: &str, profile: &RequestProfile) -> Result<Option<Entity>, AppError> {
    let envelope: EntityEnvelope =
        serde_json::from_str(body).map_err(malformed("entity response"))?;
    let data = envelope
        .data
        .ok_or_else(|| AppError::MalformedPayload("entity response missing data".into()))?;

    let Some(user) = data.user else {
        return Ok(None);
    };
    let id = id_string(&user.id)
        .ok_or_else(|| AppError::MalformedPayload("entity id is not a string or number".into()))?;

    Ok(Some(Entity {
        profile_url: profile.profile_url(&user.username),
        id,
        display_name: user.full_name.unwrap_or_default(),
        follower_count: user.follower_count.unwrap_or_default(),
        is_private: user.is_private.unwrap_or_default(),
        biography: user.biography.unwrap_or_default(),
        profile_image_url: user.profile_pic_url,
        handle: user.username,
    }))
}

// ---------------------------------------------------------------------------
// Handle search
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchEnvelope {
    data: Option<SearchData>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(rename = "xdt_api__v1__fbsearch__topsearch_connection")]
    connection: Option<SearchConnection>,
}

#[derive(Deserialize)]
struct SearchConnection {
    #[serde(default)]
    users: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    user: Option<SearchUser>,
}

#[derive(Deserialize)]
struct SearchUser {
    id: Value,
    username: String,
}

/// Pick the queried handle out of a ranked search result list.
pub fn parse_search(
    body: &str,
    handle: &str,
    fallback: MatchFallback,
) -> Result<CandidateId, AppError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(malformed("search response"))?;
    let users = envelope
        .data
        .and_then(|d| d.connection)
        .ok_or_else(|| AppError::MalformedPayload("search response missing connection".into()))?
        .users;

    let candidates: Vec<&SearchUser> = users.iter().filter_map(|hit| hit.user.as_ref()).collect();
    if candidates.is_empty() {
        return Err(AppError::NotFound(format!("handle {handle}")));
    }

    let exact = candidates
        .iter()
        .find(|u| u.username.eq_ignore_ascii_case(handle));
    let chosen = match (exact, fallback) {
        (Some(user), _) => user,
        (None, MatchFallback::FirstResult) => candidates[0],
        (None, MatchFallback::Strict) => {
            return Err(AppError::NotFound(format!(
                "handle {handle} not in search results"
            )));
        }
    };

    id_string(&chosen.id)
        .ok_or_else(|| AppError::MalformedPayload("search id is not a string or number".into()))
}

// ---------------------------------------------------------------------------
// Listing page
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    users: Option<Vec<ListUser>>,
    #[serde(default)]
    has_more: Option<bool>,
    #[serde(default)]
    next_max_id: Option<String>,
}

#[derive(Deserialize)]
struct ListUser {
    #[serde(default)]
    pk: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

pub fn parse_list_page(body: &str) -> Result<Page, AppError> {
    let envelope: ListEnvelope =
        serde_json::from_str(body).map_err(malformed("listing response"))?;
    let users = envelope
        .users
        .ok_or_else(|| AppError::MalformedPayload("listing response missing users".into()))?;

    let items = users
        .iter()
        .filter_map(|u| u.pk.as_ref().or(u.id.as_ref()).and_then(id_string))
        .collect();

    Ok(Page {
        items,
        next_cursor: envelope.next_max_id,
        has_more: envelope.has_more.unwrap_or(false),
    })
}

// ---------------------------------------------------------------------------
// Engagement sample
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EngagementEnvelope {
    data: Option<EngagementData>,
}

#[derive(Deserialize)]
struct EngagementData {
    #[serde(rename = "xdt_api__v1__clips__user__connection_v2")]
    connection: Option<EngagementConnection>,
}

#[derive(Deserialize)]
struct EngagementConnection {
    #[serde(default)]
    edges: Vec<EngagementEdge>,
}

#[derive(Deserialize)]
struct EngagementEdge {
    node: Option<EngagementNode>,
}

#[derive(Deserialize)]
struct EngagementNode {
    media: Option<EngagementMedia>,
}

#[derive(Deserialize)]
struct EngagementMedia {
    #[serde(default)]
    play_count: Option<u64>,
    #[serde(default)]
    clips_tab_pinned_user_ids: Vec<Value>,
}

/// Interaction counts of the most recent items, pinned items
/// excluded (pinning skews the recency sample).
pub fn parse_engagement(body: &str, sample_size: usize) -> Result<Vec<u64>, AppError> {
    let envelope: EngagementEnvelope =
        serde_json::from_str(body).map_err(malformed("engagement response"))?;
    let edges = envelope
        .data
        .and_then(|d| d.connection)
        .map(|c| c.edges)
        .unwrap_or_default();

    let mut sample: Vec<u64> = edges
        .into_iter()
        .filter_map(|edge| edge.node.and_then(|n| n.media))
        .filter(|media| media.clips_tab_pinned_user_ids.is_empty())
        .filter_map(|media| media.play_count)
        .collect();
    sample.truncate(sample_size);
    Ok(sample)
}

// ---------------------------------------------------------------------------
// Text corpus
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CorpusEnvelope {
    data: Option<CorpusData>,
}

#[derive(Deserialize)]
struct CorpusData {
    #[serde(rename = "xdt_api__v1__feed__user_timeline_graphql_connection")]
    connection: Option<CorpusConnection>,
}

#[derive(Deserialize)]
struct CorpusConnection {
    #[serde(default)]
    edges: Vec<CorpusEdge>,
}

#[derive(Deserialize)]
struct CorpusEdge {
    node: Option<CorpusNode>,
}

#[derive(Deserialize)]
struct CorpusNode {
    caption: Option<Caption>,
}

#[derive(Deserialize)]
struct Caption {
    #[serde(default)]
    text: Option<String>,
}

/// Non-empty captions of recent items joined with `", "`. An empty
/// or reshaped feed yields an empty string rather than an error.
pub fn parse_corpus(body: &str) -> Result<String, AppError> {
    let envelope: CorpusEnvelope =
        serde_json::from_str(body).map_err(malformed("corpus response"))?;
    let edges = envelope
        .data
        .and_then(|d| d.connection)
        .map(|c| c.edges)
        .unwrap_or_default();

    let captions: Vec<String> = edges
        .into_iter()
        .filter_map(|edge| edge.node.and_then(|n| n.caption).and_then(|c| c.text))
        .filter(|text| !text.is_empty())
        .collect();
    Ok(captions.join(", "))
}

// ---------------------------------------------------------------------------
// Hashtag page
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct HashtagEnvelope {
    data: Option<HashtagData>,
}

#[derive(Deserialize)]
struct HashtagData {
    #[serde(default)]
    top: Option<HashtagFeed>,
    #[serde(default)]
    recent: Option<HashtagFeed>,
}

#[derive(Deserialize)]
struct HashtagFeed {
    #[serde(default)]
    sections: Vec<HashtagSection>,
}

#[derive(Deserialize)]
struct HashtagSection {
    layout_content: Option<LayoutContent>,
}

#[derive(Deserialize)]
struct LayoutContent {
    #[serde(default)]
    medias: Vec<MediaWrapper>,
}

#[derive(Deserialize)]
struct MediaWrapper {
    media: Option<HashtagMedia>,
}

#[derive(Deserialize)]
struct HashtagMedia {
    user: Option<HashtagUser>,
}

#[derive(Deserialize)]
struct HashtagUser {
    pk: Value,
}

/// Owner ids across the tag's top and recent sections, deduplicated
/// with first-seen order kept. The endpoint is not cursor-paginated,
/// so this is always a single terminal page.
pub fn parse_hashtag_page(body: &str) -> Result<Page, AppError> {
    let envelope: HashtagEnvelope =
        serde_json::from_str(body).map_err(malformed("hashtag response"))?;
    let data = envelope
        .data
        .ok_or_else(|| AppError::MalformedPayload("hashtag response missing data".into()))?;

    let mut seen = std::collections::HashSet::new();
    let mut items = Vec::new();
    for feed in [data.top, data.recent].into_iter().flatten() {
        for section in feed.sections {
            let medias = section
                .layout_content
                .map(|l| l.medias)
                .unwrap_or_default();
            for wrapper in medias {
                let Some(id) = wrapper
                    .media
                    .and_then(|m| m.user)
                    .and_then(|u| id_string(&u.pk))
                else {
                    continue;
                };
                if seen.insert(id.clone()) {
                    items.push(id);
                }
            }
        }
    }

    Ok(Page {
        items,
        next_cursor: None,
        has_more: false,
    })
}
