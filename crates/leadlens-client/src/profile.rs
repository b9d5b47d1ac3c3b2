use std::time::Duration;

/// What to do when a handle search returns results but none matches
/// the query exactly (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchFallback {
    /// Treat an inexact result set as not found.
    #[default]
    Strict,
    /// Take the top-ranked result anyway.
    FirstResult,
}

/// All request-shaping variance for the remote, as data.
///
/// Endpoint revisions change document ids and header values far more
/// often than they change payload shapes, so everything that varies
/// lives here and the transport code stays a single call path per
/// endpoint family.
#[derive(Debug, Clone)]
pub struct RequestProfile {
    pub base_url: String,
    pub user_agent: String,

    /// Application id header (`x-ig-app-id`).
    pub app_id: String,
    /// Anti-scraping body directive header (`x-asbd-id`).
    pub asbd_id: String,

    /// GraphQL document ids per endpoint family.
    pub entity_doc_id: String,
    pub search_doc_id: String,
    pub engagement_doc_id: String,
    pub corpus_doc_id: String,

    /// Items requested per listing page.
    pub page_size: u32,
    /// Most recent items kept in the engagement sample.
    pub engagement_sample_size: usize,
    /// Recent items concatenated into the text corpus.
    pub corpus_item_count: u32,

    pub timeout: Duration,
    pub match_fallback: MatchFallback,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36"
                .to_string(),
            app_id: "936619743392459".to_string(),
            asbd_id: "359341".to_string(),
            entity_doc_id: "24963806849976236".to_string(),
            search_doc_id: "24146980661639222".to_string(),
            engagement_doc_id: "9905035666198614".to_string(),
            corpus_doc_id: "24937007899300943".to_string(),
            page_size: 200,
            engagement_sample_size: 7,
            corpus_item_count: 12,
            timeout: Duration::from_secs(30),
            match_fallback: MatchFallback::Strict,
        }
    }
}

impl RequestProfile {
    /// Point every endpoint at a different host, for tests and
    /// compatible mirrors.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_match_fallback(mut self, fallback: MatchFallback) -> Self {
        self.match_fallback = fallback;
        self
    }

    pub fn graphql_url(&self) -> String {
        format!("{}/graphql/query", self.base_url)
    }

    pub fn list_url(&self, id: &str, segment: &str, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/v1/friendships/{id}/{segment}/?count={}",
            self.base_url, self.page_size
        );
        if let Some(cursor) = cursor {
            url.push_str("&max_id=");
            url.push_str(cursor);
        }
        url
    }

    pub fn hashtag_url(&self, tag: &str) -> String {
        format!("{}/api/v1/tags/web_info/?tag_name={tag}", self.base_url)
    }

    /// Canonical public URL for a handle's profile.
    pub fn profile_url(&self, handle: &str) -> String {
        format!("{}/{handle}/", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_url_threads_the_cursor() {
        let profile = RequestProfile::default();
        let first = profile.list_url("42", "followers", None);
        assert!(first.ends_with("/api/v1/friendships/42/followers/?count=200"));

        let next = profile.list_url("42", "followers", Some("QVFD123"));
        assert!(next.ends_with("?count=200&max_id=QVFD123"));
    }

    #[test]
    fn base_url_override_applies_everywhere() {
        let profile = RequestProfile::default().with_base_url("http://127.0.0.1:9999");
        assert_eq!(profile.graphql_url(), "http://127.0.0.1:9999/graphql/query");
        assert_eq!(profile.profile_url("alice"), "http://127.0.0.1:9999/alice/");
    }
}
