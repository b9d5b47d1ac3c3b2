use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode};
use serde_json::json;

use leadlens_core::error::AppError;
use leadlens_core::models::{CandidateId, Entity, Identity, Page};
use leadlens_core::traits::{IdentitySource, ListTarget};

use crate::parse;
use crate::profile::RequestProfile;

/// Single-attempt HTTP source. Auth material comes from the identity
/// passed per call; everything endpoint-specific comes from the
/// [`RequestProfile`]. Retry and rotation live a layer up.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    profile: Arc<RequestProfile>,
}

impl HttpSource {
    pub fn new(profile: RequestProfile) -> Result<Self, AppError> {
        url::Url::parse(&profile.base_url)
            .map_err(|e| AppError::Validation(format!("invalid base url: {e}")))?;
        let client = Client::builder()
            .user_agent(&profile.user_agent)
            .timeout(profile.timeout)
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;
        Ok(Self {
            client,
            profile: Arc::new(profile),
        })
    }

    pub fn profile(&self) -> &RequestProfile {
        &self.profile
    }

    fn headers(&self, identity: &Identity, referer: &str) -> Result<HeaderMap, AppError> {
        let header = |value: &str| {
            HeaderValue::from_str(value).map_err(|_| {
                AppError::Validation(format!(
                    "identity {} carries a header-unsafe credential value",
                    identity.label
                ))
            })
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(COOKIE, header(&identity.auth.cookie)?);
        headers.insert(ORIGIN, header(&self.profile.base_url)?);
        headers.insert(REFERER, header(referer)?);
        headers.insert("x-ig-app-id", header(&self.profile.app_id)?);
        headers.insert("x-asbd-id", header(&self.profile.asbd_id)?);
        if !identity.auth.csrf_token.is_empty() {
            headers.insert("x-csrftoken", header(&identity.auth.csrf_token)?);
        }
        Ok(headers)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.profile.timeout.as_secs())
        } else if e.is_connect() {
            AppError::Network(format!("connection failed: {e}"))
        } else {
            AppError::Http(e.to_string())
        }
    }

    /// POST one GraphQL document and return the raw body. 404 is
    /// folded into the generic status mapping here; callers that
    /// treat it structurally intercept the status themselves.
    async fn post_graphql(
        &self,
        identity: &Identity,
        doc_id: &str,
        friendly_name: &str,
        variables: serde_json::Value,
        referer: &str,
    ) -> Result<String, AppError> {
        let variables = serde_json::to_string(&variables)?;
        let form = [
            ("doc_id", doc_id),
            ("variables", variables.as_str()),
            ("fb_api_caller_class", "RelayModern"),
            ("fb_api_req_friendly_name", friendly_name),
            ("server_timestamps", "true"),
        ];

        let response = self
            .client
            .post(self.profile.graphql_url())
            .headers(self.headers(identity, referer)?)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if let Some(err) = classify_status(status, identity) {
            return Err(err);
        }
        response.text().await.map_err(|e| self.transport_error(e))
    }

    async fn get(
        &self,
        identity: &Identity,
        url: String,
    ) -> Result<(StatusCode, String), AppError> {
        let referer = format!("{}/", self.profile.base_url);
        let response = self
            .client
            .get(url)
            .headers(self.headers(identity, &referer)?)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok((status, body))
    }
}

/// Map a non-success status to the error taxonomy. `None` means the
/// status is a success and the body is worth parsing.
fn classify_status(status: StatusCode, identity: &Identity) -> Option<AppError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::AuthRejected {
            identity: identity.label.clone(),
        },
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited,
        StatusCode::NOT_FOUND => AppError::NotFound(format!("HTTP {status}")),
        s if s.is_server_error() => AppError::Network(format!("HTTP {status}")),
        _ => AppError::Http(format!("HTTP {status}")),
    })
}

impl IdentitySource for HttpSource {
    async fn resolve_handle(
        &self,
        identity: &Identity,
        handle: &str,
    ) -> Result<CandidateId, AppError> {
        let variables = json!({
            "data": {
                "context": "blended",
                "include_reel": "true",
                "query": handle,
                "rank_token": "",
                "search_session_id": uuid::Uuid::new_v4().to_string(),
                "search_surface": "web_top_search",
            },
            "hasQuery": true,
        });
        let body = self
            .post_graphql(
                identity,
                &self.profile.search_doc_id,
                "PolarisSearchBoxRefetchableQuery",
                variables,
                &format!("{}/", self.profile.base_url),
            )
            .await?;
        parse::parse_search(&body, handle, self.profile.match_fallback)
    }

    async fn fetch_entity(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<Option<Entity>, AppError> {
        let variables = json!({
            "enable_integrity_filters": true,
            "id": id,
            "render_surface": "PROFILE",
        });
        let body = self
            .post_graphql(
                identity,
                &self.profile.entity_doc_id,
                "PolarisProfilePageContentQuery",
                variables,
                &format!("{}/", self.profile.base_url),
            )
            .await;

        match body {
            Ok(body) => parse::parse_entity(&body, &self.profile),
            // A vanished account is data, not a failure.
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_list_page(
        &self,
        identity: &Identity,
        target: &ListTarget,
        cursor: Option<&str>,
    ) -> Result<Page, AppError> {
        let url = match target {
            ListTarget::Followers(id) => self.profile.list_url(id, "followers", cursor),
            ListTarget::Following(id) => self.profile.list_url(id, "following", cursor),
            ListTarget::Hashtag(tag) => {
                let tag = tag.trim_start_matches('#');
                self.profile.hashtag_url(tag)
            }
        };

        let (status, body) = self.get(identity, url).await?;
        if let Some(err) = classify_status(status, identity) {
            return Err(err);
        }
        match target {
            ListTarget::Hashtag(_) => parse::parse_hashtag_page(&body),
            _ => parse::parse_list_page(&body),
        }
    }

    async fn fetch_engagement_sample(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<Vec<u64>, AppError> {
        let variables = json!({
            "after": null,
            "before": null,
            "data": {
                "include_feed_video": true,
                "page_size": 2,
                "target_user_id": id,
            },
            "first": self.profile.engagement_sample_size,
            "last": null,
        });
        let body = self
            .post_graphql(
                identity,
                &self.profile.engagement_doc_id,
                "PolarisProfileReelsTabContentQuery_connection",
                variables,
                &format!("{}/", self.profile.base_url),
            )
            .await?;
        parse::parse_engagement(&body, self.profile.engagement_sample_size)
    }

    /// Fail-open: captions feed the optional language/email columns,
    /// so a broken feed degrades those columns instead of discarding
    /// the candidate.
    async fn fetch_text_corpus(
        &self,
        identity: &Identity,
        handle: &str,
    ) -> Result<String, AppError> {
        let variables = json!({
            "data": {
                "count": self.profile.corpus_item_count,
                "include_reel_media_seen_timestamp": true,
                "include_relationship_info": true,
                "latest_besties_reel_media": true,
                "latest_reel_media": true,
            },
            "username": handle,
        });
        let result = self
            .post_graphql(
                identity,
                &self.profile.corpus_doc_id,
                "PolarisProfilePostsQuery",
                variables,
                &self.profile.profile_url(handle),
            )
            .await
            .and_then(|body| parse::parse_corpus(&body));

        match result {
            Ok(corpus) => Ok(corpus),
            Err(e) => {
                tracing::warn!(%handle, error = %e, "Corpus fetch failed, continuing without it");
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadlens_core::models::AuthMaterial;

    fn identity() -> Identity {
        Identity::new(
            "acct-test",
            AuthMaterial::from_cookie("csrftoken=tok123; ds_user_id=42; sessionid=abc"),
        )
    }

    #[test]
    fn auth_statuses_are_transient_and_carry_the_identity() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = classify_status(status, &identity()).unwrap();
            match &err {
                AppError::AuthRejected { identity } => assert_eq!(identity, "acct-test"),
                other => panic!("expected AuthRejected, got {other}"),
            }
            assert!(err.is_transient());
        }
    }

    #[test]
    fn throttle_and_server_errors_are_transient() {
        assert!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &identity())
                .unwrap()
                .is_transient()
        );
        assert!(
            classify_status(StatusCode::BAD_GATEWAY, &identity())
                .unwrap()
                .is_transient()
        );
    }

    #[test]
    fn missing_resources_and_odd_statuses_do_not_rotate() {
        let not_found = classify_status(StatusCode::NOT_FOUND, &identity()).unwrap();
        assert!(matches!(not_found, AppError::NotFound(_)));
        assert!(!not_found.is_transient());

        let teapot = classify_status(StatusCode::IM_A_TEAPOT, &identity()).unwrap();
        assert!(matches!(teapot, AppError::Http(_)));
        assert!(!teapot.is_transient());
    }

    #[test]
    fn success_statuses_pass_through() {
        assert!(classify_status(StatusCode::OK, &identity()).is_none());
    }

    #[test]
    fn malformed_base_url_is_rejected_at_construction() {
        let profile = RequestProfile::default().with_base_url("not a url");
        assert!(matches!(
            HttpSource::new(profile),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn headers_carry_auth_material() {
        let source = HttpSource::new(RequestProfile::default()).unwrap();
        let headers = source
            .headers(&identity(), "https://www.instagram.com/")
            .unwrap();
        assert_eq!(headers.get("x-csrftoken").unwrap(), "tok123");
        assert_eq!(headers.get("x-ig-app-id").unwrap(), "936619743392459");
        assert!(
            headers
                .get(COOKIE)
                .unwrap()
                .to_str()
                .unwrap()
                .contains("sessionid=abc")
        );
    }

    #[test]
    fn csrf_header_is_omitted_when_the_cookie_lacks_one() {
        let source = HttpSource::new(RequestProfile::default()).unwrap();
        let bare = Identity::new("bare", AuthMaterial::from_cookie("sessionid=abc"));
        let headers = source.headers(&bare, "https://www.instagram.com/").unwrap();
        assert!(headers.get("x-csrftoken").is_none());
    }
}
