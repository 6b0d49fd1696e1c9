//! Per-request classification.
//!
//! The decision function invoked for every intercepted request. It never
//! mutates durable policy; its only side effects are the recency-list
//! update and the consumption of a matching temporary allowance.

use url::form_urlencoded;
use url::Url;

use crate::policy::{Classification, Hostname, PolicyStore};
use crate::recent::RecentHistory;
use crate::ticket::RedirectAuthenticator;

/// Default path of the interstitial that carries the signed ticket.
pub const DEFAULT_REDIRECT_TARGET_URL: &str = "/pages/redirect-target.html";

/// Default path of the interactive blocked page.
pub const DEFAULT_BLOCKED_URL: &str = "/pages/top-level-blocked.html";

/// Metadata supplied by the network-interception hook for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Absolute request URL.
    pub url: String,
    /// The request loads a top-level document (not a subresource).
    pub is_top_level_navigation: bool,
    /// The request is associated with a user-visible tab.
    pub has_visible_tab: bool,
    /// HTTP method, compared case-insensitively.
    pub method: String,
}

impl RequestDescriptor {
    /// A GET navigation in a visible tab — the interstitial-eligible case.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_top_level_navigation: true,
            has_visible_tab: true,
            method: "GET".to_string(),
        }
    }

    /// A subresource request with no tab context.
    pub fn subresource(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_top_level_navigation: false,
            has_visible_tab: false,
            method: "GET".to_string(),
        }
    }
}

/// The terminal outcome for one intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Resubmit the request with the `https` scheme.
    UpgradeToSecure,
    /// Let the request proceed.
    Allow,
    /// Redirect to the interstitial, carrying the URL and its HMAC tag.
    SignedRedirect {
        /// Interstitial URL with `url` and `hmac` query parameters.
        redirect_url: String,
    },
    /// Block the request outright.
    Cancel,
}

/// URLs of the two pages involved in the block flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrls {
    /// The interstitial that proves interception via the signed ticket.
    pub redirect_target: String,
    /// The interactive page offering allow/redirect choices.
    pub blocked: String,
}

impl Default for PageUrls {
    fn default() -> Self {
        Self {
            redirect_target: DEFAULT_REDIRECT_TARGET_URL.to_string(),
            blocked: DEFAULT_BLOCKED_URL.to_string(),
        }
    }
}

/// Classifies intercepted requests against the policy sets.
#[derive(Debug, Clone, Default)]
pub struct RequestClassifier {
    pages: PageUrls,
}

impl RequestClassifier {
    /// Creates a classifier with the given page URLs.
    pub fn new(pages: PageUrls) -> Self {
        Self { pages }
    }

    /// Decides the verdict for one intercepted request.
    ///
    /// The recency list is updated before the policy decision; it is a
    /// visibility aid independent of the verdict. Requests whose URL has
    /// no parseable hostname cancel without touching it.
    pub fn classify(
        &self,
        policy: &mut PolicyStore,
        recent: &mut RecentHistory,
        authenticator: &RedirectAuthenticator,
        request: &RequestDescriptor,
    ) -> Verdict {
        let Ok(target) = Url::parse(&request.url) else {
            return Verdict::Cancel;
        };
        let Some(host) = target.host_str() else {
            return Verdict::Cancel;
        };
        let hostname = Hostname::new(host);

        recent.touch(hostname.clone());

        match policy.classify(&hostname) {
            Classification::Redirect => return Verdict::UpgradeToSecure,
            Classification::Allow => return Verdict::Allow,
            Classification::Block => {}
        }

        // A temporary allowance authorizes exactly one matching request.
        if policy.consume_temporary(&request.url) {
            return Verdict::Allow;
        }

        if request.is_top_level_navigation
            && request.has_visible_tab
            && request.method.eq_ignore_ascii_case("GET")
        {
            let tag = authenticator.sign(&request.url);
            return Verdict::SignedRedirect {
                redirect_url: self.redirect_target_url(&request.url, &tag),
            };
        }

        // No user-visible surface (or non-idempotent method): nothing an
        // interstitial could safely ask, so block outright.
        Verdict::Cancel
    }

    fn redirect_target_url(&self, url: &str, tag: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("url", url)
            .append_pair("hmac", tag)
            .finish();
        format!("{}?{}", self.pages.redirect_target, query)
    }

    /// Builds the blocked-page URL a verified handshake navigates to.
    pub fn blocked_url(&self, url: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("url", url)
            .finish();
        format!("{}?{}", self.pages.blocked, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        policy: PolicyStore,
        recent: RecentHistory,
        authenticator: RedirectAuthenticator,
        classifier: RequestClassifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                policy: PolicyStore::new(),
                recent: RecentHistory::new(),
                authenticator: RedirectAuthenticator::new(),
                classifier: RequestClassifier::default(),
            }
        }

        fn classify(&mut self, request: &RequestDescriptor) -> Verdict {
            self.classifier.classify(
                &mut self.policy,
                &mut self.recent,
                &self.authenticator,
                request,
            )
        }
    }

    // ==================== Verdict Tests ====================

    #[test]
    fn test_fresh_store_blocks_navigation_with_signed_redirect() {
        let mut fixture = Fixture::new();
        let verdict = fixture.classify(&RequestDescriptor::navigation("http://example.com/"));

        let Verdict::SignedRedirect { redirect_url } = verdict else {
            panic!("expected signed redirect, got {verdict:?}");
        };
        assert!(redirect_url.starts_with(DEFAULT_REDIRECT_TARGET_URL));
        assert!(redirect_url.contains("url=http%3A%2F%2Fexample.com%2F"));
        assert!(redirect_url.contains("&hmac="));
    }

    #[test]
    fn test_signed_redirect_tag_verifies() {
        let mut fixture = Fixture::new();
        let url = "http://example.com/";
        let Verdict::SignedRedirect { redirect_url } =
            fixture.classify(&RequestDescriptor::navigation(url))
        else {
            panic!("expected signed redirect");
        };

        let query = redirect_url.split_once('?').unwrap().1;
        let tag = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "hmac")
            .map(|(_, value)| value.into_owned())
            .unwrap();

        assert!(fixture.authenticator.verify(url, &tag));
    }

    #[test]
    fn test_redirect_set_upgrades_to_secure() {
        let mut fixture = Fixture::new();
        fixture.policy.set_redirect(&[Hostname::new("example.com")]);

        let verdict = fixture.classify(&RequestDescriptor::navigation("http://example.com/"));
        assert_eq!(verdict, Verdict::UpgradeToSecure);
    }

    #[test]
    fn test_allow_set_allows() {
        let mut fixture = Fixture::new();
        fixture.policy.set_allow(&[Hostname::new("example.com")]);

        let verdict = fixture.classify(&RequestDescriptor::navigation("http://example.com/x"));
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_subresource_cancels_instead_of_interstitial() {
        let mut fixture = Fixture::new();
        let verdict = fixture.classify(&RequestDescriptor::subresource("http://example.com/x.js"));

        assert_eq!(verdict, Verdict::Cancel);
    }

    #[test]
    fn test_non_get_navigation_cancels() {
        let mut fixture = Fixture::new();
        let mut request = RequestDescriptor::navigation("http://example.com/");
        request.method = "POST".to_string();

        assert_eq!(fixture.classify(&request), Verdict::Cancel);
    }

    #[test]
    fn test_method_comparison_is_case_insensitive() {
        let mut fixture = Fixture::new();
        let mut request = RequestDescriptor::navigation("http://example.com/");
        request.method = "get".to_string();

        assert!(matches!(
            fixture.classify(&request),
            Verdict::SignedRedirect { .. }
        ));
    }

    #[test]
    fn test_unparseable_url_cancels_without_recent_update() {
        let mut fixture = Fixture::new();
        let verdict = fixture.classify(&RequestDescriptor::navigation("not a url"));

        assert_eq!(verdict, Verdict::Cancel);
        assert!(fixture.recent.is_empty());
    }

    // ==================== Temporary Allow Tests ====================

    #[test]
    fn test_temporary_allow_permits_exactly_once() {
        let mut fixture = Fixture::new();
        let url = "http://example.com/x";
        fixture.policy.allow_temporary(url);

        assert_eq!(
            fixture.classify(&RequestDescriptor::navigation(url)),
            Verdict::Allow
        );
        // Consumed: the second interception falls through to the normal path.
        assert!(matches!(
            fixture.classify(&RequestDescriptor::navigation(url)),
            Verdict::SignedRedirect { .. }
        ));
    }

    #[test]
    fn test_temporary_allow_does_not_cover_other_urls() {
        let mut fixture = Fixture::new();
        fixture.policy.allow_temporary("http://example.com/x");

        assert!(matches!(
            fixture.classify(&RequestDescriptor::navigation("http://example.com/y")),
            Verdict::SignedRedirect { .. }
        ));
    }

    // ==================== Side Effect Tests ====================

    #[test]
    fn test_recent_updated_regardless_of_verdict() {
        let mut fixture = Fixture::new();
        fixture.policy.set_allow(&[Hostname::new("a.com")]);

        fixture.classify(&RequestDescriptor::navigation("http://a.com/"));
        fixture.classify(&RequestDescriptor::subresource("http://b.com/x.js"));

        let seen: Vec<&str> = fixture.recent.iter().map(Hostname::as_str).collect();
        assert_eq!(seen, vec!["b.com", "a.com"]);
    }

    #[test]
    fn test_classification_never_mutates_durable_sets() {
        let mut fixture = Fixture::new();
        let before = fixture.policy.snapshot();

        fixture.classify(&RequestDescriptor::navigation("http://example.com/"));

        assert_eq!(fixture.policy.snapshot(), before);
    }

    // ==================== Page URL Tests ====================

    #[test]
    fn test_blocked_url_carries_original_url() {
        let classifier = RequestClassifier::default();
        assert_eq!(
            classifier.blocked_url("http://example.com/a b"),
            format!("{DEFAULT_BLOCKED_URL}?url=http%3A%2F%2Fexample.com%2Fa+b")
        );
    }

    #[test]
    fn test_custom_page_urls() {
        let classifier = RequestClassifier::new(PageUrls {
            redirect_target: "/interstitial".to_string(),
            blocked: "/blocked".to_string(),
        });

        assert!(classifier.blocked_url("http://x.com/").starts_with("/blocked?"));
    }
}
