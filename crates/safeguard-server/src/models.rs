//! Request and response models for the classify endpoint.
//!
//! The interception hook speaks camelCase JSON. The response carries at
//! most one directive; an empty object means "let the request proceed".

use serde::{Deserialize, Serialize};

use safeguard_core::classifier::{RequestDescriptor, Verdict};

fn default_method() -> String {
    "GET".to_string()
}

/// POST /api/classify request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    /// Absolute request URL.
    pub url: String,
    /// The request loads a top-level document.
    #[serde(default)]
    pub is_top_level_navigation: bool,
    /// The request belongs to a user-visible tab.
    #[serde(default)]
    pub has_visible_tab: bool,
    /// HTTP method. Defaults to GET when the hook omits it.
    #[serde(default = "default_method")]
    pub method: String,
}

impl From<ClassifyRequest> for RequestDescriptor {
    fn from(req: ClassifyRequest) -> Self {
        Self {
            url: req.url,
            is_top_level_navigation: req.is_top_level_navigation,
            has_visible_tab: req.has_visible_tab,
            method: req.method,
        }
    }
}

/// POST /api/classify response body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    /// Resubmit the request over https.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_to_secure: Option<bool>,
    /// Redirect the request to this URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Block the request outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel: Option<bool>,
}

impl From<Verdict> for ClassifyResponse {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::UpgradeToSecure => Self {
                upgrade_to_secure: Some(true),
                ..Self::default()
            },
            Verdict::Allow => Self::default(),
            Verdict::SignedRedirect { redirect_url } => Self {
                redirect_url: Some(redirect_url),
                ..Self::default()
            },
            Verdict::Cancel => Self {
                cancel: Some(true),
                ..Self::default()
            },
        }
    }
}
