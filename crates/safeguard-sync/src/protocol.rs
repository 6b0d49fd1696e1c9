//! Wire protocol spoken over observer connections.
//!
//! Every UI surface (popup, options list, blocked page) speaks this
//! contract over a persistent connection. Messages are JSON objects
//! tagged by a kebab-case `type` field.

use serde::{Deserialize, Serialize};

use safeguard_core::policy::Classification;

/// Messages an observer sends to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Request the full policy snapshot and join the broadcast set.
    State,
    /// One-shot query for the recency list; does not subscribe.
    Recent,
    /// Clear the recency list in place. No reply, no broadcast.
    ClearRecent,
    /// Ask whether a hostname already has a non-block policy.
    Check {
        /// Hostname to look up.
        hostname: String,
    },
    /// Move hostnames into the allow set.
    Allow {
        /// Hostnames to allow.
        hostnames: Vec<String>,
    },
    /// Move hostnames into the redirect set.
    Redirect {
        /// Hostnames to redirect.
        hostnames: Vec<String>,
    },
    /// Remove hostnames from both sets.
    Block {
        /// Hostnames to block.
        hostnames: Vec<String>,
    },
    /// Grant a single-use allowance for one exact URL.
    AllowTemporary {
        /// The exact URL to allow once.
        url: String,
    },
}

/// Messages the engine sends to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full snapshot of both durable sets, domain-sorted.
    State {
        /// Allowed hostnames.
        allow: Vec<String>,
        /// Redirected hostnames.
        redirect: Vec<String>,
    },
    /// The recency list, most-recent first.
    Recent {
        /// Recently intercepted hostnames with their current class.
        recent: Vec<RecentEntry>,
    },
    /// Reply to `check` when the hostname is allowed or redirected.
    Exists,
    /// Echo of an applied `allow` mutation.
    Allow {
        /// Hostnames that were allowed.
        hostnames: Vec<String>,
    },
    /// Echo of an applied `redirect` mutation.
    Redirect {
        /// Hostnames that were redirected.
        hostnames: Vec<String>,
    },
    /// Echo of an applied `block` mutation.
    Block {
        /// Hostnames that were blocked.
        hostnames: Vec<String>,
    },
}

/// One entry of the recency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    /// The intercepted hostname.
    pub hostname: String,
    /// Its current policy class.
    pub state: Classification,
}

/// The one-shot message the interstitial sends to prove interception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeMessage {
    /// The originally intercepted URL.
    pub url: String,
    /// Hex-encoded HMAC tag over the URL.
    pub hmac: String,
    /// The tab the interstitial is loaded in.
    pub tab_id: i64,
}

/// Command emitted to the tab-navigation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabCommand {
    /// Navigate a tab to a URL.
    Navigate {
        /// Target tab.
        tab_id: i64,
        /// Destination URL.
        url: String,
    },
}
