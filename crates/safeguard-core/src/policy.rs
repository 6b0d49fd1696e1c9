//! Policy sets and classification.
//!
//! A hostname is in exactly one of three classes: redirected to https,
//! allowed over plain http, or blocked. The two durable sets (`allow`,
//! `redirect`) are kept disjoint by every mutator; the temporary-allow
//! set holds exact URLs, lives only for the current process, and each
//! entry authorizes a single matching request.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::sort_domains;

/// A normalized hostname: lowercase, no scheme or port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Creates a hostname, normalizing to lowercase.
    pub fn new(host: impl AsRef<str>) -> Self {
        Self(host.as_ref().to_ascii_lowercase())
    }

    /// Returns the hostname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Hostname {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}

impl From<String> for Hostname {
    fn from(host: String) -> Self {
        Self::new(host)
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The terminal policy class for a hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Upgrade requests for this hostname to https.
    Redirect,
    /// Allow requests for this hostname over plain http.
    Allow,
    /// Block requests for this hostname.
    Block,
}

impl Classification {
    /// Returns the classification as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which durable sets a mutation actually changed.
///
/// Drives persistence: only sets that changed are written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyDelta {
    /// The allow set changed (or must be rewritten).
    pub allow_changed: bool,
    /// The redirect set changed (or must be rewritten).
    pub redirect_changed: bool,
}

impl PolicyDelta {
    /// Returns true if anything changed.
    pub fn any(&self) -> bool {
        self.allow_changed || self.redirect_changed
    }
}

/// A full copy of both durable sets, domain-sorted.
///
/// This is the shape read from storage at startup and sent to observers
/// answering a full-state request. Absent keys deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Allowed hostnames.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Redirected hostnames.
    #[serde(default)]
    pub redirect: Vec<String>,
}

/// A partial write-back: only the sets that changed are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    /// Full allow set, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,
    /// Full redirect set, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Vec<String>>,
}

impl PolicyUpdate {
    /// Returns true if the update carries anything to write.
    pub fn is_empty(&self) -> bool {
        self.allow.is_none() && self.redirect.is_none()
    }
}

/// Owns the policy sets and enforces their invariants.
///
/// Invariant: `allow` and `redirect` are disjoint. Every mutator that
/// adds to one removes from the other first.
#[derive(Debug, Default)]
pub struct PolicyStore {
    allow: HashSet<Hostname>,
    redirect: HashSet<Hostname>,
    temporary_allow: HashSet<String>,
}

impl PolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a persisted snapshot.
    ///
    /// A hostname present in both sets should never occur; if it does,
    /// it stays in the redirect set (the earlier-checked class wins).
    pub fn from_snapshot(snapshot: PolicySnapshot) -> Self {
        let redirect: HashSet<Hostname> =
            snapshot.redirect.into_iter().map(Hostname::new).collect();

        let mut allow = HashSet::new();
        for host in snapshot.allow {
            let host = Hostname::new(host);
            if redirect.contains(&host) {
                warn!(hostname = %host, "hostname in both sets, keeping redirect");
            } else {
                allow.insert(host);
            }
        }

        Self {
            allow,
            redirect,
            temporary_allow: HashSet::new(),
        }
    }

    /// Classifies a hostname. Total over any hostname; unknown hosts block.
    pub fn classify(&self, hostname: &Hostname) -> Classification {
        if self.redirect.contains(hostname) {
            Classification::Redirect
        } else if self.allow.contains(hostname) {
            Classification::Allow
        } else {
            Classification::Block
        }
    }

    /// Moves hostnames into the allow set.
    ///
    /// The allow set is always marked changed (the caller persists it
    /// unconditionally); the redirect set only if a removal occurred.
    pub fn set_allow(&mut self, hostnames: &[Hostname]) -> PolicyDelta {
        let mut redirect_changed = false;
        for hostname in hostnames {
            redirect_changed |= self.redirect.remove(hostname);
            self.allow.insert(hostname.clone());
        }

        PolicyDelta {
            allow_changed: true,
            redirect_changed,
        }
    }

    /// Moves hostnames into the redirect set. Symmetric to [`set_allow`].
    ///
    /// [`set_allow`]: Self::set_allow
    pub fn set_redirect(&mut self, hostnames: &[Hostname]) -> PolicyDelta {
        let mut allow_changed = false;
        for hostname in hostnames {
            allow_changed |= self.allow.remove(hostname);
            self.redirect.insert(hostname.clone());
        }

        PolicyDelta {
            allow_changed,
            redirect_changed: true,
        }
    }

    /// Removes hostnames from both sets, returning them to the blocked class.
    pub fn clear(&mut self, hostnames: &[Hostname]) -> PolicyDelta {
        let mut delta = PolicyDelta::default();
        for hostname in hostnames {
            delta.allow_changed |= self.allow.remove(hostname);
            delta.redirect_changed |= self.redirect.remove(hostname);
        }
        delta
    }

    /// Grants a single-use allowance for one exact URL.
    ///
    /// Not persisted and not broadcast; valid only for this process.
    pub fn allow_temporary(&mut self, url: impl Into<String>) {
        self.temporary_allow.insert(url.into());
    }

    /// Consumes a temporary allowance for the exact URL, if one exists.
    pub fn consume_temporary(&mut self, url: &str) -> bool {
        self.temporary_allow.remove(url)
    }

    /// Returns both durable sets as domain-sorted arrays.
    pub fn snapshot(&self) -> PolicySnapshot {
        let mut allow: Vec<String> = self.allow.iter().map(|h| h.as_str().to_owned()).collect();
        let mut redirect: Vec<String> =
            self.redirect.iter().map(|h| h.as_str().to_owned()).collect();
        sort_domains(&mut allow);
        sort_domains(&mut redirect);

        PolicySnapshot { allow, redirect }
    }

    /// Builds the partial write-back for a mutation's delta.
    pub fn update_for(&self, delta: PolicyDelta) -> PolicyUpdate {
        let snapshot = self.snapshot();

        PolicyUpdate {
            allow: delta.allow_changed.then_some(snapshot.allow),
            redirect: delta.redirect_changed.then_some(snapshot.redirect),
        }
    }
}
