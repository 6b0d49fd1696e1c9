//! Safeguard Core - policy sets, request classification, and redirect
//! authentication.
//!
//! This crate holds the pure decision logic of Safeguard, the HTTP-request
//! interception tool: which hostnames are allowed over plain http, which
//! are upgraded to https, and how a blocked navigation is routed through a
//! signed interstitial. It performs no I/O; persistence and the observer
//! protocol live in `safeguard-storage` and `safeguard-sync`.
//!
//! # Example
//!
//! ```
//! use safeguard_core::classifier::{RequestClassifier, RequestDescriptor, Verdict};
//! use safeguard_core::policy::{Hostname, PolicyStore};
//! use safeguard_core::recent::RecentHistory;
//! use safeguard_core::ticket::RedirectAuthenticator;
//!
//! let mut policy = PolicyStore::new();
//! policy.set_redirect(&[Hostname::new("example.com")]);
//!
//! let mut recent = RecentHistory::new();
//! let authenticator = RedirectAuthenticator::new();
//! let classifier = RequestClassifier::default();
//!
//! let verdict = classifier.classify(
//!     &mut policy,
//!     &mut recent,
//!     &authenticator,
//!     &RequestDescriptor::navigation("http://example.com/"),
//! );
//! assert_eq!(verdict, Verdict::UpgradeToSecure);
//! ```

pub mod classifier;
pub mod domain;
pub mod hex;
pub mod policy;
pub mod recent;
pub mod ticket;

pub use classifier::{PageUrls, RequestClassifier, RequestDescriptor, Verdict};
pub use policy::{Classification, Hostname, PolicyDelta, PolicySnapshot, PolicyStore, PolicyUpdate};
pub use recent::{RecentHistory, MAX_RECENT_HOSTS};
pub use ticket::RedirectAuthenticator;
