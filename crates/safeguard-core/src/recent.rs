//! Bounded recency list of intercepted hostnames.
//!
//! Most-recently-seen hostnames, capped at twenty. Touching a hostname
//! already in the list moves it to the most-recent position; inserting
//! beyond the cap evicts the least-recently-seen entry. The list is a
//! visibility aid for the popup and is rebuilt empty at process start.

use std::collections::VecDeque;

use crate::policy::Hostname;

/// Maximum number of hostnames retained.
pub const MAX_RECENT_HOSTS: usize = 20;

/// MRU-ordered list of unique hostnames, least-recent first internally.
#[derive(Debug)]
pub struct RecentHistory {
    entries: VecDeque<Hostname>,
    cap: usize,
}

impl RecentHistory {
    /// Creates an empty history with the standard cap.
    pub fn new() -> Self {
        Self::with_cap(MAX_RECENT_HOSTS)
    }

    /// Creates an empty history with a custom cap (tests).
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Inserts a hostname, or promotes it to most-recent if present.
    pub fn touch(&mut self, hostname: Hostname) {
        if let Some(index) = self.entries.iter().position(|h| *h == hostname) {
            self.entries.remove(index);
        } else if self.entries.len() == self.cap {
            self.entries.pop_front();
        }

        self.entries.push_back(hostname);
    }

    /// Iterates hostnames, most-recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Hostname> {
        self.entries.iter().rev()
    }

    /// Number of retained hostnames.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no hostname has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new()
    }
}
