//! Target sites and their discovered URL sets.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// One configured site under acquisition.
///
/// Created from configuration at run start. Immutable except for the
/// growing `discovered_urls` set as the escalator follows in-domain links
/// up to `max_depth`. Cross-domain links are never followed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Seed URL for the site
    pub base_url: String,

    /// Link-following bound for this site
    pub max_depth: usize,

    /// Every URL discovered for this site so far (seed included)
    pub discovered_urls: HashSet<String>,
}

impl Target {
    /// Create a target from a seed URL.
    pub fn new(base_url: impl Into<String>, max_depth: usize) -> Self {
        let base_url = base_url.into();
        let mut discovered_urls = HashSet::new();
        discovered_urls.insert(base_url.clone());

        Self {
            base_url,
            max_depth,
            discovered_urls,
        }
    }

    /// The host this target is scoped to.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    /// Whether a URL is inside this target's domain.
    pub fn in_domain(&self, candidate: &str) -> bool {
        let (Some(host), Ok(url)) = (self.host(), Url::parse(candidate)) else {
            return false;
        };
        url.host_str() == Some(host.as_str())
    }

    /// Record a discovered URL. Returns `true` if it was new.
    pub fn discover(&mut self, url: impl Into<String>) -> bool {
        self.discovered_urls.insert(url.into())
    }
}
