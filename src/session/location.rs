//! Current-location abstraction.
//!
//! The session store reads the OAuth `token` query parameter from here and
//! scrubs it with a history replace; redirects and verification flows
//! navigate through it.

use std::sync::Mutex;

use reqwest::Url;

pub trait Location: Send + Sync {
    /// Full current URL.
    fn href(&self) -> String;

    /// Path component of the current URL.
    fn path(&self) -> String;

    /// First value of a query parameter, if present.
    fn query_param(&self, name: &str) -> Option<String>;

    /// Replace the current history entry without navigating.
    fn replace(&self, href: &str);

    /// Navigate to `path`, pushing a history entry.
    fn navigate(&self, path: &str);
}

#[derive(Debug, thiserror::Error)]
#[error("invalid location URL: {0}")]
pub struct LocationError(String);

/// `href` with every occurrence of query parameter `name` removed.
///
/// Drops the `?` entirely when no parameters remain. Fragments are kept.
#[must_use]
pub fn strip_query_param(url: &Url, name: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

// =============================================================================
// MEMORY LOCATION
// =============================================================================

/// In-process location with a history stack.
#[derive(Debug)]
pub struct MemoryLocation {
    inner: Mutex<MemoryLocationInner>,
}

#[derive(Debug)]
struct MemoryLocationInner {
    current: Url,
    history: Vec<String>,
}

impl MemoryLocation {
    /// # Errors
    ///
    /// Returns [`LocationError`] if `href` is not an absolute URL.
    pub fn new(href: &str) -> Result<Self, LocationError> {
        let current = Url::parse(href).map_err(|e| LocationError(format!("{href}: {e}")))?;
        let history = vec![current.to_string()];
        Ok(Self { inner: Mutex::new(MemoryLocationInner { current, history }) })
    }

    /// Every URL the location has held, oldest first. Replaces overwrite the
    /// last entry instead of pushing.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLocationInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        self.lock().current.to_string()
    }

    fn path(&self) -> String {
        self.lock().current.path().to_owned()
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.lock()
            .current
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    fn replace(&self, href: &str) {
        let mut inner = self.lock();
        let Ok(next) = inner.current.join(href) else {
            tracing::warn!(href, "ignoring unparsable history replace");
            return;
        };
        let entry = next.to_string();
        inner.current = next;
        if let Some(last) = inner.history.last_mut() {
            *last = entry;
        }
    }

    fn navigate(&self, path: &str) {
        let mut inner = self.lock();
        let Ok(next) = inner.current.join(path) else {
            tracing::warn!(path, "ignoring unparsable navigation target");
            return;
        };
        inner.history.push(next.to_string());
        inner.current = next;
    }
}

#[cfg(test)]
#[path = "location_test.rs"]
mod tests;
