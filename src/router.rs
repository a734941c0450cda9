//! Two-way synchronization between search parameters and a navigation
//! history (the address bar of the original web UI).

use std::collections::BTreeMap;

use url::Url;

use crate::params::{ParsedQuery, SearchParams, parse_query, to_query_string};

pub const SEARCH_PATH: &str = "/search";

/// Navigation history seam.
pub trait History: Send {
    fn current(&self) -> &str;
    fn push(&mut self, location: &str);
    fn replace(&mut self, location: &str);
    /// Steps back one entry and returns the new current location.
    fn back(&mut self) -> Option<String>;
    fn forward(&mut self) -> Option<String>;
}

/// In-memory history with back/forward, behaving like a browser session
/// history: pushing drops any forward entries.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<String>,
    index: usize,
}

impl MemoryHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl History for MemoryHistory {
    fn current(&self) -> &str {
        &self.entries[self.index]
    }

    fn push(&mut self, location: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push(location.to_owned());
        self.index = self.entries.len() - 1;
    }

    fn replace(&mut self, location: &str) {
        self.entries[self.index] = location.to_owned();
    }

    fn back(&mut self) -> Option<String> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.entries[self.index].clone())
    }

    fn forward(&mut self) -> Option<String> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.entries[self.index].clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub current_path: String,
    pub params: BTreeMap<String, String>,
    /// Set once the URL has been parsed; no fetch happens before that.
    pub initialized: bool,
    /// Swallows the next outbound sync after inbound navigation.
    pub suppress_next_sync: bool,
}

/// Outcome of [`Router::sync_to_url`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Pushed,
    Replaced,
    Unchanged,
    Suppressed,
}

pub struct Router {
    state: NavigationState,
    history: Box<dyn History>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("state", &self.state)
            .field("location", &self.history.current())
            .finish()
    }
}

impl Router {
    pub fn new(history: Box<dyn History>) -> Self {
        Self {
            state: NavigationState {
                current_path: "/".to_owned(),
                ..NavigationState::default()
            },
            history,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    pub fn location(&self) -> &str {
        self.history.current()
    }

    pub fn history(&self) -> &dyn History {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> &mut dyn History {
        self.history.as_mut()
    }

    /// Parses an incoming location (initial load or back/forward).
    ///
    /// Only [`SEARCH_PATH`] carries search parameters; every other path yields
    /// an empty parse, i.e. defaults.
    pub fn initialize_from_url(&mut self, path: &str, query: &str) -> ParsedQuery {
        let query = query.strip_prefix('?').unwrap_or(query);
        self.state.current_path = path.to_owned();
        self.state.params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        self.state.initialized = true;

        let parsed = if path == SEARCH_PATH {
            parse_query(query)
        } else {
            ParsedQuery::default()
        };
        if !parsed.rejected.is_empty() {
            tracing::debug!(rejected = ?parsed.rejected, "ignored malformed query values");
        }
        tracing::debug!(path, query, "initialized from url");
        parsed
    }

    /// Inbound browser navigation: parse `location` and suppress the echo
    /// write that the resulting parameter change would otherwise cause.
    pub fn handle_popstate(&mut self, location: &str) -> ParsedQuery {
        self.state.suppress_next_sync = true;
        let (path, query) = split_location(location);
        self.initialize_from_url(&path, &query)
    }

    /// Writes `params` to the history as `path?query`.
    pub fn sync_to_url(&mut self, path: &str, params: &SearchParams, replace: bool) -> SyncOutcome {
        if self.state.suppress_next_sync {
            self.state.suppress_next_sync = false;
            tracing::debug!(path, "url sync suppressed after navigation");
            return SyncOutcome::Suppressed;
        }

        let location = build_location(path, params);
        self.state.current_path = path.to_owned();
        self.state.params = params
            .query_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();

        if self.history.current() == location {
            return SyncOutcome::Unchanged;
        }
        if replace {
            self.history.replace(&location);
            tracing::debug!(%location, "url replaced");
            SyncOutcome::Replaced
        } else {
            self.history.push(&location);
            tracing::debug!(%location, "url pushed");
            SyncOutcome::Pushed
        }
    }
}

pub fn build_location(path: &str, params: &SearchParams) -> String {
    let query = to_query_string(params);
    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    }
}

/// Splits a location into `(path, query)`.
///
/// Accepts absolute URLs (`https://host/search?x=1`) as well as
/// path-and-query strings (`/search?x=1`). Fragments are dropped.
pub fn split_location(location: &str) -> (String, String) {
    let location = location.trim();
    if let Ok(url) = Url::parse(location) {
        if url.has_host() {
            return (url.path().to_owned(), url.query().unwrap_or("").to_owned());
        }
    }
    let without_fragment = location.split('#').next().unwrap_or("");
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_fragment, ""),
    };
    let path = if path.is_empty() {
        "/".to_owned()
    } else if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    (path, query.to_owned())
}
