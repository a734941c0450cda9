//! Application state for one browsing session.
//!
//! Every user action goes through the same path: update the parameter store,
//! mirror the parameters into the history, fetch, then either commit the page
//! and snapshot the parameters or roll back to the last good snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::api::SearchApi;
use crate::debounce::Debounce;
use crate::fetch::{Completion, FetchOrchestrator, MergePolicy};
use crate::formats::Book;
use crate::params::{ParamsPatch, ParsedQuery, SearchForm, SearchParams};
use crate::prefs::{DisplayMode, Preferences, ThemeMode};
use crate::router::{History, Router, SEARCH_PATH, split_location};
use crate::store::{SearchAction, SearchStore};

pub const SUBMIT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// What a view layer gets to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView<'a> {
    pub location: &'a str,
    pub display_mode: DisplayMode,
    pub theme: ThemeMode,
    pub params: &'a SearchParams,
    pub books: &'a [Book],
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<&'a str>,
}

/// Result of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded,
    /// Failed; parameters were rolled back.
    RolledBack,
    /// Superseded by a newer request.
    Stale,
    /// Nothing was requested (not initialized, or the action was rejected).
    Skipped,
}

pub struct SearchSession {
    api: Arc<dyn SearchApi>,
    router: Router,
    store: SearchStore,
    orchestrator: FetchOrchestrator,
    prefs: Preferences,
    submit: Debounce<SearchForm>,
    page_size: u32,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("router", &self.router)
            .field("store", &self.store)
            .field("orchestrator", &self.orchestrator)
            .field("prefs", &self.prefs)
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    pub fn new(
        api: Arc<dyn SearchApi>,
        history: Box<dyn History>,
        prefs: Preferences,
        page_size: u32,
    ) -> Self {
        let page_size = page_size.max(1);
        let policy = MergePolicy::from(prefs.display_mode());
        let store = SearchStore::new(SearchParams {
            limit: page_size,
            ..SearchParams::default()
        });
        Self {
            api,
            router: Router::new(history),
            store,
            orchestrator: FetchOrchestrator::new(policy),
            prefs,
            submit: Debounce::new(SUBMIT_DEBOUNCE, true),
            page_size,
        }
    }

    pub fn params(&self) -> &SearchParams {
        self.store.params()
    }

    pub fn store(&self) -> &SearchStore {
        &self.store
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn books(&self) -> &[Book] {
        self.orchestrator.books()
    }

    pub fn error(&self) -> Option<&str> {
        self.orchestrator.error().map(|e| e.message.as_str())
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            location: self.router.location(),
            display_mode: self.prefs.display_mode(),
            theme: self.prefs.theme(),
            params: self.store.params(),
            books: self.orchestrator.books(),
            total: self.orchestrator.total(),
            page: self.orchestrator.page(),
            page_size: self.orchestrator.page_size(),
            has_more: self.orchestrator.has_more(),
            loading: self.orchestrator.is_loading(),
            error: self.error(),
        }
    }

    /// Initial load: parse the location, then issue the first fetch.
    pub async fn open(&mut self, location: &str) -> FetchOutcome {
        let (path, query) = split_location(location);
        let parsed = self.router.initialize_from_url(&path, &query);
        self.initialize(parsed);
        self.history_write(true);
        self.fetch().await
    }

    /// Merges `patch` into the parameters and fetches.
    pub async fn set_parameters(&mut self, patch: ParamsPatch) -> FetchOutcome {
        self.apply(SearchAction::SetParams(patch)).await
    }

    /// Form submission, debounced on the leading edge.
    ///
    /// Returns `None` when the submission fell inside the debounce window.
    pub async fn submit_search(&mut self, form: SearchForm, now: Instant) -> Option<FetchOutcome> {
        let form = self.submit.call(now, form)?;
        let patch = form.into_patch(self.page_size);
        Some(self.set_parameters(patch).await)
    }

    /// Tag click: search by this tag alone from page 1.
    pub async fn select_tag(&mut self, tag: &str) -> FetchOutcome {
        self.set_parameters(ParamsPatch {
            tag: Some(tag.to_owned()),
            curr: Some(1),
            ..ParamsPatch::default()
        })
        .await
    }

    pub async fn select_source(&mut self, source: &str) -> FetchOutcome {
        self.set_parameters(ParamsPatch {
            source: Some(source.to_owned()),
            curr: Some(1),
            ..ParamsPatch::default()
        })
        .await
    }

    /// Infinite mode: request the next page. Rejected while loading, after
    /// the last page, or while an error is pending.
    pub async fn load_more(&mut self) -> FetchOutcome {
        if !self.router.is_initialized() || !self.orchestrator.can_load_more() {
            tracing::debug!("load more rejected");
            return FetchOutcome::Skipped;
        }
        self.apply(SearchAction::IncrementPage).await
    }

    /// Paginated mode: jump to page `page`. Rejected while loading.
    pub async fn change_page(&mut self, page: u32) -> FetchOutcome {
        if self.orchestrator.is_loading() || page == 0 {
            return FetchOutcome::Skipped;
        }
        self.apply(SearchAction::SetCurrentPage(page)).await
    }

    /// Paginated mode: change page and page size together.
    pub async fn change_page_size(&mut self, page: u32, limit: u32) -> FetchOutcome {
        if self.orchestrator.is_loading() || page == 0 || limit == 0 {
            return FetchOutcome::Skipped;
        }
        self.set_parameters(ParamsPatch {
            curr: Some(page),
            limit: Some(limit),
            ..ParamsPatch::default()
        })
        .await
    }

    /// Back to page 1 with the current filters.
    pub async fn refresh(&mut self) -> FetchOutcome {
        self.apply(SearchAction::ResetToFirstPage).await
    }

    /// Back to default parameters.
    pub async fn reset(&mut self) -> FetchOutcome {
        self.apply(SearchAction::ResetAll).await
    }

    /// Re-issues the request that failed.
    pub async fn retry(&mut self) -> FetchOutcome {
        let Some(pending) = self.orchestrator.clear_error() else {
            return FetchOutcome::Skipped;
        };
        self.apply(SearchAction::ReplaceParams(pending.params)).await
    }

    pub fn dismiss_error(&mut self) {
        self.orchestrator.clear_error();
    }

    /// Browser back button.
    pub async fn back(&mut self) -> FetchOutcome {
        match self.router.history_mut().back() {
            Some(location) => self.navigate(&location).await,
            None => FetchOutcome::Skipped,
        }
    }

    pub async fn forward(&mut self) -> FetchOutcome {
        match self.router.history_mut().forward() {
            Some(location) => self.navigate(&location).await,
            None => FetchOutcome::Skipped,
        }
    }

    /// Inbound navigation to `location` (popstate).
    pub async fn navigate(&mut self, location: &str) -> FetchOutcome {
        let parsed = self.router.handle_popstate(location);
        let changed = self.initialize(parsed);
        // Consumes the one-shot guard so the history is not written back.
        self.history_write(false);
        if !changed && self.orchestrator.error().is_none() && self.orchestrator.page() != 0 {
            return FetchOutcome::Skipped;
        }
        if self.orchestrator.rewind(self.store.params()) {
            self.store.dispatch(SearchAction::SaveSuccessful);
            return FetchOutcome::Loaded;
        }
        self.fetch().await
    }

    /// Flips display mode, clears the list and reloads page 1.
    pub async fn toggle_display_mode(&mut self) -> anyhow::Result<FetchOutcome> {
        let mode = self.prefs.toggle_display_mode()?;
        Ok(self.switch_mode(mode).await)
    }

    pub async fn set_display_mode(&mut self, mode: DisplayMode) -> anyhow::Result<FetchOutcome> {
        if mode == self.prefs.display_mode() {
            return Ok(FetchOutcome::Skipped);
        }
        self.prefs.set_display_mode(mode)?;
        Ok(self.switch_mode(mode).await)
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<ThemeMode> {
        self.prefs.toggle_theme()
    }

    async fn switch_mode(&mut self, mode: DisplayMode) -> FetchOutcome {
        tracing::info!(%mode, "display mode switched");
        self.orchestrator.reset(MergePolicy::from(mode));
        self.apply(SearchAction::ResetToFirstPage).await
    }

    /// Loads URL parameters into the store. A URL without `limit` gets the
    /// configured page size. Returns whether the parameters changed.
    fn initialize(&mut self, parsed: ParsedQuery) -> bool {
        let explicit_limit =
            parsed.patch.limit.is_some() || parsed.rejected.iter().any(|(key, _)| *key == "limit");
        let before = self.store.params().clone();
        self.store
            .dispatch(SearchAction::InitializeFromRouter(parsed));
        if !explicit_limit {
            self.store.set_parameters(ParamsPatch {
                limit: Some(self.page_size),
                ..ParamsPatch::default()
            });
        }
        self.store.params() != &before
    }

    async fn apply(&mut self, action: SearchAction) -> FetchOutcome {
        let syncs = action.syncs_to_url();
        self.store.dispatch(action);
        if syncs {
            self.history_write(false);
        }
        self.fetch().await
    }

    fn history_write(&mut self, replace: bool) {
        let params = self.store.params().clone();
        self.router.sync_to_url(SEARCH_PATH, &params, replace);
    }

    async fn fetch(&mut self) -> FetchOutcome {
        if !self.router.is_initialized() {
            return FetchOutcome::Skipped;
        }

        let ticket = self.orchestrator.begin(self.store.params());
        let Some(result) = ticket.run(self.api.as_ref()).await else {
            return FetchOutcome::Stale;
        };

        match result {
            Ok(page) => match self.orchestrator.complete(&ticket, page) {
                Completion::Applied => {
                    self.store.dispatch(SearchAction::SaveSuccessful);
                    FetchOutcome::Loaded
                }
                Completion::Stale => FetchOutcome::Stale,
            },
            Err(err) => {
                if self.orchestrator.fail(&ticket, err.clone()) == Completion::Stale {
                    return FetchOutcome::Stale;
                }
                tracing::warn!(error = %err, curr = ticket.params.curr, "search failed; rolling back");
                self.store.dispatch(SearchAction::Rollback);
                self.history_write(true);
                FetchOutcome::RolledBack
            }
        }
    }
}
