//! Search parameter store: a pure reducer plus a small holder around it.

use crate::params::{ParamsPatch, ParsedQuery, SearchParams};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub params: SearchParams,
    /// Parameters of the last fetch that succeeded.
    pub last_successful: Option<SearchParams>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchAction {
    SetParams(ParamsPatch),
    /// Replace every field, e.g. to re-issue a failed request.
    ReplaceParams(SearchParams),
    SetCurrentPage(u32),
    IncrementPage,
    ResetToFirstPage,
    ResetAll,
    /// Replace the parameters with the ones parsed from a URL.
    InitializeFromRouter(ParsedQuery),
    SaveSuccessful,
    Rollback,
}

impl SearchAction {
    /// Whether the resulting parameters should be written to the URL.
    ///
    /// Router-driven initialization came from the URL already and snapshots
    /// do not change the parameters.
    pub fn syncs_to_url(&self) -> bool {
        !matches!(
            self,
            SearchAction::InitializeFromRouter(_) | SearchAction::SaveSuccessful
        )
    }
}

pub fn reduce(state: &SearchState, action: &SearchAction) -> SearchState {
    let mut next = state.clone();
    match action {
        SearchAction::SetParams(patch) => {
            next.params = state.params.merge(patch);
        }
        SearchAction::ReplaceParams(params) => {
            let blank = SearchParams {
                sort: None,
                ..SearchParams::default()
            };
            next.params = blank.merge(&params.to_patch());
        }
        SearchAction::SetCurrentPage(page) => {
            next.params.curr = (*page).max(1);
        }
        SearchAction::IncrementPage => {
            next.params.curr = state.params.curr.saturating_add(1);
        }
        SearchAction::ResetToFirstPage => {
            next.params.curr = 1;
        }
        SearchAction::ResetAll => {
            next = SearchState::default();
        }
        SearchAction::InitializeFromRouter(parsed) => {
            let mut base = SearchParams::default();
            // A malformed page or size keeps the value currently in effect.
            for (key, _) in &parsed.rejected {
                match *key {
                    "curr" => base.curr = state.params.curr,
                    "limit" => base.limit = state.params.limit,
                    _ => {}
                }
            }
            next.params = base.merge(&parsed.patch);
        }
        SearchAction::SaveSuccessful => {
            next.last_successful = Some(state.params.clone());
        }
        SearchAction::Rollback => {
            next.params = state.last_successful.clone().unwrap_or_default();
        }
    }
    next
}

/// Owns the current [`SearchState`] and applies actions through [`reduce`].
#[derive(Debug, Clone, Default)]
pub struct SearchStore {
    state: SearchState,
}

impl SearchStore {
    pub fn new(params: SearchParams) -> Self {
        Self {
            state: SearchState {
                params,
                last_successful: None,
            },
        }
    }

    pub fn params(&self) -> &SearchParams {
        &self.state.params
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Applies `action`; returns whether the parameters changed.
    pub fn dispatch(&mut self, action: SearchAction) -> bool {
        let next = reduce(&self.state, &action);
        let changed = next.params != self.state.params;
        tracing::debug!(?action, changed, "search store");
        self.state = next;
        changed
    }

    pub fn set_parameters(&mut self, patch: ParamsPatch) -> bool {
        self.dispatch(SearchAction::SetParams(patch))
    }

    pub fn reset_to_first_page(&mut self) -> bool {
        self.dispatch(SearchAction::ResetToFirstPage)
    }

    pub fn reset_all(&mut self) -> bool {
        self.dispatch(SearchAction::ResetAll)
    }
}
