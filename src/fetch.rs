//! Result list state for both display modes.
//!
//! One orchestrator serves infinite scrolling and pagination; the only
//! difference is the [`MergePolicy`] applied to each successful page.

use tokio_util::sync::CancellationToken;

use crate::api::SearchApi;
use crate::error::SearchError;
use crate::formats::{Book, SearchPage};
use crate::params::SearchParams;
use crate::prefs::DisplayMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Page 1 starts a new list; later pages are appended.
    Append,
    /// Every page replaces the list.
    Replace,
}

impl From<DisplayMode> for MergePolicy {
    fn from(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Infinite => MergePolicy::Append,
            DisplayMode::Pagination => MergePolicy::Replace,
        }
    }
}

/// Handle for one issued request.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub generation: u64,
    pub params: SearchParams,
    pub token: CancellationToken,
    /// Whether the response extends the current list rather than replacing it.
    pub appends: bool,
}

impl FetchTicket {
    /// Runs the request unless the ticket is cancelled first.
    ///
    /// Returns `None` when a newer fetch superseded this one.
    pub async fn run(&self, api: &dyn SearchApi) -> Option<Result<SearchPage, SearchError>> {
        tokio::select! {
            _ = self.token.cancelled() => None,
            result = api.search(&self.params) => Some(result),
        }
    }
}

/// Error awaiting acknowledgement or retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingError {
    pub error: SearchError,
    pub message: String,
    /// The parameters of the failed request, re-issued by a retry.
    pub params: SearchParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// List state set aside while a restarting request is in flight.
#[derive(Debug)]
struct Retained {
    books: Vec<Book>,
    total: u64,
    page: u32,
    page_size: u32,
    has_more: bool,
    applied: Option<SearchParams>,
}

#[derive(Debug)]
pub struct FetchOrchestrator {
    policy: MergePolicy,
    books: Vec<Book>,
    total: u64,
    page: u32,
    page_size: u32,
    has_more: bool,
    /// Parameters of the last applied response.
    applied: Option<SearchParams>,
    generation: u64,
    in_flight: Option<FetchTicket>,
    error: Option<PendingError>,
    /// Restored by [`FetchOrchestrator::fail`].
    retained: Option<Retained>,
}

impl FetchOrchestrator {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            books: Vec::new(),
            total: 0,
            page: 0,
            page_size: 0,
            has_more: true,
            applied: None,
            generation: 0,
            in_flight: None,
            error: None,
            retained: None,
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Page number of the most recent successful response (0 before any).
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn error(&self) -> Option<&PendingError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) -> Option<PendingError> {
        self.error.take()
    }

    /// Infinite mode only asks for the next page when nothing is in flight,
    /// the server reported more items, and no error is pending.
    pub fn can_load_more(&self) -> bool {
        !self.is_loading() && self.has_more && self.error.is_none()
    }

    /// Drops the list and switches policy; any in-flight request becomes stale.
    pub fn reset(&mut self, policy: MergePolicy) {
        self.cancel_in_flight();
        *self = Self {
            generation: self.generation,
            ..Self::new(policy)
        };
    }

    /// Whether a response for `params` would continue the accumulated list:
    /// same filters, next page.
    fn continues(&self, params: &SearchParams) -> bool {
        self.policy == MergePolicy::Append
            && params.curr > 1
            && self
                .applied
                .as_ref()
                .is_some_and(|p| p.same_filters(params) && params.curr == p.curr + 1)
    }

    /// Starts a request for `params`, superseding any request in flight.
    ///
    /// In append mode a request that does not continue the list (page 1, new
    /// filters, or a jump) clears it first. The cleared list comes back if
    /// that request fails.
    pub fn begin(&mut self, params: &SearchParams) -> FetchTicket {
        self.cancel_in_flight();
        self.generation += 1;
        self.error = None;
        let appends = self.continues(params);
        if self.policy == MergePolicy::Append && !appends {
            // A superseded restart already set the last good list aside.
            if self.retained.is_none() {
                self.retained = Some(Retained {
                    books: std::mem::take(&mut self.books),
                    total: self.total,
                    page: self.page,
                    page_size: self.page_size,
                    has_more: self.has_more,
                    applied: self.applied.take(),
                });
            }
            self.books.clear();
            self.applied = None;
            self.has_more = true;
        }

        let ticket = FetchTicket {
            generation: self.generation,
            params: params.clone(),
            token: CancellationToken::new(),
            appends,
        };
        self.in_flight = Some(ticket.clone());
        tracing::debug!(generation = ticket.generation, curr = params.curr, "fetch started");
        ticket
    }

    pub fn complete(&mut self, ticket: &FetchTicket, page: SearchPage) -> Completion {
        if !self.is_current(ticket) {
            tracing::debug!(generation = ticket.generation, "dropped stale response");
            return Completion::Stale;
        }
        self.in_flight = None;
        self.retained = None;

        let page_num = u32::try_from(page.page_num)
            .ok()
            .filter(|n| *n >= 1)
            .unwrap_or(ticket.params.curr);
        let page_size = u32::try_from(page.page_size)
            .ok()
            .filter(|n| *n >= 1)
            .unwrap_or(ticket.params.limit);

        if ticket.appends {
            self.books.extend(page.list);
        } else {
            self.books = page.list;
        }

        self.total = page.total;
        self.page = page_num;
        self.page_size = page_size;
        self.has_more = u64::from(page_num) * u64::from(page_size) < page.total;
        self.applied = Some(ticket.params.clone());
        tracing::debug!(
            page = page_num,
            total = self.total,
            books = self.books.len(),
            has_more = self.has_more,
            "fetch applied"
        );
        Completion::Applied
    }

    pub fn fail(&mut self, ticket: &FetchTicket, error: SearchError) -> Completion {
        if !self.is_current(ticket) {
            tracing::debug!(generation = ticket.generation, "dropped stale failure");
            return Completion::Stale;
        }
        self.in_flight = None;
        if let Some(kept) = self.retained.take() {
            self.books = kept.books;
            self.total = kept.total;
            self.page = kept.page;
            self.page_size = kept.page_size;
            self.has_more = kept.has_more;
            self.applied = kept.applied;
            tracing::debug!(books = self.books.len(), "restored list after failure");
        }
        self.error = Some(PendingError {
            message: error.user_message(),
            error,
            params: ticket.params.clone(),
        });
        Completion::Applied
    }

    /// Append mode: trims the list back to `params.curr` pages when those
    /// pages are already loaded under the same filters. Returns whether the
    /// list now matches `params` without a fetch.
    pub fn rewind(&mut self, params: &SearchParams) -> bool {
        if self.policy != MergePolicy::Append || self.is_loading() || self.error.is_some() {
            return false;
        }
        let Some(applied) = self.applied.as_mut() else {
            return false;
        };
        if !applied.same_filters(params) || params.curr > applied.curr {
            return false;
        }

        let keep = (params.curr as usize).saturating_mul(self.page_size as usize);
        self.books.truncate(keep);
        applied.curr = params.curr;
        self.page = params.curr;
        self.has_more = u64::from(self.page) * u64::from(self.page_size) < self.total;
        tracing::debug!(page = self.page, books = self.books.len(), "list rewound");
        true
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|t| t.generation == ticket.generation)
    }

    fn cancel_in_flight(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            ticket.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamsPatch;

    fn books(prefix: &str, n: usize) -> Vec<Book> {
        (0..n)
            .map(|i| Book {
                id: format!("{prefix}-{i}"),
                ..Book::default()
            })
            .collect()
    }

    fn page(num: u64, list: Vec<Book>, total: u64) -> SearchPage {
        SearchPage {
            page_num: num,
            page_size: 20,
            total,
            list,
        }
    }

    fn params(curr: u32) -> SearchParams {
        SearchParams::default().merge(&ParamsPatch::page(curr))
    }

    #[test]
    fn infinite_mode_accumulates_until_total() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);

        let t = orchestrator.begin(&params(1));
        assert!(!orchestrator.can_load_more());
        orchestrator.complete(&t, page(1, books("p1", 20), 45));
        assert!(orchestrator.has_more());
        assert!(orchestrator.can_load_more());

        let t = orchestrator.begin(&params(2));
        orchestrator.complete(&t, page(2, books("p2", 20), 45));
        assert!(orchestrator.has_more());

        let t = orchestrator.begin(&params(3));
        orchestrator.complete(&t, page(3, books("p3", 5), 45));
        assert!(!orchestrator.has_more());
        assert!(!orchestrator.can_load_more());
        assert_eq!(orchestrator.books().len(), 45);
        assert_eq!(orchestrator.books()[20].id, "p2-0");
    }

    #[test]
    fn first_page_request_clears_accumulated_list() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);
        let t = orchestrator.begin(&params(1));
        orchestrator.complete(&t, page(1, books("a", 20), 45));
        let _t = orchestrator.begin(&params(1));
        assert!(orchestrator.books().is_empty());
        assert!(orchestrator.is_loading());
    }

    #[test]
    fn pagination_replaces_list() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Replace);
        let t = orchestrator.begin(&params(1));
        orchestrator.complete(&t, page(1, books("p1", 20), 45));
        let t = orchestrator.begin(&params(2));
        assert_eq!(orchestrator.books().len(), 20);
        orchestrator.complete(&t, page(2, books("p2", 20), 45));
        assert_eq!(orchestrator.books().len(), 20);
        assert!(orchestrator.books().iter().all(|b| b.id.starts_with("p2-")));
        assert_eq!(orchestrator.page(), 2);
    }

    #[test]
    fn superseded_tickets_never_commit() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Replace);
        let old = orchestrator.begin(&params(1));
        let new = orchestrator.begin(&params(2));
        assert!(old.token.is_cancelled());
        assert!(!new.token.is_cancelled());

        assert_eq!(
            orchestrator.complete(&old, page(1, books("old", 3), 45)),
            Completion::Stale
        );
        assert_eq!(
            orchestrator.fail(&old, SearchError::Timeout),
            Completion::Stale
        );
        assert!(orchestrator.books().is_empty());
        assert!(orchestrator.error().is_none());
        assert_eq!(
            orchestrator.complete(&new, page(2, books("new", 3), 45)),
            Completion::Applied
        );
        assert_eq!(orchestrator.books()[0].id, "new-0");
    }

    #[test]
    fn failure_blocks_load_more_and_keeps_list() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);
        let t = orchestrator.begin(&params(1));
        orchestrator.complete(&t, page(1, books("p1", 20), 45));
        let t = orchestrator.begin(&params(2));
        orchestrator.fail(&t, SearchError::Connect("refused".to_owned()));

        assert_eq!(orchestrator.books().len(), 20);
        assert!(!orchestrator.can_load_more());
        let pending = orchestrator.error().unwrap();
        assert_eq!(pending.params.curr, 2);
        assert!(pending.message.contains("Network connection failed"));

        orchestrator.clear_error();
        assert!(orchestrator.can_load_more());
    }

    #[test]
    fn non_contiguous_page_restarts_the_list() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);
        let t = orchestrator.begin(&params(1));
        orchestrator.complete(&t, page(1, books("p1", 20), 45));

        let t = orchestrator.begin(&params(3));
        assert!(!t.appends);
        assert!(orchestrator.books().is_empty());
        orchestrator.complete(&t, page(3, books("p3", 5), 45));
        assert_eq!(orchestrator.books().len(), 5);

        let filtered = params(2).merge(&ParamsPatch {
            keyword: Some("other".to_owned()),
            ..ParamsPatch::default()
        });
        assert!(!orchestrator.begin(&filtered).appends);
    }

    #[test]
    fn failed_restart_restores_the_accumulated_list() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);
        for n in 1..=2 {
            let t = orchestrator.begin(&params(n));
            orchestrator.complete(&t, page(u64::from(n), books(&format!("p{n}"), 20), 100));
        }

        let filtered = params(1).merge(&ParamsPatch {
            keyword: Some("x".to_owned()),
            ..ParamsPatch::default()
        });
        let superseded = orchestrator.begin(&filtered);
        let t = orchestrator.begin(&filtered);
        assert_eq!(orchestrator.fail(&superseded, SearchError::Timeout), Completion::Stale);
        assert!(orchestrator.books().is_empty());
        orchestrator.fail(&t, SearchError::Timeout);

        assert_eq!(orchestrator.books().len(), 40);
        assert_eq!(orchestrator.page(), 2);
        assert!(orchestrator.has_more());

        orchestrator.clear_error();
        let t = orchestrator.begin(&params(3));
        assert!(t.appends);
        orchestrator.complete(&t, page(3, books("p3", 20), 100));
        assert_eq!(orchestrator.books().len(), 60);
        assert_eq!(orchestrator.books()[0].id, "p1-0");
    }

    #[test]
    fn rewind_trims_loaded_pages() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);
        for n in 1..=3 {
            let t = orchestrator.begin(&params(n));
            let count = if n == 3 { 5 } else { 20 };
            orchestrator.complete(&t, page(u64::from(n), books(&format!("p{n}"), count), 45));
        }
        assert!(!orchestrator.rewind(&params(4)));
        assert!(orchestrator.rewind(&params(2)));
        assert_eq!(orchestrator.books().len(), 40);
        assert!(orchestrator.has_more());

        let t = orchestrator.begin(&params(3));
        assert!(t.appends);
    }

    #[test]
    fn reset_switches_policy_and_invalidates_flight() {
        let mut orchestrator = FetchOrchestrator::new(MergePolicy::Append);
        let t = orchestrator.begin(&params(1));
        orchestrator.reset(MergePolicy::Replace);
        assert!(t.token.is_cancelled());
        assert_eq!(orchestrator.policy(), MergePolicy::Replace);
        assert_eq!(
            orchestrator.complete(&t, page(1, books("x", 1), 1)),
            Completion::Stale
        );
        let t2 = orchestrator.begin(&params(1));
        assert!(t2.generation > t.generation);
    }
}
