//!
//! src/query.rs
//!
//! Search form, result list and the search state machine
//!

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::fetch::HomeApi;
use crate::home::cancellable;
use crate::types::{Notice, SearchQuery, Song, SongKey};
use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Searching(u64),
    ResultsShown,
    NoResults
}

/// What applying a search result did to the section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// the section changed and should be shown again
    Applied,
    Notice(Notice),
    /// stale or cancelled; nothing changed
    Dropped
}

/// A search that has been started but not applied yet
#[derive(Debug, Clone)]
pub struct PendingSearch {
    pub generation: u64,
    pub query: SearchQuery,
    pub cancel: CancellationToken
}

#[derive(Debug)]
pub struct QuerySection {
    email: String,
    query: SearchQuery,
    results: Vec<Song>,
    state: QueryState,
    generation: u64,
    inflight: Option<CancellationToken>,
    parent: CancellationToken
}

impl QuerySection {
    /// `parent` is cancelled when the session goes away; every search
    /// token is a child of it
    pub fn new(email: impl Into<String>, parent: CancellationToken) -> Self {
        Self {
            email: email.into(),
            query: SearchQuery::default(),
            results: Vec::new(),
            state: QueryState::Idle,
            generation: 0,
            inflight: None,
            parent
        }
    }

    pub fn email(&self) -> &str { &self.email }

    pub fn query(&self) -> &SearchQuery { &self.query }

    pub fn results(&self) -> &[Song] { &self.results }

    pub fn state(&self) -> QueryState { self.state }

    pub fn set_title(&mut self, title: impl Into<String>) { self.query.title = title.into(); }

    pub fn set_year(&mut self, year: impl Into<String>) { self.query.year = year.into(); }

    pub fn set_artist(&mut self, artist: impl Into<String>) { self.query.artist = artist.into(); }

    pub fn clear_fields(&mut self) { self.query = SearchQuery::default(); }

    /// Validates the form and starts a new search generation. Any search
    /// still in flight is cancelled and its result will be discarded
    pub fn begin_search(&mut self) -> Result<PendingSearch, Notice> {
        if self.query.is_blank() {
            debug!("query.search.blank");
            return Err(Notice::EmptyQuery);
        }

        if let Some(prev) = self.inflight.take() {
            debug!(generation = self.generation, "query.search.superseded");
            prev.cancel();
        }

        self.generation += 1;
        let cancel = self.parent.child_token();
        self.inflight = Some(cancel.clone());
        self.state = QueryState::Searching(self.generation);

        Ok(PendingSearch {
            generation: self.generation,
            query: self.query.clone(),
            cancel
        })
    }

    /// Applies a search outcome. Results of any generation but the latest
    /// one are dropped. Prior results are kept on empty or failed searches
    pub fn apply_search(
        &mut self,
        generation: u64,
        result: Result<Vec<Song>, ClientError>
    ) -> SearchOutcome {
        if self.state != QueryState::Searching(generation) {
            debug!(generation, current = self.generation, "query.search.stale");
            return SearchOutcome::Dropped;
        }
        self.inflight = None;

        match result {
            Ok(songs) if songs.is_empty() => {
                info!(generation, "query.search.empty");
                self.state = QueryState::NoResults;
                SearchOutcome::Notice(Notice::NoResults)
            },
            Ok(songs) => {
                info!(generation, hits = songs.len(), "query.search");
                self.results = songs;
                self.state = QueryState::ResultsShown;
                SearchOutcome::Applied
            },
            Err(ClientError::Cancelled) => {
                debug!(generation, "query.search.cancelled");
                self.state = QueryState::Idle;
                SearchOutcome::Dropped
            },
            Err(e) => {
                error!(error = %e, generation, "query.search.failed");
                self.state = QueryState::Idle;
                SearchOutcome::Applied
            }
        }
    }

    pub async fn search<A: HomeApi + ?Sized>(&mut self, api: &A) -> Option<Notice> {
        let pending = match self.begin_search() {
            Ok(p) => p,
            Err(notice) => return Some(notice)
        };
        let result = cancellable(
            &pending.cancel,
            api.search(&self.email, &pending.query)
        ).await;
        match self.apply_search(pending.generation, result) {
            SearchOutcome::Notice(notice) => Some(notice),
            SearchOutcome::Applied | SearchOutcome::Dropped => None
        }
    }

    /// Returns the result list as it was, then drops `key` from the
    /// displayed results. The snapshot is what the home page looks the
    /// song up in
    pub fn select_for_subscribe(&mut self, key: &SongKey) -> Vec<Song> {
        let snapshot = self.results.clone();
        if let Some(index) = self.results.iter().position(|s| s.has_key(key)) {
            self.results.remove(index);
        }
        snapshot
    }

    pub fn cancel_inflight(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
        if let QueryState::Searching(_) = self.state {
            self.state = QueryState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::home::tests::{FakeApi, song};
    use crate::home::HomePage;

    #[tokio::test]
    async fn blank_form_never_calls_out() {
        let api = FakeApi::default();
        let mut query = QuerySection::new("a@b.com", CancellationToken::new());
        query.set_title("   ");

        assert_eq!(query.search(&api).await, Some(Notice::EmptyQuery));
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(query.state(), QueryState::Idle);
    }

    #[tokio::test]
    async fn one_call_per_search() {
        let api = FakeApi::default();
        *api.results.lock().unwrap() = vec![song("X", "Y")];
        let mut query = QuerySection::new("a@b.com", CancellationToken::new());
        query.set_year("2001");

        assert_eq!(query.search(&api).await, None);
        assert_eq!(query.search(&api).await, None);
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 2);
        assert_eq!(query.results(), &[song("X", "Y")]);
        assert_eq!(query.state(), QueryState::ResultsShown);
    }

    #[tokio::test]
    async fn empty_response_keeps_prior_results() {
        let api = FakeApi::default();
        *api.results.lock().unwrap() = vec![song("X", "Y")];
        let mut query = QuerySection::new("a@b.com", CancellationToken::new());
        query.set_artist("Y");
        query.search(&api).await;

        api.results.lock().unwrap().clear();
        assert_eq!(query.search(&api).await, Some(Notice::NoResults));
        assert_eq!(query.results(), &[song("X", "Y")]);
        assert_eq!(query.state(), QueryState::NoResults);
    }

    #[test]
    fn newer_search_supersedes_older() {
        let mut query = QuerySection::new("a@b.com", CancellationToken::new());
        query.set_title("X");

        let slow = query.begin_search().unwrap();
        let fast = query.begin_search().unwrap();
        assert!(slow.cancel.is_cancelled());
        assert!(!fast.cancel.is_cancelled());

        assert_eq!(
            query.apply_search(fast.generation, Ok(vec![song("X", "new")])),
            SearchOutcome::Applied
        );
        assert_eq!(
            query.apply_search(slow.generation, Ok(vec![song("X", "old")])),
            SearchOutcome::Dropped
        );
        assert_eq!(query.results(), &[song("X", "new")]);
    }

    #[test]
    fn cancelled_search_is_dropped() {
        let mut query = QuerySection::new("a@b.com", CancellationToken::new());
        query.set_title("X");

        let pending = query.begin_search().unwrap();
        assert_eq!(
            query.apply_search(pending.generation, Err(ClientError::Cancelled)),
            SearchOutcome::Dropped
        );
        assert_eq!(query.state(), QueryState::Idle);
        assert!(query.results().is_empty());
    }

    #[test]
    fn teardown_cancels_search() {
        let session = CancellationToken::new();
        let mut query = QuerySection::new("a@b.com", session.clone());
        query.set_title("X");

        let pending = query.begin_search().unwrap();
        session.cancel();
        assert!(pending.cancel.is_cancelled());
    }

    #[test]
    fn selection_hands_back_pre_removal_snapshot() {
        let mut query = QuerySection::new("a@b.com", CancellationToken::new());
        query.set_title("X");
        let pending = query.begin_search().unwrap();
        query.apply_search(pending.generation, Ok(vec![song("X", "Y"), song("X", "Z")]));

        let snapshot = query.select_for_subscribe(&SongKey::new("X", "Y"));
        assert_eq!(snapshot, vec![song("X", "Y"), song("X", "Z")]);
        assert_eq!(query.results(), &[song("X", "Z")]);

        let snapshot = query.select_for_subscribe(&SongKey::new("nope", "nope"));
        assert_eq!(snapshot, vec![song("X", "Z")]);
        assert_eq!(query.results(), &[song("X", "Z")]);
    }

    #[tokio::test]
    async fn search_then_subscribe_moves_song_home() {
        let api = FakeApi::with_home("A", vec![]);
        *api.results.lock().unwrap() = vec![song("X", "Y")];
        let cancel = CancellationToken::new();

        let mut home = HomePage::new("a@b.com");
        let mut query = QuerySection::new("a@b.com", cancel.child_token());
        home.mount(&api, &cancel).await;
        assert_eq!(home.username(), Some("A"));

        query.set_title("X");
        query.search(&api).await;

        let key = SongKey::new("X", "Y");
        let snapshot = query.select_for_subscribe(&key);
        assert!(home.subscribe(&api, &key, &snapshot).await.unwrap());

        assert_eq!(home.subscriptions(), &[song("X", "Y")]);
        assert!(query.results().is_empty());
    }
}
