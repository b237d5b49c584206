//!
//! src/home.rs
//!
//! Home page controller. Owns the user name and the subscription list and
//! is the only code that mutates either
//!

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::fetch::HomeApi;
use crate::types::{HomeData, Song, SongKey, SubscriptionAction};
use crate::ClientError;

/// Races `fut` against `cancel`
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        r = fut => r
    }
}

#[derive(Debug)]
pub struct HomePage {
    email: String,
    username: Option<String>,
    subscriptions: Vec<Song>,
    loading: bool,
    mounted: bool
}

impl HomePage {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            username: None,
            subscriptions: Vec::new(),
            loading: true,
            mounted: false
        }
    }

    pub fn email(&self) -> &str { &self.email }

    pub fn username(&self) -> Option<&str> { self.username.as_deref() }

    pub fn subscriptions(&self) -> &[Song] { &self.subscriptions }

    pub fn is_loading(&self) -> bool { self.loading }

    /// True until the mount fetch has been issued. A page is built for
    /// one email and keeps it for its lifetime
    pub fn needs_mount(&self) -> bool { !self.mounted }

    /// Marks the mount fetch as issued
    pub fn begin_mount(&mut self) -> bool {
        if self.mounted {
            return false;
        }
        self.mounted = true;
        self.loading = true;
        true
    }

    /// Applies the outcome of a home fetch. Returns false if it failed
    pub fn apply_home(&mut self, result: Result<HomeData, ClientError>) -> bool {
        match result {
            Ok(data) => {
                info!(user = %data.user_name, songs = data.subscribed_songs.len(), "home.load");
                self.username = Some(data.user_name);
                self.subscriptions = data.subscribed_songs;
                self.loading = false;
                true
            },
            Err(ClientError::Cancelled) => {
                debug!("home.load.cancelled");
                false
            },
            Err(e) => {
                error!(error = %e, email = %self.email, "home.load.failed");
                self.loading = false;
                false
            }
        }
    }

    /// Fetches user name and subscriptions once per page
    pub async fn mount<A: HomeApi + ?Sized>(&mut self, api: &A, cancel: &CancellationToken) -> bool {
        if !self.begin_mount() {
            debug!(email = %self.email, "home.mount.skip");
            return true;
        }
        let result = cancellable(cancel, api.fetch_home(&self.email)).await;
        self.apply_home(result)
    }

    /// Replaces local state with what the server holds
    pub async fn reconcile<A: HomeApi + ?Sized>(&mut self, api: &A, cancel: &CancellationToken) -> bool {
        let result = cancellable(cancel, api.fetch_home(&self.email)).await;
        self.apply_home(result)
    }

    /// Removes the entry matching `key`; absent keys are a no-op
    pub fn remove_song(&mut self, key: &SongKey) -> bool {
        match self.subscriptions.iter().position(|s| s.has_key(key)) {
            Some(index) => {
                self.subscriptions.remove(index);
                true
            },
            None => false
        }
    }

    /// Appends the song matching `key` from `results` if there is one
    pub fn append_from(&mut self, key: &SongKey, results: &[Song]) -> bool {
        match results.iter().find(|s| s.has_key(key)) {
            Some(song) => {
                self.subscriptions.push(song.clone());
                true
            },
            None => {
                debug!(song = %key, "home.subscribe.not_in_results");
                false
            }
        }
    }

    pub fn apply_unsubscribe(
        &mut self,
        key: &SongKey,
        result: Result<(), ClientError>
    ) -> Result<bool, ClientError> {
        match result {
            Ok(()) => {
                let removed = self.remove_song(key);
                info!(song = %key, removed, "home.unsubscribe");
                Ok(removed)
            },
            Err(e) => {
                if !e.is_cancelled() {
                    error!(error = %e, song = %key, "home.unsubscribe.failed");
                }
                Err(e)
            }
        }
    }

    pub fn apply_subscribe(
        &mut self,
        key: &SongKey,
        results: &[Song],
        result: Result<(), ClientError>
    ) -> Result<bool, ClientError> {
        match result {
            Ok(()) => {
                let added = self.append_from(key, results);
                info!(song = %key, added, "home.subscribe");
                Ok(added)
            },
            Err(e) => {
                if !e.is_cancelled() {
                    error!(error = %e, song = %key, "home.subscribe.failed");
                }
                Err(e)
            }
        }
    }

    pub async fn unsubscribe<A: HomeApi + ?Sized>(
        &mut self,
        api: &A,
        key: &SongKey
    ) -> Result<bool, ClientError> {
        let result = api.update_subscription(&self.email, key, SubscriptionAction::Unsubscribe).await;
        self.apply_unsubscribe(key, result)
    }

    /// `results` is the search result list as it was before the caller
    /// pruned the chosen song from its display
    pub async fn subscribe<A: HomeApi + ?Sized>(
        &mut self,
        api: &A,
        key: &SongKey,
        results: &[Song]
    ) -> Result<bool, ClientError> {
        let result = api.update_subscription(&self.email, key, SubscriptionAction::Subscribe).await;
        self.apply_subscribe(key, results, result)
    }
}
