//!
//! src/session.rs
//!
//! The interactive page. Owns the home page and query section, turns user
//! commands into network tasks and applies their results as events. The
//! loop is the single writer of all component state
//!

use std::{io::Write, str::FromStr, sync::Arc};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use crate::fetch::HomeApi;
use crate::home::{HomePage, cancellable};
use crate::query::{QuerySection, SearchOutcome};
use crate::types::{HomeData, Notice, Song, SongKey, SubscriptionAction};
use crate::{ClientError, view};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetTitle(String),
    SetArtist(String),
    SetYear(String),
    Clear,
    Search,
    Subscribe(usize),
    Unsubscribe(usize),
    Refresh,
    Show,
    Help,
    Quit
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, "")
        };

        let index = |rest: &str| -> Result<usize, String> {
            match rest.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(format!("{word} expects a number from the list, got {rest:?}"))
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "title" => Ok(Command::SetTitle(rest.to_string())),
            "artist" => Ok(Command::SetArtist(rest.to_string())),
            "year" => Ok(Command::SetYear(rest.to_string())),
            "clear" => Ok(Command::Clear),
            "search" | "query" => Ok(Command::Search),
            "subscribe" | "sub" => index(rest).map(Command::Subscribe),
            "unsubscribe" | "unsub" => index(rest).map(Command::Unsubscribe),
            "refresh" => Ok(Command::Refresh),
            "show" | "" => Ok(Command::Show),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command {other:?}; try help"))
        }
    }
}

/// Result of a network task, delivered back to the loop
#[derive(Debug)]
pub enum Event {
    Home { reconcile: bool, result: Result<HomeData, ClientError> },
    Search { generation: u64, result: Result<Vec<Song>, ClientError> },
    Subscribed { key: SongKey, snapshot: Vec<Song>, result: Result<(), ClientError> },
    Unsubscribed { key: SongKey, result: Result<(), ClientError> }
}

pub struct Session {
    api: Arc<dyn HomeApi>,
    home: HomePage,
    query: QuerySection,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    pending: usize,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>
}

impl Session {
    pub fn new(api: Arc<dyn HomeApi>, email: &str, shutdown: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            home: HomePage::new(email),
            query: QuerySection::new(email, shutdown.child_token()),
            shutdown,
            tasks: TaskTracker::new(),
            pending: 0,
            tx,
            rx
        }
    }

    pub fn home(&self) -> &HomePage { &self.home }

    pub fn query(&self) -> &QuerySection { &self.query }

    /// Number of network tasks whose event has not been applied yet
    pub fn pending(&self) -> usize { self.pending }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = Event> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.pending += 1;
        self.tasks.spawn(async move {
            // receiver is gone once the session has torn down
            let _ = tx.send(task.await);
        });
    }

    /// Issues the mount fetch for the home page
    pub fn start(&mut self) {
        if !self.home.begin_mount() {
            return;
        }
        self.spawn_home(false);
    }

    fn spawn_home(&mut self, reconcile: bool) {
        let api = self.api.clone();
        let email = self.home.email().to_string();
        let cancel = self.shutdown.child_token();
        self.spawn(async move {
            let result = cancellable(&cancel, api.fetch_home(&email)).await;
            Event::Home { reconcile, result }
        });
    }

    fn spawn_mutation(&mut self, key: SongKey, action: SubscriptionAction, snapshot: Vec<Song>) {
        let api = self.api.clone();
        let email = self.home.email().to_string();
        let cancel = self.shutdown.child_token();
        self.spawn(async move {
            let result = cancellable(
                &cancel,
                api.update_subscription(&email, &key, action)
            ).await;
            match action {
                SubscriptionAction::Subscribe => Event::Subscribed { key, snapshot, result },
                SubscriptionAction::Unsubscribe => Event::Unsubscribed { key, result }
            }
        });
    }

    /// Runs one user command. Returns false when the session should end
    pub fn handle(&mut self, cmd: Command, out: &mut impl Write) -> std::io::Result<bool> {
        debug!(command = ?cmd, "session.command");
        // the mount response replaces the list wholesale, so a mutation
        // applied before it would be lost
        if matches!(cmd, Command::Subscribe(_) | Command::Unsubscribe(_)) && self.home.is_loading() {
            debug!("session.command.loading");
            writeln!(out, "still loading your subscriptions; try again in a moment")?;
            return Ok(true);
        }
        match cmd {
            Command::SetTitle(t) => self.query.set_title(t),
            Command::SetArtist(a) => self.query.set_artist(a),
            Command::SetYear(y) => self.query.set_year(y),
            Command::Clear => self.query.clear_fields(),
            Command::Search => match self.query.begin_search() {
                Ok(pending) => {
                    let api = self.api.clone();
                    let email = self.query.email().to_string();
                    self.spawn(async move {
                        let result = cancellable(
                            &pending.cancel,
                            api.search(&email, &pending.query)
                        ).await;
                        Event::Search { generation: pending.generation, result }
                    });
                    view::query_section(out, &self.query, self.home.is_loading())?;
                },
                Err(notice) => view::notice(out, &notice)?
            },
            Command::Subscribe(n) => {
                let Some(key) = n.checked_sub(1)
                    .and_then(|i| self.query.results().get(i))
                    .map(Song::key) else {
                    writeln!(out, "no search result {n}")?;
                    return Ok(true);
                };
                let snapshot = self.query.select_for_subscribe(&key);
                self.spawn_mutation(key, SubscriptionAction::Subscribe, snapshot);
            },
            Command::Unsubscribe(n) => {
                let Some(key) = n.checked_sub(1)
                    .and_then(|i| self.home.subscriptions().get(i))
                    .map(Song::key) else {
                    writeln!(out, "no subscription {n}")?;
                    return Ok(true);
                };
                self.spawn_mutation(key, SubscriptionAction::Unsubscribe, Vec::new());
            },
            Command::Refresh => self.spawn_home(true),
            Command::Show => view::page(out, &self.home, &self.query)?,
            Command::Help => view::help(out)?,
            Command::Quit => return Ok(false)
        }
        Ok(true)
    }

    /// Applies one finished task to the components
    pub fn apply(&mut self, event: Event, out: &mut impl Write) -> std::io::Result<()> {
        self.pending = self.pending.saturating_sub(1);
        match event {
            Event::Home { reconcile, result } => {
                if result.as_ref().is_err_and(ClientError::is_cancelled) {
                    return Ok(());
                }
                if self.home.apply_home(result) {
                    if reconcile {
                        info!(songs = self.home.subscriptions().len(), "session.reconciled");
                    }
                    view::page(out, &self.home, &self.query)?;
                } else {
                    view::notice(out, &Notice::LoadFailed)?;
                }
            },
            Event::Search { generation, result } => {
                match self.query.apply_search(generation, result) {
                    SearchOutcome::Applied => {
                        view::query_section(out, &self.query, self.home.is_loading())?
                    },
                    SearchOutcome::Notice(notice) => view::notice(out, &notice)?,
                    SearchOutcome::Dropped => {}
                }
            },
            Event::Subscribed { key, snapshot, result } => {
                match self.home.apply_subscribe(&key, &snapshot, result) {
                    Ok(_) => view::music_section(out, &self.home)?,
                    Err(e) if e.is_cancelled() => {},
                    Err(_) => view::notice(out, &Notice::MutationFailed {
                        action: SubscriptionAction::Subscribe, key
                    })?
                }
            },
            Event::Unsubscribed { key, result } => {
                match self.home.apply_unsubscribe(&key, result) {
                    Ok(_) => view::music_section(out, &self.home)?,
                    Err(e) if e.is_cancelled() => {},
                    Err(_) => view::notice(out, &Notice::MutationFailed {
                        action: SubscriptionAction::Unsubscribe, key
                    })?
                }
            }
        }
        out.flush()
    }

    /// Waits for the next finished task and applies it
    pub async fn pump(&mut self, out: &mut impl Write) -> std::io::Result<bool> {
        match self.rx.recv().await {
            Some(event) => {
                self.apply(event, out)?;
                Ok(true)
            },
            None => Ok(false)
        }
    }

    /// Reads commands from `input` until quit, shutdown, or end of input.
    /// At end of input the loop keeps going until every pending task has
    /// been applied
    pub async fn run<R>(&mut self, input: R, out: &mut impl Write) -> Result<(), ClientError>
    where
        R: AsyncBufRead + Unpin,
    {
        info!(email = %self.home.email(), "session.start");
        self.start();
        view::page(out, &self.home, &self.query)?;

        let mut lines = input.lines();
        let mut input_closed = false;

        loop {
            if input_closed && self.pending == 0 {
                break;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(reason = "shutdown token", "session.stop");
                    break;
                }
                Some(event) = self.rx.recv() => {
                    self.apply(event, out)?;
                }
                line = lines.next_line(), if !input_closed => {
                    match line? {
                        Some(line) => match line.parse::<Command>() {
                            Ok(cmd) => {
                                if !self.handle(cmd, out)? {
                                    info!(reason = "quit", "session.stop");
                                    break;
                                }
                            },
                            Err(msg) => writeln!(out, "{msg}")?
                        },
                        None => {
                            debug!(pending = self.pending, "session.input.closed");
                            input_closed = true;
                        }
                    }
                }
            }
        }

        self.teardown().await;
        Ok(())
    }

    /// Cancels everything in flight and waits for the tasks to exit
    pub async fn teardown(&mut self) {
        if self.pending > 0 {
            warn!(pending = self.pending, "session.teardown.inflight");
        }
        self.query.cancel_inflight();
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("session.exit");
    }
}
