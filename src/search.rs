use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

use crate::models::SearchResult;
use crate::tmdb::TmdbApi;

/// Quiet interval required before a keystroke turns into a request.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Blank query, nothing to show.
    Idle,
    /// Non-blank query typed; a request is scheduled or in flight.
    Pending,
    /// The latest request finished (possibly with an error).
    Settled,
}

#[derive(Debug, Clone)]
pub struct SearchState {
    pub phase: SearchPhase,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub failed: bool,
}

impl SearchState {
    fn idle() -> Self {
        Self {
            phase: SearchPhase::Idle,
            query: String::new(),
            results: Vec::new(),
            failed: false,
        }
    }
}

/// Debounced multi-search over the metadata API. Callers push keystrokes
/// with [`set_query`](Self::set_query) and observe [`SearchState`] through a
/// watch channel. Only the most recently issued request may settle the
/// state; superseded responses are discarded, never merged.
pub struct SearchAggregator {
    query_tx: mpsc::UnboundedSender<String>,
    state_rx: watch::Receiver<SearchState>,
    task: JoinHandle<()>,
}

impl SearchAggregator {
    pub fn new(api: Arc<dyn TmdbApi>) -> Self {
        Self::with_debounce(api, DEBOUNCE)
    }

    pub fn with_debounce(api: Arc<dyn TmdbApi>, debounce: Duration) -> Self {
        let (query_tx, query_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SearchState::idle());
        let task = tokio::spawn(run(api, debounce, query_rx, state_tx));
        Self {
            query_tx,
            state_rx,
            task,
        }
    }

    /// Feeds one keystroke's worth of query text.
    pub fn set_query(&self, query: impl Into<String>) {
        let _ = self.query_tx.send(query.into());
    }

    pub fn state(&self) -> SearchState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state_rx.clone()
    }
}

impl Drop for SearchAggregator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    api: Arc<dyn TmdbApi>,
    debounce: Duration,
    mut query_rx: mpsc::UnboundedReceiver<String>,
    state_tx: watch::Sender<SearchState>,
) {
    let (result_tx, mut result_rx) =
        mpsc::unbounded_channel::<(u64, String, Result<Vec<SearchResult>>)>();
    // Sequence of the most recently issued request. Bumping it without
    // issuing (on query clear) invalidates whatever is in flight.
    let mut seq: u64 = 0;
    let mut pending: Option<String> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            keystroke = query_rx.recv() => {
                let Some(query) = keystroke else { break };
                if query.trim().is_empty() {
                    // Clearing bypasses debounce and goes straight to Idle.
                    seq += 1;
                    pending = None;
                    let _ = state_tx.send(SearchState::idle());
                } else {
                    deadline = Instant::now() + debounce;
                    state_tx.send_modify(|state| {
                        state.phase = SearchPhase::Pending;
                        state.query = query.clone();
                        state.failed = false;
                    });
                    pending = Some(query);
                }
            }
            _ = sleep_until(deadline), if pending.is_some() => {
                let query = pending.take().unwrap_or_default();
                seq += 1;
                let request_seq = seq;
                let api = api.clone();
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    let outcome = api.search_multi(&query).await;
                    let _ = result_tx.send((request_seq, query, outcome));
                });
            }
            Some((response_seq, query, outcome)) = result_rx.recv() => {
                if response_seq != seq || pending.is_some() {
                    debug!("discarding superseded search response for '{query}'");
                    continue;
                }
                let state = match outcome {
                    Ok(results) => SearchState {
                        phase: SearchPhase::Settled,
                        query,
                        results: results.into_iter().filter(|r| r.is_supported()).collect(),
                        failed: false,
                    },
                    Err(err) => {
                        warn!("search for '{query}' failed: {err:#}");
                        SearchState {
                            phase: SearchPhase::Settled,
                            query,
                            results: Vec::new(),
                            failed: true,
                        }
                    }
                };
                let _ = state_tx.send(state);
            }
        }
    }
}
