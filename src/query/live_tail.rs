//! Live tail: re-run one query on a fixed interval
//!
//! The poller owns a thread that fetches the page, hands it to a render
//! callback, then sleeps for the interval. It stops when its owner asks, when
//! the owner drops the handle, or when the endpoint reports that the session
//! is no longer authorized. Transport errors are reported and retried on the
//! next tick.

use super::page::Page;
use super::service::{Identity, QueryRequest, QueryResponse, QueryService};
use crate::core::error::{LoggerError, Result};
use crate::core::fallback;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const LIVE_TAIL_INTERVAL: Duration = Duration::from_secs(5);

/// Where the client goes to authenticate again
pub const REAUTH_TARGET: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("session is not authenticated")]
    Unauthorized,
    #[error("session lacks permission")]
    Forbidden,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Something that can answer the tail's query
pub trait TailSource: Send + 'static {
    fn fetch(&mut self, request: &QueryRequest) -> std::result::Result<Page, PollError>;
}

/// In-process source backed by a `QueryService`
///
/// The identity slot is shared so the host can expire the session while a
/// tail is running.
pub struct ServiceSource {
    service: Arc<QueryService>,
    identity: Arc<RwLock<Option<Identity>>>,
}

impl ServiceSource {
    pub fn new(service: Arc<QueryService>, identity: Arc<RwLock<Option<Identity>>>) -> Self {
        Self { service, identity }
    }
}

impl TailSource for ServiceSource {
    fn fetch(&mut self, request: &QueryRequest) -> std::result::Result<Page, PollError> {
        let identity = self.identity.read().clone();
        match self.service.handle(identity.as_ref(), request) {
            QueryResponse::Ok(page) => Ok(page),
            QueryResponse::Unauthorized => Err(PollError::Unauthorized),
            QueryResponse::Forbidden => Err(PollError::Forbidden),
        }
    }
}

/// Why a tail stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailExit {
    /// The owner stopped it or dropped the handle
    Stopped,
    /// The endpoint answered 401/403; send the user to `redirect`
    AuthExpired { redirect: &'static str },
    /// The render callback panicked
    Crashed(String),
}

pub struct LiveTailPoller {
    request: QueryRequest,
    interval: Duration,
}

impl LiveTailPoller {
    pub fn new(request: QueryRequest) -> Self {
        Self {
            request,
            interval: LIVE_TAIL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling on a dedicated thread
    ///
    /// The first fetch happens immediately. `render` receives every page
    /// that was fetched successfully.
    pub fn spawn<S, F>(self, source: S, render: F) -> Result<TailHandle>
    where
        S: TailSource,
        F: FnMut(&Page) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded(1);
        let polls = Arc::new(AtomicU64::new(0));
        let worker_polls = Arc::clone(&polls);

        let handle = thread::Builder::new()
            .name("log-live-tail".to_string())
            .spawn(move || self.run(source, render, stop_rx, worker_polls))
            .map_err(|e| LoggerError::io_operation("starting live tail", "spawn failed", e))?;

        Ok(TailHandle {
            stop_tx,
            handle,
            polls,
        })
    }

    fn run<S, F>(self, mut source: S, mut render: F, stop: Receiver<()>, polls: Arc<AtomicU64>) -> TailExit
    where
        S: TailSource,
        F: FnMut(&Page),
    {
        loop {
            polls.fetch_add(1, Ordering::Relaxed);
            match source.fetch(&self.request) {
                Ok(page) => render(&page),
                Err(PollError::Unauthorized) | Err(PollError::Forbidden) => {
                    return TailExit::AuthExpired {
                        redirect: REAUTH_TARGET,
                    };
                }
                Err(PollError::Transport(e)) => {
                    // Keep the last rendered page and try again next tick
                    fallback::report("WARNING", format_args!("Live tail poll failed: {}", e));
                }
            }

            match stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return TailExit::Stopped,
            }
        }
    }
}

/// Owner's handle on a running tail
pub struct TailHandle {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<TailExit>,
    polls: Arc<AtomicU64>,
}

impl TailHandle {
    /// Ask the poller to stop after its current fetch
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Fetches attempted so far
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> TailExit {
        match self.handle.join() {
            Ok(exit) => exit,
            Err(panic_info) => TailExit::Crashed(fallback::panic_message(panic_info.as_ref())),
        }
    }
}
