//! # Change Trigger
//!
//! Polls the source workbook's metadata and queues a re-ingestion whenever its
//! modification time or length changes. The queue holds a single pending run;
//! notifications arriving while one is pending are coalesced into it. One
//! consumer drains the queue and runs the pipeline on the blocking pool, so
//! runs never overlap.
use crate::config::WatchConfig;
use crate::ingest::Ingestor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Observable state of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signature {
    modified: Option<SystemTime>,
    len: u64,
}

impl Signature {
    /// `None` when the file cannot be inspected.
    fn of(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Sending half of the change queue.
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    sender: mpsc::Sender<()>,
}

impl ChangeNotifier {
    /// Queues a run. Returns false when a run is already pending or the consumer is gone.
    pub fn notify(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("ingestion already pending, change coalesced");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Creates the single-slot change queue.
pub fn change_queue() -> (ChangeNotifier, mpsc::Receiver<()>) {
    let (sender, receiver) = mpsc::channel(1);
    (ChangeNotifier { sender }, receiver)
}

/// Running poller and consumer tasks.
pub struct ChangeTrigger {
    notifier: ChangeNotifier,
    poller: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl ChangeTrigger {
    /// Starts watching the ingestor's source file. Must be called inside a tokio runtime.
    pub fn spawn(ingestor: Arc<Ingestor>, config: &WatchConfig) -> Self {
        let (notifier, receiver) = change_queue();
        let path = ingestor.source().to_path_buf();
        info!(source = %path.display(), interval_ms = config.poll_interval().as_millis() as u64, "watching source workbook");

        let poller = tokio::spawn(poll_source(path, config.poll_interval(), notifier.clone()));
        let consumer = tokio::spawn(drain(ingestor, receiver));
        Self {
            notifier,
            poller,
            consumer,
        }
    }

    /// Handle for queuing runs by hand.
    pub fn notifier(&self) -> ChangeNotifier {
        self.notifier.clone()
    }

    /// Stops polling and waits for an in-flight run to finish.
    pub async fn shutdown(self) {
        self.poller.abort();
        drop(self.notifier);
        if let Err(e) = self.consumer.await {
            error!(error = %e, "ingestion consumer failed");
        }
    }
}

async fn poll_source(path: PathBuf, period: Duration, notifier: ChangeNotifier) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Signature::of(&path);

    loop {
        ticker.tick().await;
        let current = Signature::of(&path);
        if current == last {
            continue;
        }
        match current {
            Some(_) => {
                debug!(source = %path.display(), "source workbook changed");
                notifier.notify();
            }
            None => warn!(source = %path.display(), "source workbook disappeared"),
        }
        last = current;
    }
}

async fn drain(ingestor: Arc<Ingestor>, mut receiver: mpsc::Receiver<()>) {
    while receiver.recv().await.is_some() {
        let ingestor = ingestor.clone();
        match tokio::task::spawn_blocking(move || ingestor.run()).await {
            // run() logs its own outcome, failures included
            Ok(_) => (),
            Err(e) => error!(error = %e, "ingestion task panicked"),
        }
    }
}
