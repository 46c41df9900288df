use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::error;

use crate::error::WriterError;

/// Receives unrecoverable errors from replay components.
pub trait ErrorHandler: Send + Sync {
    fn report_fatal(&self, component: &str, error: &WriterError);
}

impl<H: ErrorHandler + ?Sized> ErrorHandler for Arc<H> {
    fn report_fatal(&self, component: &str, error: &WriterError) {
        (**self).report_fatal(component, error)
    }
}

/// Error handler that logs the failure and wakes up whoever holds the
/// matching [`FatalSignal`], typically the process supervisor.
#[derive(Debug, Clone)]
pub struct ShutdownOnFatal {
    tx: Arc<watch::Sender<Option<String>>>,
    reports: Arc<AtomicUsize>,
}

impl ShutdownOnFatal {
    pub fn new() -> (Self, FatalSignal) {
        let (tx, rx) = watch::channel(None);
        let handler = Self {
            tx: Arc::new(tx),
            reports: Arc::new(AtomicUsize::new(0)),
        };
        (handler, FatalSignal { rx })
    }

    /// Number of fatal reports received so far.
    pub fn report_count(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }
}

impl ErrorHandler for ShutdownOnFatal {
    fn report_fatal(&self, component: &str, err: &WriterError) {
        self.reports.fetch_add(1, Ordering::SeqCst);
        error!(tag = component, error = %err, "Fatal error, shutting down");

        let message = format!("{}: {}", component, err);
        // Keep the first report; later ones are only logged.
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(message);
            true
        });
    }
}

/// Resolves once a fatal error was reported.
#[derive(Debug, Clone)]
pub struct FatalSignal {
    rx: watch::Receiver<Option<String>>,
}

impl FatalSignal {
    /// Wait for the first fatal report. Returns `None` if every handler was
    /// dropped without reporting.
    pub async fn wait(&mut self) -> Option<String> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(message) => message.clone(),
            Err(_) => None,
        }
    }

    /// The first fatal report, if one was made.
    pub fn get(&self) -> Option<String> {
        self.rx.borrow().clone()
    }
}
