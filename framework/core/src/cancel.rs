use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Cancellation signal for a single run.
///
/// Cancellation is cooperative: the worker executing the run checks its listener between steps
/// and stops before starting the next one. Nothing is interrupted mid-step.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn cancel(&self) {
        if let Err(e) = self.sender.send(()) {
            // Will fail if nobody is listening for the cancel signal, which happens when the
            // run has already reached a terminal state.
            log::debug!("No listener for cancel signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct CancelListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl CancelListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point in time check whether the run has been asked to cancel. If this returns true then
    /// no further steps should be started.
    pub fn should_cancel(&mut self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut guard) => {
                match guard.try_recv() {
                    Ok(_) => true,
                    Err(tokio::sync::broadcast::error::TryRecvError::Closed) => true,
                    // If the receiver is empty or lagged then the run should keep going.
                    Err(_) => false,
                }
            }
            Err(_) => false,
        }
    }
}
