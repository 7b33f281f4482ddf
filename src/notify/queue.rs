//! Background delivery over a bounded queue.
//!
//! `notify` only enqueues. A dedicated worker thread drains the queue into a
//! [`Deliver`] sink. When the queue is full the message is dropped, so a
//! slow or dead endpoint can never back-pressure the caller.

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use super::{DeliveryError, Notifier};

/// A blocking delivery backend run on the worker thread.
pub trait Deliver {
    fn deliver(&mut self, message: &str) -> Result<(), DeliveryError>;
}

impl<F> Deliver for F
where
    F: FnMut(&str) -> Result<(), DeliveryError>,
{
    fn deliver(&mut self, message: &str) -> Result<(), DeliveryError> {
        self(message)
    }
}

/// Non-blocking [`Notifier`] backed by a worker thread.
pub struct QueuedNotifier {
    tx: Option<SyncSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedNotifier {
    /// Spawns the worker and waits until its sink is built.
    ///
    /// `make_sink` runs on the worker thread, so sinks that must not be
    /// built inside an async runtime are safe here. If it fails, the worker
    /// exits and its error is returned.
    pub fn spawn<S, F>(capacity: usize, make_sink: F) -> Result<Self, DeliveryError>
    where
        S: Deliver + 'static,
        F: FnOnce() -> Result<S, DeliveryError> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<String>(capacity.max(1));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), DeliveryError>>();
        let worker = thread::Builder::new()
            .name("duokey-notify".into())
            .spawn(move || {
                let mut sink = match make_sink() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                for message in rx {
                    if let Err(e) = sink.deliver(&message) {
                        log::warn!("notification dropped: {}", e);
                    }
                }
                log::debug!("notification worker stopped");
            })
            .map_err(|e| {
                log::error!("cannot start notification worker: {}", e);
                DeliveryError::Setup
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx: Some(tx),
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(DeliveryError::Setup)
            }
        }
    }

    /// Closes the queue and waits for queued messages to be attempted.
    pub fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("notification worker panicked");
            }
        }
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, message: &str) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        match tx.try_send(message.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::warn!("notification queue full; message dropped"),
            Err(TrySendError::Disconnected(_)) => log::debug!("notification worker gone; message dropped"),
        }
    }
}

impl Drop for QueuedNotifier {
    fn drop(&mut self) {
        // Closing the sender lets the worker exit on its own; not joined.
        self.tx.take();
    }
}
