//! Cancel-and-reschedule timer for search input.
//!
//! A single worker thread owns the pending value. Every [`Debouncer::push`]
//! replaces it and restarts the quiet period; once the period passes without
//! input, the callback runs once with the latest value.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Message<T> {
    Push(T),
    Cancel,
}

pub struct Debouncer<T: Send + 'static> {
    tx: Option<Sender<Message<T>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(quiet: Duration, mut fire: impl FnMut(T) + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel::<Message<T>>();

        let worker = thread::spawn(move || {
            let mut pending: Option<T> = None;
            loop {
                let message = if pending.is_some() {
                    match rx.recv_timeout(quiet) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some(value) = pending.take() {
                                fire(value);
                            }
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                } else {
                    match rx.recv() {
                        Ok(message) => message,
                        Err(_) => break,
                    }
                };

                match message {
                    Message::Push(value) => pending = Some(value),
                    Message::Cancel => pending = None,
                }
            }
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Replace the pending value and restart the quiet period.
    pub fn push(&self, value: T) {
        self.send(Message::Push(value));
    }

    /// Drop the pending value, if any.
    pub fn cancel(&self) {
        self.send(Message::Cancel);
    }

    fn send(&self, message: Message<T>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(message);
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    /// Pending values are discarded, not fired.
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(quiet_ms: u64) -> (Debouncer<String>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let debouncer = Debouncer::new(Duration::from_millis(quiet_ms), move |value| {
            let _ = tx.send(value);
        });
        (debouncer, rx)
    }

    #[test]
    fn burst_fires_once_with_latest_value() {
        let (debouncer, rx) = recorder(60);
        for query in ["w", "wi", "wif", "wifi"] {
            debouncer.push(query.to_string());
        }

        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fired, "wifi");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn separate_bursts_fire_separately() {
        let (debouncer, rx) = recorder(30);
        debouncer.push("a".to_string());
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "a");
        debouncer.push("b".to_string());
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "b");
    }

    #[test]
    fn cancel_drops_pending_value() {
        let (debouncer, rx) = recorder(80);
        debouncer.push("secret".to_string());
        debouncer.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn drop_discards_pending_value() {
        let (debouncer, rx) = recorder(500);
        debouncer.push("late".to_string());
        drop(debouncer);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
