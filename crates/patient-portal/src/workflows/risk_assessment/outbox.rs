//! Fire-and-forget delivery of notifications.
//!
//! Submissions hand notifications to a queue drained by one worker thread. Each
//! delivery runs on its own short-lived thread and the worker waits at most
//! `delivery_timeout` for it, so a stalled transport delays later notifications
//! by that bound at worst and never the submission itself.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::repository::{Notification, Notifier};

enum OutboxMessage {
    Deliver(Notification),
    Flush(SyncSender<()>),
}

pub struct NotificationOutbox {
    queue: Mutex<Option<Sender<OutboxMessage>>>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationOutbox {
    pub fn start(notifier: Arc<dyn Notifier>, delivery_timeout: Duration) -> Self {
        let (queue, inbox) = mpsc::channel();
        let worker_notifier = Arc::clone(&notifier);
        let spawned = thread::Builder::new()
            .name("risk-notify-outbox".to_string())
            .spawn(move || drain(inbox, worker_notifier, delivery_timeout));

        let queue = match spawned {
            Ok(_) => Some(queue),
            Err(err) => {
                error!(error = %err, "notification worker failed to start; delivering inline");
                None
            }
        };

        Self {
            queue: Mutex::new(queue),
            notifier,
        }
    }

    /// Queue a notification and return immediately.
    pub fn enqueue(&self, notification: Notification) {
        let rejected = {
            let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            match queue.as_ref() {
                Some(sender) => sender
                    .send(OutboxMessage::Deliver(notification))
                    .err()
                    .and_then(|returned| match returned.0 {
                        OutboxMessage::Deliver(notification) => Some(notification),
                        OutboxMessage::Flush(_) => None,
                    }),
                None => Some(notification),
            }
        };

        if let Some(notification) = rejected {
            if let Err(err) = self.notifier.notify(notification) {
                warn!(error = %err, "high-risk notification failed");
            }
        }
    }

    /// Wait until everything queued before this call has been delivered or given
    /// up on. Returns `false` if `wait` elapses first.
    pub fn flush(&self, wait: Duration) -> bool {
        let (done, acknowledged) = mpsc::sync_channel(1);
        {
            let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(sender) = queue.as_ref() else {
                return true;
            };
            if sender.send(OutboxMessage::Flush(done)).is_err() {
                return true;
            }
        }
        acknowledged.recv_timeout(wait).is_ok()
    }
}

fn drain(inbox: Receiver<OutboxMessage>, notifier: Arc<dyn Notifier>, timeout: Duration) {
    while let Ok(message) = inbox.recv() {
        match message {
            OutboxMessage::Deliver(notification) => deliver(&notifier, notification, timeout),
            OutboxMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("notification outbox closed");
}

fn deliver(notifier: &Arc<dyn Notifier>, notification: Notification, timeout: Duration) {
    let subject = notification.subject_id.clone();
    let kind = notification.kind.clone();
    let started = Instant::now();
    let (report, outcome) = mpsc::sync_channel(1);
    let transport = Arc::clone(notifier);

    let spawned = thread::Builder::new()
        .name("risk-notify-delivery".to_string())
        .spawn(move || {
            let _ = report.send(transport.notify(notification));
        });
    if let Err(err) = spawned {
        warn!(
            subject = %subject,
            kind = %kind,
            error = %err,
            "notification delivery thread failed to start"
        );
        return;
    }

    match outcome.recv_timeout(timeout) {
        Ok(Ok(())) => debug!(
            subject = %subject,
            kind = %kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "notification delivered"
        ),
        Ok(Err(err)) => warn!(
            subject = %subject,
            kind = %kind,
            error = %err,
            "high-risk notification failed"
        ),
        Err(RecvTimeoutError::Timeout) => warn!(
            subject = %subject,
            kind = %kind,
            timeout_ms = timeout.as_millis() as u64,
            "notification delivery timed out; continuing without it"
        ),
        Err(RecvTimeoutError::Disconnected) => {
            warn!(subject = %subject, kind = %kind, "notification delivery thread panicked")
        }
    }
}
