use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::{render, MailTransport, Notice, Notifier, NotifyError};

/// In-process queue feeding a single delivery worker.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<Notice>,
}

/// Receiving half; drains notices until every queue handle is dropped.
#[derive(Debug)]
pub struct QueueWorker {
    receiver: mpsc::UnboundedReceiver<Notice>,
}

impl NotificationQueue {
    pub fn channel() -> (Self, QueueWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, QueueWorker { receiver })
    }

    /// Starts the worker on the current tokio runtime.
    pub fn spawn<T: MailTransport>(transport: T) -> (Self, JoinHandle<()>) {
        let (queue, worker) = Self::channel();
        let handle = tokio::spawn(worker.run(transport));
        (queue, handle)
    }
}

impl Notifier for NotificationQueue {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        self.sender
            .send(notice)
            .map_err(|_| NotifyError::QueueClosed)
    }
}

impl QueueWorker {
    /// Transports may block, so each send runs on the blocking pool.
    pub async fn run<T: MailTransport>(mut self, transport: T) {
        let transport = Arc::new(transport);
        while let Some(notice) = self.receiver.recv().await {
            let Some(message) = render(&notice) else {
                debug!(template = notice.template(), "notice has no mail body, skipping");
                continue;
            };
            let sender = Arc::clone(&transport);
            let delivery = task::spawn_blocking(move || {
                let outcome = sender.send(&message);
                (message, outcome)
            })
            .await;
            let (message, outcome) = match delivery {
                Ok(delivered) => delivered,
                Err(err) => {
                    error!(
                        template = notice.template(),
                        error = %err,
                        "mail transport panicked"
                    );
                    continue;
                }
            };
            match outcome {
                Ok(()) => info!(
                    template = notice.template(),
                    to = %message.to_email,
                    "notification sent"
                ),
                Err(err) => warn!(
                    template = notice.template(),
                    to = %message.to_email,
                    error = %err,
                    "notification delivery failed"
                ),
            }
        }
    }
}
