//! Duplex coordinator: concurrent send and receive loops over one stream
//! handle, synchronized by a one-shot completion signal.
//!
//! The send task owns the send-half exclusively, the receive task the
//! receive-half; the only state they share is a pair of atomic counters. The
//! receive task fires the completion signal exactly once on every path it can
//! exit through (end-of-stream, error, deadline), and the initiating call does
//! not return until the signal has fired.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::call::CallDescriptor;
use crate::envelope::Envelope;
use crate::error::{ClientError, log_status_details};
use crate::stream::{InterceptedReceiver, InterceptedSender};

/// Outcome of a completed duplex exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplexSummary {
    pub sent: u64,
    pub received: u64,
}

/// One client-initiated duplex exchange over an open stream.
pub struct DuplexCall<Req, Resp> {
    desc: CallDescriptor,
    sender: InterceptedSender<Req>,
    receiver: InterceptedReceiver<Resp>,
    deadline: Option<Duration>,
}

impl<Req, Resp> DuplexCall<Req, Resp>
where
    Req: Envelope,
    Resp: Envelope,
{
    pub fn new(
        desc: CallDescriptor,
        sender: InterceptedSender<Req>,
        receiver: InterceptedReceiver<Resp>,
    ) -> Self {
        Self {
            desc,
            sender,
            receiver,
            deadline: None,
        }
    }

    /// Bound the whole exchange; both loops observe the deadline.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Drive the exchange: send every outbound message in order, close the
    /// send-half, drain inbound messages into `on_message`, and return once
    /// the completion signal has fired.
    pub async fn run<I, F>(self, outbound: I, mut on_message: F) -> Result<DuplexSummary, ClientError>
    where
        I: IntoIterator<Item = Req> + Send + 'static,
        I::IntoIter: Send,
        F: FnMut(Resp) + Send + 'static,
    {
        let desc = self.desc;
        let timeout = self.deadline;
        let deadline_at = timeout.map(|d| tokio::time::Instant::now() + d);

        let sent = Arc::new(AtomicU64::new(0));
        let received = Arc::new(AtomicU64::new(0));
        let (done_tx, done_rx) = oneshot::channel::<Result<(), ClientError>>();

        let sender = self.sender;
        let sent_counter = sent.clone();
        let send_task = tokio::spawn(async move {
            for message in outbound {
                tokio::select! {
                    result = sender.send(message) => match result {
                        Ok(()) => {
                            sent_counter.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(error) => {
                            // Aborts sending only; the receive loop ends on
                            // its own terminal condition.
                            warn!(call = %desc, error = %error, "send loop aborted");
                            break;
                        }
                    },
                    _ = until(deadline_at) => {
                        warn!(call = %desc, "send loop cancelled at deadline");
                        break;
                    }
                }
            }
            // Dropping the sender closes the send-half, exactly once.
        });

        let mut receiver = self.receiver;
        let received_counter = received.clone();
        tokio::spawn(async move {
            let outcome = loop {
                tokio::select! {
                    item = receiver.next() => match item {
                        Some(Ok(message)) => {
                            received_counter.fetch_add(1, Ordering::Relaxed);
                            on_message(message);
                        }
                        Some(Err(status)) => {
                            log_status_details(&status);
                            break Err(ClientError::from(status));
                        }
                        // End-of-stream: the expected terminal condition.
                        None => break Ok(()),
                    },
                    _ = until(deadline_at) => {
                        break Err(ClientError::DeadlineExceeded(
                            timeout.unwrap_or_default(),
                        ));
                    }
                }
            };
            debug!(call = %desc, ok = outcome.is_ok(), "receive loop finished");
            let _ = done_tx.send(outcome);
        });

        // Block on the completion signal before anything else; a dropped
        // sender without a signal means the receive task died abnormally.
        let outcome = done_rx.await.map_err(|_| ClientError::Incomplete)?;
        let _ = send_task.await;
        outcome?;

        Ok(DuplexSummary {
            sent: sent.load(Ordering::Relaxed),
            received: received.load(Ordering::Relaxed),
        })
    }
}

async fn until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
