//! Stream wrapper: routes every send and receive on an open stream back
//! through the chain's per-message policy.
//!
//! The two halves are independent by construction. The sender owns the
//! outbound `mpsc` half (the transport pulls from the paired receiver); the
//! receiver owns the inbound half. Dropping the sender closes the send-half
//! exactly once. End-of-stream on the inbound half is a terminal condition,
//! not an error, and passes through unchanged.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tonic::Status;

use crate::call::CallDescriptor;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::interceptor::StreamHooks;

/// Boxed inbound message stream, as yielded by the channel abstraction.
pub type InboundStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Boxed outbound message stream, as consumed by the channel abstraction.
pub type OutboundStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Send-half of a wrapped stream.
pub struct InterceptedSender<Req> {
    desc: CallDescriptor,
    hooks: StreamHooks,
    tx: mpsc::Sender<Req>,
}

impl<Req: Envelope> InterceptedSender<Req> {
    /// Create the send-half plus the raw stream the transport will consume.
    pub fn channel(
        desc: CallDescriptor,
        hooks: StreamHooks,
        capacity: usize,
    ) -> (Self, OutboundStream<Req>) {
        let (tx, rx) = mpsc::channel(capacity);
        let outbound = Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));
        (Self { desc, hooks, tx }, outbound)
    }

    /// Apply the chain's send policy, then forward to the underlying half.
    pub async fn send(&self, mut message: Req) -> Result<(), ClientError> {
        self.hooks.on_send(self.desc, &mut message);
        self.tx
            .send(message)
            .await
            .map_err(|_| ClientError::SendClosed)
    }
}

/// Receive-half of a wrapped stream.
pub struct InterceptedReceiver<Resp> {
    desc: CallDescriptor,
    hooks: StreamHooks,
    inner: InboundStream<Resp>,
}

impl<Resp: Envelope> InterceptedReceiver<Resp> {
    pub fn new(desc: CallDescriptor, hooks: StreamHooks, inner: InboundStream<Resp>) -> Self {
        Self { desc, hooks, inner }
    }
}

impl<Resp: Envelope> Stream for InterceptedReceiver<Resp> {
    type Item = Result<Resp, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(mut message))) => {
                let desc = self.desc;
                self.hooks.on_receive(desc, &mut message);
                Poll::Ready(Some(Ok(message)))
            }
            // Errors and end-of-stream are the transport's to report; they
            // pass through unmodified.
            other => other,
        }
    }
}
