use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::call::CallDescriptor;
use crate::error::ClientError;
use crate::interceptor::{UnaryFunc, UnaryInterceptor};

/// Bounds the downstream call with a deadline.
///
/// The remainder of the chain runs under `tokio::time::timeout`; if the
/// deadline elapses mid-call the downstream future is dropped and the call
/// fails with [`ClientError::DeadlineExceeded`], which propagates like any
/// other failure.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineInterceptor {
    timeout: Duration,
}

impl DeadlineInterceptor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<Req, Resp> UnaryInterceptor<Req, Resp> for DeadlineInterceptor
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, desc: CallDescriptor, next: UnaryFunc<Req, Resp>) -> UnaryFunc<Req, Resp> {
        let timeout = self.timeout;
        Arc::new(move |request| {
            let fut = next(request);
            Box::pin(async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(call = %desc, timeout = ?timeout, "deadline exceeded");
                        Err(ClientError::DeadlineExceeded(timeout))
                    }
                }
            })
        })
    }
}
