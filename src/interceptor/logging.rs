use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tracing::{debug, info, warn};

use crate::call::CallDescriptor;
use crate::envelope::Envelope;
use crate::interceptor::{StreamPolicy, UnaryFunc, UnaryInterceptor};

/// Logs call start, call completion, and every streaming message in either
/// direction. Observes only; payloads and errors pass through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl<Req, Resp> UnaryInterceptor<Req, Resp> for LoggingInterceptor
where
    Req: Envelope,
    Resp: Envelope,
{
    fn wrap(&self, desc: CallDescriptor, next: UnaryFunc<Req, Resp>) -> UnaryFunc<Req, Resp> {
        Arc::new(move |request| {
            info!(call = %desc, request = request.get_ref().kind(), "call start");
            let fut = next(request);
            Box::pin(async move {
                let result = fut.await;
                match &result {
                    Ok(response) => {
                        info!(call = %desc, response = response.get_ref().kind(), "call completed")
                    }
                    Err(error) => warn!(call = %desc, error = %error, "call failed"),
                }
                result
            })
        })
    }
}

impl StreamPolicy for LoggingInterceptor {
    fn on_open(&self, desc: CallDescriptor, _metadata: &mut MetadataMap) {
        info!(call = %desc, "stream opened");
    }

    fn on_send(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        debug!(call = %desc, message = message.kind(), "stream message sent");
    }

    fn on_receive(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        debug!(call = %desc, message = message.kind(), "stream message received");
    }
}
