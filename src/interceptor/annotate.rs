use std::sync::Arc;

use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tracing::debug;

use crate::call::CallDescriptor;
use crate::envelope::Envelope;
use crate::interceptor::{StreamPolicy, UnaryFunc, UnaryInterceptor};

/// Mutates payloads through their [`Envelope`] capability and appends fixed
/// metadata pairs to every outgoing call.
///
/// Requests are annotated before dispatch, responses after receipt. Kinds
/// whose `annotate` is a no-op pass through unchanged.
#[derive(Debug, Clone)]
pub struct AnnotateInterceptor {
    request_tag: String,
    response_tag: String,
    metadata: Vec<(&'static str, String)>,
}

impl AnnotateInterceptor {
    pub fn new(request_tag: impl Into<String>, response_tag: impl Into<String>) -> Self {
        Self {
            request_tag: request_tag.into(),
            response_tag: response_tag.into(),
            metadata: Vec::new(),
        }
    }

    /// Append a metadata pair to every call this unit wraps.
    pub fn with_metadata(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.metadata.push((key, value.into()));
        self
    }

    fn append_metadata(&self, metadata: &mut MetadataMap) {
        for (key, value) in &self.metadata {
            if let Ok(value) = MetadataValue::<Ascii>::try_from(value.as_str()) {
                metadata.append(*key, value);
            }
        }
    }

    fn annotate(&self, desc: CallDescriptor, tag: &str, message: &mut dyn Envelope) {
        if message.annotatable() {
            message.annotate(tag);
            debug!(call = %desc, message = message.kind(), tag = %tag, "mutation applied");
        }
    }
}

impl<Req, Resp> UnaryInterceptor<Req, Resp> for AnnotateInterceptor
where
    Req: Envelope,
    Resp: Envelope,
{
    fn wrap(&self, desc: CallDescriptor, next: UnaryFunc<Req, Resp>) -> UnaryFunc<Req, Resp> {
        let unit = self.clone();
        Arc::new(move |mut request| {
            unit.annotate(desc, &unit.request_tag, request.get_mut());
            unit.append_metadata(request.metadata_mut());

            let fut = next(request);
            let unit = unit.clone();
            Box::pin(async move {
                let mut response = fut.await?;
                unit.annotate(desc, &unit.response_tag, response.get_mut());
                Ok(response)
            })
        })
    }
}

impl StreamPolicy for AnnotateInterceptor {
    fn on_open(&self, _desc: CallDescriptor, metadata: &mut MetadataMap) {
        self.append_metadata(metadata);
    }

    fn on_send(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        self.annotate(desc, &self.request_tag, message);
    }

    fn on_receive(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        self.annotate(desc, &self.response_tag, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallKind;
    use crate::interceptor::InterceptorChain;
    use crate::proto::hello::{HelloRequest, HelloResponse};
    use tonic::{Request, Response};

    fn desc() -> CallDescriptor {
        CallDescriptor::new("hello.HelloService", "SayHello", CallKind::Unary)
    }

    #[tokio::test]
    async fn test_request_and_response_both_annotated() {
        let chain = InterceptorChain::new().with(Arc::new(
            AnnotateInterceptor::new("[req] ", "[resp] ").with_metadata("x-meta-1", "one"),
        ));

        let terminal: UnaryFunc<HelloRequest, HelloResponse> = Arc::new(|request| {
            let seen_metadata = request.metadata().get("x-meta-1").cloned();
            let name = request.into_inner().name;
            Box::pin(async move {
                assert_eq!(seen_metadata.unwrap(), "one");
                Ok(Response::new(HelloResponse {
                    message: format!("hi {name}"),
                }))
            })
        });

        let composed = chain.compose(desc(), terminal);
        let response = composed(Request::new(HelloRequest {
            name: "ann".to_string(),
        }))
        .await
        .unwrap();

        // Request annotated before the terminal saw it, response after.
        assert_eq!(response.into_inner().message, "[resp] hi [req] ann");
    }

    #[test]
    fn test_stream_open_appends_metadata() {
        let unit = AnnotateInterceptor::new("", "")
            .with_metadata("x-meta-1", "one")
            .with_metadata("x-meta-2", "two");

        let mut metadata = MetadataMap::new();
        unit.on_open(desc(), &mut metadata);

        assert_eq!(metadata.get("x-meta-1").unwrap(), "one");
        assert_eq!(metadata.get("x-meta-2").unwrap(), "two");
    }
}
