//! Per-shape call dispatch: composes the interceptor chain, the channel, the
//! stream wrapper, and the duplex coordinator for one request/response pair.
//!
//! Facades stay thin by delegating here; this module owns the mechanics of
//! attaching metadata, surfacing response metadata to the observer, and
//! picking the right concurrency structure per call shape.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tonic::Request;
use tonic::metadata::MetadataMap;

use crate::call::CallDescriptor;
use crate::channel::CallChannel;
use crate::duplex::{DuplexCall, DuplexSummary};
use crate::envelope::Envelope;
use crate::error::{ClientError, log_status_details};
use crate::interceptor::{InterceptorChain, UnaryFunc};
use crate::metadata::MetadataObserver;
use crate::stream::{InterceptedReceiver, InterceptedSender};

pub(crate) struct CallPipeline<C, Req, Resp> {
    channel: Arc<C>,
    chain: InterceptorChain<Req, Resp>,
    deadline: Option<Duration>,
    capacity: usize,
    observer: Option<MetadataObserver>,
}

impl<C, Req, Resp> CallPipeline<C, Req, Resp>
where
    C: CallChannel<Req, Resp>,
    Req: Envelope,
    Resp: Envelope,
{
    pub(crate) fn new(
        channel: Arc<C>,
        chain: InterceptorChain<Req, Resp>,
        deadline: Option<Duration>,
        capacity: usize,
        observer: Option<MetadataObserver>,
    ) -> Self {
        Self {
            channel,
            chain,
            deadline,
            capacity,
            observer,
        }
    }

    pub(crate) async fn unary(
        &self,
        desc: CallDescriptor,
        message: Req,
        metadata: Option<MetadataMap>,
    ) -> Result<Resp, ClientError> {
        let observe = metadata.is_some();
        let request = build_request(message, metadata);

        let channel = self.channel.clone();
        let terminal: UnaryFunc<Req, Resp> = Arc::new(move |request| {
            let fut = channel.unary(desc, request);
            Box::pin(async move {
                fut.await.map_err(|status| {
                    log_status_details(&status);
                    ClientError::from(status)
                })
            })
        });

        let composed = self.chain.compose(desc, terminal);
        let response = composed(request).await?;
        if observe {
            self.observe(response.metadata());
        }
        Ok(response.into_inner())
    }

    pub(crate) async fn server_streaming(
        &self,
        desc: CallDescriptor,
        message: Req,
        metadata: Option<MetadataMap>,
    ) -> Result<Vec<Resp>, ClientError> {
        let observe = metadata.is_some();
        let mut request = build_request(message, metadata);
        self.chain.open_stream(desc, request.metadata_mut());

        // The deadline covers dispatch and drain alike; a transport that
        // stalls before sending headers still ends at the deadline.
        let exchange = async {
            let response = self.channel.server_streaming(desc, request).await?;
            let (headers, inbound, _extensions) = response.into_parts();
            if observe {
                self.observe(&headers);
            }

            let mut receiver = InterceptedReceiver::new(desc, self.chain.stream_hooks(), inbound);
            let mut collected = Vec::new();
            loop {
                match receiver.next().await {
                    Some(Ok(message)) => collected.push(message),
                    Some(Err(status)) => {
                        log_status_details(&status);
                        return Err(ClientError::from(status));
                    }
                    // End-of-stream terminates the drain cleanly.
                    None => return Ok(collected),
                }
            }
        };

        bounded(self.deadline, exchange).await
    }

    /// Degenerate duplex: all sends happen before the single reply, so no
    /// coordinator is needed — send everything, close, await the response.
    pub(crate) async fn client_streaming(
        &self,
        desc: CallDescriptor,
        messages: Vec<Req>,
        metadata: Option<MetadataMap>,
    ) -> Result<Resp, ClientError> {
        let observe = metadata.is_some();
        let (sender, outbound) =
            InterceptedSender::channel(desc, self.chain.stream_hooks(), self.capacity);

        let mut request = build_request(outbound, metadata);
        self.chain.open_stream(desc, request.metadata_mut());

        // The whole exchange runs under the deadline: a transport that never
        // pulls the outbound stream would otherwise block `send` forever once
        // the channel buffer fills.
        let exchange = async {
            // Dispatch first: the transport pulls the outbound stream while
            // the call future is in flight.
            let call = tokio::spawn(self.channel.client_streaming(desc, request));

            for message in messages {
                sender.send(message).await?;
            }
            drop(sender);

            let response = call
                .await
                .map_err(|_| ClientError::Incomplete)?
                .map_err(|status| {
                    log_status_details(&status);
                    ClientError::from(status)
                })?;

            let (headers, mut message, _extensions) = response.into_parts();
            self.chain.stream_hooks().on_receive(desc, &mut message);
            Ok::<_, ClientError>((headers, message))
        };

        let (headers, message) = bounded(self.deadline, exchange).await?;
        if observe {
            self.observe(&headers);
        }
        Ok(message)
    }

    pub(crate) async fn bidi_streaming<F>(
        &self,
        desc: CallDescriptor,
        messages: Vec<Req>,
        metadata: Option<MetadataMap>,
        on_message: F,
    ) -> Result<DuplexSummary, ClientError>
    where
        F: FnMut(Resp) + Send + 'static,
    {
        let observe = metadata.is_some();
        let (sender, outbound) =
            InterceptedSender::channel(desc, self.chain.stream_hooks(), self.capacity);

        let mut request = build_request(outbound, metadata);
        self.chain.open_stream(desc, request.metadata_mut());

        // Dispatch is bounded here; the duplex loops get whatever deadline
        // budget is left once the stream is open.
        let started = tokio::time::Instant::now();
        let response = bounded(self.deadline, async {
            self.channel
                .bidi_streaming(desc, request)
                .await
                .map_err(ClientError::from)
        })
        .await?;
        let (headers, inbound, _extensions) = response.into_parts();
        if observe {
            self.observe(&headers);
        }

        let remaining = self
            .deadline
            .map(|deadline| deadline.saturating_sub(started.elapsed()));
        let receiver = InterceptedReceiver::new(desc, self.chain.stream_hooks(), inbound);
        DuplexCall::new(desc, sender, receiver)
            .with_deadline(remaining)
            .run(messages, on_message)
            .await
    }

    fn observe(&self, metadata: &MetadataMap) {
        match &self.observer {
            Some(observer) => observer(metadata),
            None => crate::metadata::log_response_metadata(metadata),
        }
    }
}

async fn bounded<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    match deadline {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ClientError::DeadlineExceeded(timeout))?,
        None => fut.await,
    }
}

fn build_request<T>(message: T, metadata: Option<MetadataMap>) -> Request<T> {
    let mut request = Request::new(message);
    if let Some(metadata) = metadata {
        *request.metadata_mut() = metadata;
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallKind;
    use crate::channel::testing::FakeChannel;
    use crate::interceptor::AnnotateInterceptor;
    use crate::metadata::request_metadata;
    use crate::proto::resiliency::{ResiliencyRequest, ResiliencyResponse};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn desc(kind: CallKind) -> CallDescriptor {
        CallDescriptor::new("resiliency.ResiliencyService", "UnaryResiliency", kind)
    }

    fn annotating_chain() -> InterceptorChain<ResiliencyRequest, ResiliencyResponse> {
        InterceptorChain::new().with(Arc::new(AnnotateInterceptor::new("[req] ", "[resp] ")))
    }

    fn pipeline(
        channel: FakeChannel,
        chain: InterceptorChain<ResiliencyRequest, ResiliencyResponse>,
    ) -> CallPipeline<FakeChannel, ResiliencyRequest, ResiliencyResponse> {
        CallPipeline::new(Arc::new(channel), chain, Some(Duration::from_secs(2)), 8, None)
    }

    #[tokio::test]
    async fn test_unary_runs_chain_around_transport() {
        let seen = Arc::new(Mutex::new(String::new()));
        let seen_in_channel = seen.clone();
        let channel = FakeChannel::with_unary(Arc::new(move |request: ResiliencyRequest| {
            *seen_in_channel.lock().unwrap() = format!("delay={}", request.min_delay_second);
            Ok(ResiliencyResponse {
                dummy_string: "pong".to_string(),
            })
        }));

        let pipeline = pipeline(channel, annotating_chain());
        let reply = pipeline
            .unary(
                desc(CallKind::Unary),
                ResiliencyRequest {
                    min_delay_second: 1,
                    max_delay_second: 2,
                    status_codes: vec![0],
                },
                None,
            )
            .await
            .unwrap();

        // The response passed back out through the chain.
        assert_eq!(reply.dummy_string, "[resp] pong");
        assert_eq!(seen.lock().unwrap().as_str(), "delay=1");
    }

    #[tokio::test]
    async fn test_unary_attaches_metadata_and_surfaces_headers() {
        let mut headers = MetadataMap::new();
        headers.insert("x-served-by", "fake".parse().unwrap());
        let channel = FakeChannel {
            response_metadata: headers,
            ..FakeChannel::default()
        };
        let seen_metadata = channel.seen_metadata.clone();

        let observed = Arc::new(Mutex::new(None::<MetadataMap>));
        let observed_in_hook = observed.clone();
        let observer: MetadataObserver = Arc::new(move |metadata: &MetadataMap| {
            *observed_in_hook.lock().unwrap() = Some(metadata.clone());
        });

        let pipeline = CallPipeline::new(
            Arc::new(channel),
            InterceptorChain::new(),
            None,
            8,
            Some(observer),
        );
        pipeline
            .unary(
                desc(CallKind::Unary),
                ResiliencyRequest::default(),
                Some(request_metadata()),
            )
            .await
            .unwrap();

        let sent = seen_metadata.lock().unwrap().clone().unwrap();
        assert!(sent.contains_key(crate::metadata::REQUEST_ID_KEY));

        let surfaced = observed.lock().unwrap().clone().unwrap();
        assert_eq!(surfaced.get("x-served-by").unwrap(), "fake");
    }

    #[tokio::test]
    async fn test_server_streaming_collects_with_receive_policy() {
        let channel = FakeChannel {
            server_count: 3,
            ..FakeChannel::default()
        };

        let pipeline = pipeline(channel, annotating_chain());
        let replies = pipeline
            .server_streaming(
                desc(CallKind::ServerStreaming),
                ResiliencyRequest::default(),
                None,
            )
            .await
            .unwrap();

        let messages: Vec<_> = replies.into_iter().map(|r| r.dummy_string).collect();
        assert_eq!(messages, vec!["[resp] stream-0", "[resp] stream-1", "[resp] stream-2"]);
    }

    #[tokio::test]
    async fn test_client_streaming_sends_all_before_single_reply() {
        let channel = FakeChannel::default();

        // Ten requests against a capacity-8 outbound channel: the in-flight
        // call must be draining while sends continue.
        let pipeline = pipeline(channel, annotating_chain());
        let reply = pipeline
            .client_streaming(
                desc(CallKind::ClientStreaming),
                vec![ResiliencyRequest::default(); 10],
                None,
            )
            .await
            .unwrap();

        assert_eq!(reply.dummy_string, "[resp] received 10 messages");
    }

    #[tokio::test]
    async fn test_bidi_streaming_counts_both_directions() {
        let channel = FakeChannel::default();
        let delivered = Arc::new(AtomicU64::new(0));
        let delivered_in_callback = delivered.clone();

        let pipeline = pipeline(channel, annotating_chain());
        let summary = pipeline
            .bidi_streaming(
                desc(CallKind::BidiStreaming),
                vec![ResiliencyRequest::default(); 10],
                None,
                move |_reply| {
                    delivered_in_callback.fetch_add(1, Ordering::Relaxed);
                },
            )
            .await
            .unwrap();

        assert_eq!(summary, DuplexSummary { sent: 10, received: 10 });
        assert_eq!(delivered.load(Ordering::Relaxed), 10);
    }

    /// Accepts every call, keeps the request alive, and never answers.
    struct StalledChannel;

    impl CallChannel<ResiliencyRequest, ResiliencyResponse> for StalledChannel {
        fn unary(
            &self,
            _desc: CallDescriptor,
            request: tonic::Request<ResiliencyRequest>,
        ) -> crate::interceptor::BoxFuture<
            Result<tonic::Response<ResiliencyResponse>, tonic::Status>,
        > {
            Box::pin(async move {
                let _request = request;
                std::future::pending().await
            })
        }

        fn server_streaming(
            &self,
            _desc: CallDescriptor,
            request: tonic::Request<ResiliencyRequest>,
        ) -> crate::interceptor::BoxFuture<
            Result<
                tonic::Response<crate::stream::InboundStream<ResiliencyResponse>>,
                tonic::Status,
            >,
        > {
            Box::pin(async move {
                let _request = request;
                std::future::pending().await
            })
        }

        fn client_streaming(
            &self,
            _desc: CallDescriptor,
            request: tonic::Request<crate::stream::OutboundStream<ResiliencyRequest>>,
        ) -> crate::interceptor::BoxFuture<
            Result<tonic::Response<ResiliencyResponse>, tonic::Status>,
        > {
            // Holding the request keeps the outbound stream open, so sends
            // block on backpressure instead of failing fast.
            Box::pin(async move {
                let _request = request;
                std::future::pending().await
            })
        }

        fn bidi_streaming(
            &self,
            _desc: CallDescriptor,
            request: tonic::Request<crate::stream::OutboundStream<ResiliencyRequest>>,
        ) -> crate::interceptor::BoxFuture<
            Result<
                tonic::Response<crate::stream::InboundStream<ResiliencyResponse>>,
                tonic::Status,
            >,
        > {
            Box::pin(async move {
                let _request = request;
                std::future::pending().await
            })
        }
    }

    fn stalled_pipeline(
        deadline: Duration,
        capacity: usize,
    ) -> CallPipeline<StalledChannel, ResiliencyRequest, ResiliencyResponse> {
        CallPipeline::new(
            Arc::new(StalledChannel),
            InterceptorChain::new(),
            Some(deadline),
            capacity,
            None,
        )
    }

    #[tokio::test]
    async fn test_client_streaming_send_phase_observes_deadline() {
        // Capacity 2 with 10 messages against a transport that never pulls
        // the outbound stream: sends block on backpressure and only the
        // deadline can end the call.
        let pipeline = stalled_pipeline(Duration::from_millis(100), 2);

        let result = pipeline
            .client_streaming(
                desc(CallKind::ClientStreaming),
                vec![ResiliencyRequest::default(); 10],
                None,
            )
            .await;

        assert!(matches!(result, Err(ClientError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_server_streaming_dispatch_observes_deadline() {
        let pipeline = stalled_pipeline(Duration::from_millis(50), 8);

        let result = pipeline
            .server_streaming(
                desc(CallKind::ServerStreaming),
                ResiliencyRequest::default(),
                None,
            )
            .await;

        assert!(matches!(result, Err(ClientError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_bidi_dispatch_observes_deadline() {
        let pipeline = stalled_pipeline(Duration::from_millis(50), 8);

        let result = pipeline
            .bidi_streaming(
                desc(CallKind::BidiStreaming),
                vec![ResiliencyRequest::default(); 3],
                None,
                |_reply| {},
            )
            .await;

        assert!(matches!(result, Err(ClientError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_transport_status_maps_to_client_error() {
        let channel = FakeChannel::with_unary(Arc::new(|_| {
            Err(tonic::Status::unavailable("backend down"))
        }));

        let pipeline = pipeline(channel, InterceptorChain::new());
        let result = pipeline
            .unary(desc(CallKind::Unary), ResiliencyRequest::default(), None)
            .await;

        match result {
            Err(ClientError::Status(status)) => {
                assert_eq!(status.code(), tonic::Code::Unavailable);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
