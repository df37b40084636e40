//! Facade for the resiliency service: all four call shapes, each in a plain
//! variant and a `*_with_metadata` variant that attaches fresh request
//! metadata and surfaces response metadata to the observer.

use std::sync::Arc;

use crate::call::{CallDescriptor, CallKind};
use crate::channel::CallChannel;
use crate::client::ClientConfig;
use crate::duplex::DuplexSummary;
use crate::error::ClientError;
use crate::interceptor::{
    AnnotateInterceptor, DeadlineInterceptor, InterceptorChain, LoggingInterceptor,
};
use crate::metadata::{MetadataObserver, request_metadata};
use crate::pipeline::CallPipeline;
use crate::proto::resiliency::{ResiliencyRequest, ResiliencyResponse};

const SERVICE: &str = "resiliency.ResiliencyService";
const METADATA_SERVICE: &str = "resiliency.ResiliencyWithMetadataService";

/// Client for both resiliency services, mirroring the two generated stubs the
/// server exposes: one plain, one that echoes per-call metadata.
pub struct ResiliencyClient<C> {
    plain: CallPipeline<C, ResiliencyRequest, ResiliencyResponse>,
    with_metadata: CallPipeline<C, ResiliencyRequest, ResiliencyResponse>,
}

impl<C> ResiliencyClient<C>
where
    C: CallChannel<ResiliencyRequest, ResiliencyResponse>,
{
    pub fn new(channel: Arc<C>, config: ClientConfig) -> Self {
        Self::with_observer(channel, config, None)
    }

    /// Like [`ResiliencyClient::new`], with a callback receiving the response
    /// metadata of every `*_with_metadata` call.
    pub fn with_observer(
        channel: Arc<C>,
        config: ClientConfig,
        observer: Option<MetadataObserver>,
    ) -> Self {
        let chain: InterceptorChain<ResiliencyRequest, ResiliencyResponse> =
            InterceptorChain::new()
                .with_unary(Arc::new(DeadlineInterceptor::new(config.deadline)))
                .with(Arc::new(LoggingInterceptor::new()))
                .with(Arc::new(AnnotateInterceptor::new(
                    config.request_tag.clone(),
                    config.response_tag.clone(),
                )));

        let plain = CallPipeline::new(
            channel.clone(),
            chain.clone(),
            Some(config.deadline),
            config.channel_capacity,
            None,
        );
        let with_metadata = CallPipeline::new(
            channel,
            chain,
            Some(config.deadline),
            config.channel_capacity,
            observer,
        );
        Self {
            plain,
            with_metadata,
        }
    }

    pub async fn unary(
        &self,
        request: ResiliencyRequest,
    ) -> Result<ResiliencyResponse, ClientError> {
        self.plain
            .unary(plain_desc("UnaryResiliency", CallKind::Unary), request, None)
            .await
    }

    pub async fn unary_with_metadata(
        &self,
        request: ResiliencyRequest,
    ) -> Result<ResiliencyResponse, ClientError> {
        self.with_metadata
            .unary(
                meta_desc("UnaryResiliencyWithMetadata", CallKind::Unary),
                request,
                Some(request_metadata()),
            )
            .await
    }

    /// Drain the whole server stream and return the collected responses.
    pub async fn server_streaming(
        &self,
        request: ResiliencyRequest,
    ) -> Result<Vec<ResiliencyResponse>, ClientError> {
        self.plain
            .server_streaming(
                plain_desc("ServerStreamResiliency", CallKind::ServerStreaming),
                request,
                None,
            )
            .await
    }

    pub async fn server_streaming_with_metadata(
        &self,
        request: ResiliencyRequest,
    ) -> Result<Vec<ResiliencyResponse>, ClientError> {
        self.with_metadata
            .server_streaming(
                meta_desc(
                    "ServerStreamResiliencyWithMetadata",
                    CallKind::ServerStreaming,
                ),
                request,
                Some(request_metadata()),
            )
            .await
    }

    /// Send every request, close the outbound half, await the single
    /// aggregated response.
    pub async fn client_streaming(
        &self,
        requests: Vec<ResiliencyRequest>,
    ) -> Result<ResiliencyResponse, ClientError> {
        self.plain
            .client_streaming(
                plain_desc("ClientStreamResiliency", CallKind::ClientStreaming),
                requests,
                None,
            )
            .await
    }

    pub async fn client_streaming_with_metadata(
        &self,
        requests: Vec<ResiliencyRequest>,
    ) -> Result<ResiliencyResponse, ClientError> {
        self.with_metadata
            .client_streaming(
                meta_desc(
                    "ClientStreamResiliencyWithMetadata",
                    CallKind::ClientStreaming,
                ),
                requests,
                Some(request_metadata()),
            )
            .await
    }

    /// Full duplex: concurrent send and receive loops, responses delivered to
    /// `on_message` as they arrive.
    pub async fn bidi_streaming<F>(
        &self,
        requests: Vec<ResiliencyRequest>,
        on_message: F,
    ) -> Result<DuplexSummary, ClientError>
    where
        F: FnMut(ResiliencyResponse) + Send + 'static,
    {
        self.plain
            .bidi_streaming(
                plain_desc("BidirectionalStreamResiliency", CallKind::BidiStreaming),
                requests,
                None,
                on_message,
            )
            .await
    }

    pub async fn bidi_streaming_with_metadata<F>(
        &self,
        requests: Vec<ResiliencyRequest>,
        on_message: F,
    ) -> Result<DuplexSummary, ClientError>
    where
        F: FnMut(ResiliencyResponse) + Send + 'static,
    {
        self.with_metadata
            .bidi_streaming(
                meta_desc(
                    "BidirectionalStreamResiliencyWithMetadata",
                    CallKind::BidiStreaming,
                ),
                requests,
                Some(request_metadata()),
                on_message,
            )
            .await
    }
}

fn plain_desc(method: &'static str, kind: CallKind) -> CallDescriptor {
    CallDescriptor::new(SERVICE, method, kind)
}

fn meta_desc(method: &'static str, kind: CallKind) -> CallDescriptor {
    CallDescriptor::new(METADATA_SERVICE, method, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerConfig, CircuitRegistry, CircuitState};
    use crate::channel::testing::FakeChannel;
    use crate::metadata::REQUEST_ID_KEY;
    use crate::proto::resiliency::codes;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tonic::metadata::MetadataMap;

    fn request() -> ResiliencyRequest {
        ResiliencyRequest {
            min_delay_second: 0,
            max_delay_second: 1,
            status_codes: vec![codes::OK],
        }
    }

    #[tokio::test]
    async fn test_unary_round_trip_applies_both_tags() {
        let channel = Arc::new(FakeChannel::with_unary(Arc::new(
            |request: ResiliencyRequest| {
                Ok(ResiliencyResponse {
                    dummy_string: format!("codes={}", request.status_codes.len()),
                })
            },
        )));

        let client = ResiliencyClient::new(channel, ClientConfig::default());
        let reply = client.unary(request()).await.unwrap();
        assert_eq!(reply.dummy_string, "[intercepted response] codes=1");
    }

    #[tokio::test]
    async fn test_with_metadata_attaches_and_observes() {
        let mut headers = MetadataMap::new();
        headers.insert("x-served-by", "fake".parse().unwrap());
        let channel = Arc::new(FakeChannel {
            response_metadata: headers,
            ..FakeChannel::default()
        });
        let seen_by_server = channel.seen_metadata.clone();

        let observed = Arc::new(Mutex::new(None::<MetadataMap>));
        let observed_in_hook = observed.clone();
        let observer: MetadataObserver = Arc::new(move |metadata: &MetadataMap| {
            *observed_in_hook.lock().unwrap() = Some(metadata.clone());
        });

        let client =
            ResiliencyClient::with_observer(channel, ClientConfig::default(), Some(observer));
        client.unary_with_metadata(request()).await.unwrap();

        let sent = seen_by_server.lock().unwrap().clone().unwrap();
        assert!(sent.contains_key(REQUEST_ID_KEY));

        let surfaced = observed.lock().unwrap().clone().unwrap();
        assert_eq!(surfaced.get("x-served-by").unwrap(), "fake");
    }

    #[tokio::test]
    async fn test_client_streaming_aggregates_ten_requests() {
        let client = ResiliencyClient::new(
            Arc::new(FakeChannel::default()),
            ClientConfig::builder().channel_capacity(4).build(),
        );

        let reply = client.client_streaming(vec![request(); 10]).await.unwrap();
        assert_eq!(
            reply.dummy_string,
            "[intercepted response] received 10 messages"
        );
    }

    #[tokio::test]
    async fn test_bidi_streaming_reports_full_duplex_counts() {
        let client =
            ResiliencyClient::new(Arc::new(FakeChannel::default()), ClientConfig::default());

        let delivered = Arc::new(AtomicU64::new(0));
        let delivered_in_callback = delivered.clone();
        let summary = client
            .bidi_streaming(vec![request(); 10], move |_reply| {
                delivered_in_callback.fetch_add(1, Ordering::Relaxed);
            })
            .await
            .unwrap();

        assert_eq!(
            summary,
            DuplexSummary {
                sent: 10,
                received: 10
            }
        );
        assert_eq!(delivered.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn test_failing_calls_trip_the_guarding_circuit() {
        let channel = Arc::new(FakeChannel::with_unary(Arc::new(|_| {
            Err(tonic::Status::unavailable("backend down"))
        })));
        let client = ResiliencyClient::new(channel, ClientConfig::default());

        let registry = CircuitRegistry::new(
            BreakerConfig::builder()
                .min_requests(3)
                .failure_ratio(0.6)
                .open_timeout(Duration::from_secs(30))
                .build(),
        );
        let breaker = registry.breaker("resiliency");

        for _ in 0..3 {
            let result = breaker.execute(|| client.unary(request())).await;
            assert!(matches!(result, Err(ClientError::Status(_))));
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        let rejected = breaker.execute(|| client.unary(request())).await;
        assert!(matches!(rejected, Err(ClientError::CircuitOpen { .. })));
    }
}
