//! Channel abstraction: dispatch by method name, tagged with a call shape.
//!
//! [`CallChannel`] is the seam between the pipeline and the transport. The
//! production implementation is [`GrpcChannel`], a thin hand-written client
//! over `tonic::client::Grpc` in the style of tonic's generated stubs; tests
//! substitute in-memory implementations.

use tonic::codegen::http::uri::PathAndQuery;
use tonic::{Request, Response, Status};

use crate::call::CallDescriptor;
use crate::error::ClientError;
use crate::interceptor::BoxFuture;
use crate::stream::{InboundStream, OutboundStream};

/// A connection that can dispatch all four call shapes for one request and
/// response type, routed by the descriptor's method path.
pub trait CallChannel<Req, Resp>: Send + Sync + 'static {
    fn unary(
        &self,
        desc: CallDescriptor,
        request: Request<Req>,
    ) -> BoxFuture<Result<Response<Resp>, Status>>;

    fn server_streaming(
        &self,
        desc: CallDescriptor,
        request: Request<Req>,
    ) -> BoxFuture<Result<Response<InboundStream<Resp>>, Status>>;

    fn client_streaming(
        &self,
        desc: CallDescriptor,
        request: Request<OutboundStream<Req>>,
    ) -> BoxFuture<Result<Response<Resp>, Status>>;

    fn bidi_streaming(
        &self,
        desc: CallDescriptor,
        request: Request<OutboundStream<Req>>,
    ) -> BoxFuture<Result<Response<InboundStream<Resp>>, Status>>;
}

/// tonic-backed channel. Cheap to clone; every call takes a fresh handle on
/// the underlying HTTP/2 connection.
#[derive(Debug, Clone)]
pub struct GrpcChannel {
    inner: tonic::transport::Channel,
}

impl GrpcChannel {
    pub fn new(channel: tonic::transport::Channel) -> Self {
        Self { inner: channel }
    }

    /// Connect eagerly, failing if the endpoint is unreachable.
    pub async fn connect(uri: impl Into<String>) -> Result<Self, ClientError> {
        let channel = tonic::transport::Endpoint::from_shared(uri.into())?
            .connect()
            .await?;
        Ok(Self { inner: channel })
    }

    /// Build the channel without dialing; the connection is established on
    /// first use.
    pub fn connect_lazy(uri: impl Into<String>) -> Result<Self, ClientError> {
        let channel = tonic::transport::Endpoint::from_shared(uri.into())?.connect_lazy();
        Ok(Self { inner: channel })
    }

    fn path(desc: CallDescriptor) -> Result<PathAndQuery, Status> {
        PathAndQuery::from_maybe_shared(desc.path())
            .map_err(|e| Status::internal(format!("invalid method path: {e}")))
    }
}

impl<Req, Resp> CallChannel<Req, Resp> for GrpcChannel
where
    Req: prost::Message + Default + 'static,
    Resp: prost::Message + Default + 'static,
{
    fn unary(
        &self,
        desc: CallDescriptor,
        request: Request<Req>,
    ) -> BoxFuture<Result<Response<Resp>, Status>> {
        let channel = self.inner.clone();
        Box::pin(async move {
            let mut grpc = tonic::client::Grpc::new(channel);
            grpc.ready()
                .await
                .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
            let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
            grpc.unary(request, Self::path(desc)?, codec).await
        })
    }

    fn server_streaming(
        &self,
        desc: CallDescriptor,
        request: Request<Req>,
    ) -> BoxFuture<Result<Response<InboundStream<Resp>>, Status>> {
        let channel = self.inner.clone();
        Box::pin(async move {
            let mut grpc = tonic::client::Grpc::new(channel);
            grpc.ready()
                .await
                .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
            let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
            let response = grpc.server_streaming(request, Self::path(desc)?, codec).await?;
            let (metadata, streaming, extensions) = response.into_parts();
            let inbound: InboundStream<Resp> = Box::pin(streaming);
            Ok(Response::from_parts(metadata, inbound, extensions))
        })
    }

    fn client_streaming(
        &self,
        desc: CallDescriptor,
        request: Request<OutboundStream<Req>>,
    ) -> BoxFuture<Result<Response<Resp>, Status>> {
        let channel = self.inner.clone();
        Box::pin(async move {
            let mut grpc = tonic::client::Grpc::new(channel);
            grpc.ready()
                .await
                .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
            let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
            grpc.client_streaming(request, Self::path(desc)?, codec).await
        })
    }

    fn bidi_streaming(
        &self,
        desc: CallDescriptor,
        request: Request<OutboundStream<Req>>,
    ) -> BoxFuture<Result<Response<InboundStream<Resp>>, Status>> {
        let channel = self.inner.clone();
        Box::pin(async move {
            let mut grpc = tonic::client::Grpc::new(channel);
            grpc.ready()
                .await
                .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
            let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
            let response = grpc.streaming(request, Self::path(desc)?, codec).await?;
            let (metadata, streaming, extensions) = response.into_parts();
            let inbound: InboundStream<Resp> = Box::pin(streaming);
            Ok(Response::from_parts(metadata, inbound, extensions))
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory channel for exercising the pipeline and facades without a
    //! network. The resiliency service is the shape-complete one, so the
    //! fake speaks its types.

    use std::sync::{Arc, Mutex};

    use futures::StreamExt;
    use tonic::metadata::MetadataMap;
    use tonic::{Extensions, Request, Response, Status};

    use super::CallChannel;
    use crate::call::CallDescriptor;
    use crate::interceptor::BoxFuture;
    use crate::proto::resiliency::{ResiliencyRequest, ResiliencyResponse};
    use crate::stream::{InboundStream, OutboundStream};

    type UnaryFn = Arc<dyn Fn(ResiliencyRequest) -> Result<ResiliencyResponse, Status> + Send + Sync>;

    pub(crate) struct FakeChannel {
        pub(crate) unary_fn: UnaryFn,
        pub(crate) server_count: usize,
        pub(crate) response_metadata: MetadataMap,
        pub(crate) seen_metadata: Arc<Mutex<Option<MetadataMap>>>,
    }

    impl Default for FakeChannel {
        fn default() -> Self {
            Self {
                unary_fn: Arc::new(|_| {
                    Ok(ResiliencyResponse {
                        dummy_string: "ok".to_string(),
                    })
                }),
                server_count: 3,
                response_metadata: MetadataMap::new(),
                seen_metadata: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl FakeChannel {
        pub(crate) fn with_unary(unary_fn: UnaryFn) -> Self {
            Self {
                unary_fn,
                ..Self::default()
            }
        }

        fn record(&self, metadata: &MetadataMap) {
            *self.seen_metadata.lock().unwrap() = Some(metadata.clone());
        }

        fn headers(&self) -> MetadataMap {
            self.response_metadata.clone()
        }
    }

    impl CallChannel<ResiliencyRequest, ResiliencyResponse> for FakeChannel {
        fn unary(
            &self,
            _desc: CallDescriptor,
            request: Request<ResiliencyRequest>,
        ) -> BoxFuture<Result<Response<ResiliencyResponse>, Status>> {
            self.record(request.metadata());
            let unary_fn = self.unary_fn.clone();
            let headers = self.headers();
            Box::pin(async move {
                let message = unary_fn(request.into_inner())?;
                Ok(Response::from_parts(headers, message, Extensions::default()))
            })
        }

        fn server_streaming(
            &self,
            _desc: CallDescriptor,
            request: Request<ResiliencyRequest>,
        ) -> BoxFuture<Result<Response<InboundStream<ResiliencyResponse>>, Status>> {
            self.record(request.metadata());
            let count = self.server_count;
            let headers = self.headers();
            Box::pin(async move {
                let inbound: InboundStream<ResiliencyResponse> =
                    Box::pin(futures::stream::iter((0..count).map(|i| {
                        Ok(ResiliencyResponse {
                            dummy_string: format!("stream-{i}"),
                        })
                    })));
                Ok(Response::from_parts(headers, inbound, Extensions::default()))
            })
        }

        fn client_streaming(
            &self,
            _desc: CallDescriptor,
            request: Request<OutboundStream<ResiliencyRequest>>,
        ) -> BoxFuture<Result<Response<ResiliencyResponse>, Status>> {
            self.record(request.metadata());
            let headers = self.headers();
            Box::pin(async move {
                let count = request.into_inner().count().await;
                let message = ResiliencyResponse {
                    dummy_string: format!("received {count} messages"),
                };
                Ok(Response::from_parts(headers, message, Extensions::default()))
            })
        }

        fn bidi_streaming(
            &self,
            _desc: CallDescriptor,
            request: Request<OutboundStream<ResiliencyRequest>>,
        ) -> BoxFuture<Result<Response<InboundStream<ResiliencyResponse>>, Status>> {
            self.record(request.metadata());
            let headers = self.headers();
            Box::pin(async move {
                let mut outbound = request.into_inner();
                // One reply per request, interleaved as the requests arrive.
                let inbound: InboundStream<ResiliencyResponse> =
                    Box::pin(async_stream::stream! {
                        let mut i = 0;
                        while outbound.next().await.is_some() {
                            yield Ok(ResiliencyResponse {
                                dummy_string: format!("echo-{i}"),
                            });
                            i += 1;
                        }
                    });
                Ok(Response::from_parts(headers, inbound, Extensions::default()))
            })
        }
    }
}
