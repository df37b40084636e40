//! Facade for the hello service. Demonstration-grade counterpart to the
//! resiliency facade: same pipeline, friendlier method surface.

use std::sync::Arc;

use crate::call::{CallDescriptor, CallKind};
use crate::channel::CallChannel;
use crate::client::ClientConfig;
use crate::duplex::DuplexSummary;
use crate::error::ClientError;
use crate::interceptor::{
    AnnotateInterceptor, DeadlineInterceptor, InterceptorChain, LoggingInterceptor,
};
use crate::pipeline::CallPipeline;
use crate::proto::hello::{HelloRequest, HelloResponse};

const SERVICE: &str = "hello.HelloService";

pub struct HelloClient<C> {
    pipeline: CallPipeline<C, HelloRequest, HelloResponse>,
}

impl<C> HelloClient<C>
where
    C: CallChannel<HelloRequest, HelloResponse>,
{
    pub fn new(channel: Arc<C>, config: ClientConfig) -> Self {
        let chain: InterceptorChain<HelloRequest, HelloResponse> = InterceptorChain::new()
            .with_unary(Arc::new(DeadlineInterceptor::new(config.deadline)))
            .with(Arc::new(LoggingInterceptor::new()))
            .with(Arc::new(AnnotateInterceptor::new(
                config.request_tag.clone(),
                config.response_tag.clone(),
            )));

        let pipeline = CallPipeline::new(
            channel,
            chain,
            Some(config.deadline),
            config.channel_capacity,
            None,
        );
        Self { pipeline }
    }

    pub async fn say_hello(&self, name: impl Into<String>) -> Result<String, ClientError> {
        let response = self
            .pipeline
            .unary(
                desc("SayHello", CallKind::Unary),
                HelloRequest { name: name.into() },
                None,
            )
            .await?;
        Ok(response.message)
    }

    /// One name in, a stream of greetings out.
    pub async fn say_many_hello(&self, name: impl Into<String>) -> Result<Vec<String>, ClientError> {
        let responses = self
            .pipeline
            .server_streaming(
                desc("SayManyHello", CallKind::ServerStreaming),
                HelloRequest { name: name.into() },
                None,
            )
            .await?;
        Ok(responses.into_iter().map(|r| r.message).collect())
    }

    /// Many names in, one combined greeting out.
    pub async fn say_hello_to_everyone(
        &self,
        names: impl IntoIterator<Item = String>,
    ) -> Result<String, ClientError> {
        let requests = names
            .into_iter()
            .map(|name| HelloRequest { name })
            .collect();
        let response = self
            .pipeline
            .client_streaming(
                desc("SayHelloToEveryone", CallKind::ClientStreaming),
                requests,
                None,
            )
            .await?;
        Ok(response.message)
    }

    /// Full duplex: greetings stream back while names are still being sent.
    pub async fn say_hello_continuous<F>(
        &self,
        names: impl IntoIterator<Item = String>,
        on_message: F,
    ) -> Result<DuplexSummary, ClientError>
    where
        F: FnMut(HelloResponse) + Send + 'static,
    {
        let requests = names
            .into_iter()
            .map(|name| HelloRequest { name })
            .collect();
        self.pipeline
            .bidi_streaming(
                desc("SayHelloContinuous", CallKind::BidiStreaming),
                requests,
                None,
                on_message,
            )
            .await
    }
}

fn desc(method: &'static str, kind: CallKind) -> CallDescriptor {
    CallDescriptor::new(SERVICE, method, kind)
}
