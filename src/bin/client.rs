use anyhow::Result;
use rand::Rng;
use resilient_rpc::metadata::MetadataObserver;
use resilient_rpc::proto::resiliency::{ResiliencyRequest, codes};
use resilient_rpc::{
    BreakerConfig, CircuitRegistry, ClientConfig, GrpcChannel, HelloClient, ResiliencyClient,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:50051".to_string());
    let stream_count: usize = std::env::var("STREAM_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    info!(server = %url, "connecting");
    let channel = Arc::new(GrpcChannel::connect_lazy(url)?);

    let observer: MetadataObserver = Arc::new(|metadata| {
        for key_value in metadata.iter() {
            if let tonic::metadata::KeyAndValueRef::Ascii(key, value) = key_value {
                info!(key = %key, value = ?value, "response metadata");
            }
        }
    });

    let config = ClientConfig::builder()
        .deadline(Duration::from_secs(5))
        .build();
    let resiliency =
        ResiliencyClient::with_observer(channel.clone(), config.clone(), Some(observer));
    let hello = HelloClient::new(channel, config);

    let registry = CircuitRegistry::new(
        BreakerConfig::builder()
            .min_requests(3)
            .failure_ratio(0.6)
            .open_timeout(Duration::from_secs(10))
            .build(),
    );
    let breaker = registry.breaker("resiliency");

    // Unary, guarded by the circuit.
    match breaker.execute(|| resiliency.unary(random_request())).await {
        Ok(reply) => info!(message = %reply.dummy_string, "unary reply"),
        Err(error) => warn!(%error, "unary failed"),
    }

    // Unary with per-call metadata; the observer above logs the echo.
    match breaker
        .execute(|| resiliency.unary_with_metadata(random_request()))
        .await
    {
        Ok(reply) => info!(message = %reply.dummy_string, "unary-with-metadata reply"),
        Err(error) => warn!(%error, "unary-with-metadata failed"),
    }

    // Server stream, drained to completion.
    match breaker
        .execute(|| resiliency.server_streaming(random_request()))
        .await
    {
        Ok(replies) => info!(count = replies.len(), "server stream drained"),
        Err(error) => warn!(%error, "server stream failed"),
    }

    // Client stream: many requests, one aggregated reply.
    let requests: Vec<_> = (0..stream_count).map(|_| random_request()).collect();
    match breaker
        .execute(|| resiliency.client_streaming(requests))
        .await
    {
        Ok(reply) => info!(message = %reply.dummy_string, "client stream reply"),
        Err(error) => warn!(%error, "client stream failed"),
    }

    // Bidirectional: replies logged as they interleave with sends.
    let requests: Vec<_> = (0..stream_count).map(|_| random_request()).collect();
    match breaker
        .execute(|| {
            resiliency.bidi_streaming(requests, |reply| {
                info!(message = %reply.dummy_string, "bidi reply");
            })
        })
        .await
    {
        Ok(summary) => info!(sent = summary.sent, received = summary.received, "bidi done"),
        Err(error) => warn!(%error, "bidi failed"),
    }

    // The hello service shares the same pipeline machinery.
    match hello.say_hello("world").await {
        Ok(message) => info!(%message, "hello reply"),
        Err(error) => warn!(%error, "hello failed"),
    }

    Ok(())
}

/// A request asking the server for a short random delay and an OK status.
fn random_request() -> ResiliencyRequest {
    let mut rng = rand::rng();
    let min = rng.random_range(0..2);
    ResiliencyRequest {
        min_delay_second: min,
        max_delay_second: rng.random_range(min..min + 2),
        status_codes: vec![codes::OK],
    }
}
