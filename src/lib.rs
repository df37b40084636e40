//! Client-side RPC resiliency: an interceptor pipeline, stream wrappers,
//! a duplex coordinator, and circuit breaking over tonic channels.
//!
//! The moving parts compose in one direction: a facade in [`client`] builds
//! an [`interceptor::InterceptorChain`] and dispatches calls through a
//! [`channel::CallChannel`]; streaming shapes route every message through the
//! wrappers in [`stream`], and bidirectional calls are driven by the
//! coordinator in [`duplex`]. Callers who need admission control wrap facade
//! calls in a [`breaker::CircuitBreaker`] from a [`breaker::CircuitRegistry`].

pub mod breaker;
pub mod call;
pub mod channel;
pub mod client;
pub mod duplex;
pub mod envelope;
pub mod error;
pub mod interceptor;
pub mod metadata;
pub mod proto;
pub mod stream;

mod pipeline;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitRegistry, CircuitState};
pub use call::{CallDescriptor, CallKind};
pub use channel::{CallChannel, GrpcChannel};
pub use client::{BankClient, ClientConfig, HelloClient, ResiliencyClient};
pub use duplex::DuplexSummary;
pub use error::ClientError;
