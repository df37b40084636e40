//! # interceptor
//!
//! Composable policy units applied to every call shape.
//!
//! Unary interceptors wrap the whole request/response exchange: each unit
//! receives the composed remainder of the chain as a `next` function and may
//! inspect or mutate the request, augment outgoing metadata, short-circuit
//! without calling `next`, or post-process the response. Streaming shapes are
//! intercepted at stream *creation* through [`StreamPolicy`]; the per-message
//! hooks are then routed through the stream wrapper so every later send and
//! receive is still subject to policy.
//!
//! The chain is an explicit ordered list. Composition is a reverse fold over
//! the list performed per invocation, so the first registered unit is the
//! outermost layer and the chain itself holds no per-call state.

mod annotate;
mod deadline;
mod logging;

pub use annotate::AnnotateInterceptor;
pub use deadline::DeadlineInterceptor;
pub use logging::LoggingInterceptor;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::{Request, Response};

use crate::call::CallDescriptor;
use crate::envelope::Envelope;
use crate::error::ClientError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The composed signature of a unary call: interceptors wrap one of these and
/// produce another.
pub type UnaryFunc<Req, Resp> =
    Arc<dyn Fn(Request<Req>) -> BoxFuture<Result<Response<Resp>, ClientError>> + Send + Sync>;

/// A policy unit wrapping the unary exchange.
pub trait UnaryInterceptor<Req, Resp>: Send + Sync {
    fn wrap(&self, desc: CallDescriptor, next: UnaryFunc<Req, Resp>) -> UnaryFunc<Req, Resp>;
}

/// A policy unit applied to streaming calls: once at stream creation, then on
/// every message in either direction.
pub trait StreamPolicy: Send + Sync {
    /// Called before the stream is dispatched; the outgoing metadata is still
    /// mutable at this point.
    fn on_open(&self, desc: CallDescriptor, metadata: &mut MetadataMap) {
        let _ = (desc, metadata);
    }

    /// Called for every outbound message before it is forwarded.
    fn on_send(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        let _ = (desc, message);
    }

    /// Called for every inbound message after it arrives.
    fn on_receive(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        let _ = (desc, message);
    }
}

/// The streaming half of a chain, detached from the unary type parameters so
/// stream wrappers can carry it per message.
#[derive(Clone, Default)]
pub struct StreamHooks {
    units: Vec<Arc<dyn StreamPolicy>>,
}

impl StreamHooks {
    pub fn on_open(&self, desc: CallDescriptor, metadata: &mut MetadataMap) {
        for unit in &self.units {
            unit.on_open(desc, metadata);
        }
    }

    pub fn on_send(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        for unit in &self.units {
            unit.on_send(desc, message);
        }
    }

    pub fn on_receive(&self, desc: CallDescriptor, message: &mut dyn Envelope) {
        for unit in &self.units {
            unit.on_receive(desc, message);
        }
    }
}

/// Ordered list of policy units shared by all call shapes.
///
/// The last registered unit sits closest to the transport.
pub struct InterceptorChain<Req, Resp> {
    unary: Vec<Arc<dyn UnaryInterceptor<Req, Resp>>>,
    stream: StreamHooks,
}

impl<Req, Resp> Clone for InterceptorChain<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            unary: self.unary.clone(),
            stream: self.stream.clone(),
        }
    }
}

impl<Req, Resp> Default for InterceptorChain<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> InterceptorChain<Req, Resp> {
    pub fn new() -> Self {
        Self {
            unary: Vec::new(),
            stream: StreamHooks::default(),
        }
    }

    /// Register a unit for both the unary path and the streaming hooks.
    pub fn with<I>(self, unit: Arc<I>) -> Self
    where
        I: UnaryInterceptor<Req, Resp> + StreamPolicy + 'static,
    {
        self.with_unary(unit.clone()).with_stream(unit)
    }

    /// Register a unit on the unary path only.
    pub fn with_unary(mut self, unit: Arc<dyn UnaryInterceptor<Req, Resp>>) -> Self {
        self.unary.push(unit);
        self
    }

    /// Register a unit on the streaming hooks only.
    pub fn with_stream(mut self, unit: Arc<dyn StreamPolicy>) -> Self {
        self.stream.units.push(unit);
        self
    }

    pub fn len(&self) -> usize {
        self.unary.len().max(self.stream.units.len())
    }

    pub fn is_empty(&self) -> bool {
        self.unary.is_empty() && self.stream.units.is_empty()
    }

    /// Build the composed call function for one invocation.
    ///
    /// Folded in reverse so the first registered unit acts first on the way in
    /// and last on the way out.
    pub fn compose(
        &self,
        desc: CallDescriptor,
        terminal: UnaryFunc<Req, Resp>,
    ) -> UnaryFunc<Req, Resp> {
        let mut wrapped = terminal;
        for unit in self.unary.iter().rev() {
            wrapped = unit.wrap(desc, wrapped);
        }
        wrapped
    }

    /// Run every unit's stream-open hook against the outgoing metadata.
    pub fn open_stream(&self, desc: CallDescriptor, metadata: &mut MetadataMap) {
        self.stream.on_open(desc, metadata);
    }

    /// Clone of the streaming hooks, for handing to stream wrappers.
    pub fn stream_hooks(&self) -> StreamHooks {
        self.stream.clone()
    }
}
