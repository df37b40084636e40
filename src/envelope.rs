//! Describe-and-mutate capability over the closed message set.
//!
//! Interceptors never enumerate concrete message types. Each kind implements
//! [`Envelope`] and decides for itself what an annotation means; kinds with no
//! annotatable field keep the default no-op and pass through the pipeline
//! unmodified.

use crate::proto::bank::{
    CurrentBalanceRequest, CurrentBalanceResponse, ExchangeRateRequest, ExchangeRateResponse,
    Transaction, TransactionSummary, TransferRequest, TransferResponse,
};
use crate::proto::hello::{HelloRequest, HelloResponse};
use crate::proto::resiliency::{ResiliencyRequest, ResiliencyResponse};

/// A message the pipeline can describe and mutate in place.
pub trait Envelope: Send + 'static {
    /// Stable name of the message kind, for log lines.
    fn kind(&self) -> &'static str;

    /// Apply an annotation to the message's primary text field.
    ///
    /// The default does nothing, which is the pass-through contract for kinds
    /// that carry no annotatable field.
    fn annotate(&mut self, tag: &str) {
        let _ = tag;
    }

    /// Whether [`Envelope::annotate`] mutates this kind.
    fn annotatable(&self) -> bool {
        false
    }
}

impl Envelope for HelloRequest {
    fn kind(&self) -> &'static str {
        "hello.HelloRequest"
    }

    fn annotate(&mut self, tag: &str) {
        self.name = format!("{tag}{}", self.name);
    }

    fn annotatable(&self) -> bool {
        true
    }
}

impl Envelope for HelloResponse {
    fn kind(&self) -> &'static str {
        "hello.HelloResponse"
    }

    fn annotate(&mut self, tag: &str) {
        self.message = format!("{tag}{}", self.message);
    }

    fn annotatable(&self) -> bool {
        true
    }
}

// The resiliency request is all numeric; annotations pass it by.
impl Envelope for ResiliencyRequest {
    fn kind(&self) -> &'static str {
        "resiliency.ResiliencyRequest"
    }
}

impl Envelope for ResiliencyResponse {
    fn kind(&self) -> &'static str {
        "resiliency.ResiliencyResponse"
    }

    fn annotate(&mut self, tag: &str) {
        self.dummy_string = format!("{tag}{}", self.dummy_string);
    }

    fn annotatable(&self) -> bool {
        true
    }
}

// The bank kinds are all transactional data; none carries an annotatable
// text field.
impl Envelope for CurrentBalanceRequest {
    fn kind(&self) -> &'static str {
        "bank.CurrentBalanceRequest"
    }
}

impl Envelope for CurrentBalanceResponse {
    fn kind(&self) -> &'static str {
        "bank.CurrentBalanceResponse"
    }
}

impl Envelope for ExchangeRateRequest {
    fn kind(&self) -> &'static str {
        "bank.ExchangeRateRequest"
    }
}

impl Envelope for ExchangeRateResponse {
    fn kind(&self) -> &'static str {
        "bank.ExchangeRateResponse"
    }
}

impl Envelope for Transaction {
    fn kind(&self) -> &'static str {
        "bank.Transaction"
    }
}

impl Envelope for TransactionSummary {
    fn kind(&self) -> &'static str {
        "bank.TransactionSummary"
    }
}

impl Envelope for TransferRequest {
    fn kind(&self) -> &'static str {
        "bank.TransferRequest"
    }
}

impl Envelope for TransferResponse {
    fn kind(&self) -> &'static str {
        "bank.TransferResponse"
    }
}
