//! Service facades: typed adapters that hide channel, chain, and coordinator
//! wiring behind per-method calls.

mod bank;
mod hello;
mod resiliency;

pub use bank::BankClient;
pub use hello::HelloClient;
pub use resiliency::ResiliencyClient;

use std::time::Duration;

use bon::Builder;

/// Tuning shared by every facade built on the call pipeline.
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Upper bound on one call, unary or streaming.
    #[builder(default = Duration::from_secs(5))]
    pub deadline: Duration,

    /// Prefix applied to annotatable requests on the way out.
    #[builder(into, default = String::from("[intercepted request] "))]
    pub request_tag: String,

    /// Prefix applied to annotatable responses on the way in.
    #[builder(into, default = String::from("[intercepted response] "))]
    pub response_tag: String,

    /// Outbound stream buffer, in messages.
    #[builder(default = 16)]
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
