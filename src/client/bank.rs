//! Facade for the bank service: balance lookup, exchange-rate stream,
//! transaction summarizing, and multi-transfer duplex.
//!
//! Bank payloads are transactional data, so the chain here carries no
//! mutation unit; failed transfers surface their structured error details
//! through the receive path's status logging.

use std::sync::Arc;

use crate::call::{CallDescriptor, CallKind};
use crate::channel::CallChannel;
use crate::client::ClientConfig;
use crate::duplex::DuplexSummary;
use crate::error::ClientError;
use crate::interceptor::{DeadlineInterceptor, InterceptorChain, LoggingInterceptor};
use crate::pipeline::CallPipeline;
use crate::proto::bank::{
    CurrentBalanceRequest, CurrentBalanceResponse, ExchangeRateRequest, ExchangeRateResponse,
    Transaction, TransactionSummary, TransferRequest, TransferResponse,
};

const SERVICE: &str = "bank.BankService";

pub struct BankClient<C> {
    balance: CallPipeline<C, CurrentBalanceRequest, CurrentBalanceResponse>,
    rates: CallPipeline<C, ExchangeRateRequest, ExchangeRateResponse>,
    transactions: CallPipeline<C, Transaction, TransactionSummary>,
    transfers: CallPipeline<C, TransferRequest, TransferResponse>,
}

impl<C> BankClient<C>
where
    C: CallChannel<CurrentBalanceRequest, CurrentBalanceResponse>
        + CallChannel<ExchangeRateRequest, ExchangeRateResponse>
        + CallChannel<Transaction, TransactionSummary>
        + CallChannel<TransferRequest, TransferResponse>,
{
    pub fn new(channel: Arc<C>, config: ClientConfig) -> Self {
        Self {
            balance: pipeline(channel.clone(), &config),
            rates: pipeline(channel.clone(), &config),
            transactions: pipeline(channel.clone(), &config),
            transfers: pipeline(channel, &config),
        }
    }

    pub async fn get_current_balance(
        &self,
        account_number: impl Into<String>,
    ) -> Result<f64, ClientError> {
        let response = self
            .balance
            .unary(
                desc("GetCurrentBalance", CallKind::Unary),
                CurrentBalanceRequest {
                    account_number: account_number.into(),
                },
                None,
            )
            .await?;
        Ok(response.amount)
    }

    /// Drain the rate stream for one currency pair.
    pub async fn fetch_exchange_rates(
        &self,
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
    ) -> Result<Vec<ExchangeRateResponse>, ClientError> {
        self.rates
            .server_streaming(
                desc("FetchExchangeRates", CallKind::ServerStreaming),
                ExchangeRateRequest {
                    from_currency: from_currency.into(),
                    to_currency: to_currency.into(),
                },
                None,
            )
            .await
    }

    /// Stream every transaction, close, await the single summary.
    pub async fn summarize_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<TransactionSummary, ClientError> {
        self.transactions
            .client_streaming(
                desc("SummarizeTransactions", CallKind::ClientStreaming),
                transactions,
                None,
            )
            .await
    }

    /// Full duplex: transfer statuses stream back while requests are still
    /// being sent. A rejected transfer's status details are logged on the
    /// receive path before the error propagates.
    pub async fn transfer_multiple<F>(
        &self,
        transfers: Vec<TransferRequest>,
        on_status: F,
    ) -> Result<DuplexSummary, ClientError>
    where
        F: FnMut(TransferResponse) + Send + 'static,
    {
        self.transfers
            .bidi_streaming(
                desc("TransferMultiple", CallKind::BidiStreaming),
                transfers,
                None,
                on_status,
            )
            .await
    }
}

fn pipeline<C, Req, Resp>(channel: Arc<C>, config: &ClientConfig) -> CallPipeline<C, Req, Resp>
where
    C: CallChannel<Req, Resp>,
    Req: crate::envelope::Envelope,
    Resp: crate::envelope::Envelope,
{
    let chain: InterceptorChain<Req, Resp> = InterceptorChain::new()
        .with_unary(Arc::new(DeadlineInterceptor::new(config.deadline)))
        .with(Arc::new(LoggingInterceptor::new()));
    CallPipeline::new(
        channel,
        chain,
        Some(config.deadline),
        config.channel_capacity,
        None,
    )
}

fn desc(method: &'static str, kind: CallKind) -> CallDescriptor {
    CallDescriptor::new(SERVICE, method, kind)
}
