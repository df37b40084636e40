#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CurrentBalanceRequest {
    #[prost(string, tag = "1")]
    pub account_number: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CurrentBalanceResponse {
    #[prost(double, tag = "1")]
    pub amount: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExchangeRateRequest {
    #[prost(string, tag = "1")]
    pub from_currency: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub to_currency: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExchangeRateResponse {
    #[prost(string, tag = "1")]
    pub from_currency: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub to_currency: ::prost::alloc::string::String,
    #[prost(double, tag = "3")]
    pub rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TransactionType {
    Unspecified = 0,
    In = 1,
    Out = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transaction {
    #[prost(string, tag = "1")]
    pub account_number: ::prost::alloc::string::String,
    #[prost(enumeration = "TransactionType", tag = "2")]
    pub transaction_type: i32,
    #[prost(double, tag = "3")]
    pub amount: f64,
    #[prost(string, tag = "4")]
    pub notes: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionSummary {
    #[prost(string, tag = "1")]
    pub account_number: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub transaction_count: i32,
    #[prost(double, tag = "3")]
    pub total_amount: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferRequest {
    #[prost(string, tag = "1")]
    pub from_account_number: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub to_account_number: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub currency: ::prost::alloc::string::String,
    #[prost(double, tag = "4")]
    pub amount: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferResponse {
    #[prost(string, tag = "1")]
    pub status: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}
