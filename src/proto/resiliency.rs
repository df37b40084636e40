#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResiliencyRequest {
    /// Lower bound, in seconds, of the artificial delay the server applies.
    #[prost(int32, tag = "1")]
    pub min_delay_second: i32,
    /// Upper bound, in seconds, of the artificial delay the server applies.
    #[prost(int32, tag = "2")]
    pub max_delay_second: i32,
    /// Status codes the server may pick from when answering.
    #[prost(uint32, repeated, tag = "3")]
    pub status_codes: ::prost::alloc::vec::Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResiliencyResponse {
    #[prost(string, tag = "1")]
    pub dummy_string: ::prost::alloc::string::String,
}

/// gRPC status codes as carried in `ResiliencyRequest::status_codes`.
pub mod codes {
    pub const OK: u32 = 0;
    pub const CANCELLED: u32 = 1;
    pub const UNKNOWN: u32 = 2;
    pub const INVALID_ARGUMENT: u32 = 3;
    pub const DEADLINE_EXCEEDED: u32 = 4;
    pub const NOT_FOUND: u32 = 5;
    pub const ALREADY_EXISTS: u32 = 6;
    pub const PERMISSION_DENIED: u32 = 7;
    pub const RESOURCE_EXHAUSTED: u32 = 8;
}
