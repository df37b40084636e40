//! The closed set of message types the pipeline operates on.
//!
//! These mirror the wire protos of the consumed services. They are
//! hand-maintained prost structs rather than build-time codegen output: the
//! set is small and closed, and skipping codegen keeps the build free of a
//! protoc dependency. Tags and field types must stay in sync with the server's
//! proto definitions.

pub mod bank;
pub mod hello;
pub mod resiliency;
