//! Out-of-band call metadata.
//!
//! Outgoing metadata is owned and mutable until the call is dispatched; the
//! response side only ever hands out shared references.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tracing::info;
use uuid::Uuid;

pub const REQUEST_ID_KEY: &str = "x-request-id";
pub const CLIENT_TIME_KEY: &str = "x-client-time";
pub const CLIENT_OS_KEY: &str = "x-client-os";

/// Callback invoked with the metadata returned on a response header.
pub type MetadataObserver = Arc<dyn Fn(&MetadataMap) + Send + Sync>;

/// Fresh metadata for one outgoing call: correlation id, client timestamp,
/// client platform tag.
pub fn request_metadata() -> MetadataMap {
    let mut metadata = MetadataMap::new();
    insert_ascii(&mut metadata, REQUEST_ID_KEY, &Uuid::new_v4().to_string());
    insert_ascii(&mut metadata, CLIENT_TIME_KEY, &unix_seconds().to_string());
    insert_ascii(&mut metadata, CLIENT_OS_KEY, std::env::consts::OS);
    metadata
}

/// Default response-metadata observer: log every entry.
pub fn log_response_metadata(metadata: &MetadataMap) {
    if metadata.is_empty() {
        info!("response metadata not found");
        return;
    }

    for entry in metadata.iter() {
        if let tonic::metadata::KeyAndValueRef::Ascii(key, value) = entry {
            info!(key = %key, value = ?value, "response metadata");
        }
    }
}

fn insert_ascii(metadata: &mut MetadataMap, key: &'static str, value: &str) {
    if let Ok(value) = MetadataValue::<Ascii>::try_from(value) {
        metadata.insert(key, value);
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
