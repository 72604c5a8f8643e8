//! Provenance stamping for event batches.
//!
//! A batch is `{"batch": [{"user": {...}, "events": [{...}, ...]}, ...]}`.
//! Every well-formed event gets `metaData.sdkProxy` set to this proxy's version
//! and, when the caller reported one, `metaData.sdkPlatform`.

use serde_json::{Map, Value};

/// Version stamped into `metaData.sdkProxy`.
pub const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");

const SDK_PROXY: &str = "sdkProxy";
const SDK_PLATFORM: &str = "sdkPlatform";

/// Stamp provenance onto every event in the batch. Returns how many events were stamped.
pub fn rewrite_batch(document: &mut Value, version: &str, platform: Option<&str>) -> usize {
    let Some(records) = document.get_mut("batch").and_then(Value::as_array_mut) else {
        return 0;
    };

    let mut stamped = 0;
    for record in records {
        let Some(events) = record.get_mut("events").and_then(Value::as_array_mut) else {
            continue;
        };
        for event in events {
            if stamp_event(event, version, platform) {
                stamped += 1;
            }
        }
    }
    stamped
}

fn stamp_event(event: &mut Value, version: &str, platform: Option<&str>) -> bool {
    let Some(event) = event.as_object_mut() else {
        return false;
    };

    let meta = event
        .entry("metaData")
        .or_insert_with(|| Value::Object(Map::new()));
    if meta.is_null() {
        *meta = Value::Object(Map::new());
    }
    let Some(meta) = meta.as_object_mut() else {
        return false;
    };

    meta.insert(SDK_PROXY.to_string(), Value::String(version.to_string()));
    if let Some(platform) = platform {
        meta.insert(SDK_PLATFORM.to_string(), Value::String(platform.to_string()));
    }
    true
}
