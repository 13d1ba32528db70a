#![allow(dead_code)]

pub mod socket_guard;

use std::path::Path;
use std::time::Duration;

use offline_library_core::{LibraryConfig, OfflineLibrary};
use wiremock::MockServer;

/// Short enough that exhausted 429 budgets finish quickly on a real clock.
pub const TEST_RATE_LIMIT_WAIT: Duration = Duration::from_millis(10);

/// Config pointing at `server` with its cache under `cache_root`.
pub fn test_config(server: &MockServer, cache_root: &Path) -> LibraryConfig {
    LibraryConfig {
        api_base_url: server.uri(),
        rate_limit_wait: TEST_RATE_LIMIT_WAIT,
        request_timeout: Duration::from_secs(10),
        ..LibraryConfig::with_cache_root(cache_root)
    }
}

/// Library pointing at `server` with its cache under `cache_root`.
pub fn test_library(server: &MockServer, cache_root: &Path) -> OfflineLibrary {
    OfflineLibrary::new(test_config(server, cache_root)).expect("test library should build")
}

/// `count` resources with ids `start..start + count`.
pub fn resource_page(start: u32, count: u32) -> serde_json::Value {
    let items: Vec<serde_json::Value> = (start..start + count)
        .map(|id| {
            serde_json::json!({
                "id": id,
                "title": format!("Resource {id}"),
                "img": format!("/storage/thumbs/{id}.png"),
            })
        })
        .collect();
    serde_json::Value::Array(items)
}
