//! Builders for image API payloads and mock endpoints.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use nasa_mirror_core::SyncConfig;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A search item as returned by `/search`.
pub fn search_item(nasa_id: &str, date_created: &str) -> Value {
    json!({
        "href": format!("https://images-assets.nasa.gov/image/{nasa_id}/collection.json"),
        "data": [{
            "nasa_id": nasa_id,
            "title": format!("Title of {nasa_id}"),
            "date_created": date_created,
            "media_type": "image",
            "center": "JPL"
        }],
        "links": [{"href": format!("https://images-assets.nasa.gov/image/{nasa_id}/{nasa_id}~thumb.jpg"), "rel": "preview"}]
    })
}

/// A search response body.
pub fn search_page(items: Vec<Value>) -> Value {
    json!({"collection": {"version": "1.0", "items": items}})
}

/// An asset response body listing `hrefs` in order.
pub fn asset_listing(hrefs: &[String]) -> Value {
    let items: Vec<Value> = hrefs.iter().map(|href| json!({"href": href})).collect();
    json!({"collection": {"version": "1.0", "items": items}})
}

/// Mounts numbered search pages followed by an empty page for every later
/// page number. Returns nothing; use `received_requests` to inspect calls.
pub async fn mount_search_pages(server: &MockServer, pages: Vec<Vec<Value>>) {
    for (index, items) in pages.into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", (index + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_page(items)))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(Vec::new())))
        .mount(server)
        .await;
}

/// Download URL served by [`mount_record`] for `nasa_id`.
pub fn binary_url(server: &MockServer, nasa_id: &str) -> String {
    format!("{}/files/{nasa_id}.jpg", server.uri())
}

/// Mounts the asset lookup and binary for one record.
pub async fn mount_record(server: &MockServer, nasa_id: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/asset/{nasa_id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(asset_listing(&[binary_url(server, nasa_id)])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{nasa_id}.jpg")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Config pointed at `server` with no download delay.
pub fn config_for(server: &MockServer, base: &Path) -> SyncConfig {
    SyncConfig::new(base)
        .with_api_base_url(server.uri())
        .with_download_delay(Duration::ZERO)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// A fixed "now" used so runs do not depend on the wall clock.
pub fn fixed_now() -> NaiveDateTime {
    date(2024, 3, 15).and_hms_opt(12, 0, 0).expect("valid time")
}
