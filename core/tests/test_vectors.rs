//! Check query rendering and response classification against the JSON test
//! vectors stored in `test-vectors/`.
//!
//! The vectors are plain data so other client implementations can share
//! them. Each case carries its own name, which every assertion reports.

use std::time::Duration;

use catalog_core::classify::classify_page;
use catalog_core::{
    ApiResult, Client, ClientConfig, Entity, FilterValue, HttpMethod, HttpResponse, PaginationMode,
    RequestBuilder,
};
use serde::Deserialize;
use serde_json::Value;

const BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Deserialize)]
struct Model {}

impl Entity for Model {
    const RESOURCE: &'static str = "models";
    const SUPPORTS_SORT: bool = true;
}

#[derive(Debug, Deserialize)]
struct Image {}

impl Entity for Image {
    const RESOURCE: &'static str = "images";
    const PAGINATION: PaginationMode = PaginationMode::PageIndex;
}

fn client() -> Client {
    Client::new(ClientConfig::new(BASE_URL)).unwrap()
}

/// Strings become text, booleans stay booleans and arrays become list filters.
fn filter_value(value: &Value) -> FilterValue {
    match value {
        Value::String(text) => FilterValue::from(text.as_str()),
        Value::Bool(flag) => FilterValue::from(*flag),
        Value::Array(items) => FilterValue::List(items.iter().map(filter_value).collect()),
        other => panic!("unsupported filter value in vector: {other}"),
    }
}

fn apply_case<E: Entity>(mut builder: RequestBuilder<E>, case: &Value) -> RequestBuilder<E> {
    if let Some(filters) = case["filters"].as_array() {
        for pair in filters {
            let key = pair[0].as_str().unwrap();
            builder = builder.with_filter(key, filter_value(&pair[1]));
        }
    }
    if let Some(sort) = case["sort"].as_str() {
        builder = builder.with_sort(sort);
    }
    if let Some(size) = case["page_size"].as_u64() {
        builder = builder.with_page_size(size as u32).unwrap();
    }
    if let Some(cursor) = case["cursor"].as_str() {
        builder = builder.with_cursor(cursor).unwrap();
    }
    if let Some(page) = case["page"].as_u64() {
        builder = builder.with_page_index(page as u32).unwrap();
    }
    builder
}

fn check_request<E: Entity>(builder: RequestBuilder<E>, case: &Value) {
    let name = case["name"].as_str().unwrap();
    let builder = apply_case(builder, case);

    assert_eq!(builder.query_string(), case["expected_query"].as_str().unwrap(), "{name}: query");

    let request = builder.build_request();
    assert_eq!(request.method, HttpMethod::Get, "{name}: method");
    assert_eq!(
        request.url,
        format!("{BASE_URL}{}", case["expected_url"].as_str().unwrap()),
        "{name}: url"
    );
    assert!(request.body.is_none(), "{name}: GET carries no body");
    assert_eq!(request.header("accept"), Some("application/json"), "{name}: accept");
}

// ---------------------------------------------------------------------------
// Query rendering
// ---------------------------------------------------------------------------

#[test]
fn query_test_vectors() {
    let raw = include_str!("../../test-vectors/query.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        match case["entity"].as_str().unwrap() {
            "models" => check_request(c.query::<Model>(), case),
            "images" => check_request(c.query::<Image>(), case),
            other => panic!("unknown entity in vector: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

fn response(raw: &Value) -> HttpResponse {
    let headers = raw["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let pair = h.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect();
    HttpResponse {
        status: raw["status"].as_u64().unwrap() as u16,
        headers,
        body: raw["body"].as_str().unwrap().to_string(),
    }
}

#[test]
fn classify_test_vectors() {
    let raw = include_str!("../../test-vectors/classify.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let response = response(&case["response"]);

        let result = classify_page::<Value>(&response);
        // Classification only borrows the response and must be repeatable.
        assert_eq!(result, classify_page::<Value>(&response), "{name}: repeatable");

        match result {
            ApiResult::Success(page) => {
                let items = expected["items"]
                    .as_u64()
                    .unwrap_or_else(|| panic!("{name}: expected failure, got success"));
                assert_eq!(page.items.len() as u64, items, "{name}: items");
                assert_eq!(page.next_cursor(), expected["next_cursor"].as_str(), "{name}: next_cursor");
            }
            ApiResult::Failure(err) => {
                let kind = expected["kind"]
                    .as_str()
                    .unwrap_or_else(|| panic!("{name}: expected success, got {err}"));
                assert_eq!(err.kind().as_str(), kind, "{name}: kind");
                assert_eq!(
                    err.http_status().map(u64::from),
                    expected["http_status"].as_u64(),
                    "{name}: http_status"
                );
                if let Some(message) = expected["message"].as_str() {
                    assert_eq!(err.message(), message, "{name}: message");
                }
                if let Some(secs) = expected["retry_after_secs"].as_u64() {
                    assert_eq!(err.retry_after(), Some(Duration::from_secs(secs)), "{name}: retry_after");
                }
                if let Some(trace_id) = expected["trace_id"].as_str() {
                    assert_eq!(err.trace_id(), Some(trace_id), "{name}: trace_id");
                }
                if let Some(fields) = expected["details"].as_array() {
                    let details = err.details().unwrap_or_else(|| panic!("{name}: no details"));
                    for field in fields {
                        assert!(details.contains_key(field.as_str().unwrap()), "{name}: details {field}");
                    }
                }
            }
        }
    }
}
