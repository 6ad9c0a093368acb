//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field-ordering differences.

use serde_json::Value;
use table_core::{
    ClientError, CreateRecord, DeletedRecord, HttpMethod, HttpRequest, HttpResponse, ListQuery,
    Page, Record, TableClient, TableConfig, UpdateRecord,
};

const ENDPOINT: &str = "http://localhost:3000";

fn client() -> TableClient<()> {
    let config = TableConfig::new("appTEST", "keyTEST").with_endpoint(ENDPOINT);
    TableClient::new(config, ())
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let arr = pair.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse::new(
        sim["status"].as_u64().unwrap() as u16,
        sim["body"].as_str().unwrap(),
    )
}

/// Compare method, URL and, when the vector lists them, query, headers and body.
fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.url, format!("{ENDPOINT}{}", expected["path"].as_str().unwrap()), "{name}: url");
    if let Some(query) = expected.get("query") {
        assert_eq!(req.query, pairs(query), "{name}: query");
    }
    if let Some(headers) = expected.get("headers") {
        assert_eq!(req.headers, pairs(headers), "{name}: headers");
    }
    match expected.get("body") {
        Some(body) => {
            let req_body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&req_body, body, "{name}: body");
        }
        None => assert!(req.body.is_none(), "{name}: body should be None"),
    }
}

/// Compare a parsed page against `expected_records` or `expected_upstream`.
fn check_page<R>(name: &str, page: Page<R>, case: &Value)
where
    R: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    match (page, case.get("expected_upstream")) {
        (Page::Upstream(body), Some(expected)) => assert_eq!(&body, expected, "{name}: upstream"),
        (Page::Records { records, offset }, None) => {
            let expected: Vec<R> = serde_json::from_value(case["expected_records"].clone()).unwrap();
            assert_eq!(records, expected, "{name}: records");
            if let Some(expected_offset) = case.get("expected_offset") {
                assert_eq!(offset.as_deref(), expected_offset.as_str(), "{name}: offset");
            }
        }
        (page, _) => panic!("{name}: unexpected page {page:?}"),
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[test]
fn create_test_vectors() {
    let raw = include_str!("../../test-vectors/create.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let table = case["table"].as_str().unwrap();
        let input: Vec<CreateRecord> = serde_json::from_value(case["input"].clone()).unwrap();

        let req = c.build_create(table, &input).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let page = c.parse_records::<Record>(simulated(case)).unwrap();
        check_page(name, page, case);
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[test]
fn list_test_vectors() {
    let raw = include_str!("../../test-vectors/list.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let table = case["table"].as_str().unwrap();
        let q = &case["query"];

        let mut query = ListQuery::new();
        if let Some(formula) = q.get("filter_by_formula").and_then(Value::as_str) {
            query = query.filter_by_formula(formula);
        }
        for field in q.get("fields").and_then(Value::as_array).into_iter().flatten() {
            query = query.field(field.as_str().unwrap());
        }
        if let Some(view) = q.get("view").and_then(Value::as_str) {
            query = query.view(view);
        }
        if let Some(size) = q.get("page_size").and_then(Value::as_u64) {
            query = query.page_size(size as u32);
        }

        let req = c.build_list(table, &query, case["offset"].as_str());
        check_request(name, &req, &case["expected_request"]);

        let page = c.parse_records::<Record>(simulated(case)).unwrap();
        check_page(name, page, case);
    }
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

#[test]
fn get_test_vectors() {
    let raw = include_str!("../../test-vectors/get.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let table = case["table"].as_str().unwrap();
        let id = case["input_id"].as_str().unwrap();

        let req = c.build_get(table, id);
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_get(simulated(case));
        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error.as_str().unwrap() {
                "InvalidResponse" => assert!(
                    matches!(err, ClientError::InvalidResponse { .. }),
                    "{name}: expected InvalidResponse"
                ),
                other => panic!("{name}: unknown expected_error: {other}"),
            }
        } else {
            assert_eq!(result.unwrap(), case["expected_result"], "{name}: parsed result");
        }
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[test]
fn update_test_vectors() {
    let raw = include_str!("../../test-vectors/update.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let table = case["table"].as_str().unwrap();
        let input: Vec<UpdateRecord> = serde_json::from_value(case["input"].clone()).unwrap();

        let req = c.build_update(table, &input).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let page = c.parse_records::<Record>(simulated(case)).unwrap();
        check_page(name, page, case);
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn delete_test_vectors() {
    let raw = include_str!("../../test-vectors/delete.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let table = case["table"].as_str().unwrap();
        let ids: Vec<String> = serde_json::from_value(case["input_ids"].clone()).unwrap();

        let req = c.build_delete(table, &ids);
        check_request(name, &req, &case["expected_request"]);

        let page = c.parse_records::<DeletedRecord>(simulated(case)).unwrap();
        check_page(name, page, case);
    }
}
