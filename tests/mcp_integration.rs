//! Integration tests for the MCP (Model Context Protocol) server
//!
//! These tests drive the full router with stubbed upstream wrappers:
//! - Handshake and session lifecycle
//! - Tool discovery and listing
//! - Tool execution and error mapping
//! - Transport details (SSE framing, notifications, status codes)

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use openerz_mcp::mcp::models::SESSION_HEADER;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tower::util::ServiceExt; // for `oneshot`

fn tool_names(body: &Value) -> Vec<String> {
    body["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_mcp_sse_endpoint() {
    let app = create_test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(content_type, "text/event-stream");

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body_bytes.to_vec()).unwrap();
    assert!(body_str.contains("event: endpoint"));
    assert!(body_str.contains("data: /mcp"));
}

#[tokio::test]
async fn test_initialize_grants_requested_tools_capability() {
    let app = create_test_app();

    let response = send_jsonrpc_request(
        &app,
        None,
        "initialize",
        json!({ "capabilities": { "tools": {}, "sampling": {} } }),
        1,
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.session.is_some(), "session header must be set");
    assert_eq!(response.body["jsonrpc"], "2.0");
    assert_eq!(response.body["id"], 1);

    let result = &response.body["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "openerz-mcp");
    assert_eq!(result["capabilities"], json!({ "tools": { "listChanged": false } }));
}

#[tokio::test]
async fn test_initialize_without_capabilities_grants_nothing() {
    let app = create_test_app();

    let response = send_jsonrpc_request(&app, None, "initialize", json!({}), 1).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["result"]["capabilities"], json!({}));
}

#[tokio::test]
async fn test_tools_list_contains_all_tools_in_order() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = send_jsonrpc_request(&app, Some(&session), "tools/list", json!({}), 2).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        tool_names(&response.body),
        vec![
            "get_next_waste_collection",
            "get_next_waste_collection_for_type",
            "list_waste_regions",
            "list_waste_areas",
            "list_waste_types",
            "list_weather_stations",
            "get_weather_measurements",
        ]
    );

    let tools = response.body["result"]["tools"].as_array().unwrap();
    for tool in tools {
        assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
        assert_eq!(tool["inputSchema"]["type"], "object");
    }

    let measurements = tools
        .iter()
        .find(|t| t["name"] == "get_weather_measurements")
        .unwrap();
    assert_eq!(measurements["inputSchema"]["required"], json!(["station"]));
}

#[tokio::test]
async fn test_tools_list_is_stable_across_calls_and_sessions() {
    let app = create_test_app();
    let first = initialize(&app).await;
    let second = initialize(&app).await;
    assert_ne!(first, second);

    let a = send_jsonrpc_request(&app, Some(&first), "tools/list", Value::Null, 2).await;
    let b = send_jsonrpc_request(&app, Some(&first), "tools/list", Value::Null, 3).await;
    let c = send_jsonrpc_request(&app, Some(&second), "tools/list", Value::Null, 4).await;

    assert_eq!(a.body["result"], b.body["result"]);
    assert_eq!(a.body["result"], c.body["result"]);
}

#[tokio::test]
async fn test_next_waste_collection_returns_stubbed_date() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = call_tool(
        &app,
        &session,
        "get_next_waste_collection",
        json!({ "region": "zurich" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], 3);
    let result = &response.body["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["date"], FIXED_DATE);
    assert_eq!(result["structuredContent"]["region"], "zurich");
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains(&format!("Date: {}", FIXED_DATE)));
}

#[tokio::test]
async fn test_next_waste_collection_for_type() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = call_tool(
        &app,
        &session,
        "get_next_waste_collection_for_type",
        json!({ "region": "zurich", "waste_type": "cardboard", "area": "8001" }),
    )
    .await;

    let payload = &response.body["result"]["structuredContent"];
    assert_eq!(payload["waste_type"], "cardboard");
    assert_eq!(payload["area"], "8001");
}

#[tokio::test]
async fn test_unknown_region_is_not_found() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = call_tool(
        &app,
        &session,
        "get_next_waste_collection",
        json!({ "region": "atlantis" }),
    )
    .await;

    assert_eq!(response.body["error"]["code"], -32013);
    assert_eq!(response.body["error"]["data"]["kind"], "NotFound");
    assert!(response.body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("list_waste_regions"));
}

#[tokio::test]
async fn test_weather_not_found_is_protocol_error() {
    let app = create_test_app();
    let session = initialize(&app).await;

    for station in ["unknown-station", "mythenquai"] {
        let response = call_tool(
            &app,
            &session,
            "get_weather_measurements",
            json!({ "station": station }),
        )
        .await;

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.get("result").is_none());
        assert_eq!(response.body["error"]["code"], -32013);
        assert_eq!(response.body["error"]["data"]["kind"], "NotFound");
    }
}

#[tokio::test]
async fn test_list_weather_stations() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = call_tool(&app, &session, "list_weather_stations", json!({})).await;
    assert_eq!(
        response.body["result"]["structuredContent"]["stations"],
        json!(["mythenquai"])
    );
}

#[tokio::test]
async fn test_slow_upstream_times_out_within_bound() {
    let call_timeout = Duration::from_millis(200);
    let app = create_slow_app(call_timeout);
    let session = initialize(&app).await;

    let started = Instant::now();
    let response = call_tool(
        &app,
        &session,
        "get_next_waste_collection",
        json!({ "region": "zurich" }),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(response.body["error"]["code"], -32011);
    assert_eq!(response.body["error"]["data"]["kind"], "UpstreamTimeout");
    assert!(
        elapsed < call_timeout + Duration::from_secs(1),
        "took {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_invalid_arguments_are_rejected_before_the_call() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let cases = [
        json!({}),
        json!({ "region": 42 }),
        json!({ "region": "zurich", "colour": "blue" }),
    ];
    for arguments in cases {
        let response = call_tool(&app, &session, "get_next_waste_collection", arguments).await;
        assert_eq!(response.body["error"]["code"], -32602);
    }

    let response = call_tool(
        &app,
        &session,
        "get_weather_measurements",
        json!({ "station": "mythenquai", "start_date": "18.03.2024" }),
    )
    .await;
    assert_eq!(response.body["error"]["code"], -32602);

    let response = call_tool(
        &app,
        &session,
        "get_weather_measurements",
        json!({ "station": "mythenquai", "limit": 500 }),
    )
    .await;
    assert_eq!(response.body["error"]["code"], -32014);

    let response = call_tool(
        &app,
        &session,
        "get_weather_measurements",
        json!({ "station": "mythenquai", "limit": 1u64 << 63 }),
    )
    .await;
    assert_eq!(response.body["error"]["code"], -32014);
}

#[tokio::test]
async fn test_unknown_tool() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = call_tool(&app, &session, "order_pizza", json!({})).await;
    assert_eq!(response.body["error"]["code"], -32004);
    assert_eq!(response.body["error"]["data"]["kind"], "UnknownTool");
}

#[tokio::test]
async fn test_unknown_method_after_initialize() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = send_jsonrpc_request(&app, Some(&session), "unknown/method", json!({}), 99).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], 99);
    assert_eq!(response.body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_requests_before_initialize_are_rejected() {
    let app = create_test_app();

    for method in ["tools/list", "tools/call", "ping"] {
        let response = send_jsonrpc_request(
            &app,
            None,
            method,
            json!({ "name": "list_waste_regions", "arguments": {} }),
            5,
        )
        .await;
        assert_eq!(response.body["error"]["code"], -32002, "{}", method);
        assert!(response.session.is_none());
    }
}

#[tokio::test]
async fn test_duplicate_initialize_is_rejected() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = send_jsonrpc_request(&app, Some(&session), "initialize", json!({}), 7).await;
    assert_eq!(response.body["error"]["code"], -32003);

    // The first session keeps working.
    let response = send_jsonrpc_request(&app, Some(&session), "tools/list", json!({}), 8).await;
    assert!(response.body.get("result").is_some());
}

#[tokio::test]
async fn test_ping() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let response = send_jsonrpc_request(&app, Some(&session), "ping", Value::Null, 4).await;
    assert_eq!(response.body["result"], json!({}));
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let body = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = post_raw(&app, body.to_string(), Some(&session), None).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert!(response.raw.is_empty());
}

#[tokio::test]
async fn test_invalid_json() {
    let app = create_test_app();

    let response = post_raw(&app, "{invalid json}", None, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], -32700);
    assert_eq!(response.body["id"], Value::Null);
}

#[tokio::test]
async fn test_malformed_envelopes() {
    let app = create_test_app();

    // Method of the wrong type keeps the recoverable id.
    let body = json!({ "jsonrpc": "2.0", "id": 9, "method": 123 });
    let response = post_raw(&app, body.to_string(), None, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], -32700);
    assert_eq!(response.body["id"], 9);

    // A request (not a notification) without an id.
    let body = json!({ "jsonrpc": "2.0", "method": "tools/list" });
    let response = post_raw(&app, body.to_string(), None, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], -32700);
    assert_eq!(response.body["id"], Value::Null);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = create_test_app();

    let response =
        send_jsonrpc_request(&app, Some("no-such-session"), "tools/list", json!({}), 2).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"]["code"], -32002);
}

#[tokio::test]
async fn test_delete_closes_session() {
    let app = create_test_app();
    let session = initialize(&app).await;

    let delete = |id: Option<&str>| {
        let mut builder = Request::builder().method("DELETE").uri("/mcp");
        if let Some(id) = id {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(delete(Some(&session))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send_jsonrpc_request(&app, Some(&session), "tools/list", json!({}), 2).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"]["code"], -32002);

    let response = app.clone().oneshot(delete(Some(&session))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(delete(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_abandons_in_flight_call() {
    let app = create_slow_app(Duration::from_secs(10));
    let session = initialize(&app).await;

    let started = Instant::now();
    let call = {
        let app = app.clone();
        let session = session.clone();
        tokio::spawn(async move {
            call_tool(
                &app,
                &session,
                "get_next_waste_collection",
                json!({ "region": "zurich" }),
            )
            .await
        })
    };

    // Let the call take the session lock before closing it.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .header(SESSION_HEADER, session.as_str())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let abandoned = call.await.unwrap();
    assert_eq!(abandoned.status, StatusCode::NOT_FOUND);
    assert!(abandoned.raw.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_event_stream_responses() {
    let app = create_test_app();

    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "capabilities": { "tools": {} } }
    });
    let response = post_raw(
        &app,
        body.to_string(),
        None,
        Some("application/json, text/event-stream"),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("text/event-stream"));
    assert!(response.session.is_some());
    assert!(response.raw.starts_with("event: message\ndata: "));
    assert!(response.raw.ends_with("\n\n"));

    let data = response
        .raw
        .lines()
        .find_map(|l| l.strip_prefix("data: "))
        .unwrap();
    let message: Value = serde_json::from_str(data).unwrap();
    assert_eq!(message["result"]["serverInfo"]["name"], "openerz-mcp");
}

#[tokio::test]
async fn test_legacy_root_endpoint() {
    let app = create_test_app();

    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} });
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(SESSION_HEADER));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let _session = initialize(&app).await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok", "tools": 7, "sessions": 1 }));
}
