use common::{GREETER_PROTO, write_proto};
use echo_service::{ECHO_METADATA_KEY, EchoServiceImpl, EchoServiceServer, FAILURE_MESSAGE};
use protodeck_core::client::Target;
use protodeck_core::config::Config;
use protodeck_core::dispatch::CallOptions;
use protodeck_core::error::ErrorKind;
use protodeck_core::session::SessionStatus;
use protodeck_core::workbench::Workbench;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

mod common;

type EchoConnector = fn(&Target) -> Result<EchoServiceServer<EchoServiceImpl>, Infallible>;

const ENDPOINT: &str = "localhost:50051";
const SERVICE: &str = "echo.EchoService";

fn echo_connector(_target: &Target) -> Result<EchoServiceServer<EchoServiceImpl>, Infallible> {
    Ok(echo_service::server())
}

fn workbench() -> Workbench<EchoConnector> {
    workbench_with(Config::default())
}

fn workbench_with(config: Config) -> Workbench<EchoConnector> {
    Workbench::with_connector(config, echo_connector as EchoConnector)
}

async fn connected(workbench: &Workbench<EchoConnector>, key: &str) {
    assert!(
        workbench
            .load_schema(key, echo_service::proto_path())
            .await
            .success
    );
    assert!(workbench.connect(key, ENDPOINT, SERVICE).await.success);
}

#[tokio::test]
async fn test_unary_call_round_trip() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call("tab-1", "UnaryEcho", json!({ "message": "hello" }))
        .await;

    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.data, Some(json!({ "message": "hello" })));
}

#[tokio::test]
async fn test_call_with_metadata() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call_with_metadata(
            "tab-1",
            "UnaryEcho",
            json!({ "message": "with headers" }),
            vec![
                (ECHO_METADATA_KEY.to_string(), "first".to_string()),
                ("x-other".to_string(), "ignored".to_string()),
            ],
        )
        .await;

    assert_eq!(
        response.data,
        Some(json!({ "message": "with headers", "metadata": ["first"] }))
    );
}

#[tokio::test]
async fn test_invalid_metadata_key_is_a_transport_error() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call_with_metadata(
            "tab-1",
            "UnaryEcho",
            json!({ "message": "hi" }),
            vec![("bad key".to_string(), "v".to_string())],
        )
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));
}

#[tokio::test]
async fn test_unknown_method_is_a_binding_error() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench.call("tab-1", "NoSuchMethod", json!({})).await;

    assert!(!response.success);
    assert_eq!(response.error_kind(), Some(ErrorKind::MethodBindingError));
    assert!(workbench.status("tab-1").await.data.unwrap().connected);
}

#[tokio::test]
async fn test_method_names_are_matched_exactly() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call("tab-1", "unaryEcho", json!({ "message": "hi" }))
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::MethodBindingError));
}

#[tokio::test]
async fn test_streaming_method_is_a_binding_error() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call("tab-1", "ServerStreamingEcho", json!({ "message": "hi" }))
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::MethodBindingError));
}

#[tokio::test]
async fn test_server_status_is_a_transport_error() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call("tab-1", "FailingEcho", json!({ "message": "hi" }))
        .await;

    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::TransportError);
    assert!(error.message.contains("FailedPrecondition"), "{}", error.message);
    assert!(error.message.contains(FAILURE_MESSAGE), "{}", error.message);
}

#[tokio::test]
async fn test_bad_request_is_a_codec_error() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call("tab-1", "UnaryEcho", json!({ "message": ["not", "a", "string"] }))
        .await;

    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::CodecError);
    assert!(error.message.contains("echo.EchoRequest"), "{}", error.message);
}

#[tokio::test]
async fn test_timeout_is_a_transport_error_and_keeps_the_session() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let slow = CallOptions {
        timeout: Some(Duration::from_millis(50)),
        ..CallOptions::default()
    };
    let response = workbench
        .call_with_options(
            "tab-1",
            "UnaryEcho",
            json!({ "message": "slow", "delayMs": "2000" }),
            slow,
        )
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));

    assert!(workbench.status("tab-1").await.data.unwrap().connected);
    let next = workbench
        .call("tab-1", "UnaryEcho", json!({ "message": "again" }))
        .await;
    assert_eq!(next.data, Some(json!({ "message": "again" })));
}

#[tokio::test]
async fn test_configured_call_timeout_applies() {
    let workbench = workbench_with(Config {
        call_timeout_ms: 50,
        ..Config::default()
    });
    connected(&workbench, "tab-1").await;

    let response = workbench
        .call(
            "tab-1",
            "UnaryEcho",
            json!({ "message": "slow", "delayMs": "2000" }),
        )
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));
}

#[tokio::test]
async fn test_call_before_connect_is_a_session_state_error() {
    let workbench = workbench();

    let unknown = workbench.call("nobody", "UnaryEcho", json!({})).await;
    assert_eq!(unknown.error_kind(), Some(ErrorKind::SessionStateError));

    workbench
        .load_schema("tab-1", echo_service::proto_path())
        .await;
    let not_connected = workbench.call("tab-1", "UnaryEcho", json!({})).await;
    assert_eq!(
        not_connected.error_kind(),
        Some(ErrorKind::SessionStateError)
    );
}

#[tokio::test]
async fn test_connect_without_schema_is_a_session_state_error() {
    let workbench = workbench();

    let response = workbench.connect("tab-1", ENDPOINT, SERVICE).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::SessionStateError));
}

#[tokio::test]
async fn test_connect_to_unknown_service_stays_disconnected() {
    let workbench = workbench();
    workbench
        .load_schema("tab-1", echo_service::proto_path())
        .await;

    let response = workbench.connect("tab-1", ENDPOINT, "echo.Nope").await;

    assert_eq!(response.error_kind(), Some(ErrorKind::ServiceNotFoundError));
    let status = workbench.status("tab-1").await.data.unwrap();
    assert!(!status.connected);
    assert!(status.has_schema);
}

#[tokio::test]
async fn test_status_transitions() {
    let workbench = workbench();

    assert_eq!(
        workbench.status("tab-1").await.data,
        Some(SessionStatus::default())
    );

    workbench
        .load_schema("tab-1", echo_service::proto_path())
        .await;
    let loaded = workbench.status("tab-1").await.data.unwrap();
    assert!(loaded.exists);
    assert!(loaded.has_schema);
    assert!(!loaded.connected);
    assert_eq!(loaded.schema_path, Some(echo_service::proto_path()));

    workbench.connect("tab-1", ENDPOINT, SERVICE).await;
    let online = workbench.status("tab-1").await.data.unwrap();
    assert!(online.connected);
    assert_eq!(online.endpoint.as_deref(), Some(ENDPOINT));
    assert_eq!(online.service_name.as_deref(), Some(SERVICE));

    assert!(workbench.disconnect("tab-1").await.success);
    let offline = workbench.status("tab-1").await.data.unwrap();
    assert!(!offline.connected);
    assert!(offline.has_schema);
    assert_eq!(offline.endpoint.as_deref(), Some(ENDPOINT));
}

#[tokio::test]
async fn test_status_serializes_in_camel_case() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let response = serde_json::to_value(workbench.status("tab-1").await).unwrap();

    assert_eq!(response["success"], json!(true));
    assert_eq!(response["data"]["hasSchema"], json!(true));
    assert_eq!(response["data"]["serviceName"], json!(SERVICE));
    assert!(response.get("error").is_none());
}

#[tokio::test]
async fn test_disconnect_without_client_is_a_noop() {
    let workbench = workbench();

    assert!(workbench.disconnect("never-seen").await.success);
    assert!(!workbench.sessions().contains("never-seen"));

    workbench
        .load_schema("tab-1", echo_service::proto_path())
        .await;
    assert!(workbench.disconnect("tab-1").await.success);
    assert!(workbench.disconnect("tab-1").await.success);
    assert!(workbench.status("tab-1").await.data.unwrap().has_schema);
}

#[tokio::test]
async fn test_reload_invalidates_the_client() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    let reload = workbench
        .load_schema("tab-1", echo_service::proto_path())
        .await;
    assert!(reload.success);

    let status = workbench.status("tab-1").await.data.unwrap();
    assert!(!status.connected);
    assert!(status.has_schema);

    let call = workbench
        .call("tab-1", "UnaryEcho", json!({ "message": "hi" }))
        .await;
    assert_eq!(call.error_kind(), Some(ErrorKind::SessionStateError));
}

#[tokio::test]
async fn test_failed_reload_keeps_the_client() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;
    let dir = tempfile::tempdir().unwrap();
    let broken = write_proto(dir.path(), "broken.proto", "syntax = \"proto3\";\nmessage {");

    let reload = workbench.load_schema("tab-1", broken).await;
    assert_eq!(reload.error_kind(), Some(ErrorKind::ParseError));

    let status = workbench.status("tab-1").await.data.unwrap();
    assert!(status.connected);
    assert_eq!(status.schema_path, Some(echo_service::proto_path()));

    let call = workbench
        .call("tab-1", "UnaryEcho", json!({ "message": "still here" }))
        .await;
    assert_eq!(call.data, Some(json!({ "message": "still here" })));
}

#[tokio::test]
async fn test_reconnect_uses_the_last_connection() {
    let workbench = workbench();

    let never = workbench.reconnect("tab-1").await;
    assert_eq!(never.error_kind(), Some(ErrorKind::SessionStateError));

    connected(&workbench, "tab-1").await;
    workbench.disconnect("tab-1").await;

    assert!(workbench.reconnect("tab-1").await.success);
    let call = workbench
        .call("tab-1", "UnaryEcho", json!({ "message": "back" }))
        .await;
    assert_eq!(call.data, Some(json!({ "message": "back" })));
}

#[tokio::test]
async fn test_include_dirs_are_used_by_later_loads() {
    let workbench = workbench();
    let dir = tempfile::tempdir().unwrap();
    let include = dir.path().join("include");
    write_proto(
        &include,
        "shared/greeting.proto",
        "syntax = \"proto3\";\npackage shared;\nmessage Greeting { string text = 1; }\n",
    );
    let root = write_proto(
        dir.path(),
        "app/hello.proto",
        r#"
        syntax = "proto3";
        package hello;
        import "shared/greeting.proto";
        service Hello { rpc Greet(shared.Greeting) returns (shared.Greeting); }
        "#,
    );

    let without = workbench.load_schema("tab-1", &root).await;
    assert_eq!(without.error_kind(), Some(ErrorKind::ImportResolutionError));

    workbench.set_include_dirs("tab-1", vec![include]).await;
    assert!(workbench.load_schema("tab-1", &root).await.success);

    let listing = workbench.describe("tab-1").await.data.unwrap();
    assert_eq!(listing.package_name, "hello");
    assert_eq!(listing.methods[0].request_fields[0].name, "text");
}

#[tokio::test]
async fn test_describe_requires_a_schema() {
    let workbench = workbench();

    let response = workbench.describe("tab-1").await;

    assert_eq!(response.error_kind(), Some(ErrorKind::SessionStateError));
}

#[tokio::test]
async fn test_parse_schema_from_content() {
    let workbench = workbench();

    let listing = workbench
        .parse_schema(GREETER_PROTO, None, None)
        .await
        .data
        .unwrap();
    assert_eq!(listing.services[0].full_name, "helloworld.Greeter");

    let broken = workbench.parse_schema("message {", None, None).await;
    assert_eq!(broken.error_kind(), Some(ErrorKind::ParseError));

    // Content without a path never touches the session.
    let in_tab = workbench
        .parse_schema(GREETER_PROTO, None, Some("tab-1"))
        .await;
    assert!(in_tab.success);
    assert!(!workbench.status("tab-1").await.data.unwrap().has_schema);
}

#[tokio::test]
async fn test_parse_schema_with_path_stores_the_schema() {
    let workbench = workbench();
    let path = echo_service::proto_path();

    let listing = workbench
        .parse_schema(echo_service::ECHO_PROTO, Some(path.clone()), Some("tab-1"))
        .await
        .data
        .unwrap();
    assert_eq!(listing.services[0].full_name, SERVICE);

    let status = workbench.status("tab-1").await.data.unwrap();
    assert!(status.has_schema);
    assert_eq!(status.schema_path, Some(path.clone()));

    assert!(workbench.connect("tab-1", ENDPOINT, SERVICE).await.success);
    // Same path again: listed from the session, the client survives.
    workbench
        .parse_schema(echo_service::ECHO_PROTO, Some(path), Some("tab-1"))
        .await;
    assert!(workbench.status("tab-1").await.data.unwrap().connected);
}

#[tokio::test]
async fn test_extract_descriptors_from_a_root() {
    let workbench = workbench();
    let schema = protodeck_core::schema::SchemaLoader::default()
        .load_from_content(GREETER_PROTO, &[])
        .await
        .unwrap();

    let listing = workbench.extract_descriptors(&schema).data.unwrap();

    assert_eq!(listing.methods.len(), 1);
}

#[tokio::test]
async fn test_close_session_forgets_the_key() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;

    assert_eq!(workbench.close_session("tab-1").await.data, Some(true));
    assert_eq!(workbench.close_session("tab-1").await.data, Some(false));
    assert!(!workbench.status("tab-1").await.data.unwrap().exists);
    assert!(workbench.sessions().keys().is_empty());
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let workbench = workbench();
    connected(&workbench, "tab-1").await;
    workbench
        .load_schema("tab-2", echo_service::proto_path())
        .await;

    workbench.disconnect("tab-2").await;

    assert!(workbench.status("tab-1").await.data.unwrap().connected);
    let mut keys = workbench.sessions().keys();
    keys.sort();
    assert_eq!(keys, vec!["tab-1", "tab-2"]);
}

#[tokio::test]
async fn test_slow_call_does_not_block_other_sessions() {
    let workbench = Arc::new(workbench());
    connected(&workbench, "slow").await;
    connected(&workbench, "fast").await;

    let slow = tokio::spawn({
        let workbench = workbench.clone();
        async move {
            workbench
                .call(
                    "slow",
                    "UnaryEcho",
                    json!({ "message": "slow", "delayMs": "500" }),
                )
                .await
        }
    });

    let fast = tokio::time::timeout(
        Duration::from_millis(400),
        workbench.call("fast", "UnaryEcho", json!({ "message": "fast" })),
    )
    .await
    .expect("a call on another key must not wait for the slow one");
    assert_eq!(fast.data, Some(json!({ "message": "fast" })));

    let slow = slow.await.unwrap();
    assert_eq!(slow.data, Some(json!({ "message": "slow" })));
}

#[tokio::test]
async fn test_operations_on_one_key_are_queued() {
    let workbench = Arc::new(workbench());
    connected(&workbench, "tab-1").await;

    let call = tokio::spawn({
        let workbench = workbench.clone();
        async move {
            workbench
                .call(
                    "tab-1",
                    "UnaryEcho",
                    json!({ "message": "first", "delayMs": "200" }),
                )
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Waits for the in-flight call instead of closing its client under it.
    assert!(workbench.disconnect("tab-1").await.success);

    let first = call.await.unwrap();
    assert_eq!(first.data, Some(json!({ "message": "first" })));
    assert!(!workbench.status("tab-1").await.data.unwrap().connected);
}
