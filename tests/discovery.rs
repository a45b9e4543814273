//! Tests for the discovery handshake.
//!
//! Most cases drive [`run_discovery`] over an in-memory WebSocket pair; the
//! last ones go through a real server with the [`MockStation`] simulator.

use std::time::Duration;

use basicstation::{
    discovery::{
        DISCOVERY_TIMEOUT,
        DiscoveryConfig,
        DiscoveryError,
        DiscoveryResponse,
        MISSING_ROUTER,
        run_discovery,
    },
    eui::Eui,
    hooks::RequestInfo,
    server::StationServer,
};
use basicstation_testing::{
    Event,
    MockStation,
    RecordingServer,
    TestResult,
    TestServer,
    duplex_pair,
    next_event,
    unused_listener,
};
use futures::{SinkExt, StreamExt};
use rstest::rstest;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;

struct Exchange {
    result: Result<Eui, DiscoveryError>,
    /// Text frames the station received, in order.
    replies: Vec<String>,
}

/// Run one in-memory discovery exchange where the station sends `request`.
async fn exchange(network: RecordingServer, request: Option<&str>) -> Exchange {
    let (server_ws, mut client) = duplex_pair().await;
    let info = RequestInfo {
        path: "/router-info".into(),
        ..RequestInfo::default()
    };
    let handle = tokio::spawn(async move {
        run_discovery(server_ws, &info, &network, &DiscoveryConfig::default()).await
    });

    if let Some(request) = request {
        client
            .send(WsMessage::Text(request.to_owned()))
            .await
            .expect("send discovery request");
    }
    let mut replies = Vec::new();
    while let Some(Ok(frame)) = client.next().await {
        match frame {
            WsMessage::Text(text) => replies.push(text),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    let result = handle.await.expect("discovery task panicked");
    Exchange { result, replies }
}

fn only_reply(exchange: &Exchange) -> Value {
    assert_eq!(exchange.replies.len(), 1, "replies: {:?}", exchange.replies);
    serde_json::from_str(&exchange.replies[0]).expect("reply is JSON")
}

#[rstest]
#[case(json!({"router": 1}), 1)]
#[case(json!({"router": "1"}), 1)]
#[case(json!({"router": 3.0}), 3)]
#[case(json!({"Router": "00-00-00-00-00-00-00-02"}), 2)]
#[case(json!({"router": "b827:ebff:fe61:1"}), 0xb827_ebff_fe61_0001)]
#[case(json!({"router": "B8:27:EB:FF:FE:61:00:01", "extra": true}), 0xb827_ebff_fe61_0001)]
#[tokio::test]
async fn redirects_known_station(#[case] request: Value, #[case] raw: u64) {
    let (network, mut events) = RecordingServer::new();
    let exchange = exchange(network, Some(&request.to_string())).await;

    let eui = Eui::new(raw);
    assert_eq!(exchange.result.as_ref().ok(), Some(&eui));
    let reply = only_reply(&exchange);
    assert_eq!(reply["router"], format!("{raw:016x}"));
    assert_eq!(reply["uri"], format!("ws://127.0.0.1/{raw:016x}"));
    assert_eq!(reply["muxs"], "muxs-test");
    assert!(reply.get("error").is_none());
    assert!(matches!(
        next_event(&mut events).await,
        Event::Discovery { router, .. } if router == eui
    ));
}

#[rstest]
#[case(json!({"router": "zz"}))]
#[case(json!({"router": 1.5}))]
#[case(json!({"router": -4}))]
#[case(json!({"router": null}))]
#[tokio::test]
async fn invalid_router_gets_error_response(#[case] request: Value) {
    let (network, _events) = RecordingServer::new();
    let exchange = exchange(network, Some(&request.to_string())).await;

    assert!(matches!(exchange.result, Err(DiscoveryError::InvalidRouter(_))));
    let reply: DiscoveryResponse =
        serde_json::from_str(&exchange.replies[0]).expect("reply decodes");
    assert!(reply.is_error());
    assert_eq!(reply.router, None);
    assert!(reply.uri.is_empty());
}

#[tokio::test]
async fn missing_router_gets_error_response() {
    let (network, _events) = RecordingServer::new();
    let exchange = exchange(network, Some(r#"{"eui":"0000000000000001"}"#)).await;

    assert!(matches!(exchange.result, Err(DiscoveryError::MissingRouter)));
    assert_eq!(only_reply(&exchange), json!({ "error": MISSING_ROUTER }));
}

#[tokio::test]
async fn malformed_request_closes_without_reply() {
    let (network, _events) = RecordingServer::new();
    let exchange = exchange(network, Some("router=1")).await;

    assert!(matches!(exchange.result, Err(DiscoveryError::Malformed(_))));
    assert!(exchange.replies.is_empty());
}

#[tokio::test]
async fn unknown_station_closes_without_reply() {
    let (network, _events) = RecordingServer::new();
    let network = network.reject(Eui::new(7));
    let exchange = exchange(network, Some(r#"{"router":7}"#)).await;

    assert!(matches!(exchange.result, Err(DiscoveryError::Handler(_))));
    assert!(exchange.replies.is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_station_times_out() {
    let (network, _events) = RecordingServer::new();
    let exchange = exchange(network, None).await;

    assert!(matches!(
        exchange.result,
        Err(DiscoveryError::Timeout(limit)) if limit == DISCOVERY_TIMEOUT
    ));
    assert!(exchange.replies.is_empty());
}

#[tokio::test]
async fn station_discovers_its_session_endpoint() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let server = TestServer::start(network).await?;
    let eui = Eui::new(0x0016_c001_ff10_a235);

    let mut station = MockStation::new(eui, server.base_uri());
    let response = station.discover().await?;

    assert_eq!(response.router, Some(eui));
    assert_eq!(response.uri, format!("{}/0016c001ff10a235", server.base_uri()));
    match next_event(&mut events).await {
        Event::Discovery { router, path } => {
            assert_eq!(router, eui);
            assert_eq!(path, "/router-info");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn slow_station_gets_no_answer() -> TestResult {
    let (network, _events) = RecordingServer::new();
    let server = StationServer::new(network).discovery_config(DiscoveryConfig {
        timeout: Duration::from_millis(50),
    });
    let server = TestServer::launch(server, unused_listener()?).await?;

    let mut station = MockStation::new(Eui::new(1), server.base_uri())
        .with_discovery_delay(Duration::from_millis(300));
    assert!(station.discover().await.is_err());
    server.shutdown().await;
    Ok(())
}
