//! Log output of the session and discovery paths.

use std::{sync::Arc, time::Duration};

use basicstation::{
    discovery::{DiscoveryConfig, run_discovery},
    eui::Eui,
    hooks::RequestInfo,
    session::{SessionConfig, StationSession, run_session},
};
use basicstation_testing::{
    Event,
    LoggerHandle,
    RecordingServer,
    duplex_pair,
    logger,
    next_event,
};
use futures::{SinkExt, StreamExt};
use rstest::rstest;
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const VERSION: &str = r#"{"msgtype":"version","station":"2.0.6","protocol":2}"#;

#[rstest]
#[tokio::test]
async fn decode_failures_are_logged_with_station(mut logger: LoggerHandle) {
    let (network, mut events) = RecordingServer::new();
    let (server_ws, mut client) = duplex_pair().await;
    let eui = Eui::new(0xb827_ebff_fe61_0001);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_session(
        server_ws,
        StationSession::new(eui),
        Arc::new(network),
        SessionConfig::default(),
        cancel.clone(),
    ));

    client.send(WsMessage::Text(VERSION.into())).await.expect("send version");
    assert!(matches!(client.next().await, Some(Ok(WsMessage::Text(_)))));
    client.send(WsMessage::Text("[1,2]".into())).await.expect("send array");
    client
        .send(WsMessage::Text(r#"{"msgtype":"updf","FCnt":1}"#.into()))
        .await
        .expect("send uplink");
    loop {
        if let Event::Received(..) = next_event(&mut events).await {
            break;
        }
    }
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

    let messages = logger.messages();
    let decode = messages
        .iter()
        .find(|m| m.starts_with("decode failed"))
        .expect("decode failure logged");
    assert!(decode.contains(&format!("eui={eui}")), "{decode}");
    assert!(decode.contains("error_type=json"), "{decode}");
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("session closed") && m.contains("Cancelled")),
        "{messages:?}"
    );
}

#[rstest]
#[tokio::test]
async fn rejected_discovery_is_logged(mut logger: LoggerHandle) {
    let (network, _events) = RecordingServer::new();
    let (server_ws, mut client) = duplex_pair().await;
    let handle = tokio::spawn(async move {
        run_discovery(
            server_ws,
            &RequestInfo::default(),
            &network,
            &DiscoveryConfig::default(),
        )
        .await
    });

    client
        .send(WsMessage::Text(r#"{"router":"not-an-eui"}"#.into()))
        .await
        .expect("send request");
    while let Some(Ok(_)) = client.next().await {}
    assert!(handle.await.expect("discovery task").is_err());

    let messages = logger.messages();
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("discovery failed") && m.contains("invalid router field")),
        "{messages:?}"
    );
}
