//! End-to-end tests for station sessions over a real server.

use std::time::Duration;

use basicstation::{
    eui::Eui,
    message::{Downlink, Message, MessageKind, RxContext, Uplink},
    server::StationServer,
    session::{CloseReason, SessionConfig, SessionState, StationSession},
};
use basicstation_testing::{
    Event,
    MockStation,
    RecordingServer,
    StationError,
    TestResult,
    TestServer,
    next_event,
    sample_router_config,
    sample_version,
    unused_listener,
};
use rstest::rstest;
use tokio::sync::mpsc::UnboundedReceiver;

const STATION: Eui = Eui::new(0xb827_ebff_fe61_0001);

async fn started_session(events: &mut UnboundedReceiver<Event>) -> StationSession {
    loop {
        match next_event(events).await {
            Event::SessionStarted(session) => return session,
            Event::Discovery { .. } => {}
            other => panic!("unexpected event before session start: {other:?}"),
        }
    }
}

fn uplink(fcnt: u16) -> Message {
    Message::Uplink(Uplink {
        mhdr: 0x40,
        dev_addr: -1,
        fcnt,
        fport: 1,
        frm_payload: "cafe".into(),
        data_rate: 5,
        frequency: 868_100_000,
        ..Uplink::default()
    })
}

#[rstest]
#[tokio::test]
async fn station_is_configured_then_delivers_traffic() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let server = TestServer::start(network).await?;

    let mut station = MockStation::new(STATION, server.base_uri());
    let config = station.connect_discovered().await?;
    assert_eq!(config, sample_router_config());

    let session = started_session(&mut events).await;
    assert_eq!(session.eui(), STATION);
    match next_event(&mut events).await {
        Event::Version(eui, version) => {
            assert_eq!(eui, STATION);
            assert_eq!(version, sample_version());
        }
        other => panic!("expected version, got {other:?}"),
    }

    station.send(&uplink(11)).await?;
    match next_event(&mut events).await {
        Event::Received(eui, message) => {
            assert_eq!(eui, STATION);
            assert_eq!(message, uplink(11));
        }
        other => panic!("expected uplink, got {other:?}"),
    }

    station.close().await?;
    assert!(matches!(
        next_event(&mut events).await,
        Event::SessionEnded(eui, Ok(CloseReason::PeerClosed)) if eui == STATION
    ));
    assert_eq!(session.state(), SessionState::Closed);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn bad_frames_do_not_end_the_session() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let server = TestServer::start(network).await?;
    let mut station = MockStation::new(STATION, server.base_uri());
    station.connect_discovered().await?;
    let session = started_session(&mut events).await;

    station.send_binary(vec![1, 2, 3]).await?;
    station.send_text("{").await?;
    station.send_text(r#"{"msgtype":"timesync","txtime":1}"#).await?;
    station.send_text(r#"{"msgtype":"propdf","FRMPayload":"ff"}"#).await?;
    station.send(&uplink(1)).await?;

    loop {
        match next_event(&mut events).await {
            Event::Version(..) => {}
            Event::Received(_, message) => {
                assert_eq!(message.kind(), MessageKind::Uplink);
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    let stats = session.stats();
    assert_eq!(stats.recv_binary, 1);
    assert_eq!(stats.decode_errors, 2);
    assert_eq!(stats.count(MessageKind::Proprietary), 1);
    assert_eq!(stats.count(MessageKind::Uplink), 1);
    assert_eq!(session.state(), SessionState::Active);

    station.close().await?;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn server_writes_reach_the_station() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let server = TestServer::start(network).await?;
    let mut station = MockStation::new(STATION, server.base_uri());
    station.connect_discovered().await?;
    let session = started_session(&mut events).await;

    let rx = RxContext {
        context: 1,
        xtime: 0x0022_0000_0001_e240,
        gpstime: None,
    };
    let downlink = Downlink {
        dev_eui: Some("00-00-00-00-00-00-00-99".into()),
        ..Downlink::reply_to(rx, 77, "a0b1")
    };
    session.send(&Message::from(downlink.clone())).await?;
    assert_eq!(station.next_message().await?, Some(Message::Downlink(downlink)));

    session.write_text(r#"{"msgtype":"propdf"}"#).await?;
    session.send(&Message::from(sample_router_config())).await?;
    assert!(matches!(
        station.next_message().await?,
        Some(Message::RouterConfig(_))
    ));
    // One configuration at handshake plus three writes.
    assert_eq!(session.stats().write_ok, 4);

    station.close().await?;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unknown_station_is_not_configured() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let server = TestServer::start(network.reject(STATION)).await?;

    let mut station = MockStation::new(STATION, server.base_uri());
    let uri = format!("{}/{STATION}", server.base_uri());
    let err = station.connect(&uri).await.expect_err("must not be configured");
    assert!(matches!(err, StationError::Closed | StationError::Transport(_)));

    let session = started_session(&mut events).await;
    loop {
        match next_event(&mut events).await {
            Event::Version(..) => {}
            Event::SessionEnded(eui, outcome) => {
                assert_eq!(eui, STATION);
                assert_eq!(outcome, Err("protocol"));
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(session.state(), SessionState::Error);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn late_version_is_rejected() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let listener = unused_listener()?;
    let base = format!("ws://{}", listener.local_addr()?);
    let server = StationServer::new(network).session_config(SessionConfig {
        version_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    });
    let server = TestServer::launch(server, listener).await?;

    let mut station =
        MockStation::new(STATION, base.clone()).with_version_delay(Duration::from_millis(300));
    assert!(station.connect(&format!("{base}/{STATION}")).await.is_err());

    started_session(&mut events).await;
    assert!(matches!(
        next_event(&mut events).await,
        Event::SessionEnded(_, Err("protocol"))
    ));
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_live_sessions() -> TestResult {
    let (network, mut events) = RecordingServer::new();
    let server = TestServer::start(network).await?;
    let mut station = MockStation::new(STATION, server.base_uri());
    station.connect_discovered().await?;
    let session = started_session(&mut events).await;

    tokio::time::timeout(Duration::from_secs(2), server.shutdown()).await?;

    assert_eq!(station.next_message().await?, None);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.is_connected());
    loop {
        match next_event(&mut events).await {
            Event::Version(..) => {}
            Event::SessionEnded(_, outcome) => {
                assert_eq!(outcome, Ok(CloseReason::Cancelled));
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    Ok(())
}
