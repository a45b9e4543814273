//! Test support for the `basicstation` crate.
//!
//! [`MockStation`] plays the gateway side of the protocol over real TCP:
//! discovery, the session handshake and ordinary traffic, with optional
//! delays for exercising server deadlines. [`RecordingServer`] is a
//! [`NetworkServer`](basicstation::hooks::NetworkServer) that reports every
//! callback on a channel, and [`TestServer`] runs a
//! [`StationServer`](basicstation::server::StationServer) on a free port.
//!
//! ```rust,no_run
//! use basicstation::eui::Eui;
//! use basicstation_testing::{MockStation, RecordingServer, TestServer};
//!
//! # async fn example() -> basicstation_testing::TestResult {
//! let (network, _events) = RecordingServer::new();
//! let server = TestServer::start(network).await?;
//! let mut station = MockStation::new(Eui::new(1), server.base_uri());
//! let config = station.connect_discovered().await?;
//! assert_eq!(config.region, "EU863");
//! station.close().await?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod logging;
mod recording;
mod server;
mod station;

use basicstation::message::{Radio, RadioChannel, RouterConfig, Sx1301Conf, Version};
pub use logging::{LoggerHandle, logger};
pub use recording::{Event, RecordingServer, next_event};
use rstest::fixture;
pub use server::{TestServer, duplex_pair, unused_listener};
pub use station::{MockStation, StationError};

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Version announcement of a Raspberry Pi reference station.
#[fixture]
pub fn sample_version() -> Version {
    Version {
        station: "2.0.6(rpi/std)".into(),
        firmware: "1.0.3".into(),
        package: "1.0.3".into(),
        model: "rpi".into(),
        protocol: 2,
        features: "rmtsh".into(),
    }
}

/// Single-chip EU863 plan with the three mandatory join channels enabled.
#[fixture]
pub fn sample_router_config() -> RouterConfig {
    let channel = |if_offset| RadioChannel {
        enable: true,
        radio: 0,
        if_offset,
    };
    RouterConfig {
        region: "EU863".into(),
        hwspec: "sx1301/1".into(),
        data_rates: vec![
            [12, 125, 0],
            [11, 125, 0],
            [10, 125, 0],
            [9, 125, 0],
            [8, 125, 0],
            [7, 125, 0],
            [7, 250, 0],
        ],
        net_ids: vec![0x13],
        freq_range: Some([863_000_000, 870_000_000]),
        sx1301_conf: vec![Sx1301Conf {
            radio_0: Radio {
                enable: true,
                freq: 868_300_000,
            },
            chan_multi_sf_0: channel(-200_000),
            chan_multi_sf_1: channel(0),
            chan_multi_sf_2: channel(200_000),
            ..Sx1301Conf::default()
        }],
        ..RouterConfig::default()
    }
}
