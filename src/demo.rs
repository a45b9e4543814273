//! In-memory network server used by the demo binary.

use async_trait::async_trait;
use basicstation::{
    discovery::DiscoveryResponse,
    eui::Eui,
    hooks::{HandlerError, NetworkServer, RequestInfo},
    message::{LoraStdChannel, Message, Radio, RadioChannel, RouterConfig, Sx1301Conf, Version},
    session::{CloseReason, SessionError, StationSession},
};
use log::{info, warn};

/// Redirects every station to `{public_uri}/{eui}` and hands out one static
/// channel plan.
#[derive(Debug)]
pub struct DemoServer {
    public_uri: String,
    muxs: String,
    router_config: RouterConfig,
}

impl DemoServer {
    pub fn new(public_uri: &str, muxs: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            public_uri: public_uri.trim_end_matches('/').to_owned(),
            muxs: muxs.into(),
            router_config: us902_sub_band_2(region.into()),
        }
    }
}

#[async_trait]
impl NetworkServer for DemoServer {
    async fn discovery_response(
        &self,
        router: Eui,
        request: &RequestInfo,
    ) -> Result<DiscoveryResponse, HandlerError> {
        info!(
            "discovery: eui={router}, peer_addr={:?}",
            request.peer_addr
        );
        Ok(DiscoveryResponse::redirect(
            router,
            format!("{}/{router}", self.public_uri),
            self.muxs.clone(),
        ))
    }

    async fn router_config(&self, session: &StationSession) -> Result<RouterConfig, HandlerError> {
        info!(
            "router config requested: eui={}, region={}",
            session.eui(),
            self.router_config.region
        );
        Ok(self.router_config.clone())
    }

    async fn set_version(&self, session: &StationSession, version: &Version) {
        info!(
            "station version: eui={}, station={}, model={}",
            session.eui(),
            version.station,
            version.model
        );
    }

    fn receive(&self, session: &StationSession, message: Message) {
        info!("received: eui={}, message={message:?}", session.eui());
    }

    async fn on_session_end(
        &self,
        session: &StationSession,
        outcome: Result<&CloseReason, &SessionError>,
    ) {
        let stats = session.stats();
        match outcome {
            Ok(reason) => info!(
                "session ended: eui={}, reason={reason:?}, stats={stats:?}",
                session.eui()
            ),
            Err(e) => warn!("session ended: eui={}, error={e}, stats={stats:?}", session.eui()),
        }
    }
}

/// Unused data rate slot.
const DR_UNUSED: [i32; 3] = [-1, 0, 0];

/// US902 channel plan on sub-band 2 (903.9 to 905.3 MHz).
fn us902_sub_band_2(region: String) -> RouterConfig {
    let multi_sf = |radio, if_offset| RadioChannel {
        enable: true,
        radio,
        if_offset,
    };
    RouterConfig {
        region,
        hwspec: "sx1301/1".into(),
        data_rates: vec![
            [10, 125, 0],
            [9, 125, 0],
            [8, 125, 0],
            [7, 125, 0],
            [8, 500, 0],
            DR_UNUSED,
            DR_UNUSED,
            DR_UNUSED,
            [12, 500, 1],
            [11, 500, 1],
            [10, 500, 1],
            [9, 500, 1],
            [8, 500, 1],
            [7, 500, 1],
            DR_UNUSED,
            DR_UNUSED,
        ],
        freq_range: Some([902_000_000, 928_000_000]),
        sx1301_conf: vec![Sx1301Conf {
            radio_0: Radio {
                enable: true,
                freq: 904_300_000,
            },
            radio_1: Radio {
                enable: true,
                freq: 905_000_000,
            },
            chan_multi_sf_0: multi_sf(0, -400_000),
            chan_multi_sf_1: multi_sf(0, -200_000),
            chan_multi_sf_2: multi_sf(0, 0),
            chan_multi_sf_3: multi_sf(0, 200_000),
            chan_multi_sf_4: multi_sf(1, -300_000),
            chan_multi_sf_5: multi_sf(1, -100_000),
            chan_multi_sf_6: multi_sf(1, 100_000),
            chan_multi_sf_7: multi_sf(1, 300_000),
            chan_lora_std: LoraStdChannel {
                enable: true,
                radio: 0,
                if_offset: 300_000,
                bandwidth: 500_000,
                spread_factor: 8,
            },
            ..Sx1301Conf::default()
        }],
        ..RouterConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn redirects_to_station_endpoint() {
        let server = DemoServer::new("ws://lns.local:8080/", "demo", "US902");
        let eui = Eui::new(0xb827_ebff_fe61_0001);
        let response = server
            .discovery_response(eui, &RequestInfo::default())
            .await
            .expect("discovery response");
        assert_eq!(response.uri, format!("ws://lns.local:8080/{eui}"));
        assert_eq!(response.muxs, "demo");
        assert_eq!(response.router, Some(eui));
    }

    #[test]
    fn channel_plan_stays_in_band() {
        let config = us902_sub_band_2("US902".into());
        let [low, high] = config.freq_range.expect("frequency range");
        let chip = &config.sx1301_conf[0];
        let radios = [chip.radio_0.freq, chip.radio_1.freq];
        for channel in chip.multi_sf_channels() {
            let centre = i64::from(radios[usize::from(channel.radio)]) + i64::from(channel.if_offset);
            assert!((i64::from(low)..=i64::from(high)).contains(&centre));
        }
        assert_eq!(config.data_rates.len(), 16);
    }
}
