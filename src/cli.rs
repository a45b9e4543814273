//! Command line interface for the `basicstation` demo binary.
//!
//! Shared with the build script, which renders the man page from it, so this
//! file depends on nothing but `clap` and `std`.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `basicstation` binary.
#[derive(Debug, Parser)]
#[command(
    name = "basicstation",
    version,
    about = "Demo LoRa Basic Station network server"
)]
pub struct Cli {
    /// Address to accept station connections on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub address: SocketAddr,

    /// Base WebSocket URI stations are redirected to after discovery.
    #[arg(long, default_value = "ws://127.0.0.1:8080")]
    pub public_uri: String,

    /// Server instance tag returned in discovery responses.
    #[arg(long, default_value = "demoServer")]
    pub muxs: String,

    /// Region tag written into the router configuration.
    #[arg(long, default_value = "US902")]
    pub region: String,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_address: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_match_demo_setup() {
        let cli = Cli::parse_from(["basicstation"]);
        assert_eq!(cli.address.port(), 8080);
        assert_eq!(cli.public_uri, "ws://127.0.0.1:8080");
        assert_eq!(cli.muxs, "demoServer");
        assert_eq!(cli.region, "US902");
        assert!(cli.metrics_address.is_none());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "basicstation",
            "--address",
            "127.0.0.1:6038",
            "--public-uri",
            "wss://lns.example:6038",
            "--region",
            "EU863",
            "--metrics-address",
            "127.0.0.1:9000",
        ]);
        assert_eq!(cli.address.port(), 6038);
        assert_eq!(cli.public_uri, "wss://lns.example:6038");
        assert_eq!(cli.region, "EU863");
        assert_eq!(cli.metrics_address.map(|a| a.port()), Some(9000));
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(Cli::try_parse_from(["basicstation", "--address", "nowhere"]).is_err());
    }
}
