//! # Relay CLI
use crate::{config::RelayConfig, spawn::try_spawn_with_args, version::RELAY_LONG_VERSION};
use clap::Parser;
use std::{net::IpAddr, path::PathBuf, time::Duration};
use url::Url;

/// Relays signed ERC-20 transfers and charges the relayer fee in the transferred token.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    long_version = RELAY_LONG_VERSION,
    about = "Gasless transfer relay",
    long_about = None
)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one is written to this path. Chains can only be configured in the
    /// file.
    #[arg(long, value_name = "CONFIG", env = "RELAY_CONFIG", default_value = "relay.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR")]
    pub address: Option<IpAddr>,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT")]
    pub port: Option<u16>,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT")]
    pub metrics_port: Option<u16>,
    /// Private key of the relayer account.
    #[arg(long = "relayer-key", value_name = "KEY", env = "RELAY_SK", hide_env_values = true)]
    pub relayer_key: Option<String>,
    /// Base URL of the Pyth Hermes price service.
    #[arg(long = "price-feed", value_name = "URL", env = "RELAY_PRICE_FEED")]
    pub price_feed: Option<Url>,
    /// A constant USD price used for every token. Do not use in production.
    #[arg(long = "constant-price", value_name = "USD")]
    pub constant_price: Option<f64>,
    /// Timeout of a single request to a chain node.
    #[arg(long = "rpc-timeout", value_name = "SECONDS", value_parser = parse_duration_secs)]
    pub rpc_timeout: Option<Duration>,
}

impl Args {
    /// Run the relay service.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        try_spawn_with_args(self, &config_path).await?.server.stopped().await;

        Ok(())
    }

    /// Merges [`Args`] values into an existing [`RelayConfig`] instance.
    pub fn merge_relay_config(self, mut config: RelayConfig) -> RelayConfig {
        if let Some(address) = self.address {
            config = config.with_address(address);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(metrics_port) = self.metrics_port {
            config = config.with_metrics_port(metrics_port);
        }
        if let Some(timeout) = self.rpc_timeout {
            config = config.with_rpc_timeout(timeout);
        }
        config
            .with_relayer_key(self.relayer_key)
            .with_price_feed_endpoint(self.price_feed)
            .with_constant_price(self.constant_price)
    }
}

/// Parses a string representing seconds to a [`Duration`].
fn parse_duration_secs(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_secs(arg.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_override_the_file() {
        let args = Args::parse_from([
            "gasless-relay",
            "--http.port",
            "8545",
            "--relayer-key",
            "0x01",
            "--rpc-timeout",
            "3",
        ]);
        let config = args.merge_relay_config(RelayConfig::default().with_metrics_port(9100));

        assert_eq!(config.server.port, 8545);
        assert_eq!(config.server.metrics_port, 9100);
        assert_eq!(config.secrets.relayer_key, "0x01");
        assert_eq!(config.transactions.rpc_timeout, Duration::from_secs(3));
    }
}
