//! Relay spawn utilities.
use crate::{
    chains::{ChainProfile, ChainRegistry},
    cli::Args,
    config::RelayConfig,
    constants::REPLAY_PURGE_INTERVAL,
    contract::{GaslessContract, OnchainContract},
    estimation::GasEstimator,
    metrics::{self, RpcMetricsService},
    nonce::ReplayGuard,
    price::{HermesClient, PriceOracle},
    pricing::FeeCalculator,
    relay::Relay,
    rpc::RelayApiServer,
    signers::RelaySigner,
    transactions::TransactionSubmitter,
    transport::{RETRY_LAYER, RequestTimeoutLayer},
};
use alloy::{
    network::EthereumWallet,
    primitives::ChainId,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::ClientBuilder,
};
use http::header;
use jsonrpsee::server::{
    RpcServiceBuilder, Server, ServerHandle, middleware::http::ProxyGetRequestLayer,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{collections::HashMap, net::SocketAddr, path::Path, sync::Arc};
use tower::ServiceBuilder;
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Context returned once relay is launched.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// The relay pipeline.
    pub relay: Relay,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

impl RelayHandle {
    /// Returns the url to the http server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Attempts to spawn the relay service using CLI arguments and a configuration file.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<RelayHandle> {
    let config = if !config_path.as_ref().exists() {
        let config = args.merge_relay_config(RelayConfig::default());
        config.save_to_file(&config_path)?;
        warn!(path = %config_path.as_ref().display(), "Wrote default config without chains");
        config
    } else {
        // File exists: load and override with CLI values.
        args.merge_relay_config(RelayConfig::load_from_file(&config_path)?)
    };

    try_spawn(config).await
}

/// Connects to the node of `chain` with the relayer wallet.
async fn connect(
    chain: &ChainProfile,
    wallet: EthereumWallet,
    config: &RelayConfig,
) -> eyre::Result<DynProvider> {
    // The timeout is the outer layer and bounds the request including its retry.
    let client = ClientBuilder::default()
        .layer(RequestTimeoutLayer::new(config.transactions.rpc_timeout, chain.chain_id))
        .layer(RETRY_LAYER.clone())
        .connect(chain.rpc_endpoint.as_str())
        .await?;
    let provider = ProviderBuilder::new().wallet(wallet).connect_client(client).erased();

    let remote_chain_id = provider.get_chain_id().await?;
    if remote_chain_id != chain.chain_id {
        eyre::bail!(
            "endpoint of chain {} reports chain id {remote_chain_id}: {}",
            chain.chain_id,
            chain.rpc_endpoint
        );
    }
    Ok(provider)
}

/// Spawns the relay service using the provided [`RelayConfig`].
pub async fn try_spawn(config: RelayConfig) -> eyre::Result<RelayHandle> {
    if config.secrets.relayer_key.is_empty() {
        eyre::bail!("no relayer key configured, set RELAY_SK or --relayer-key");
    }
    let signer = RelaySigner::from_private_key(&config.secrets.relayer_key)?;

    let metrics = metrics::setup_exporter((config.server.address, config.server.metrics_port))?;

    let chains = ChainRegistry::from_configs(config.chains.clone())?;
    if chains.is_empty() {
        warn!("No chains configured, every transfer will be rejected");
    }

    let mut contracts: HashMap<ChainId, Arc<dyn GaslessContract>> = HashMap::new();
    for chain in chains.iter() {
        let Ok(address) = chain.contract() else {
            warn!(chain_id = chain.chain_id, "No relayer contract configured, skipping chain");
            continue;
        };
        let provider = connect(chain, signer.wallet(), &config).await?;
        let contract = OnchainContract::new(address, provider, signer.address())
            .with_confirmations(config.transactions.confirmations)
            .with_receipt_timeout(config.transactions.receipt_timeout);
        info!(chain_id = chain.chain_id, name = %chain.name, %address, "Connected chain");
        contracts.insert(chain.chain_id, Arc::new(contract));
    }

    let feed = HermesClient::new(config.price_feed.endpoint.clone(), config.price_feed.timeout)?;
    if let Some(price) = config.price_feed.constant_price {
        warn!("Setting a constant price: {price}. Should not be used in production!");
    }
    let oracle = PriceOracle::with_ttl(Arc::new(feed), config.price_feed.ttl)
        .with_constant_price(config.price_feed.constant_price);

    let replay = ReplayGuard::new(config.transactions.replay_ttl);
    spawn_replay_purge(replay.clone());

    let relay = Relay::new(
        chains,
        contracts,
        FeeCalculator::new(oracle),
        replay,
        GasEstimator::default(),
        TransactionSubmitter::new(config.transactions.max_batch_size),
    );

    // http layers
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);

    // start server
    let server = Server::builder()
        .http_only()
        .max_connections(config.server.max_connections)
        .set_http_middleware(
            ServiceBuilder::new()
                .layer(cors)
                .layer(ProxyGetRequestLayer::new("/health", "health")?),
        )
        .set_rpc_middleware(RpcServiceBuilder::new().layer_fn(RpcMetricsService::new))
        .build((config.server.address, config.server.port))
        .await?;
    let addr = server.local_addr()?;
    info!(%addr, "Started relay service");
    info!(relayer = %signer.address(), "Relayer account");

    let server = server.start(relay.clone().into_rpc());
    Ok(RelayHandle { local_addr: addr, server, relay, metrics })
}

/// Periodically drops expired replay keys.
fn spawn_replay_purge(replay: ReplayGuard) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REPLAY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = replay.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = replay.len(), "Purged expired replay keys");
            }
        }
    });
}
