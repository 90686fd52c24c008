use {
    alloy::primitives::Address,
    anyhow::{Context, Result},
    bigdecimal::BigDecimal,
    clap::Parser,
    std::{net::SocketAddr, time::Duration},
    url::Url,
};

#[derive(Parser)]
pub struct Arguments {
    /// Filter for the tracing subscriber, env_logger syntax.
    #[clap(long, env, default_value = "info")]
    pub log_filter: String,

    /// Url of the Postgres database. By default connects to locally running
    /// postgres.
    #[clap(long, env, default_value = "postgresql://")]
    pub db_url: Url,

    /// The ledger node URL to connect to.
    #[clap(long, env, default_value = "http://localhost:8545")]
    pub node_url: Url,

    /// GraphQL endpoint of the event index.
    #[clap(long, env, default_value = "http://localhost:8000/subgraphs/orders")]
    pub index_url: Url,

    /// Address the API listens on.
    #[clap(long, env, default_value = "0.0.0.0:8080")]
    pub bind_address: SocketAddr,

    /// Address the metrics endpoint listens on.
    #[clap(long, env, default_value = "0.0.0.0:9586")]
    pub metrics_address: SocketAddr,

    /// Address of the deployed price oracle contract.
    #[clap(long, env)]
    pub oracle_address: Address,

    /// Private key of the account holding (or to be granted) the oracle's
    /// price writer role.
    #[clap(long, env)]
    pub oracle_signer_key: String,

    /// Secret the API credential tokens are signed with.
    #[clap(long, env)]
    pub api_secret: String,

    /// How often the full synchronization pass runs.
    #[clap(long, env, default_value = "5m", value_parser = humantime::parse_duration)]
    pub full_sync_interval: Duration,

    /// How often payments and refunds are synchronized.
    #[clap(long, env, default_value = "15m", value_parser = humantime::parse_duration)]
    pub settlement_sync_interval: Duration,

    /// How often fresh prices are pushed to the oracle.
    #[clap(long, env, default_value = "1h", value_parser = humantime::parse_duration)]
    pub price_refresh_interval: Duration,

    /// How often aged price update rows are deleted.
    #[clap(long, env, default_value = "1d", value_parser = humantime::parse_duration)]
    pub retention_cleanup_interval: Duration,

    /// How long price update rows are retained.
    #[clap(long, env, default_value = "90d", value_parser = humantime::parse_duration)]
    pub price_update_retention: Duration,

    /// Deadline for a single event index query.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub index_deadline: Duration,

    /// Deadline for a single ledger interaction.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub ledger_deadline: Duration,

    /// Smallest USD price the oracle service is willing to push.
    #[clap(long, env, default_value = "0.01")]
    pub price_sanity_min: BigDecimal,

    /// Largest USD price the oracle service is willing to push.
    #[clap(long, env, default_value = "1000000")]
    pub price_sanity_max: BigDecimal,

    /// Maximum spread between external price sources, in basis points.
    #[clap(long, env, default_value = "50")]
    pub price_tolerance_bps: u32,

    /// Payment tokens the periodic price refresh pushes prices for.
    #[clap(long, env, value_delimiter = ',')]
    pub tracked_tokens: Vec<Address>,

    /// Base URL of the CoinGecko API.
    #[clap(long, env, default_value = "https://api.coingecko.com/api/v3/")]
    pub coingecko_url: Url,

    /// Optional CoinGecko API key.
    #[clap(long, env)]
    pub coingecko_api_key: Option<String>,

    /// CoinGecko platform id used for token contract lookups.
    #[clap(long, env, default_value = "ethereum")]
    pub coingecko_chain: String,

    /// CoinGecko coin id of the chain's native asset.
    #[clap(long, env, default_value = "ethereum")]
    pub coingecko_native_id: String,

    /// Base URL of the Coinbase spot price API.
    #[clap(long, env, default_value = "https://api.coinbase.com/v2/")]
    pub coinbase_url: Url,

    /// Coinbase symbol of the chain's native asset.
    #[clap(long, env, default_value = "ETH")]
    pub coinbase_native_symbol: String,

    /// Coinbase symbols for tracked payment tokens as
    /// `<address>=<symbol>` pairs.
    #[clap(long, env, value_delimiter = ',', value_parser = parse_token_symbol)]
    pub coinbase_token_symbols: Vec<(Address, String)>,

    /// Number of API requests a client may make per rate limit window.
    #[clap(long, env, default_value = "60")]
    pub rate_limit_max_requests: u32,

    /// Length of the API rate limit window.
    #[clap(long, env, default_value = "1m", value_parser = humantime::parse_duration)]
    pub rate_limit_window: Duration,
}

fn parse_token_symbol(value: &str) -> Result<(Address, String)> {
    let (address, symbol) = value
        .split_once('=')
        .context("expected <address>=<symbol>")?;
    Ok((
        address.parse().context("invalid token address")?,
        symbol.to_string(),
    ))
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "log_filter: {}", self.log_filter)?;
        writeln!(f, "db_url: SECRET")?;
        writeln!(f, "node_url: {}", self.node_url)?;
        writeln!(f, "index_url: {}", self.index_url)?;
        writeln!(f, "bind_address: {}", self.bind_address)?;
        writeln!(f, "metrics_address: {}", self.metrics_address)?;
        writeln!(f, "oracle_address: {}", self.oracle_address)?;
        writeln!(f, "oracle_signer_key: SECRET")?;
        writeln!(f, "api_secret: SECRET")?;
        writeln!(f, "full_sync_interval: {:?}", self.full_sync_interval)?;
        writeln!(
            f,
            "settlement_sync_interval: {:?}",
            self.settlement_sync_interval
        )?;
        writeln!(f, "price_refresh_interval: {:?}", self.price_refresh_interval)?;
        writeln!(
            f,
            "retention_cleanup_interval: {:?}",
            self.retention_cleanup_interval
        )?;
        writeln!(f, "price_update_retention: {:?}", self.price_update_retention)?;
        writeln!(f, "index_deadline: {:?}", self.index_deadline)?;
        writeln!(f, "ledger_deadline: {:?}", self.ledger_deadline)?;
        writeln!(f, "price_sanity_min: {}", self.price_sanity_min)?;
        writeln!(f, "price_sanity_max: {}", self.price_sanity_max)?;
        writeln!(f, "price_tolerance_bps: {}", self.price_tolerance_bps)?;
        writeln!(f, "tracked_tokens: {:?}", self.tracked_tokens)?;
        writeln!(f, "coingecko_url: {}", self.coingecko_url)?;
        writeln!(
            f,
            "coingecko_api_key: {}",
            self.coingecko_api_key
                .as_deref()
                .map(|_| "SECRET")
                .unwrap_or("None")
        )?;
        writeln!(f, "coingecko_chain: {}", self.coingecko_chain)?;
        writeln!(f, "coingecko_native_id: {}", self.coingecko_native_id)?;
        writeln!(f, "coinbase_url: {}", self.coinbase_url)?;
        writeln!(f, "coinbase_native_symbol: {}", self.coinbase_native_symbol)?;
        writeln!(f, "coinbase_token_symbols: {:?}", self.coinbase_token_symbols)?;
        writeln!(f, "rate_limit_max_requests: {}", self.rate_limit_max_requests)?;
        writeln!(f, "rate_limit_window: {:?}", self.rate_limit_window)?;
        Ok(())
    }
}
