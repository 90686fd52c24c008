//! External price sources and the consensus rule that decides which value
//! is trustworthy enough to push on-chain.

use {
    crate::service::{OracleError, OracleService, PriceTarget},
    alloy::primitives::TxHash,
    anyhow::{Context, Result, anyhow},
    bigdecimal::{BigDecimal, RoundingMode},
    reqwest::Client,
    std::{collections::HashMap, sync::Arc},
    url::Url,
};

/// A single external USD price feed.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn usd_price(&self, target: PriceTarget) -> anyhow::Result<BigDecimal>;
}

/// Polls all configured sources and pushes the median on-chain, provided
/// enough sources agree.
pub struct PriceRefresher {
    oracle: Arc<OracleService>,
    sources: Vec<Box<dyn PriceSource>>,
    tolerance_bps: u32,
}

impl PriceRefresher {
    pub fn new(
        oracle: Arc<OracleService>,
        sources: Vec<Box<dyn PriceSource>>,
        tolerance_bps: u32,
    ) -> Self {
        Self {
            oracle,
            sources,
            tolerance_bps,
        }
    }

    /// Fetches quotes from every source, derives the consensus price and
    /// pushes it on-chain. Individual source failures are logged and
    /// tolerated as long as enough sources answer.
    pub async fn fetch_and_push(&self, target: PriceTarget) -> Result<TxHash, OracleError> {
        let quotes = fetch_quotes(&self.sources, target).await;
        let price = consensus(quotes, self.tolerance_bps)?;
        self.oracle.set_price(target, &price).await
    }

}

async fn fetch_quotes(sources: &[Box<dyn PriceSource>], target: PriceTarget) -> Vec<BigDecimal> {
    let quotes = futures::future::join_all(
        sources
            .iter()
            .map(|source| async move { (source.name(), source.usd_price(target).await) }),
    )
    .await;
    quotes
        .into_iter()
        .filter_map(|(name, quote)| match quote {
            Ok(price) => Some(price),
            Err(err) => {
                tracing::warn!(source = name, %target, ?err, "price source failed");
                None
            }
        })
        .collect()
}

/// CoinGecko spot prices.
pub struct CoinGecko {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    /// CoinGecko platform id used for token contract lookups, e.g.
    /// "ethereum".
    chain: String,
    /// CoinGecko coin id of the chain's native asset.
    native_id: String,
}

impl CoinGecko {
    const AUTHORIZATION: &'static str = "x-cg-pro-api-key";

    pub fn new(
        client: Client,
        base_url: Url,
        api_key: Option<String>,
        chain: String,
        native_id: String,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            chain,
            native_id,
        }
    }

    async fn fetch_usd(&self, path: &str, query: &[(&str, &str)]) -> Result<BigDecimal> {
        let url = self.base_url.join(path)?;
        let mut builder = self.client.get(url).query(query);
        if let Some(ref api_key) = self.api_key {
            builder = builder.header(Self::AUTHORIZATION, api_key);
        }
        let response: HashMap<String, HashMap<String, f64>> = builder
            .send()
            .await
            .context("failed to send CoinGecko price request")?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse CoinGecko response")?;
        let usd = response
            .into_values()
            .next()
            .and_then(|prices| prices.get("usd").copied())
            .context("CoinGecko response misses usd price")?;
        // Quotes arrive as floats. Round to 8 decimals so the exact
        // fixed-point scaling downstream never rejects the binary
        // expansion of the float.
        BigDecimal::try_from(usd)
            .map(|price| price.with_scale_round(8, RoundingMode::HalfUp))
            .context("CoinGecko price is not a finite number")
    }
}

#[async_trait::async_trait]
impl PriceSource for CoinGecko {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn usd_price(&self, target: PriceTarget) -> Result<BigDecimal> {
        match target {
            PriceTarget::Native => {
                self.fetch_usd(
                    "simple/price",
                    &[("ids", self.native_id.as_str()), ("vs_currencies", "usd")],
                )
                .await
            }
            PriceTarget::Token(token) => {
                let address = format!("{token:#x}");
                self.fetch_usd(
                    &format!("simple/token_price/{}", self.chain),
                    &[
                        ("contract_addresses", address.as_str()),
                        ("vs_currencies", "usd"),
                    ],
                )
                .await
            }
        }
    }
}

/// Coinbase spot prices. Amounts arrive as decimal strings, so no float
/// round-tripping is involved.
pub struct Coinbase {
    client: Client,
    base_url: Url,
    native_symbol: String,
    token_symbols: HashMap<alloy::primitives::Address, String>,
}

#[derive(serde::Deserialize)]
struct CoinbaseResponse {
    data: CoinbaseSpot,
}

#[derive(serde::Deserialize)]
struct CoinbaseSpot {
    amount: BigDecimal,
}

impl Coinbase {
    pub fn new(
        client: Client,
        base_url: Url,
        native_symbol: String,
        token_symbols: HashMap<alloy::primitives::Address, String>,
    ) -> Self {
        Self {
            client,
            base_url,
            native_symbol,
            token_symbols,
        }
    }
}

#[async_trait::async_trait]
impl PriceSource for Coinbase {
    fn name(&self) -> &str {
        "coinbase"
    }

    async fn usd_price(&self, target: PriceTarget) -> Result<BigDecimal> {
        let symbol = match target {
            PriceTarget::Native => &self.native_symbol,
            PriceTarget::Token(token) => self
                .token_symbols
                .get(&token)
                .with_context(|| format!("no Coinbase symbol configured for {token}"))?,
        };
        let url = self.base_url.join(&format!("prices/{symbol}-USD/spot"))?;
        let response: CoinbaseResponse = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to send Coinbase price request")?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse Coinbase response")?;
        Ok(response.data.amount)
    }
}

/// Derives the price to push from the available quotes: at least two
/// sources have to answer, and the full spread between the cheapest and
/// the most expensive quote must stay within `tolerance_bps` of the
/// median.
fn consensus(mut quotes: Vec<BigDecimal>, tolerance_bps: u32) -> Result<BigDecimal, OracleError> {
    if quotes.len() < 2 {
        return Err(OracleError::Rpc(anyhow!(
            "only {} price sources answered, need at least 2",
            quotes.len()
        )));
    }
    quotes.sort();

    let median = if quotes.len() % 2 == 1 {
        quotes[quotes.len() / 2].clone()
    } else {
        (&quotes[quotes.len() / 2 - 1] + &quotes[quotes.len() / 2]) / 2
    };

    // `quotes` is sorted and non-empty, so first/last always exist.
    let spread = quotes.last().unwrap() - quotes.first().unwrap();
    if &spread * BigDecimal::from(10_000u32) > &median * BigDecimal::from(tolerance_bps) {
        return Err(OracleError::SourcesDisagree);
    }
    Ok(median)
}

#[cfg(test)]
mod tests {
    use {super::*, std::str::FromStr};

    fn quotes(values: &[&str]) -> Vec<BigDecimal> {
        values
            .iter()
            .map(|value| BigDecimal::from_str(value).unwrap())
            .collect()
    }

    #[test]
    fn median_of_agreeing_sources() {
        // 50 bps tolerance, spread of 0.2 on ~100.
        let price = consensus(quotes(&["99.9", "100.0", "100.1"]), 50).unwrap();
        assert_eq!(price, BigDecimal::from_str("100.0").unwrap());
    }

    #[test]
    fn even_number_of_sources_averages_the_middle() {
        let price = consensus(quotes(&["99.0", "101.0"]), 250).unwrap();
        assert_eq!(price, BigDecimal::from(100));
    }

    #[test]
    fn disagreement_is_rejected() {
        assert!(matches!(
            consensus(quotes(&["100.0", "110.0"]), 50),
            Err(OracleError::SourcesDisagree)
        ));
    }

    #[test]
    fn single_answer_is_not_enough() {
        assert!(matches!(
            consensus(quotes(&["100.0"]), 50),
            Err(OracleError::Rpc(_))
        ));
        assert!(matches!(consensus(vec![], 50), Err(OracleError::Rpc(_))));
    }

    #[tokio::test]
    async fn failed_sources_are_filtered_out() {
        let mut good = MockPriceSource::new();
        good.expect_name().return_const("good".to_string());
        good.expect_usd_price()
            .returning(|_| Ok(BigDecimal::from(100)));

        let mut bad = MockPriceSource::new();
        bad.expect_name().return_const("bad".to_string());
        bad.expect_usd_price()
            .returning(|_| Err(anyhow!("connection refused")));

        let sources: Vec<Box<dyn PriceSource>> = vec![Box::new(good), Box::new(bad)];
        let quotes = fetch_quotes(&sources, PriceTarget::Native).await;
        assert_eq!(quotes, vec![BigDecimal::from(100)]);
    }
}
