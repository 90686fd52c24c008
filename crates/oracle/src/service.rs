use {
    alloy::primitives::{Address, TxHash, U256},
    bigdecimal::BigDecimal,
    contracts::PriceOracleInstance,
    number::units::{self, ScaleError},
    std::time::Duration,
    thiserror::Error,
};

/// What the oracle quotes a price for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PriceTarget {
    /// The chain's native asset.
    Native,
    /// An ERC-20 payment token.
    Token(Address),
}

impl std::fmt::Display for PriceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Token(token) => write!(f, "{token}"),
        }
    }
}

/// Inclusive bounds a price has to stay within before we are willing to
/// push it on-chain. Guards against fat-fingered and garbage source
/// values.
#[derive(Clone, Debug)]
pub struct SanityBand {
    pub min: BigDecimal,
    pub max: BigDecimal,
}

impl SanityBand {
    pub fn contains(&self, price: &BigDecimal) -> bool {
        *price >= self.min && *price <= self.max
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("price {price} outside sanity band [{min}, {max}]")]
    PriceOutOfBounds {
        price: BigDecimal,
        min: BigDecimal,
        max: BigDecimal,
    },
    #[error("account {0} lacks the price writer role")]
    MissingRole(Address),
    #[error("price sources disagree beyond the configured tolerance")]
    SourcesDisagree,
    #[error("ledger interaction timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Rpc(#[from] anyhow::Error),
}

/// Read and write access to the on-chain price oracle. Writes go through
/// the `writer` account, which must hold the oracle's price writer role.
pub struct OracleService {
    oracle: PriceOracleInstance,
    writer: Address,
    band: SanityBand,
    deadline: Duration,
}

impl OracleService {
    pub fn new(
        oracle: PriceOracleInstance,
        writer: Address,
        band: SanityBand,
        deadline: Duration,
    ) -> Self {
        Self {
            oracle,
            writer,
            band,
            deadline,
        }
    }

    /// Applies the configured deadline to a single ledger interaction.
    /// The alloy call builders only implement [`IntoFuture`], hence the
    /// relaxed bound.
    async fn with_deadline<T, E>(
        &self,
        interaction: impl IntoFuture<Output = Result<T, E>>,
    ) -> Result<T, OracleError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match tokio::time::timeout(self.deadline, interaction.into_future()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(OracleError::Rpc(err.into())),
            Err(_) => Err(OracleError::Timeout(self.deadline)),
        }
    }

    /// Reads the current on-chain price for the target, descaled to an
    /// exact USD decimal.
    pub async fn current_price(&self, target: PriceTarget) -> Result<BigDecimal, OracleError> {
        let raw: U256 = match target {
            PriceTarget::Native => {
                self.with_deadline(self.oracle.getNativePrice().call())
                    .await?
            }
            PriceTarget::Token(token) => {
                self.with_deadline(self.oracle.getTokenPrice(token).call())
                    .await?
            }
        };
        Ok(units::descale_usd(&raw))
    }

    /// Pushes a new price on-chain and waits for the transaction to be
    /// included. The price is validated against the sanity band and the
    /// writer role before anything is submitted.
    pub async fn set_price(
        &self,
        target: PriceTarget,
        price_usd: &BigDecimal,
    ) -> Result<TxHash, OracleError> {
        if !self.band.contains(price_usd) {
            return Err(OracleError::PriceOutOfBounds {
                price: price_usd.clone(),
                min: self.band.min.clone(),
                max: self.band.max.clone(),
            });
        }
        let raw = units::scale_usd(price_usd)?;

        if !self
            .with_deadline(self.oracle.isPriceWriter(self.writer).call())
            .await?
        {
            return Err(OracleError::MissingRole(self.writer));
        }

        let pending = match target {
            PriceTarget::Native => {
                self.with_deadline(self.oracle.setNativePrice(raw).send())
                    .await?
            }
            PriceTarget::Token(token) => {
                self.with_deadline(self.oracle.setTokenPrice(token, raw).send())
                    .await?
            }
        };
        let tx_hash = self.with_deadline(pending.watch()).await?;
        tracing::info!(%target, %price_usd, ?tx_hash, "pushed oracle price");
        Ok(tx_hash)
    }

    /// Grants the writer account the price writer role. A role that is
    /// already granted, either visible through `isPriceWriter` or as a
    /// revert complaining about an existing role, counts as success, so
    /// this is safe to run on every startup.
    pub async fn initialize(&self) -> Result<(), OracleError> {
        if self
            .with_deadline(self.oracle.isPriceWriter(self.writer).call())
            .await?
        {
            tracing::debug!(writer = %self.writer, "price writer role already granted");
            return Ok(());
        }

        let pending = match self
            .with_deadline(self.oracle.grantPriceWriter(self.writer).send())
            .await
        {
            Ok(pending) => pending,
            Err(OracleError::Rpc(err)) if format!("{err:#}").contains("already") => {
                tracing::debug!(writer = %self.writer, "role grant raced, treating as granted");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        self.with_deadline(pending.watch()).await?;
        tracing::info!(writer = %self.writer, "granted price writer role");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::str::FromStr};

    fn band(min: &str, max: &str) -> SanityBand {
        SanityBand {
            min: BigDecimal::from_str(min).unwrap(),
            max: BigDecimal::from_str(max).unwrap(),
        }
    }

    #[test]
    fn sanity_band_is_inclusive() {
        let band = band("0.01", "100000");
        assert!(band.contains(&BigDecimal::from_str("0.01").unwrap()));
        assert!(band.contains(&BigDecimal::from_str("100000").unwrap()));
        assert!(band.contains(&BigDecimal::from_str("3250.5").unwrap()));
        assert!(!band.contains(&BigDecimal::from_str("0.009").unwrap()));
        assert!(!band.contains(&BigDecimal::from_str("100000.01").unwrap()));
    }

    #[test]
    fn target_display() {
        assert_eq!(PriceTarget::Native.to_string(), "native");
        assert!(
            PriceTarget::Token(Address::repeat_byte(0x42))
                .to_string()
                .starts_with("0x4242")
        );
    }
}
