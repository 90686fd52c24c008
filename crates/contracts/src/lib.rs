//! Alloy bindings for the on-chain contracts the mirror talks to, plus
//! provider construction shared by the binaries.

use {
    alloy::{
        network::{EthereumWallet, TxSigner},
        primitives::Signature,
        providers::{DynProvider, Provider as _, ProviderBuilder},
        rpc::client::ClientBuilder,
    },
    url::Url,
};

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract PriceOracle {
        function getNativePrice() external view returns (uint256);
        function getTokenPrice(address token) external view returns (uint256);
        function setNativePrice(uint256 price) external;
        function setTokenPrice(address token, uint256 price) external;
        function isPriceWriter(address account) external view returns (bool);
        function grantPriceWriter(address account) external;
    }
}

/// A [`PriceOracle`] instance bound to a type erased provider.
pub type PriceOracleInstance = PriceOracle::PriceOracleInstance<DynProvider>;

/// Creates a provider that signs and submits transactions with the given
/// signer.
pub fn provider_with_signer(
    url: &Url,
    signer: Box<dyn TxSigner<Signature> + Send + Sync + 'static>,
) -> DynProvider {
    let rpc = ClientBuilder::default().http(url.clone());
    let wallet = EthereumWallet::new(signer);
    ProviderBuilder::new()
        .wallet(wallet)
        .connect_client(rpc)
        .erased()
}
