//! Client for the on-chain price oracle: reading and pushing USD prices
//! with exact fixed-point conversion, plus the external source consensus
//! used by the periodic price refresh.

pub mod service;
pub mod sources;

pub use {
    service::{OracleError, OracleService, PriceTarget, SanityBand},
    sources::{CoinGecko, Coinbase, PriceRefresher, PriceSource},
};
