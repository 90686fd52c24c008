//! Numeric conversions between the ledger's fixed-point integers and the
//! exact decimal values the rest of the system works with.

pub mod conversions;
pub mod units;
