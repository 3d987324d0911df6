//! Spark address types.
//!
//! This crate provides the Spark-network address format:
//!
//! - [`Network`] -- Spark network identifier (Mainnet, Regtest)
//! - [`SparkAddress`] -- Bech32m-encoded identity public key address,
//!   including conversion from Bitcoin Taproot addresses

pub mod codec;

pub use codec::{
    SparkAddress, SparkAddressError, decode_spark_address, encode_spark_address,
    spark_address_from_taproot,
};

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Spark network identifier.
///
/// Determines the human-readable prefix (HRP) used in Spark addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Spark mainnet.
    Mainnet,

    /// Spark regtest.
    Regtest,
}
