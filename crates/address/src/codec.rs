//! Spark address encoding, decoding, and Taproot address conversion.
//!
//! A Spark address is a Bech32m string carrying a wallet's identity public
//! key inside a protobuf-style wrapper:
//!
//! - A human-readable part (HRP) identifying the network
//! - A separator (`1`)
//! - The Bech32m-encoded payload:
//!   - A protobuf tag byte (`0x0a` = field 1, wire type 2)
//!   - A length byte (`0x21` = 33)
//!   - The 33-byte compressed secp256k1 public key
//! - A 6-character checksum
//!
//! # Network prefixes
//!
//! | Network  | HRP       | Taproot HRP | Example          |
//! |----------|-----------|-------------|------------------|
//! | Mainnet  | `spark`   | `bc`        | `spark1pgss...`  |
//! | Regtest  | `sparkrt` | `bcrt`      | `sparkrt1pgss...`|
//!
//! A Bitcoin Taproot output carries only the x-coordinate of its key, so
//! [`SparkAddress::from_taproot_address`] reconstitutes the compressed key
//! with the even-y prefix byte (`0x02`) before re-encoding.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bech32::primitives::decode::{CheckedHrpstring, SegwitHrpstring};
use bech32::{Bech32m, Hrp};

use crate::Network;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Protobuf tag byte: field 1, wire type 2 (length-delimited).
const PROTO_TAG: u8 = 0x0a;

/// Length of a compressed secp256k1 public key, also the envelope's
/// length byte (`0x21`).
const PUBKEY_LEN: u8 = 33;

/// Total size of the protobuf envelope: tag + length + pubkey.
const PAYLOAD_SIZE: usize = 2 + PUBKEY_LEN as usize;

/// Compressed-key prefix byte for an even y-coordinate.
const EVEN_Y_PREFIX: u8 = 0x02;

/// Human-readable part for Spark mainnet addresses.
pub const HRP_MAINNET: &str = "spark";

/// Human-readable part for Spark regtest addresses.
pub const HRP_REGTEST: &str = "sparkrt";

/// Bitcoin mainnet taproot HRP, mapped to [`HRP_MAINNET`].
const HRP_BITCOIN: &str = "bc";

/// Bitcoin regtest taproot HRP, mapped to [`HRP_REGTEST`].
const HRP_BITCOIN_REGTEST: &str = "bcrt";

/// Bitcoin testnet HRP -- recognized, but Spark has no testnet.
const HRP_BITCOIN_TESTNET: &str = "tb";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from Spark address encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SparkAddressError {
    /// The public key is not a 33-byte compressed secp256k1 key.
    InvalidPublicKey,

    /// The address is structurally invalid: bad Bech32m, wrong witness
    /// version, or wrong payload length.
    InvalidAddress(String),

    /// The prefix is recognized but the network is not supported (`tb`).
    UnsupportedNetwork,

    /// The prefix is not recognized at all.
    UnknownPrefix(String),
}

impl fmt::Display for SparkAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPublicKey => write!(f, "invalid public key format"),
            Self::InvalidAddress(reason) => write!(f, "invalid address: {reason}"),
            Self::UnsupportedNetwork => write!(f, "only mainnet or regtest supported"),
            Self::UnknownPrefix(hrp) => write!(f, "unknown address prefix: {hrp}"),
        }
    }
}

impl std::error::Error for SparkAddressError {}

// ---------------------------------------------------------------------------
// SparkAddress
// ---------------------------------------------------------------------------

/// A Spark address: a network plus a 33-byte identity public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SparkAddress {
    network: Network,
    pubkey: [u8; 33],
}

impl SparkAddress {
    /// Creates a Spark address from a network and compressed public key.
    pub fn from_pubkey(network: Network, pubkey: [u8; 33]) -> Self {
        Self { network, pubkey }
    }

    /// Creates a Spark address from a public key slice.
    ///
    /// # Errors
    ///
    /// Returns [`SparkAddressError::InvalidPublicKey`] unless `pubkey` is
    /// exactly 33 bytes.
    pub fn from_pubkey_slice(network: Network, pubkey: &[u8]) -> Result<Self, SparkAddressError> {
        let pubkey: [u8; 33] = pubkey
            .try_into()
            .map_err(|_| SparkAddressError::InvalidPublicKey)?;
        Ok(Self { network, pubkey })
    }

    /// Converts a Bitcoin Taproot address into the Spark address holding
    /// the same key.
    ///
    /// The taproot witness program is an x-only key; the compressed key is
    /// reconstituted with the even-y prefix byte. The HRP maps `bc` to
    /// mainnet and `bcrt` to regtest.
    ///
    /// # Errors
    ///
    /// - [`SparkAddressError::UnsupportedNetwork`] for a `tb` prefix.
    /// - [`SparkAddressError::UnknownPrefix`] for any other non-Bitcoin
    ///   prefix.
    /// - [`SparkAddressError::InvalidAddress`] for a malformed string, a
    ///   witness version other than 1, or a non-32-byte program.
    ///
    /// The prefix is classified before checksum validation, so a `tb` or
    /// unknown-prefix input reports its network error even when the
    /// checksum no longer matches.
    pub fn from_taproot_address(address: &str) -> Result<Self, SparkAddressError> {
        let normalized = normalize_case(address);

        let (hrp, _) = normalized.rsplit_once('1').ok_or_else(|| {
            SparkAddressError::InvalidAddress("missing bech32 separator".into())
        })?;
        let network = match hrp {
            HRP_BITCOIN => Network::Mainnet,
            HRP_BITCOIN_REGTEST => Network::Regtest,
            HRP_BITCOIN_TESTNET => return Err(SparkAddressError::UnsupportedNetwork),
            other => return Err(SparkAddressError::UnknownPrefix(other.to_string())),
        };

        // Full segwit validation: charset, checksum variant, padding.
        let segwit = SegwitHrpstring::new(&normalized)
            .map_err(|e| SparkAddressError::InvalidAddress(e.to_string()))?;

        if segwit.witness_version().to_u8() != 1 {
            return Err(SparkAddressError::InvalidAddress(
                "not a valid taproot address version".into(),
            ));
        }

        // Witness program into the tail of the pubkey buffer -- zero alloc.
        let mut pubkey = [0u8; 33];
        pubkey[0] = EVEN_Y_PREFIX;
        let mut len = 0;
        for byte in segwit.byte_iter() {
            if len == 32 {
                return Err(SparkAddressError::InvalidAddress(
                    "invalid public key length".into(),
                ));
            }
            pubkey[1 + len] = byte;
            len += 1;
        }
        if len != 32 {
            return Err(SparkAddressError::InvalidAddress(
                "invalid public key length".into(),
            ));
        }

        Ok(Self { network, pubkey })
    }

    /// Parses a Spark address from a Bech32m string.
    ///
    /// Zero heap allocations when the input is already lowercase (the
    /// common case -- the encoder always produces lowercase).
    ///
    /// # Errors
    ///
    /// - [`SparkAddressError::InvalidAddress`] for bad Bech32m or a
    ///   malformed payload envelope.
    /// - [`SparkAddressError::UnknownPrefix`] if the HRP is not a Spark
    ///   network.
    /// - [`SparkAddressError::InvalidPublicKey`] if the embedded key's
    ///   prefix byte is not `0x02` or `0x03`.
    pub fn parse(s: &str) -> Result<Self, SparkAddressError> {
        let normalized = normalize_case(s);

        let checked = CheckedHrpstring::new::<Bech32m>(&normalized)
            .map_err(|e| SparkAddressError::InvalidAddress(e.to_string()))?;

        let network = match checked.hrp().as_str() {
            HRP_MAINNET => Network::Mainnet,
            HRP_REGTEST => Network::Regtest,
            other => return Err(SparkAddressError::UnknownPrefix(other.to_string())),
        };

        // Decode the payload into a stack buffer -- zero alloc.
        let mut buf = [0u8; PAYLOAD_SIZE];
        let mut len = 0;
        for byte in checked.byte_iter() {
            if len == PAYLOAD_SIZE {
                return Err(SparkAddressError::InvalidAddress(
                    "invalid payload envelope".into(),
                ));
            }
            buf[len] = byte;
            len += 1;
        }
        if len != PAYLOAD_SIZE || buf[0] != PROTO_TAG || buf[1] != PUBKEY_LEN {
            return Err(SparkAddressError::InvalidAddress(
                "invalid payload envelope".into(),
            ));
        }

        let mut pubkey = [0u8; 33];
        pubkey.copy_from_slice(&buf[2..]);

        // A compressed public key starts with a sign byte.
        if pubkey[0] != 0x02 && pubkey[0] != 0x03 {
            return Err(SparkAddressError::InvalidPublicKey);
        }

        Ok(Self { network, pubkey })
    }

    /// Returns the network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Returns the identity public key as a 33-byte array.
    pub fn pubkey(&self) -> &[u8; 33] {
        &self.pubkey
    }

    /// Returns the identity public key as a lowercase hex string.
    pub fn pubkey_hex(&self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut s = String::with_capacity(66);
        for &b in &self.pubkey {
            s.push(HEX[(b >> 4) as usize] as char);
            s.push(HEX[(b & 0x0f) as usize] as char);
        }
        s
    }

    /// Returns the human-readable part (HRP) for this address's network.
    pub fn hrp(&self) -> &'static str {
        match self.network {
            Network::Mainnet => HRP_MAINNET,
            Network::Regtest => HRP_REGTEST,
        }
    }

    /// Encodes this address as a Bech32m string.
    ///
    /// Allocates a `String`. For zero-alloc writing, use the [`Display`]
    /// impl directly (e.g. `write!(buf, "{address}")`).
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Returns the protobuf-wrapped payload as a stack-allocated array.
    fn payload(&self) -> [u8; PAYLOAD_SIZE] {
        let mut buf = [0u8; PAYLOAD_SIZE];
        buf[0] = PROTO_TAG;
        buf[1] = PUBKEY_LEN;
        buf[2..].copy_from_slice(&self.pubkey);
        buf
    }
}

/// Zero-alloc: writes the Bech32m encoding directly to the formatter.
impl fmt::Display for SparkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = Hrp::parse(self.hrp()).expect("HRP constant is valid");
        let data = self.payload();
        bech32::encode_lower_to_fmt::<Bech32m, _>(f, hrp, &data).map_err(|_| fmt::Error)
    }
}

impl FromStr for SparkAddress {
    type Err = SparkAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bech32 strings are case-insensitive. Lowercases only when needed, so
/// already-lowercase input (the common path) stays borrowed.
fn normalize_case(s: &str) -> Cow<'_, str> {
    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(s.to_lowercase())
    } else {
        Cow::Borrowed(s)
    }
}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Encodes a compressed identity public key as a Spark address string.
///
/// # Errors
///
/// Returns [`SparkAddressError::InvalidPublicKey`] unless `pubkey` is
/// exactly 33 bytes.
pub fn encode_spark_address(network: Network, pubkey: &[u8]) -> Result<String, SparkAddressError> {
    Ok(SparkAddress::from_pubkey_slice(network, pubkey)?.encode())
}

/// Decodes a Spark address string into its components.
pub fn decode_spark_address(address: &str) -> Result<(Network, [u8; 33]), SparkAddressError> {
    let addr = SparkAddress::parse(address)?;
    Ok((addr.network, addr.pubkey))
}

/// Converts a Bitcoin Taproot address string into a Spark address string.
pub fn spark_address_from_taproot(address: &str) -> Result<String, SparkAddressError> {
    Ok(SparkAddress::from_taproot_address(address)?.encode())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode a hex string into bytes. Test-only helper to avoid a `hex`
    /// dependency.
    fn from_hex(s: &str) -> Vec<u8> {
        assert!(s.len() % 2 == 0, "hex string must have even length");
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).expect("valid hex"))
            .collect()
    }

    // -- encode --

    #[test]
    fn encode_prefixes_and_length() {
        let pubkey = [0x02u8; 33];

        let mainnet = encode_spark_address(Network::Mainnet, &pubkey).unwrap();
        assert!(mainnet.starts_with("spark1"));
        assert!(mainnet.len() > 10);
        assert!(!mainnet.contains(char::is_uppercase));

        let regtest = encode_spark_address(Network::Regtest, &pubkey).unwrap();
        assert!(regtest.starts_with("sparkrt1"));
        assert!(regtest.len() > 10);
    }

    #[test]
    fn encode_rejects_32_byte_key() {
        let xonly = [0x7fu8; 32];
        assert_eq!(
            encode_spark_address(Network::Mainnet, &xonly),
            Err(SparkAddressError::InvalidPublicKey)
        );
    }

    #[test]
    fn encode_rejects_oversized_key() {
        let uncompressed = [0x04u8; 65];
        assert_eq!(
            encode_spark_address(Network::Mainnet, &uncompressed),
            Err(SparkAddressError::InvalidPublicKey)
        );
    }

    // -- taproot conversion --

    #[test]
    fn taproot_mainnet_fixed_vector() {
        let spark = spark_address_from_taproot(
            "bc1pvluhspufxmuus9wh3dshxhxfg3656c9mwfw85scaydyp7sk9800sl4h5ae",
        )
        .unwrap();
        assert_eq!(
            spark,
            "spark1pgssyele0qrcjdheeq2a0zmpwdwvj3r4f4stkuju0fp36g6grapv2w7l8am2cp"
        );
    }

    #[test]
    fn taproot_regtest_fixed_vector() {
        let spark = spark_address_from_taproot(
            "bcrt1p47kh0ff29d3rjw2n43vxqgmrgv9az562x37x6dp4ehyqq7ezyhcqlz5y42",
        )
        .unwrap();
        assert_eq!(
            spark,
            "sparkrt1pgss9tadw7jj52mz8yu48tzcvq3kxsct69f55drud56rtnwgqpajyf0stj62w6"
        );
    }

    #[test]
    fn taproot_conversion_keeps_x_coordinate() {
        let addr = SparkAddress::from_taproot_address(
            "bc1pvluhspufxmuus9wh3dshxhxfg3656c9mwfw85scaydyp7sk9800sl4h5ae",
        )
        .unwrap();
        assert_eq!(addr.network(), Network::Mainnet);
        assert_eq!(addr.pubkey()[0], 0x02);
        assert_eq!(
            addr.pubkey_hex(),
            "0267f978078936f9c815d78b61735cc944754d60bb725c7a431d23481f42c53bdf"
        );
    }

    #[test]
    fn taproot_testnet_unsupported() {
        let result = SparkAddress::from_taproot_address(
            "tb1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjdcwps8yq",
        );
        assert_eq!(result, Err(SparkAddressError::UnsupportedNetwork));
    }

    #[test]
    fn taproot_unknown_prefix() {
        let result = SparkAddress::from_taproot_address(
            "xyz1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjdcwps8yq",
        );
        assert_eq!(
            result,
            Err(SparkAddressError::UnknownPrefix("xyz".to_string()))
        );
    }

    #[test]
    fn taproot_malformed_string() {
        let result = SparkAddress::from_taproot_address("invalid-address");
        assert!(matches!(result, Err(SparkAddressError::InvalidAddress(_))));
    }

    #[test]
    fn taproot_rejects_witness_v0() {
        // Valid segwit v0 address; decodes, but is not a taproot output.
        let result =
            SparkAddress::from_taproot_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert_eq!(
            result,
            Err(SparkAddressError::InvalidAddress(
                "not a valid taproot address version".to_string()
            ))
        );
    }

    #[test]
    fn taproot_rejects_corrupted_checksum() {
        // Known-prefix address with a flipped final character.
        let result = SparkAddress::from_taproot_address(
            "bc1pvluhspufxmuus9wh3dshxhxfg3656c9mwfw85scaydyp7sk9800sl4h5aq",
        );
        assert!(matches!(result, Err(SparkAddressError::InvalidAddress(_))));
    }

    #[test]
    fn taproot_uppercase_input() {
        let spark = spark_address_from_taproot(
            "BC1PVLUHSPUFXMUUS9WH3DSHXHXFG3656C9MWFW85SCAYDYP7SK9800SL4H5AE",
        )
        .unwrap();
        assert_eq!(
            spark,
            "spark1pgssyele0qrcjdheeq2a0zmpwdwvj3r4f4stkuju0fp36g6grapv2w7l8am2cp"
        );
    }

    // -- parse --

    #[test]
    fn parse_roundtrip() {
        let pubkey = [
            0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce,
            0x87, 0x0b, 0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81,
            0x5b, 0x16, 0xf8, 0x17, 0x98,
        ];

        let address = SparkAddress::from_pubkey(Network::Mainnet, pubkey);
        let parsed = SparkAddress::parse(&address.encode()).unwrap();
        assert_eq!(parsed.network(), Network::Mainnet);
        assert_eq!(parsed.pubkey(), &pubkey);
    }

    #[test]
    fn parse_real_sparkscan_address() {
        let addr = SparkAddress::parse(
            "sparkrt1pgssxsdqp2dzd3x9hgjjgmpkh294y7kyqqgnr5c8k5wv2sqzskm88mxu93h6m9",
        )
        .unwrap();
        assert_eq!(addr.network(), Network::Regtest);
        assert_eq!(
            addr.pubkey_hex(),
            "0341a00a9a26c4c5ba25246c36ba8b527ac4001131d307b51cc5400285b673ecdc"
        );

        // Re-encoding reproduces the input.
        assert_eq!(
            addr.encode(),
            "sparkrt1pgssxsdqp2dzd3x9hgjjgmpkh294y7kyqqgnr5c8k5wv2sqzskm88mxu93h6m9"
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        let pubkey = [0x02u8; 33];
        let encoded = SparkAddress::from_pubkey(Network::Mainnet, pubkey).encode();

        let parsed = SparkAddress::parse(&encoded.to_uppercase()).unwrap();
        assert_eq!(parsed.pubkey(), &pubkey);
    }

    #[test]
    fn parse_rejects_foreign_bech32m() {
        // Valid Bech32m, but a Bitcoin HRP rather than a Spark one.
        let result =
            SparkAddress::parse("bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0");
        assert!(matches!(result, Err(SparkAddressError::UnknownPrefix(_))));
    }

    #[test]
    fn parse_rejects_bech32_v0_checksum() {
        // Segwit v0 address (Bech32, not Bech32m) fails checksum validation.
        let result = SparkAddress::parse("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert!(matches!(result, Err(SparkAddressError::InvalidAddress(_))));
    }

    #[test]
    fn parse_rejects_bad_sign_byte() {
        let encoded = SparkAddress::from_pubkey(Network::Mainnet, [0x04u8; 33]).encode();
        assert_eq!(
            SparkAddress::parse(&encoded),
            Err(SparkAddressError::InvalidPublicKey)
        );
    }

    #[test]
    fn from_str_and_display_agree() {
        let address = SparkAddress::from_pubkey(Network::Regtest, [0x03u8; 33]);
        let encoded = format!("{address}");
        assert_eq!(encoded, address.encode());

        let parsed: SparkAddress = encoded.parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn decode_convenience_function() {
        let pubkey = [0x02u8; 33];
        let encoded = encode_spark_address(Network::Regtest, &pubkey).unwrap();
        let (network, decoded) = decode_spark_address(&encoded).unwrap();
        assert_eq!(network, Network::Regtest);
        assert_eq!(decoded, pubkey);
    }

    #[test]
    fn pubkey_hex_roundtrip() {
        let hex = "0341a00a9a26c4c5ba25246c36ba8b527ac4001131d307b51cc5400285b673ecdc";
        let pubkey: [u8; 33] = from_hex(hex).try_into().unwrap();
        let address = SparkAddress::from_pubkey(Network::Regtest, pubkey);
        assert_eq!(address.pubkey_hex(), hex);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SparkAddressError::InvalidPublicKey.to_string(),
            "invalid public key format"
        );
        assert_eq!(
            SparkAddressError::UnsupportedNetwork.to_string(),
            "only mainnet or regtest supported"
        );
        assert_eq!(
            SparkAddressError::UnknownPrefix("xyz".into()).to_string(),
            "unknown address prefix: xyz"
        );
        assert_eq!(
            SparkAddressError::InvalidAddress("missing bech32 separator".into()).to_string(),
            "invalid address: missing bech32 separator"
        );
    }
}
