//! HD key derivation for Spark wallets.
//!
//! This crate turns a BIP32 seed into the fixed bundle of keys a Spark
//! wallet needs -- identity, signing, deposit, and static-deposit -- along
//! one of the four standard Bitcoin derivation schemes:
//!
//! - [`DerivationScheme`] -- which BIP purpose (84'/49'/44'/86') and path
//!   template to walk.
//! - [`KeyDeriver`] -- resolves a scheme + seed + account number into a
//!   [`DerivedKeys`] bundle.
//! - [`taproot`] -- the BIP341 output-key tweak applied to the Taproot
//!   scheme's identity key.

pub mod derivation;
pub mod taproot;

pub use derivation::{
    DerivationError, DerivationScheme, DerivedHdKey, DerivedKeys, KeyDeriver, KeyPair, SchemePath,
};
