//! Derivation schemes and the HD key derivation engine.
//!
//! A [`KeyDeriver`] walks the BIP32 tree from a seed along one of four
//! standard Bitcoin derivation schemes and returns a [`DerivedKeys`] bundle.
//!
//! # Path templates
//!
//! Each scheme substitutes one numeric placeholder, selected by the
//! `use_address_index` flag set at construction time:
//!
//! | Form          | Template          | Placeholder                |
//! |---------------|-------------------|----------------------------|
//! | Address index | `m/P'/0'/0'/0/n`  | `n` = address index        |
//! | Account       | `m/P'/0'/n'/0/0`  | `n` = account (hardened)   |
//!
//! where `P` is the scheme's purpose code (84, 49, 44, or 86).
//!
//! # Key bundle
//!
//! | Key            | Position relative to base path | Shape                   |
//! |----------------|--------------------------------|-------------------------|
//! | Identity       | base                           | [`KeyPair`]             |
//! | Signing        | base `/1'`                     | [`DerivedHdKey`]        |
//! | Deposit        | base `/2'`                     | [`KeyPair`]             |
//! | Static deposit | base `/3'`                     | [`DerivedHdKey`]        |
//!
//! For the Taproot scheme the identity key is additionally run through the
//! BIP341 output-key tweak (see [`crate::taproot`]); its three hardened
//! children remain anchored at the untweaked internal key.

use std::fmt;

use bitcoin::{
    Network,
    bip32::{ChildNumber, Xpriv},
    secp256k1::{All, PublicKey, Secp256k1, SecretKey, Signing},
};

use crate::taproot;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Coin type component, fixed at `0'` (Bitcoin) for every scheme.
const COIN_TYPE_CHILD: ChildNumber = ChildNumber::Hardened { index: 0 };

/// Change component, fixed at `0` (external chain) for every scheme.
const CHANGE_CHILD: ChildNumber = ChildNumber::Normal { index: 0 };

/// Hardened child of the identity node holding the signing key.
const SIGNING_CHILD: ChildNumber = ChildNumber::Hardened { index: 1 };

/// Hardened child of the identity node holding the deposit key.
const DEPOSIT_CHILD: ChildNumber = ChildNumber::Hardened { index: 2 };

/// Hardened child of the identity node holding the static-deposit key.
const STATIC_DEPOSIT_CHILD: ChildNumber = ChildNumber::Hardened { index: 3 };

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors returned by derivation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationError {
    /// The seed was rejected by BIP32 master key derivation.
    InvalidSeed,
    /// The child index exceeds the valid BIP32 range (must be < 2^31).
    InvalidChildIndex(u32),
    /// BIP32 derivation failed along the path, leaving the bundle incomplete.
    DerivationFailed,
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSeed => write!(f, "invalid seed"),
            Self::InvalidChildIndex(i) => write!(f, "child index {i} out of range"),
            Self::DerivationFailed => {
                write!(f, "failed to derive all required keys from seed")
            }
        }
    }
}

impl std::error::Error for DerivationError {}

// ---------------------------------------------------------------------------
// Derivation schemes
// ---------------------------------------------------------------------------

/// The four standard Bitcoin HD derivation schemes.
///
/// Encoded as the purpose component of the path: `m/purpose'/0'/...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationScheme {
    /// Native segwit (BIP84, purpose `84'`).
    NativeSegwit,
    /// Wrapped segwit (BIP49, purpose `49'`).
    WrappedSegwit,
    /// Legacy Bitcoin (BIP44, purpose `44'`).
    LegacyBitcoin,
    /// Taproot (BIP86, purpose `86'`). The identity key is tweaked per BIP341.
    Taproot,
}

impl DerivationScheme {
    /// Returns the BIP purpose code for this scheme.
    #[inline]
    pub const fn purpose(self) -> u32 {
        match self {
            Self::NativeSegwit => 84,
            Self::WrappedSegwit => 49,
            Self::LegacyBitcoin => 44,
            Self::Taproot => 86,
        }
    }

    /// Resolves the concrete base path for this scheme.
    ///
    /// With `use_address_index` the account component is fixed at `0'` and
    /// `n` fills the (normal) address-index slot; otherwise the address
    /// index is fixed at `0` and `n` fills the hardened account slot.
    ///
    /// # Errors
    ///
    /// Returns [`DerivationError::InvalidChildIndex`] if `n >= 2^31`.
    pub fn path(self, use_address_index: bool, n: u32) -> Result<SchemePath, DerivationError> {
        let purpose = ChildNumber::Hardened {
            index: self.purpose(),
        };

        let (account, address) = if use_address_index {
            (ChildNumber::Hardened { index: 0 }, child_number(n, false)?)
        } else {
            (child_number(n, true)?, ChildNumber::Normal { index: 0 })
        };

        Ok(SchemePath::base(purpose, account, address))
    }
}

// ---------------------------------------------------------------------------
// Scheme path (stack-allocated)
// ---------------------------------------------------------------------------

/// A resolved derivation path for one scheme.
///
/// Always 5 segments (`purpose/coin/account/change/address`) or 6 segments
/// with a hardened purpose-key child appended. Stored entirely on the stack
/// -- no heap allocation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SchemePath {
    segments: [ChildNumber; 6],
    len: u8,
}

impl SchemePath {
    /// Creates the 5-segment base path.
    fn base(purpose: ChildNumber, account: ChildNumber, address: ChildNumber) -> Self {
        Self {
            segments: [
                purpose,
                COIN_TYPE_CHILD,
                account,
                CHANGE_CHILD,
                address,
                ChildNumber::Normal { index: 0 }, // unused
            ],
            len: 5,
        }
    }

    /// Returns the 6-segment path with `child` appended to the base.
    pub fn with_child(mut self, child: ChildNumber) -> Self {
        self.segments[5] = child;
        self.len = 6;
        self
    }
}

impl fmt::Debug for SchemePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Renders the concrete path string, e.g. `m/84'/0'/0'/0/5`.
impl fmt::Display for SchemePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for child in self.iter() {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}

impl std::ops::Deref for SchemePath {
    type Target = [ChildNumber];

    fn deref(&self) -> &Self::Target {
        &self.segments[..self.len as usize]
    }
}

impl AsRef<[ChildNumber]> for SchemePath {
    fn as_ref(&self) -> &[ChildNumber] {
        self
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Creates a [`ChildNumber`] from an index and hardened flag.
///
/// # Errors
///
/// Returns [`DerivationError::InvalidChildIndex`] if `index >= 2^31`.
pub fn child_number(index: u32, hardened: bool) -> Result<ChildNumber, DerivationError> {
    if hardened {
        ChildNumber::from_hardened_idx(index)
    } else {
        ChildNumber::from_normal_idx(index)
    }
    .map_err(|_| DerivationError::InvalidChildIndex(index))
}

// ---------------------------------------------------------------------------
// Key types
// ---------------------------------------------------------------------------

/// An immutable secp256k1 key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Builds a key pair by computing the public key from `secret_key`.
    pub fn from_secret_key<C: Signing>(secp: &Secp256k1<C>, secret_key: &SecretKey) -> Self {
        Self {
            secret_key: *secret_key,
            public_key: PublicKey::from_secret_key(secp, secret_key),
        }
    }

    /// Returns the secret key.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the 32 secret key bytes.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    /// Returns the 33-byte compressed (sign-byte-prefixed) public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }
}

/// A [`KeyPair`] together with its position in the HD tree.
///
/// The retained [`Xpriv`] lets the caller keep deriving descendants; the
/// engine itself holds no reference to it after returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedHdKey {
    key_pair: KeyPair,
    xpriv: Xpriv,
}

impl DerivedHdKey {
    fn new<C: Signing>(secp: &Secp256k1<C>, xpriv: Xpriv) -> Self {
        Self {
            key_pair: KeyPair::from_secret_key(secp, &xpriv.private_key),
            xpriv,
        }
    }

    /// Returns the key pair at this node.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Returns the extended private key at this node.
    pub fn xpriv(&self) -> &Xpriv {
        &self.xpriv
    }

    /// Derives a descendant of this node.
    ///
    /// # Errors
    ///
    /// Returns [`DerivationError::DerivationFailed`] if BIP32 derivation
    /// fails along `path`.
    pub fn derive_child<C: Signing, P: AsRef<[ChildNumber]>>(
        &self,
        secp: &Secp256k1<C>,
        path: &P,
    ) -> Result<DerivedHdKey, DerivationError> {
        let xpriv = self
            .xpriv
            .derive_priv(secp, path)
            .map_err(|_| DerivationError::DerivationFailed)?;
        Ok(Self::new(secp, xpriv))
    }
}

/// The key bundle produced by one [`KeyDeriver::derive_keys_from_seed`] call.
///
/// All four keys descend from the same resolved base path: identity sits at
/// the base, the other three are its hardened children `1'`, `2'`, `3'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedKeys {
    /// The identity key (tweaked per BIP341 for the Taproot scheme).
    pub identity_key: KeyPair,
    /// The signing key, with its HD tree handle (`base/1'`).
    pub signing_hd_key: DerivedHdKey,
    /// The deposit key (`base/2'`).
    pub deposit_key: KeyPair,
    /// The static-deposit key, with its HD tree handle (`base/3'`).
    pub static_deposit_hd_key: DerivedHdKey,
}

// ---------------------------------------------------------------------------
// KeyDeriver
// ---------------------------------------------------------------------------

/// HD key derivation engine for one scheme.
///
/// Holds a `Secp256k1<All>` context (~1.7 KiB) plus the construction-time
/// scheme and placeholder selection; carries no other state, so a single
/// instance can be shared across threads.
pub struct KeyDeriver {
    secp: Secp256k1<All>,
    scheme: DerivationScheme,
    use_address_index: bool,
}

impl KeyDeriver {
    /// Creates an engine for `scheme`.
    ///
    /// `use_address_index` selects which path template the account number
    /// fills at derivation time (see the module docs).
    pub fn new(scheme: DerivationScheme, use_address_index: bool) -> Self {
        Self {
            secp: Secp256k1::new(),
            scheme,
            use_address_index,
        }
    }

    /// Returns the scheme this engine derives along.
    pub fn scheme(&self) -> DerivationScheme {
        self.scheme
    }

    /// Returns a reference to the secp256k1 context.
    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Derives the full key bundle for `account_number` from `seed`.
    ///
    /// The seed is treated as opaque bytes; only the BIP32 primitive
    /// constrains it. The master key bytes are network-independent (the
    /// network only selects serialization version bytes, which are never
    /// serialized here).
    ///
    /// # Errors
    ///
    /// - [`DerivationError::InvalidSeed`] if master key derivation rejects
    ///   the seed.
    /// - [`DerivationError::InvalidChildIndex`] if `account_number >= 2^31`.
    /// - [`DerivationError::DerivationFailed`] if any of the four nodes
    ///   cannot be derived.
    pub fn derive_keys_from_seed(
        &self,
        seed: &[u8],
        account_number: u32,
    ) -> Result<DerivedKeys, DerivationError> {
        let master =
            Xpriv::new_master(Network::Bitcoin, seed).map_err(|_| DerivationError::InvalidSeed)?;

        let base = self.scheme.path(self.use_address_index, account_number)?;

        let identity = master
            .derive_priv(&self.secp, &base)
            .map_err(|_| DerivationError::DerivationFailed)?;

        // The purpose-key children hang off the identity node. For Taproot
        // this is the untweaked internal key, not the tweaked output key.
        let signing = self.derive_node(&identity, SIGNING_CHILD)?;
        let deposit = self.derive_node(&identity, DEPOSIT_CHILD)?;
        let static_deposit = self.derive_node(&identity, STATIC_DEPOSIT_CHILD)?;

        let identity_key = match self.scheme {
            DerivationScheme::Taproot => {
                taproot::tweak_identity_key(&self.secp, &identity.private_key)
            }
            _ => KeyPair::from_secret_key(&self.secp, &identity.private_key),
        };

        Ok(DerivedKeys {
            identity_key,
            signing_hd_key: DerivedHdKey::new(&self.secp, signing),
            deposit_key: KeyPair::from_secret_key(&self.secp, &deposit.private_key),
            static_deposit_hd_key: DerivedHdKey::new(&self.secp, static_deposit),
        })
    }

    fn derive_node(&self, parent: &Xpriv, child: ChildNumber) -> Result<Xpriv, DerivationError> {
        parent
            .derive_priv(&self.secp, &[child])
            .map_err(|_| DerivationError::DerivationFailed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
