//! BIP341 identity-key tweak for the Taproot derivation scheme.
//!
//! The Taproot scheme's identity key is the BIP341 *output* key: the
//! internal key combined with a domain-separated hash of its own x-only
//! public key, with no script tree committed. On top of the tweak this
//! module enforces the even-y convention, so the identity public key always
//! serializes with a `0x02` prefix.

use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey, Signing, Verification};

use crate::derivation::KeyPair;

/// Tweaks an internal secret key into the even-y identity key pair.
///
/// Applies the BIP341 output-key tweak (no merkle root), then negates the
/// tweaked secret key once if its public key has an odd y-coordinate. A
/// single negation always flips parity, so the returned public key's
/// compressed prefix is `0x02`.
pub fn tweak_identity_key<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    internal: &SecretKey,
) -> KeyPair {
    let keypair = Keypair::from_secret_key(secp, internal);
    let tweaked = keypair.tap_tweak(secp, None).to_inner();

    let pair = KeyPair::from_secret_key(secp, &SecretKey::from_keypair(&tweaked));
    if pair.public_key_bytes()[0] == 0x03 {
        KeyPair::from_secret_key(secp, &pair.secret_key().negate())
    } else {
        pair
    }
}
