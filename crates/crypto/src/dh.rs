// Copyright 2022-2026 SwiftDB developers.
// This file is part of SwiftDB.

// SwiftDB is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// SwiftDB is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with SwiftDB.  If not, see <http://www.gnu.org/licenses/>.

//! Finite-field Diffie-Hellman over the RFC 7919 ffdhe2048 group.
//!
//! One `DhSession` is generated per connection. Key material crosses the
//! wire as base64 big-endian magnitudes. The shared secret is reduced to
//! the 32-byte AES session key with HKDF-SHA256 rather than truncation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hkdf::Hkdf;
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::{Error, AES_KEY_SIZE};

/// Group generator, shared with clients in the handshake.
pub const DH_GENERATOR: u32 = 2;

/// HKDF context string separating this derivation from any other use of
/// the shared secret.
const HKDF_INFO: &[u8] = b"swiftdb aes-256 session key";

/// RFC 7919 ffdhe2048 prime, big-endian hex.
const FFDHE2048_PRIME_HEX: &[u8] =
    b"FFFFFFFFFFFFFFFFADF85458A2BB4A9AAFDC5620273D3CF1D8B9C583CE2D3695\
      A9E13641146433FBCC939DCE249B3EF97D2FE363630C75D8F681B202AEC4617A\
      D3DF1ED5D5FD65612433F51F5F066ED0856365553DED1AF3B557135E7F57C935\
      984F0C70E0E68B77E2A689DAF3EFE8721DF158A136ADE73530ACCA4F483A797A\
      BC0AB182B324FB61D108A94BB2C8E3FBB96ADAB760D7F4681D4F42A3DE394DF4\
      AE56EDE76372BB190B07A7C8EE0A6D709E02FCE1CDF7E2ECC03404CD28342F61\
      9172FE9CE98583FF8E4F1232EEF28183C3FE3B1B4C6FAD733BB5FCBC2EC22005\
      C58EF1837D1683B2C6F34A26C1B2EFFA886B423861285C97FFFFFFFFFFFFFFFF";

fn group_prime() -> BigUint {
    BigUint::parse_bytes(FFDHE2048_PRIME_HEX, 16)
        .expect("ffdhe2048 prime constant is valid hex; qed")
}

/// An ephemeral server keypair for one key exchange.
pub struct DhSession {
    prime: BigUint,
    private: BigUint,
    public: BigUint,
}

impl DhSession {
    /// Generates a fresh keypair in the ffdhe2048 group.
    pub fn new() -> DhSession {
        let prime = group_prime();
        let generator = BigUint::from(DH_GENERATOR);

        // Exponent in [2, p-2]; the group order leaves no usable bias.
        let upper = &prime - 3u32;
        let private = OsRng.gen_biguint_below(&upper) + 2u32;
        let public = generator.modpow(&private, &prime);

        DhSession {
            prime,
            private,
            public,
        }
    }

    /// Server public value Y, base64 big-endian.
    pub fn public_key_b64(&self) -> String {
        BASE64.encode(self.public.to_bytes_be())
    }

    /// Group prime p, base64 big-endian.
    pub fn prime_b64(&self) -> String {
        BASE64.encode(self.prime.to_bytes_be())
    }

    /// Imports the peer's base64 public value, derives the shared secret
    /// and reduces it to the AES-256 session key.
    pub fn derive_key(&self, peer_public_b64: &str) -> Result<[u8; AES_KEY_SIZE], Error> {
        let raw = BASE64
            .decode(peer_public_b64)
            .map_err(|_| Error::InvalidPeerKey)?;
        let peer = BigUint::from_bytes_be(&raw);

        // Subgroup confinement guard: reject the degenerate elements.
        let two = BigUint::from(2u32);
        if peer < two || peer > &self.prime - &two {
            return Err(Error::InvalidPeerKey);
        }

        let secret = peer.modpow(&self.private, &self.prime);

        let mut key = [0u8; AES_KEY_SIZE];
        Hkdf::<Sha256>::new(None, &secret.to_bytes_be())
            .expand(HKDF_INFO, &mut key)
            .expect("32 bytes is a valid HKDF-SHA256 output length; qed");
        Ok(key)
    }
}

impl Default for DhSession {
    fn default() -> Self {
        DhSession::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_agree_on_key() {
        let server = DhSession::new();
        let client = DhSession::new();

        let server_key = server.derive_key(&client.public_key_b64()).unwrap();
        let client_key = client.derive_key(&server.public_key_b64()).unwrap();

        assert_eq!(server_key, client_key);
    }

    #[test]
    fn exported_prime_is_2048_bit() {
        let session = DhSession::new();
        let prime = BASE64.decode(session.prime_b64()).unwrap();
        assert_eq!(prime.len(), 256);
        assert_eq!(prime[0], 0xFF);
    }

    #[test]
    fn rejects_degenerate_peer_keys() {
        let session = DhSession::new();
        let prime = group_prime();

        for bad in [
            BigUint::from(0u32),
            BigUint::from(1u32),
            &prime - 1u32,
            prime.clone(),
        ] {
            let encoded = BASE64.encode(bad.to_bytes_be());
            assert_eq!(session.derive_key(&encoded), Err(Error::InvalidPeerKey));
        }
    }

    #[test]
    fn rejects_invalid_base64() {
        let session = DhSession::new();
        assert_eq!(
            session.derive_key("not//valid==base64!!"),
            Err(Error::InvalidPeerKey)
        );
    }
}
