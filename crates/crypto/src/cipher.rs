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

//! AES-256-CBC payload cipher. Every frame carries its own random IV as a
//! 16-byte prefix, so the negotiated initial IV only marks the starting
//! point of a session and never chains across frames.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;

use crate::{random_bytes, Error, AES_IV_SIZE, AES_KEY_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Symmetric cipher for one session direction-pair; both directions share
/// the session key derived from the handshake.
#[derive(Clone)]
pub struct FrameCipher {
    key: [u8; AES_KEY_SIZE],
}

impl FrameCipher {
    pub fn new(key: [u8; AES_KEY_SIZE]) -> FrameCipher {
        FrameCipher { key }
    }

    /// Encrypts `plaintext` under a fresh random IV and returns
    /// `IV || ciphertext` with PKCS#7 padding applied.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut iv = [0u8; AES_IV_SIZE];
        random_bytes(&mut iv)?;

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(AES_IV_SIZE + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Splits off the IV prefix of `input` and decrypts the remainder.
    pub fn decrypt(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        if input.len() <= AES_IV_SIZE {
            return Err(Error::Malformed);
        }

        let (iv, ciphertext) = input.split_at(AES_IV_SIZE);
        let iv: [u8; AES_IV_SIZE] = iv.try_into().expect("split_at yields exactly AES_IV_SIZE bytes; qed");

        Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FrameCipher {
        let mut key = [0u8; AES_KEY_SIZE];
        random_bytes(&mut key).unwrap();
        FrameCipher::new(key)
    }

    #[test]
    fn round_trips_plaintext() {
        let c = cipher();
        for len in [0usize, 1, 15, 16, 17, 4096] {
            let plain: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let sealed = c.encrypt(&plain).unwrap();
            assert_eq!(c.decrypt(&sealed).unwrap(), plain);
        }
    }

    #[test]
    fn fresh_iv_per_frame() {
        let c = cipher();
        let a = c.encrypt(b"same payload").unwrap();
        let b = c.encrypt(b"same payload").unwrap();
        assert_ne!(a[..AES_IV_SIZE], b[..AES_IV_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_truncated_input() {
        let c = cipher();
        assert_eq!(c.decrypt(&[0u8; AES_IV_SIZE]), Err(Error::Malformed));
        assert_eq!(c.decrypt(&[0u8; 5]), Err(Error::Malformed));
    }

    #[test]
    fn rejects_wrong_key() {
        let a = cipher();
        let b = cipher();
        let sealed = a.encrypt(b"secret").unwrap();
        // Wrong key either unpads to garbage or fails outright; a silent
        // success with the original plaintext is the only wrong answer.
        if let Ok(plain) = b.decrypt(&sealed) {
            assert_ne!(plain, b"secret");
        }
    }
}
