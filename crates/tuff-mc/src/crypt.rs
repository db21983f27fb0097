//! AES-128-CFB8 stream cipher used for transport encryption.
//!
//! Once the login exchange agrees on a shared secret, every byte on the
//! wire in both directions passes through one of these, below framing.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};

/// AES-128-CFB8 cipher state.
///
/// CFB8 mode encrypts/decrypts one byte at a time, using the previous
/// ciphertext byte to update the IV for the next byte.
pub struct Cfb8Cipher {
    cipher: Aes128,
    iv: [u8; 16],
}

impl Cfb8Cipher {
    /// Create a new CFB8 cipher with the given key and IV.
    #[must_use]
    pub fn new(key: &[u8; 16], iv: &[u8; 16]) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(key));
        Self { cipher, iv: *iv }
    }

    /// Create a cipher keyed the way Minecraft does it: key and IV are both
    /// the shared secret.
    #[must_use]
    pub fn from_shared_secret(secret: &[u8; 16]) -> Self {
        Self::new(secret, secret)
    }

    fn keystream_byte(&self) -> u8 {
        let mut block = GenericArray::clone_from_slice(&self.iv);
        self.cipher.encrypt_block(&mut block);
        block[0]
    }

    fn shift_in(&mut self, ciphertext_byte: u8) {
        self.iv.copy_within(1.., 0);
        self.iv[15] = ciphertext_byte;
    }

    /// Encrypt data in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let ciphertext_byte = *byte ^ self.keystream_byte();
            *byte = ciphertext_byte;
            self.shift_in(ciphertext_byte);
        }
    }

    /// Decrypt data in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let ciphertext_byte = *byte;
            *byte ^= self.keystream_byte();
            self.shift_in(ciphertext_byte);
        }
    }
}

impl std::fmt::Debug for Cfb8Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cfb8Cipher").finish_non_exhaustive()
    }
}
