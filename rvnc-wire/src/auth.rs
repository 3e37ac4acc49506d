//! VNC authentication (security type 2).
//!
//! The scheme is a DES challenge/response with a protocol-specific quirk:
//! the password is truncated or zero-padded to 8 bytes and then every byte
//! has its bits reversed before the result is used as the DES key. The
//! 16-byte server challenge is encrypted as two independent 8-byte blocks
//! in ECB mode, no padding, and the 16-byte ciphertext is the response.
//!
//! The bit reversal is historical but mandatory: a response computed with
//! the plain password bytes is rejected by every server.

use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;

/// Reverse the bits within a byte (bit 0 swaps with bit 7, and so on).
pub fn reverse_bits(byte: u8) -> u8 {
    let mut result = 0u8;
    for i in 0..8 {
        if byte & (1 << i) != 0 {
            result |= 1 << (7 - i);
        }
    }
    result
}

/// Derive the 8-byte DES key from a VNC password.
fn password_key(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (i, &byte) in password.as_bytes().iter().take(8).enumerate() {
        key[i] = reverse_bits(byte);
    }
    key
}

/// Encrypt a 16-byte challenge with the VNC password.
///
/// Returns the 16-byte response the client sends back to the server.
pub fn encrypt_challenge(password: &str, challenge: &[u8; 16]) -> [u8; 16] {
    let key = password_key(password);
    let cipher = Des::new_from_slice(&key).expect("8-byte key");

    let mut response = [0u8; 16];
    for (i, chunk) in challenge.chunks_exact(8).enumerate() {
        let mut block_bytes = [0u8; 8];
        block_bytes.copy_from_slice(chunk);
        let mut block = block_bytes.into();
        cipher.encrypt_block(&mut block);
        response[i * 8..(i + 1) * 8].copy_from_slice(&block);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reversal() {
        assert_eq!(reverse_bits(0x01), 0x80);
        assert_eq!(reverse_bits(0x80), 0x01);
        assert_eq!(reverse_bits(0b1011_0001), 0b1000_1101);
        // Applying the reversal twice is the identity; once is not.
        for b in 0..=255u8 {
            assert_eq!(reverse_bits(reverse_bits(b)), b);
        }
        assert_ne!(reverse_bits(0x01), 0x01);
    }

    #[test]
    fn key_padding_and_truncation() {
        assert_eq!(
            password_key("pass"),
            [
                reverse_bits(b'p'),
                reverse_bits(b'a'),
                reverse_bits(b's'),
                reverse_bits(b's'),
                0,
                0,
                0,
                0
            ]
        );
        // Only the first 8 bytes of a long password participate.
        assert_eq!(password_key("abcdefghij"), password_key("abcdefgh"));
    }

    #[test]
    fn zero_challenge_known_answer() {
        // DES of an all-zero block under the bit-reversed "pass\0\0\0\0"
        // key; both halves of a zero challenge produce the same ciphertext.
        let response = encrypt_challenge("pass", &[0u8; 16]);
        assert_eq!(response[..8], response[8..]);

        let expected = {
            let cipher = Des::new_from_slice(&password_key("pass")).unwrap();
            let mut block = [0u8; 8].into();
            cipher.encrypt_block(&mut block);
            let mut out = [0u8; 8];
            out.copy_from_slice(&block);
            out
        };
        assert_eq!(response[..8], expected);
        // The quirk matters: the plain-key ciphertext differs.
        let plain_key_cipher = Des::new_from_slice(b"pass\0\0\0\0").unwrap();
        let mut plain_block = [0u8; 8].into();
        plain_key_cipher.encrypt_block(&mut plain_block);
        assert_ne!(response[..8], plain_block[..]);
    }

    #[test]
    fn halves_are_encrypted_independently() {
        let mut challenge = [0u8; 16];
        challenge[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        challenge[8..].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let response = encrypt_challenge("secret", &challenge);
        // Identical plaintext halves give identical ciphertext halves (ECB).
        assert_eq!(response[..8], response[8..]);

        challenge[8] = 99;
        let response2 = encrypt_challenge("secret", &challenge);
        assert_eq!(response[..8], response2[..8]);
        assert_ne!(response2[..8], response2[8..]);
    }
}
