//! Cryptographic primitives for the UTXO commitment engine.
//!
//! The only export of interest is [`MuHash3072`], an incremental multiset
//! accumulator: elements can be absorbed and withdrawn in any order, and the
//! 32-byte digest depends only on the resulting multiset.

pub mod muhash;

pub use muhash::MuHash3072;

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

/// Produces one 64-byte ChaCha20 keystream block for the given key, nonce and
/// block counter.
pub fn chacha20_block(key: &[u8; 32], nonce: &[u8; 12], counter: u32) -> Vec<u8> {
    let mut cipher = ChaCha20::new(key.into(), nonce.into());

    // Each keystream block is 64 bytes; seek to the requested one.
    cipher.seek(counter as u64 * 64);

    let mut keystream = vec![0u8; 64];
    cipher.apply_keystream(&mut keystream);

    keystream
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // Test vectors from RFC 7539/8439: 32-byte key, 12-byte nonce, block
    // counter and the first 64 bytes of keystream.
    #[test]
    fn test_chacha20_block() {
        let cases: Vec<([u8; 32], [u8; 12], u32, [u8; 64])> = vec![
            (
                hex!("0000000000000000000000000000000000000000000000000000000000000000"),
                [0u8; 12],
                0,
                hex!(
                    "76b8e0ada0f13d90405d6ae55386bd28bdd219b8a08ded1aa836efcc8b770dc7\
                    da41597c5157488d7724e03fb8d84a376a43b8f41518a11cc387b669b2ee6586"
                ),
            ),
            (
                hex!("0000000000000000000000000000000000000000000000000000000000000000"),
                [0u8; 12],
                1,
                hex!(
                    "9f07e7be5551387a98ba977c732d080dcb0f29a048e3656912c6533e32ee7aed\
                    29b721769ce64e43d57133b074d839d531ed1f28510afb45ace10a1f4b794d6f"
                ),
            ),
            (
                hex!("0000000000000000000000000000000000000000000000000000000000000001"),
                [0u8; 12],
                1,
                hex!(
                    "3aeb5224ecf849929b9d828db1ced4dd832025e8018b8160b82284f3c949aa5a\
                    8eca00bbb4a73bdad192b5c42f73f2fd4e273644c8b36125a64addeb006c13a0"
                ),
            ),
            (
                hex!("00ff000000000000000000000000000000000000000000000000000000000000"),
                [0u8; 12],
                2,
                hex!(
                    "72d54dfbf12ec44b362692df94137f328fea8da73990265ec1bbbea1ae9af0ca\
                    13b25aa26cb4a648cb9b9d1be65b2c0924a66c54d545ec1b7374f4872e99f096"
                ),
            ),
        ];

        for (key, nonce, counter, expected) in cases {
            let keystream = chacha20_block(&key, &nonce, counter);
            assert_eq!(&keystream[..], &expected[..]);
        }
    }
}
