//! MuHash3072 multiset accumulator.
//!
//! Follows the scheme used by Bitcoin Core for its UTXO set hash
//! (`src/crypto/muhash.h`): every element hashes to a 3072-bit number, the
//! set is represented as a running product of inserted elements divided by a
//! running product of removed ones, modulo the prime 2^3072 - 1103717, and
//! the digest is the SHA-256 of the 384-byte little-endian quotient.
//!
//! Division makes the accumulator invertible: removing an element that was
//! never inserted is legal and cancels out once the insertion arrives.

use crate::chacha20_block;
use num_bigint::{BigUint, ToBigUint};
use num_traits::One;
use sha2::{Digest, Sha256};

// Expand a 32-byte hash into a 3072-bit number using 6 ChaCha20 blocks.
fn data_to_num3072(data: &[u8; 32]) -> BigUint {
    let mut bytes384 = Vec::with_capacity(384);
    for counter in 0..6 {
        bytes384.extend(chacha20_block(data, &[0u8; 12], counter));
    }
    BigUint::from_bytes_le(&bytes384)
}

fn modulus() -> BigUint {
    (BigUint::one() << 3072) - 1103717u32.to_biguint().expect("fits in BigUint; qed")
}

/// An incremental, order-independent multiset accumulator.
///
/// `insert` and `remove` commute with each other in every combination, so
/// the [`digest`](Self::digest) depends only on the net multiset. The empty
/// multiset (or any sequence of operations that cancels out) digests to a
/// fixed 32-byte value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MuHash3072 {
    numerator: BigUint,
    denominator: BigUint,
    modulus: BigUint,
}

impl Default for MuHash3072 {
    fn default() -> Self {
        Self::new()
    }
}

impl MuHash3072 {
    /// Creates the accumulator of the empty multiset.
    pub fn new() -> Self {
        Self {
            numerator: BigUint::one(),
            denominator: BigUint::one(),
            modulus: modulus(),
        }
    }

    /// Absorbs one element. Inserting the same bytes twice keeps two copies.
    pub fn insert(&mut self, element: &[u8]) {
        let element_hash = Sha256::digest(element);
        let num3072 = data_to_num3072(&element_hash.into());
        self.numerator *= num3072;
        self.numerator %= &self.modulus;
    }

    /// Withdraws one element; the exact inverse of [`insert`](Self::insert).
    pub fn remove(&mut self, element: &[u8]) {
        let element_hash = Sha256::digest(element);
        let num3072 = data_to_num3072(&element_hash.into());
        self.denominator *= num3072;
        self.denominator %= &self.modulus;
    }

    /// Merges another accumulator into this one, yielding the accumulator of
    /// the multiset union. Commutative and associative.
    pub fn combine(&mut self, other: &Self) {
        self.numerator *= &other.numerator;
        self.numerator %= &self.modulus;
        self.denominator *= &other.denominator;
        self.denominator %= &self.modulus;
    }

    /// Finalizes the accumulator into its 32-byte digest.
    pub fn digest(&self) -> [u8; 32] {
        // The modular inverse via Fermat is by far the most expensive step;
        // insert-only accumulators keep the denominator at one and skip it.
        let val = if self.denominator.is_one() {
            self.numerator.clone()
        } else {
            let denominator_inv = self
                .denominator
                .modpow(&(self.modulus.clone() - 2u32), &self.modulus);
            (&self.numerator * denominator_inv) % &self.modulus
        };
        let mut bytes384 = val.to_bytes_le();
        bytes384.resize(384, 0);
        Sha256::digest(&bytes384).into()
    }
}
