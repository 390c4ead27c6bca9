//! Coin type and the canonical element encoding.
//!
//! The engine itself treats elements as opaque bytes; this module defines
//! the byte layout consumers must use for UTXOs so that independently built
//! commitments agree. An element is the serialized outpoint followed by the
//! serialized coin:
//!
//! ```text
//! txid (32 bytes) || vout (4 bytes, LE)
//!   || varint(height * 2 + is_coinbase)
//!   || amount (8 bytes, LE)
//!   || compact_size(script len) || script
//! ```

use bitcoin::OutPoint;
use bitcoin::consensus::Encodable;

/// Unspent transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    /// Whether the coin is from a coinbase transaction.
    pub is_coinbase: bool,
    /// Transfer value in satoshis.
    pub amount: u64,
    /// Block height at which the containing transaction was included.
    pub height: u32,
    /// Spending condition of the output.
    pub script_pubkey: Vec<u8>,
}

impl Coin {
    /// Builds a coin from a transaction output.
    pub fn from_txout(output: &bitcoin::TxOut, height: u32, is_coinbase: bool) -> Self {
        Self {
            is_coinbase,
            amount: output.value.to_sat(),
            height,
            script_pubkey: output.script_pubkey.to_bytes(),
        }
    }
}

/// Serializes an `(outpoint, coin)` pair into its canonical element bytes.
pub fn serialize_element(outpoint: &OutPoint, coin: &Coin) -> Vec<u8> {
    let mut data = Vec::with_capacity(54 + coin.script_pubkey.len());

    outpoint
        .consensus_encode(&mut data)
        .expect("writing to a Vec cannot fail; qed");

    write_var_int(
        &mut data,
        u64::from(coin.height) * 2 + u64::from(coin.is_coinbase),
    );
    data.extend_from_slice(&coin.amount.to_le_bytes());
    write_compact_size(&mut data, coin.script_pubkey.len() as u64);
    data.extend_from_slice(&coin.script_pubkey);

    data
}

// https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/serialize.h#L305
fn write_compact_size(data: &mut Vec<u8>, size: u64) {
    if size < 253 {
        data.push(size as u8);
    } else if size <= 0xFFFF {
        data.push(253);
        data.extend_from_slice(&(size as u16).to_le_bytes());
    } else if size <= 0xFFFF_FFFF {
        data.push(254);
        data.extend_from_slice(&(size as u32).to_le_bytes());
    } else {
        data.push(255);
        data.extend_from_slice(&size.to_le_bytes());
    }
}

fn write_var_int(data: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        data.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
    data.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;
    use bitcoin::hashes::Hash;
    use hex_literal::hex;

    #[test]
    fn test_serialize_element_vector() {
        let outpoint = OutPoint {
            txid: Txid::from_byte_array(hex!(
                "38115d014104c6ec27cffce0823c3fecb162dbd576c88dd7cda0b7b32b096118"
            )),
            vout: 2,
        };
        let coin = Coin {
            is_coinbase: false,
            amount: 100,
            height: 7,
            script_pubkey: hex!("76a9148abcdefabbaabbaabbaabbaabbaabbaabbaabbaa88ac").to_vec(),
        };

        let element = serialize_element(&outpoint, &coin);

        let expected = hex!(
            // txid, raw byte order
            "38115d014104c6ec27cffce0823c3fecb162dbd576c88dd7cda0b7b32b096118"
            // vout
            "02000000"
            // varint(7 * 2 + 0)
            "0e"
            // amount
            "6400000000000000"
            // script length and script
            "19"
            "76a9148abcdefabbaabbaabbaabbaabbaabbaabbaabbaa88ac"
        );
        assert_eq!(element, expected);
    }

    #[test]
    fn test_coinbase_flag_in_varint() {
        let outpoint = OutPoint {
            txid: Txid::all_zeros(),
            vout: 0,
        };
        let coin = Coin {
            is_coinbase: true,
            amount: 5_000_000_000,
            height: 0,
            script_pubkey: vec![0x51],
        };

        let element = serialize_element(&outpoint, &coin);
        // varint(0 * 2 + 1) right after the 36-byte outpoint
        assert_eq!(element[36], 0x01);
    }

    #[test]
    fn test_write_var_int_multi_byte() {
        let mut data = Vec::new();
        write_var_int(&mut data, 14);
        assert_eq!(data, vec![0x0e]);

        let mut data = Vec::new();
        write_var_int(&mut data, 300);
        assert_eq!(data, vec![0xac, 0x02]);
    }

    #[test]
    fn test_write_compact_size_boundaries() {
        let mut data = Vec::new();
        write_compact_size(&mut data, 252);
        assert_eq!(data, vec![252]);

        let mut data = Vec::new();
        write_compact_size(&mut data, 253);
        assert_eq!(data, vec![253, 253, 0]);

        let mut data = Vec::new();
        write_compact_size(&mut data, 0x1_0000);
        assert_eq!(data, vec![254, 0, 0, 1, 0]);
    }
}
