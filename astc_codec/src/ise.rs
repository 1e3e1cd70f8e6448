//! Integer sequence encoding for packing values at fractional bit widths.
//!
//! Blocks of 5 trits are packed into 8 bits and blocks of 3 quints into 7 bits.
//! The packed bits are interleaved with the low bits of each value.
use std::sync::OnceLock;

use crate::quantization::QUANT_RANGES;

// (shift, count) of the packed trit or quint bits following each value in a block.
const TRIT_CHUNKS: [(u32, u32); 5] = [(0, 2), (2, 2), (4, 1), (5, 2), (7, 1)];
const QUINT_CHUNKS: [(u32, u32); 3] = [(0, 3), (3, 2), (5, 2)];

pub fn read_bits(data: u128, position: usize, count: usize) -> u32 {
    if count == 0 || position >= 128 {
        return 0;
    }
    ((data >> position) & ((1u128 << count) - 1)) as u32
}

pub fn write_bits(data: &mut u128, position: usize, count: usize, value: u32) {
    if count == 0 || position >= 128 {
        return;
    }
    let mask = (1u128 << count) - 1;
    *data &= !(mask << position);
    *data |= (value as u128 & mask) << position;
}

fn decode_trit_block(t: u32) -> [u8; 5] {
    let bit = |v: u32, i: u32| (v >> i) & 1;

    let (c, t3, t4) = if (t >> 2) & 7 == 7 {
        ((((t >> 5) & 7) << 2) | (t & 3), 2, 2)
    } else if (t >> 5) & 3 == 3 {
        (t & 0x1F, (t >> 7) & 1, 2)
    } else {
        (t & 0x1F, (t >> 5) & 3, (t >> 7) & 1)
    };

    let (t0, t1, t2) = if c & 3 == 3 {
        let t0 = (bit(c, 3) << 1) | (bit(c, 2) & (bit(c, 3) ^ 1));
        (t0, bit(c, 4), 2)
    } else if (c >> 2) & 3 == 3 {
        (c & 3, 2, 2)
    } else {
        let t0 = (c & 2) | (bit(c, 0) & (bit(c, 1) ^ 1));
        (t0, (c >> 2) & 3, bit(c, 4))
    };

    [t0 as u8, t1 as u8, t2 as u8, t3 as u8, t4 as u8]
}

fn decode_quint_block(q: u32) -> [u8; 3] {
    let bit = |v: u32, i: u32| (v >> i) & 1;

    if (q >> 1) & 3 == 3 && (q >> 5) & 3 == 0 {
        let not_q0 = bit(q, 0) ^ 1;
        let q2 = (bit(q, 0) << 2) | ((bit(q, 4) & not_q0) << 1) | (bit(q, 3) & not_q0);
        return [4, 4, q2 as u8];
    }

    let (c, q2) = if (q >> 1) & 3 == 3 {
        let c = (((q >> 3) & 3) << 3) | ((!(q >> 5) & 3) << 1) | (q & 1);
        (c, 4)
    } else {
        (q & 0x1F, (q >> 5) & 3)
    };

    let (q0, q1) = if c & 7 == 5 {
        ((c >> 3) & 3, 4)
    } else {
        (c & 7, (c >> 3) & 3)
    };
    [q0 as u8, q1 as u8, q2 as u8]
}

struct EncodeTables {
    // Indexed by the base 3 or base 5 digits of the block.
    trits: [u8; 243],
    quints: [u8; 125],
}

fn encode_tables() -> &'static EncodeTables {
    static TABLES: OnceLock<EncodeTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut tables = EncodeTables {
            trits: [0; 243],
            quints: [0; 125],
        };
        // Several packed patterns decode to the same digits, so keep the first.
        let mut seen = [false; 243];
        for t in 0..256 {
            let digits = decode_trit_block(t);
            let index = digits.iter().rev().fold(0, |acc, d| acc * 3 + *d as usize);
            if !seen[index] {
                seen[index] = true;
                tables.trits[index] = t as u8;
            }
        }
        let mut seen = [false; 125];
        for q in 0..128 {
            let digits = decode_quint_block(q);
            let index = digits.iter().rev().fold(0, |acc, d| acc * 5 + *d as usize);
            if !seen[index] {
                seen[index] = true;
                tables.quints[index] = q as u8;
            }
        }
        tables
    })
}

/// Encode raw ISE `symbols` at `level` into `data` starting at bit `position`.
pub fn encode_ise(level: usize, symbols: &[u8], data: &mut u128, position: usize) {
    let range = QUANT_RANGES[level];
    let bits = range.bits as usize;
    let mask = (1u32 << bits) - 1;
    let mut position = position;

    if range.trits != 0 {
        for block in symbols.chunks(5) {
            let index = block
                .iter()
                .rev()
                .fold(0, |acc, s| acc * 3 + (*s as u32 >> bits) as usize);
            let packed = encode_tables().trits[index] as u32;
            for (symbol, (shift, count)) in block.iter().zip(TRIT_CHUNKS) {
                write_bits(data, position, bits, *symbol as u32 & mask);
                position += bits;
                write_bits(data, position, count as usize, packed >> shift);
                position += count as usize;
            }
        }
    } else if range.quints != 0 {
        for block in symbols.chunks(3) {
            let index = block
                .iter()
                .rev()
                .fold(0, |acc, s| acc * 5 + (*s as u32 >> bits) as usize);
            let packed = encode_tables().quints[index] as u32;
            for (symbol, (shift, count)) in block.iter().zip(QUINT_CHUNKS) {
                write_bits(data, position, bits, *symbol as u32 & mask);
                position += bits;
                write_bits(data, position, count as usize, packed >> shift);
                position += count as usize;
            }
        }
    } else {
        for symbol in symbols {
            write_bits(data, position, bits, *symbol as u32);
            position += bits;
        }
    }
}

/// Decode `symbols.len()` raw ISE values at `level` from `data` starting at bit `position`.
pub fn decode_ise(level: usize, data: u128, position: usize, symbols: &mut [u8]) {
    let range = QUANT_RANGES[level];
    let bits = range.bits as usize;
    let mut position = position;

    if range.trits != 0 {
        for block in symbols.chunks_mut(5) {
            let mut packed = 0;
            let mut low = [0u32; 5];
            for (i, (shift, count)) in TRIT_CHUNKS.iter().take(block.len()).enumerate() {
                low[i] = read_bits(data, position, bits);
                position += bits;
                packed |= read_bits(data, position, *count as usize) << shift;
                position += *count as usize;
            }
            let digits = decode_trit_block(packed);
            for (i, symbol) in block.iter_mut().enumerate() {
                *symbol = ((digits[i] as u32) << bits | low[i]) as u8;
            }
        }
    } else if range.quints != 0 {
        for block in symbols.chunks_mut(3) {
            let mut packed = 0;
            let mut low = [0u32; 3];
            for (i, (shift, count)) in QUINT_CHUNKS.iter().take(block.len()).enumerate() {
                low[i] = read_bits(data, position, bits);
                position += bits;
                packed |= read_bits(data, position, *count as usize) << shift;
                position += *count as usize;
            }
            let digits = decode_quint_block(packed);
            for (i, symbol) in block.iter_mut().enumerate() {
                *symbol = ((digits[i] as u32) << bits | low[i]) as u8;
            }
        }
    } else {
        for symbol in symbols {
            *symbol = read_bits(data, position, bits) as u8;
            position += bits;
        }
    }
}
