//! Quantization and unquantization tables for color endpoint and weight values.
//!
//! Symbolic blocks store quantized values as ranks rather than raw ISE symbols.
//! Rank `0` is the smallest representable value and rank `levels - 1` is the largest,
//! so stepping a rank up or down always moves to the neighboring value.
//! Conversion to and from the raw symbols only happens when packing physical blocks.
use std::sync::OnceLock;

/// The number of color quantization levels from 2 codes up to 256 codes.
pub const COLOR_LEVEL_COUNT: usize = 21;
/// The number of weight quantization levels from 2 codes up to 32 codes.
pub const WEIGHT_LEVEL_COUNT: usize = 12;

pub const QUANT_6: usize = 4;
pub const QUANT_256: usize = 20;

/// The bits, trits, and quints used to store a single value at a quantization level.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct QuantRange {
    pub bits: u8,
    pub trits: u8,
    pub quints: u8,
}

const fn range(bits: u8, trits: u8, quints: u8) -> QuantRange {
    QuantRange {
        bits,
        trits,
        quints,
    }
}

pub const QUANT_RANGES: [QuantRange; COLOR_LEVEL_COUNT] = [
    range(1, 0, 0),
    range(0, 1, 0),
    range(2, 0, 0),
    range(0, 0, 1),
    range(1, 1, 0),
    range(3, 0, 0),
    range(1, 0, 1),
    range(2, 1, 0),
    range(4, 0, 0),
    range(2, 0, 1),
    range(3, 1, 0),
    range(5, 0, 0),
    range(3, 0, 1),
    range(4, 1, 0),
    range(6, 0, 0),
    range(4, 0, 1),
    range(5, 1, 0),
    range(7, 0, 0),
    range(5, 0, 1),
    range(6, 1, 0),
    range(8, 0, 0),
];

/// The number of distinct codes available at `level`.
pub fn quant_levels(level: usize) -> usize {
    let r = QUANT_RANGES[level];
    let base = if r.trits != 0 {
        3
    } else if r.quints != 0 {
        5
    } else {
        1
    };
    base << r.bits
}

/// The number of bits needed to store `count` values at `level` using integer sequence encoding.
pub fn ise_bit_count(count: usize, level: usize) -> usize {
    let r = QUANT_RANGES[level];
    count * r.bits as usize
        + ((8 * count + 4) / 5) * r.trits as usize
        + ((7 * count + 2) / 3) * r.quints as usize
}

/// The highest color level able to store `count` values in `bits` bits.
pub fn color_level_for_bits(count: usize, bits: usize) -> Option<usize> {
    (0..COLOR_LEVEL_COUNT)
        .rev()
        .find(|&level| ise_bit_count(count, level) <= bits)
}

struct ColorTable {
    unquantized: [u8; 256],
    quantized: [u8; 256],
    rank_to_ise: [u8; 256],
    ise_to_rank: [u8; 256],
}

struct WeightTable {
    unquantized: [u8; 32],
    rank_to_ise: [u8; 32],
    ise_to_rank: [u8; 32],
}

struct QuantizationTables {
    color: Vec<ColorTable>,
    weight: Vec<WeightTable>,
}

fn tables() -> &'static QuantizationTables {
    static TABLES: OnceLock<QuantizationTables> = OnceLock::new();
    TABLES.get_or_init(|| QuantizationTables {
        color: (0..COLOR_LEVEL_COUNT).map(color_table).collect(),
        weight: (0..WEIGHT_LEVEL_COUNT).map(weight_table).collect(),
    })
}

/// Quantize an 8-bit `value` to the rank of the nearest representable value.
pub fn quantize_color(level: usize, value: u8) -> u8 {
    tables().color[level].quantized[value as usize]
}

/// Quantize a float in the range `0.0` to `255.0` after rounding to the nearest integer.
pub fn quantize_color_f32(level: usize, value: f32) -> u8 {
    quantize_color(level, (value + 0.5).floor().clamp(0.0, 255.0) as u8)
}

/// Quantize `value` to the nearest rank whose unquantized value keeps all the bits in `mask`.
pub fn quantize_color_constrained(level: usize, value: u8, mask: u8) -> Option<u8> {
    let table = &tables().color[level];
    (0..quant_levels(level))
        .filter(|&rank| (table.unquantized[rank] ^ value) & mask == 0)
        .min_by_key(|&rank| (table.unquantized[rank] as i32 - value as i32).abs())
        .map(|rank| rank as u8)
}

pub fn unquantize_color(level: usize, rank: u8) -> u8 {
    tables().color[level].unquantized[rank as usize]
}

pub fn color_ise_from_rank(level: usize, rank: u8) -> u8 {
    tables().color[level].rank_to_ise[rank as usize]
}

pub fn color_rank_from_ise(level: usize, symbol: u8) -> u8 {
    tables().color[level].ise_to_rank[symbol as usize]
}

/// Quantize a weight in the range `0.0` to `1.0` to the rank of the nearest representable weight.
pub fn quantize_weight(level: usize, weight: f32) -> u8 {
    let table = &tables().weight[level];
    let target = weight.clamp(0.0, 1.0) * 64.0;
    let mut best = 0;
    let mut best_error = f32::MAX;
    for rank in 0..quant_levels(level) {
        let error = (table.unquantized[rank] as f32 - target).abs();
        if error < best_error {
            best = rank;
            best_error = error;
        }
    }
    best as u8
}

/// The interpolation weight for `rank` in the range `0` to `64`.
pub fn unquantize_weight(level: usize, rank: u8) -> u8 {
    tables().weight[level].unquantized[rank as usize]
}

pub fn weight_ise_from_rank(level: usize, rank: u8) -> u8 {
    tables().weight[level].rank_to_ise[rank as usize]
}

pub fn weight_rank_from_ise(level: usize, symbol: u8) -> u8 {
    tables().weight[level].ise_to_rank[symbol as usize]
}

fn replicate_bits(value: u32, bits: u32, target_bits: u32) -> u32 {
    let mut result = 0;
    let mut shift = target_bits as i32;
    while shift > 0 {
        shift -= bits as i32;
        if shift >= 0 {
            result |= value << shift;
        } else {
            result |= value >> -shift;
        }
    }
    result & ((1 << target_bits) - 1)
}

// Build the B term from a pattern of bit letters where 'a' is bit 0 of m.
fn pattern_bits(pattern: &[u8], m: u32) -> u32 {
    pattern.iter().fold(0, |acc, &c| {
        let bit = match c {
            b'0' => 0,
            letter => (m >> (letter - b'a')) & 1,
        };
        (acc << 1) | bit
    })
}

fn unquantize_color_ise(level: usize, symbol: u32) -> u8 {
    let r = QUANT_RANGES[level];
    let n = quant_levels(level) as u32;
    if r.trits == 0 && r.quints == 0 {
        return replicate_bits(symbol, r.bits as u32, 8) as u8;
    }
    if r.bits == 0 {
        // Only trits or quints leave nothing to replicate, so spread the codes evenly.
        return ((symbol * 255 * 2 + (n - 1)) / (2 * (n - 1))) as u8;
    }

    let d = symbol >> r.bits;
    let m = symbol & ((1 << r.bits) - 1);
    let a = if m & 1 != 0 { 0x1FF } else { 0 };
    let (b, c) = if r.trits != 0 {
        match r.bits {
            1 => (0, 204),
            2 => (pattern_bits(b"b000b0bb0", m), 93),
            3 => (pattern_bits(b"cb000cbcb", m), 44),
            4 => (pattern_bits(b"dcb000dcb", m), 22),
            5 => (pattern_bits(b"edcb000ed", m), 11),
            _ => (pattern_bits(b"fedcb000f", m), 5),
        }
    } else {
        match r.bits {
            1 => (0, 113),
            2 => (pattern_bits(b"b0000bb00", m), 54),
            3 => (pattern_bits(b"cb0000cbc", m), 26),
            4 => (pattern_bits(b"dcb0000dc", m), 13),
            _ => (pattern_bits(b"edcb0000e", m), 6),
        }
    };
    let t = (d * c + b) ^ a;
    ((a & 0x80) | (t >> 2)) as u8
}

fn unquantize_weight_ise(level: usize, symbol: u32) -> u8 {
    let r = QUANT_RANGES[level];
    let value = if r.trits == 0 && r.quints == 0 {
        replicate_bits(symbol, r.bits as u32, 6)
    } else if r.bits == 0 {
        if r.trits != 0 {
            [0, 32, 63][symbol as usize]
        } else {
            [0, 16, 32, 47, 63][symbol as usize]
        }
    } else {
        let d = symbol >> r.bits;
        let m = symbol & ((1 << r.bits) - 1);
        let a = if m & 1 != 0 { 0x7F } else { 0 };
        let (b, c) = match (r.trits != 0, r.bits) {
            (true, 1) => (0, 50),
            (false, 1) => (0, 28),
            (true, 2) => (pattern_bits(b"b000b0b", m), 23),
            (false, 2) => (pattern_bits(b"b0000b0", m), 13),
            _ => (pattern_bits(b"cb000cb", m), 11),
        };
        let t = (d * c + b) ^ a;
        (a & 0x20) | (t >> 2)
    };
    // Expand 0..=63 to 0..=64.
    if value > 32 {
        value as u8 + 1
    } else {
        value as u8
    }
}

fn color_table(level: usize) -> ColorTable {
    let n = quant_levels(level);

    let mut symbols: Vec<(u8, u8)> = (0..n)
        .map(|s| (unquantize_color_ise(level, s as u32), s as u8))
        .collect();
    symbols.sort();

    let mut table = ColorTable {
        unquantized: [0; 256],
        quantized: [0; 256],
        rank_to_ise: [0; 256],
        ise_to_rank: [0; 256],
    };
    for (rank, (value, symbol)) in symbols.iter().enumerate() {
        table.unquantized[rank] = *value;
        table.rank_to_ise[rank] = *symbol;
        table.ise_to_rank[*symbol as usize] = rank as u8;
    }

    // Values are sorted, so the nearest rank only moves forward.
    let mut rank = 0;
    for value in 0..256 {
        while rank + 1 < n
            && (table.unquantized[rank + 1] as i32 - value).abs()
                < (table.unquantized[rank] as i32 - value).abs()
        {
            rank += 1;
        }
        table.quantized[value as usize] = rank as u8;
    }
    table
}

fn weight_table(level: usize) -> WeightTable {
    let n = quant_levels(level);

    let mut symbols: Vec<(u8, u8)> = (0..n)
        .map(|s| (unquantize_weight_ise(level, s as u32), s as u8))
        .collect();
    symbols.sort();

    let mut table = WeightTable {
        unquantized: [0; 32],
        rank_to_ise: [0; 32],
        ise_to_rank: [0; 32],
    };
    for (rank, (value, symbol)) in symbols.iter().enumerate() {
        table.unquantized[rank] = *value;
        table.rank_to_ise[rank] = *symbol;
        table.ise_to_rank[*symbol as usize] = rank as u8;
    }
    table
}
