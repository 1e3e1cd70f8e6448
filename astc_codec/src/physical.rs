//! Conversion between symbolic blocks and the 128-bit physical ASTC block layout.
//!
//! Color values are stored with integer sequence encoding from the bottom of the block.
//! Weights are stored bit reversed from the top of the block.
use crate::{
    block_size::{BlockSizeDescriptor, MAX_WEIGHTS_PER_BLOCK},
    color_format::{EndpointFormat, EndpointPayload},
    ise::{decode_ise, encode_ise, read_bits, write_bits},
    quantization::{
        color_ise_from_rank, color_level_for_bits, color_rank_from_ise, weight_ise_from_rank,
        weight_rank_from_ise, QUANT_6,
    },
    symbolic::{BlockType, SymbolicCompressedBlock},
};

const VOID_EXTENT_MODE: u32 = 0x1FC;
const VOID_EXTENT_COORDINATE: u32 = 0x1FFF;
const PARTITION_INDEX_BITS: usize = 10;
pub(crate) const MAX_COLOR_VALUES: usize = 18;

/// The bit position of the first color value.
fn color_start(partition_count: usize) -> usize {
    if partition_count == 1 {
        17
    } else {
        13 + PARTITION_INDEX_BITS + 6
    }
}

/// The number of CEM bits stored below the weights for mixed formats.
fn extra_cem_bits(partition_count: usize) -> usize {
    3 * partition_count - 4
}

/// The number of bits available for color values.
pub fn color_bits(
    partition_count: usize,
    weight_bits: usize,
    dual_plane: bool,
    formats_matched: bool,
) -> usize {
    let mut end = 128 - weight_bits;
    if partition_count > 1 && !formats_matched {
        end -= extra_cem_bits(partition_count);
    }
    if dual_plane {
        end -= 2;
    }
    end.saturating_sub(color_start(partition_count))
}

fn encode_void_extent(color: [u16; 4], hdr: bool) -> [u8; 16] {
    let mut data = 0u128;
    write_bits(&mut data, 0, 9, VOID_EXTENT_MODE);
    write_bits(&mut data, 9, 1, hdr as u32);
    write_bits(&mut data, 10, 2, 3);
    for i in 0..4 {
        write_bits(&mut data, 12 + i * 13, 13, VOID_EXTENT_COORDINATE);
    }
    for (i, c) in color.iter().enumerate() {
        write_bits(&mut data, 64 + i * 16, 16, *c as u32);
    }
    data.to_le_bytes()
}

fn decode_void_extent(data: u128) -> SymbolicCompressedBlock {
    if read_bits(data, 10, 2) != 3 {
        return SymbolicCompressedBlock::error();
    }

    let coordinates: [u32; 4] = std::array::from_fn(|i| read_bits(data, 12 + i * 13, 13));
    let all_ones = coordinates.iter().all(|c| *c == VOID_EXTENT_COORDINATE);
    if !all_ones && (coordinates[0] >= coordinates[1] || coordinates[2] >= coordinates[3]) {
        return SymbolicCompressedBlock::error();
    }

    let color: [u16; 4] = std::array::from_fn(|i| read_bits(data, 64 + i * 16, 16) as u16);
    if read_bits(data, 9, 1) != 0 {
        SymbolicCompressedBlock::constant_f16(color)
    } else {
        SymbolicCompressedBlock::constant_unorm16(color)
    }
}

/// Pack a symbolic block into its physical representation.
///
/// Error blocks are written as all zeros, which is an illegal encoding.
pub fn symbolic_to_physical(bsd: &BlockSizeDescriptor, scb: &SymbolicCompressedBlock) -> [u8; 16] {
    let block_mode = match scb.block_type {
        BlockType::Error => return [0; 16],
        BlockType::ConstantUnorm16(color) => return encode_void_extent(color, false),
        BlockType::ConstantF16(color) => return encode_void_extent(color, true),
        BlockType::Normal { block_mode } => block_mode,
    };
    let Some(mode) = bsd.block_mode(block_mode) else {
        return [0; 16];
    };
    let weight_count = bsd.decimation_tables[mode.decimation].weight_count;
    let partition_count = scb.partition_count;

    // Weights are written from the top of the block.
    let symbols: Vec<u8> = if mode.dual_plane {
        (0..weight_count)
            .flat_map(|i| [scb.plane1_weights[i], scb.plane2_weights[i]])
            .map(|r| weight_ise_from_rank(mode.weight_level, r))
            .collect()
    } else {
        scb.plane1_weights[..weight_count]
            .iter()
            .map(|r| weight_ise_from_rank(mode.weight_level, *r))
            .collect()
    };
    let mut weights = 0u128;
    encode_ise(mode.weight_level, &symbols, &mut weights, 0);
    let mut data = weights.reverse_bits();

    write_bits(&mut data, 0, 11, block_mode as u32);
    write_bits(&mut data, 11, 2, partition_count as u32 - 1);

    let mut below_weights = 128 - mode.weight_bits;
    let formats: Vec<_> = scb.endpoints().iter().map(|e| e.format as u32).collect();
    if partition_count > 1 {
        write_bits(&mut data, 13, PARTITION_INDEX_BITS, scb.partition_index as u32);

        let encoded = if scb.color_formats_matched {
            formats[0] << 2
        } else {
            // Every class must be the base class or one higher.
            let low_class = formats.iter().map(|f| f >> 2).min().unwrap_or(0).min(2);
            let mut encoded = low_class + 1;
            let mut position = 2;
            for f in &formats {
                encoded |= ((f >> 2) - low_class) << position;
                position += 1;
            }
            for f in &formats {
                encoded |= (f & 3) << position;
                position += 2;
            }

            let extra_bits = extra_cem_bits(partition_count);
            below_weights -= extra_bits;
            write_bits(&mut data, below_weights, extra_bits, encoded >> 6);
            encoded
        };
        write_bits(&mut data, 13 + PARTITION_INDEX_BITS, 6, encoded & 0x3F);
    } else {
        write_bits(&mut data, 13, 4, formats[0]);
    }

    if mode.dual_plane {
        write_bits(&mut data, below_weights - 2, 2, scb.plane2_color_component as u32);
    }

    let level = scb.color_quantization_level;
    let colors: Vec<u8> = scb
        .endpoints()
        .iter()
        .flat_map(|e| e.values().iter().map(|r| color_ise_from_rank(level, *r)))
        .collect();
    encode_ise(level, &colors, &mut data, color_start(partition_count));

    data.to_le_bytes()
}

/// Unpack a physical block into a symbolic block.
///
/// Illegal encodings for the block footprint produce an error block.
pub fn physical_to_symbolic(bsd: &BlockSizeDescriptor, block: [u8; 16]) -> SymbolicCompressedBlock {
    let data = u128::from_le_bytes(block);

    if read_bits(data, 0, 9) == VOID_EXTENT_MODE {
        return decode_void_extent(data);
    }

    let block_mode = read_bits(data, 0, 11) as u16;
    let Some(mode) = bsd.block_mode(block_mode) else {
        return SymbolicCompressedBlock::error();
    };
    let weight_count = bsd.decimation_tables[mode.decimation].weight_count;

    let partition_count = read_bits(data, 11, 2) as usize + 1;
    if mode.dual_plane && partition_count == 4 {
        return SymbolicCompressedBlock::error();
    }

    let mut scb = SymbolicCompressedBlock {
        block_type: BlockType::Normal { block_mode },
        partition_count,
        ..Default::default()
    };

    let plane_count = if mode.dual_plane { 2 } else { 1 };
    let mut symbols = [0u8; MAX_WEIGHTS_PER_BLOCK];
    decode_ise(
        mode.weight_level,
        data.reverse_bits(),
        0,
        &mut symbols[..weight_count * plane_count],
    );
    for i in 0..weight_count {
        let rank = |s: u8| weight_rank_from_ise(mode.weight_level, s);
        if mode.dual_plane {
            scb.plane1_weights[i] = rank(symbols[2 * i]);
            scb.plane2_weights[i] = rank(symbols[2 * i + 1]);
        } else {
            scb.plane1_weights[i] = rank(symbols[i]);
        }
    }

    let mut below_weights = 128 - mode.weight_bits;
    let mut formats = [0u32; 4];
    if partition_count > 1 {
        scb.partition_index = read_bits(data, 13, PARTITION_INDEX_BITS) as u16;

        let mut encoded = read_bits(data, 13 + PARTITION_INDEX_BITS, 6);
        if encoded & 3 == 0 {
            scb.color_formats_matched = true;
            formats = [encoded >> 2; 4];
        } else {
            let extra_bits = extra_cem_bits(partition_count);
            below_weights -= extra_bits;
            encoded |= read_bits(data, below_weights, extra_bits) << 6;

            let base_class = (encoded & 3) - 1;
            let mut position = 2;
            for format in formats.iter_mut().take(partition_count) {
                *format = (base_class + ((encoded >> position) & 1)) << 2;
                position += 1;
            }
            for format in formats.iter_mut().take(partition_count) {
                *format |= (encoded >> position) & 3;
                position += 2;
            }
        }
    } else {
        formats[0] = read_bits(data, 13, 4);
    }

    if mode.dual_plane {
        scb.plane2_color_component = read_bits(data, below_weights - 2, 2) as usize;
    }

    let formats = formats.map(|f| EndpointFormat::from_repr(f as u8).unwrap_or_default());
    let value_count: usize = formats[..partition_count].iter().map(|f| f.value_count()).sum();
    if value_count > MAX_COLOR_VALUES {
        return SymbolicCompressedBlock::error();
    }

    let bits = color_bits(
        partition_count,
        mode.weight_bits,
        mode.dual_plane,
        scb.color_formats_matched,
    );
    let level = match color_level_for_bits(value_count, bits) {
        Some(level) if level >= QUANT_6 => level,
        _ => return SymbolicCompressedBlock::error(),
    };
    scb.color_quantization_level = level;

    let mut colors = [0u8; MAX_COLOR_VALUES];
    decode_ise(level, data, color_start(partition_count), &mut colors[..value_count]);
    let mut values = colors[..value_count]
        .iter()
        .map(|s| color_rank_from_ise(level, *s));
    for (endpoints, format) in scb.endpoints.iter_mut().zip(formats).take(partition_count) {
        let payload: Vec<u8> = values.by_ref().take(format.value_count()).collect();
        *endpoints = EndpointPayload::new(format, &payload);
    }

    scb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::QUANT_256;

    struct Vector {
        block_mode: u16,
        weight_level: usize,
        color_level: usize,
        weights: &'static [u8],
        endpoints: [u8; 6],
        expected: [u32; 4],
    }

    // Blocks for a 4x4 footprint with RGB endpoints.
    // Weights and endpoints are raw integer sequence encoding values.
    const VECTORS: [Vector; 5] = [
        Vector {
            block_mode: 578,
            weight_level: 8,
            color_level: 19,
            weights: &[1, 8, 14, 13, 3, 9, 9, 8, 0, 7, 7, 2, 1, 2, 5, 5],
            endpoints: [115, 107, 48, 178, 32, 96],
            expected: [0xD6E70242, 0x3020B260, 0x0EE484AA, 0x817BC991],
        },
        Vector {
            block_mode: 593,
            weight_level: 7,
            color_level: 20,
            weights: &[7, 9, 10, 4, 1, 5, 3, 8, 1, 1, 11, 10, 5, 5, 5, 7],
            endpoints: [226, 202, 117, 106, 58, 54],
            expected: [0x95C50251, 0x6C74D4EB, 0x4D5B5780, 0xEB452F84],
        },
        Vector {
            block_mode: 1471,
            weight_level: 5,
            color_level: 20,
            weights: &[4, 4, 0, 1, 0, 0, 7, 5, 3, 7, 4, 6, 7, 5, 2, 2, 3, 5],
            endpoints: [239, 222, 121, 115, 57, 55],
            expected: [0xBDDF05BF, 0x6E72E6F3, 0xBF52D400, 0x24403DDC],
        },
        Vector {
            block_mode: 1487,
            weight_level: 4,
            color_level: 19,
            weights: &[
                1, 1, 3, 5, 3, 5, 3, 1, 5, 3, 5, 3, 3, 1, 4, 4, 4, 1, 5, 5, 0, 0, 0, 4,
            ],
            endpoints: [147, 155, 186, 118, 160, 28],
            expected: [0xB72705CF, 0x0E60F675, 0xF85F6002, 0x93BDD5EE],
        },
        Vector {
            block_mode: 577,
            weight_level: 6,
            color_level: 20,
            weights: &[0, 8, 2, 6, 9, 9, 9, 4, 1, 7, 8, 8, 8, 7, 9, 3],
            endpoints: [148, 157, 90, 92, 59, 58],
            expected: [0x3B290241, 0x7476B8B5, 0xDA3FB000, 0x509FE933],
        },
    ];

    fn symbolic(v: &Vector) -> SymbolicCompressedBlock {
        let dual_plane = v.block_mode & 0x400 != 0;
        let mut scb = SymbolicCompressedBlock {
            block_type: BlockType::Normal {
                block_mode: v.block_mode,
            },
            color_quantization_level: v.color_level,
            ..Default::default()
        };
        let ranks = v.endpoints.map(|s| color_rank_from_ise(v.color_level, s));
        scb.endpoints[0] = EndpointPayload::new(EndpointFormat::Rgb, &ranks);
        for (i, s) in v.weights.iter().enumerate() {
            let rank = weight_rank_from_ise(v.weight_level, *s);
            match (dual_plane, i % 2) {
                (true, 0) => scb.plane1_weights[i / 2] = rank,
                (true, _) => scb.plane2_weights[i / 2] = rank,
                (false, _) => scb.plane1_weights[i] = rank,
            }
        }
        scb
    }

    fn physical(words: [u32; 4]) -> [u8; 16] {
        let mut block = [0u8; 16];
        for (chunk, word) in block.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        block
    }

    #[test]
    fn encode_known_blocks() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        for v in &VECTORS {
            assert_eq!(
                physical(v.expected),
                symbolic_to_physical(&bsd, &symbolic(v)),
                "{}",
                v.block_mode
            );
        }
    }

    #[test]
    fn decode_known_blocks() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        for v in &VECTORS {
            let scb = physical_to_symbolic(&bsd, physical(v.expected));
            assert_eq!(symbolic(v), scb, "{}", v.block_mode);
        }
    }

    #[test]
    fn void_extent_ldr() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let color = [0x1234, 0x5678, 0x9ABC, 0xFFFF];
        let block = symbolic_to_physical(&bsd, &SymbolicCompressedBlock::constant_unorm16(color));
        assert_eq!(
            [
                0xFC, 0xFD, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A,
                0xFF, 0xFF
            ],
            block
        );
        assert_eq!(
            SymbolicCompressedBlock::constant_unorm16(color),
            physical_to_symbolic(&bsd, block)
        );
    }

    #[test]
    fn void_extent_hdr() {
        let bsd = BlockSizeDescriptor::new(8, 8);
        let color = [0x3C00, 0x4000, 0x0000, 0x3C00];
        let block = symbolic_to_physical(&bsd, &SymbolicCompressedBlock::constant_f16(color));
        assert_eq!([0xFC, 0xFF], block[..2]);
        assert_eq!(
            SymbolicCompressedBlock::constant_f16(color),
            physical_to_symbolic(&bsd, block)
        );
    }

    #[test]
    fn void_extent_reserved_bits() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let mut block =
            symbolic_to_physical(&bsd, &SymbolicCompressedBlock::constant_unorm16([0; 4]));
        block[1] &= !0x04;
        assert!(physical_to_symbolic(&bsd, block).is_error());
    }

    #[test]
    fn error_block_round_trip() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let block = symbolic_to_physical(&bsd, &SymbolicCompressedBlock::error());
        assert_eq!([0; 16], block);
        assert!(physical_to_symbolic(&bsd, block).is_error());
    }

    #[test]
    fn grid_larger_than_footprint() {
        // A 4x4 weight grid is not legal for a 4x3 footprint.
        let bsd = BlockSizeDescriptor::new(4, 3);
        assert!(physical_to_symbolic(&bsd, physical(VECTORS[0].expected)).is_error());
    }

    #[test]
    fn too_many_color_values() {
        let bsd = BlockSizeDescriptor::new(8, 8);
        let mode = bsd.block_mode_index(4, 4, false, 1).unwrap();
        let mut scb = SymbolicCompressedBlock {
            block_type: BlockType::Normal { block_mode: mode },
            partition_count: 3,
            partition_index: 1,
            color_formats_matched: true,
            color_quantization_level: QUANT_6,
            ..Default::default()
        };
        for e in &mut scb.endpoints[..3] {
            *e = EndpointPayload::new(EndpointFormat::Rgba, &[0; 8]);
        }
        // 24 values are more than a block can store.
        let block = symbolic_to_physical(&bsd, &scb);
        assert!(physical_to_symbolic(&bsd, block).is_error());
    }

    #[test]
    fn partitioned_round_trip() {
        let bsd = BlockSizeDescriptor::new(6, 6);
        let mode = bsd.block_mode_index(4, 4, false, 2).unwrap();
        let weight_bits = bsd.block_mode(mode).unwrap().weight_bits;

        for (formats, matched) in [
            (
                [EndpointFormat::Rgb, EndpointFormat::RgbDelta, EndpointFormat::Rgb],
                false,
            ),
            (
                [
                    EndpointFormat::Luminance,
                    EndpointFormat::LuminanceAlpha,
                    EndpointFormat::LuminanceDelta,
                ],
                false,
            ),
            ([EndpointFormat::LuminanceAlpha; 3], true),
            ([EndpointFormat::Rgb; 3], false),
        ] {
            let count: usize = formats.iter().map(|f| f.value_count()).sum();
            let bits = color_bits(3, weight_bits, false, matched);
            let level = color_level_for_bits(count, bits).unwrap();

            let mut scb = SymbolicCompressedBlock {
                block_type: BlockType::Normal { block_mode: mode },
                partition_count: 3,
                partition_index: 517,
                color_formats_matched: matched,
                color_quantization_level: level,
                ..Default::default()
            };
            for (i, f) in formats.iter().enumerate() {
                let values: Vec<u8> = (0..f.value_count())
                    .map(|v| ((v * 3 + i) % 6) as u8)
                    .collect();
                scb.endpoints[i] = EndpointPayload::new(*f, &values);
            }
            for i in 0..16 {
                scb.plane1_weights[i] = (i % 4) as u8;
            }

            let block = symbolic_to_physical(&bsd, &scb);
            assert_eq!(scb, physical_to_symbolic(&bsd, block));
        }
    }

    #[test]
    fn dual_plane_round_trip() {
        let bsd = BlockSizeDescriptor::new(5, 5);
        let mode = bsd.block_mode_index(4, 4, true, 1).unwrap();
        let weight_bits = bsd.block_mode(mode).unwrap().weight_bits;
        let level = color_level_for_bits(8, color_bits(2, weight_bits, true, false)).unwrap();

        let mut scb = SymbolicCompressedBlock {
            block_type: BlockType::Normal { block_mode: mode },
            partition_count: 2,
            partition_index: 33,
            color_quantization_level: level,
            plane2_color_component: 2,
            ..Default::default()
        };
        scb.endpoints[0] = EndpointPayload::new(EndpointFormat::LuminanceAlpha, &[1, 2, 3, 4]);
        scb.endpoints[1] = EndpointPayload::new(EndpointFormat::RgbScale, &[5, 4, 3, 2]);
        for i in 0..16 {
            scb.plane1_weights[i] = (i % 3) as u8;
            scb.plane2_weights[i] = ((i + 1) % 3) as u8;
        }

        let block = symbolic_to_physical(&bsd, &scb);
        assert_eq!(scb, physical_to_symbolic(&bsd, block));
    }

    #[test]
    fn arbitrary_blocks_never_panic() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let mut state = 0x12345678u64;
        for _ in 0..10000 {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let block = ((state as u128) << 64 | state.rotate_left(17) as u128).to_le_bytes();
            let scb = physical_to_symbolic(&bsd, block);
            // Constant blocks have no color quantization level.
            if matches!(scb.block_type, BlockType::Normal { .. }) {
                assert!(scb.color_quantization_level >= QUANT_6);
                assert!(scb.color_quantization_level <= QUANT_256);
            }
        }
    }
}
