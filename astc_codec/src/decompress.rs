use sf16_rs::f16_to_f32;

use crate::{
    block_size::{BlockSizeDescriptor, MAX_WEIGHTS_PER_BLOCK},
    color_format::DecodeMode,
    color_unquantize::unpack_color_endpoints,
    image_block::ImageBlock,
    lns::{float_to_lns, lns_to_sf16},
    quantization::unquantize_weight,
    symbolic::{BlockType, SymbolicCompressedBlock},
};

/// Interpolate UNORM16 or LNS endpoints with weights from `0` to `64`.
///
/// The second weight applies only to `plane2_component` for dual plane blocks.
pub fn lerp_color_int(
    decode_mode: DecodeMode,
    endpoint0: [u16; 4],
    endpoint1: [u16; 4],
    weight: u32,
    plane2_weight: u32,
    plane2_component: Option<usize>,
) -> [u16; 4] {
    std::array::from_fn(|c| {
        let w = if plane2_component == Some(c) {
            plane2_weight
        } else {
            weight
        };
        let (e0, e1) = if decode_mode == DecodeMode::LdrSrgb {
            (endpoint0[c] as u32 >> 8, endpoint1[c] as u32 >> 8)
        } else {
            (endpoint0[c] as u32, endpoint1[c] as u32)
        };

        let color = (e0 * (64 - w) + e1 * w + 32) >> 6;
        if decode_mode == DecodeMode::LdrSrgb {
            (color | (color << 8)) as u16
        } else {
            color as u16
        }
    })
}

fn error_color_block(decode_mode: DecodeMode, xdim: usize, ydim: usize) -> ImageBlock {
    let mut block = ImageBlock::new(xdim, ydim);
    for i in 0..block.texel_count {
        if decode_mode == DecodeMode::LdrSrgb {
            // Magenta is easy to spot in LDR images.
            block.work_data[i] = [65535.0, 0.0, 65535.0, 65535.0];
            block.orig_data[i] = [1.0, 0.0, 1.0, 1.0];
        } else {
            block.work_data[i] = [0.0; 4];
            block.orig_data[i] = [f32::NAN; 4];
            block.nan_texel[i] = true;
        }
    }
    block
}

fn constant_block(xdim: usize, ydim: usize, work: [f32; 4], orig: [f32; 4], lns: bool) -> ImageBlock {
    let mut block = ImageBlock::new(xdim, ydim);
    for i in 0..block.texel_count {
        block.work_data[i] = work;
        block.orig_data[i] = orig;
        block.rgb_lns[i] = lns;
        block.alpha_lns[i] = lns;
    }
    block.update_statistics();
    block
}

fn unquantized_weights(ranks: &[u8], weight_level: usize) -> [u8; MAX_WEIGHTS_PER_BLOCK] {
    let mut weights = [0; MAX_WEIGHTS_PER_BLOCK];
    for (w, r) in weights.iter_mut().zip(ranks) {
        *w = unquantize_weight(weight_level, *r);
    }
    weights
}

/// Decode every texel of `scb` into working values from `0.0` to `65535.0`.
///
/// Error blocks and blocks that are invalid for the footprint decode to an error color.
pub fn decompress_symbolic_block(
    decode_mode: DecodeMode,
    bsd: &BlockSizeDescriptor,
    scb: &SymbolicCompressedBlock,
) -> ImageBlock {
    let (xdim, ydim) = (bsd.xdim, bsd.ydim);

    let block_mode = match scb.block_type {
        BlockType::Error => return error_color_block(decode_mode, xdim, ydim),
        BlockType::ConstantUnorm16(color) => {
            let color = if decode_mode == DecodeMode::LdrSrgb {
                color.map(|c| (c & 0xFF00) | (c >> 8))
            } else {
                color
            };
            let work = color.map(|c| c as f32);
            return constant_block(xdim, ydim, work, work.map(|c| c / 65535.0), false);
        }
        BlockType::ConstantF16(color) => {
            if decode_mode != DecodeMode::Hdr {
                return error_color_block(decode_mode, xdim, ydim);
            }
            let orig = color.map(f16_to_f32);
            let work = orig.map(float_to_lns);
            return constant_block(xdim, ydim, work, orig, true);
        }
        BlockType::Normal { block_mode } => block_mode,
    };

    let Some(mode) = bsd.block_mode(block_mode) else {
        return error_color_block(decode_mode, xdim, ydim);
    };
    let table = &bsd.decimation_tables[mode.decimation];
    let partition = bsd.partition_table(scb.partition_count).get(scb.partition_index);

    let weights1 = unquantized_weights(&scb.plane1_weights[..table.weight_count], mode.weight_level);
    let weights2 = unquantized_weights(&scb.plane2_weights[..table.weight_count], mode.weight_level);
    let plane2_component = mode.dual_plane.then_some(scb.plane2_color_component);

    let endpoints: Vec<_> = scb
        .endpoints()
        .iter()
        .map(|e| unpack_color_endpoints(decode_mode, e, scb.color_quantization_level))
        .collect();

    let mut block = ImageBlock::new(xdim, ydim);
    for i in 0..block.texel_count {
        let e = &endpoints[partition.partition_of_texel[i] as usize];
        let color = lerp_color_int(
            decode_mode,
            e.endpoint0,
            e.endpoint1,
            table.texel_weight_int(i, &weights1),
            table.texel_weight_int(i, &weights2),
            plane2_component,
        );

        block.rgb_lns[i] = e.rgb_hdr;
        block.alpha_lns[i] = e.alpha_hdr;
        block.nan_texel[i] = e.nan_endpoint;
        block.work_data[i] = color.map(|c| c as f32);
        block.orig_data[i] = std::array::from_fn(|c| {
            let lns = if c < 3 { e.rgb_hdr } else { e.alpha_hdr };
            if e.nan_endpoint {
                f32::NAN
            } else if lns {
                f16_to_f32(lns_to_sf16(color[c]))
            } else {
                color[c] as f32 / 65535.0
            }
        });
    }
    block.update_statistics();
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color_format::{EndpointFormat, EndpointPayload},
        quantization::QUANT_256,
    };

    fn rgb_block(bsd: &BlockSizeDescriptor, block_mode: u16, weights: &[u8]) -> SymbolicCompressedBlock {
        let mut scb = SymbolicCompressedBlock {
            block_type: BlockType::Normal { block_mode },
            color_quantization_level: QUANT_256,
            ..Default::default()
        };
        scb.endpoints[0] = EndpointPayload::new(EndpointFormat::Rgb, &[0, 255, 0, 255, 0, 255]);
        scb.plane1_weights[..weights.len()].copy_from_slice(weights);
        assert!(bsd.block_mode(block_mode).is_some());
        scb
    }

    #[test]
    fn lerp_endpoints() {
        let e0 = [0, 1000, 65535, 65535];
        let e1 = [65535, 3000, 0, 65535];
        assert_eq!(e0, lerp_color_int(DecodeMode::Ldr, e0, e1, 0, 0, None));
        assert_eq!(e1, lerp_color_int(DecodeMode::Ldr, e0, e1, 64, 64, None));
        assert_eq!(
            [32768, 2000, 32768, 65535],
            lerp_color_int(DecodeMode::Ldr, e0, e1, 32, 32, None)
        );
    }

    #[test]
    fn lerp_dual_plane() {
        let e0 = [0; 4];
        let e1 = [65535; 4];
        assert_eq!(
            [0, 0, 0, 65535],
            lerp_color_int(DecodeMode::Ldr, e0, e1, 0, 64, Some(3))
        );
    }

    #[test]
    fn lerp_srgb_uses_top_bits() {
        let e0 = [0x10FF, 0, 0, 0xFFFF];
        let e1 = [0x20FF, 0, 0, 0xFFFF];
        assert_eq!(
            [0x1818, 0, 0, 0xFFFF],
            lerp_color_int(DecodeMode::LdrSrgb, e0, e1, 32, 32, None)
        );
    }

    #[test]
    fn decompress_error_block() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let scb = SymbolicCompressedBlock::error();

        let block = decompress_symbolic_block(DecodeMode::LdrSrgb, &bsd, &scb);
        assert_eq!([65535.0, 0.0, 65535.0, 65535.0], block.work_data[5]);
        assert!(!block.has_nan());

        let block = decompress_symbolic_block(DecodeMode::Ldr, &bsd, &scb);
        assert_eq!([0.0; 4], block.work_data[5]);
        assert!(block.has_nan());
        assert!(block.orig_data[0][0].is_nan());
    }

    #[test]
    fn decompress_constant_unorm16() {
        let bsd = BlockSizeDescriptor::new(6, 5);
        let color = [128 * 257, 64 * 257, 200 * 257, 65535];
        let scb = SymbolicCompressedBlock::constant_unorm16(color);
        let block = decompress_symbolic_block(DecodeMode::Ldr, &bsd, &scb);
        assert_eq!(30, block.texel_count);
        assert_eq!(color.map(|c| c as f32), block.work_data[29]);
        assert!(block.is_constant());

        // sRGB keeps only the top 8 bits.
        let scb = SymbolicCompressedBlock::constant_unorm16([0x1234, 0, 0, 0xFFFF]);
        let block = decompress_symbolic_block(DecodeMode::LdrSrgb, &bsd, &scb);
        assert_eq!(0x1212 as f32, block.work_data[0][0]);
    }

    #[test]
    fn decompress_constant_f16() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let scb = SymbolicCompressedBlock::constant_f16([0x3C00, 0x4000, 0, 0x3C00]);

        let block = decompress_symbolic_block(DecodeMode::Hdr, &bsd, &scb);
        assert_eq!([1.0, 2.0, 0.0, 1.0], block.orig_data[3]);
        assert_eq!(30721.0, block.work_data[3][0]);
        assert!(block.is_rgb_lns());

        // LDR decoding cannot represent float constants.
        let block = decompress_symbolic_block(DecodeMode::Ldr, &bsd, &scb);
        assert!(block.has_nan());
    }

    #[test]
    fn decompress_weights() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        // 8 weight values unquantize to 0, 9, 18, 27, 37, 46, 55, 64.
        let mode = bsd.block_mode_index(4, 4, false, 5).unwrap();
        let weights: Vec<u8> = (0..16).map(|i| (i % 8) as u8).collect();
        let scb = rgb_block(&bsd, mode, &weights);

        let block = decompress_symbolic_block(DecodeMode::Ldr, &bsd, &scb);
        assert_eq!([0.0, 0.0, 0.0, 65535.0], block.work_data[0]);
        assert_eq!(27648.0, block.work_data[3][1]);
        assert_eq!([65535.0; 4], block.work_data[7]);
        assert!(!block.has_nan());
        assert_eq!(1.0, block.orig_data[7][0]);
    }

    #[test]
    fn decompress_dual_plane() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let mode = bsd.block_mode_index(4, 4, true, 2).unwrap();
        let mut scb = rgb_block(&bsd, mode, &[3; 16]);
        scb.plane2_color_component = 1;

        let block = decompress_symbolic_block(DecodeMode::Ldr, &bsd, &scb);
        assert_eq!([65535.0, 0.0, 65535.0, 65535.0], block.work_data[10]);
    }

    #[test]
    fn decompress_hdr_endpoints_in_ldr() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let mode = bsd.block_mode_index(4, 4, false, 5).unwrap();
        let mut scb = rgb_block(&bsd, mode, &[0; 16]);
        scb.endpoints[0] = EndpointPayload::new(EndpointFormat::HdrLuminanceLargeRange, &[10, 20]);

        let block = decompress_symbolic_block(DecodeMode::Ldr, &bsd, &scb);
        assert!(block.has_nan());
        assert_eq!([65535.0; 4], block.work_data[0]);

        let block = decompress_symbolic_block(DecodeMode::Hdr, &bsd, &scb);
        assert!(!block.has_nan());
        assert!(block.is_rgb_lns());
        assert!(!block.is_alpha_lns());
        assert_eq!(10.0 * 256.0, block.work_data[0][0]);
    }
}
