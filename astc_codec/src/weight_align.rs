use crate::{
    block_size::{BlockSizeDescriptor, DecimationTable, MAX_WEIGHTS_PER_BLOCK},
    color_format::DecodeMode,
    color_unquantize::{unpack_color_endpoints, UnpackedEndpoints},
    decompress::lerp_color_int,
    image_block::{ErrorWeightBlock, ImageBlock},
    partition::PartitionInfo,
    quantization::{quant_levels, unquantize_weight},
    symbolic::{BlockType, SymbolicCompressedBlock},
};

struct PlaneContext<'a> {
    decode_mode: DecodeMode,
    block: &'a ImageBlock,
    ewb: &'a ErrorWeightBlock,
    table: &'a DecimationTable,
    partition: &'a PartitionInfo,
    endpoints: &'a [UnpackedEndpoints],
    plane2_component: Option<usize>,
}

impl PlaneContext<'_> {
    // The error of only the texels influenced by `weight`.
    fn weight_error(&self, weight: usize, weights1: &[u8], weights2: &[u8]) -> f32 {
        self.table.weight_texels[weight]
            .iter()
            .map(|t| {
                let t = *t as usize;
                let e = &self.endpoints[self.partition.partition_of_texel[t] as usize];
                let color = lerp_color_int(
                    self.decode_mode,
                    e.endpoint0,
                    e.endpoint1,
                    self.table.texel_weight_int(t, weights1),
                    self.table.texel_weight_int(t, weights2),
                    self.plane2_component,
                );
                (0..4)
                    .map(|c| {
                        let diff = color[c] as f32 - self.block.work_data[t][c];
                        diff * diff * self.ewb.error_weights[t][c]
                    })
                    .sum::<f32>()
            })
            .sum()
    }
}

fn unquantized(ranks: &[u8], weight_level: usize) -> [u8; MAX_WEIGHTS_PER_BLOCK] {
    let mut weights = [0; MAX_WEIGHTS_PER_BLOCK];
    for (w, r) in weights.iter_mut().zip(ranks) {
        *w = unquantize_weight(weight_level, *r);
    }
    weights
}

// Move each weight of one plane to a neighboring rank while the error strictly decreases.
fn realign_plane(
    context: &PlaneContext,
    weight_level: usize,
    ranks: &mut [u8],
    other_ranks: &[u8],
    second_plane: bool,
) -> usize {
    let levels = quant_levels(weight_level) as u8;
    let mut weights = unquantized(ranks, weight_level);
    let other = unquantized(other_ranks, weight_level);

    let error = |weights: &[u8], w: usize| {
        if second_plane {
            context.weight_error(w, &other, weights)
        } else {
            context.weight_error(w, weights, &other)
        }
    };

    let mut adjustments = 0;
    for w in 0..context.table.weight_count {
        let original = ranks[w];
        let mut best_error = error(&weights, w);

        for step in [1i32, -1] {
            loop {
                let candidate = ranks[w] as i32 + step;
                if candidate < 0 || candidate >= levels as i32 {
                    break;
                }
                let previous = weights[w];
                weights[w] = unquantize_weight(weight_level, candidate as u8);
                let candidate_error = error(&weights, w);
                if candidate_error < best_error {
                    best_error = candidate_error;
                    ranks[w] = candidate as u8;
                } else {
                    weights[w] = previous;
                    break;
                }
            }
        }

        if ranks[w] != original {
            adjustments += 1;
        }
    }
    adjustments
}

/// Adjust each quantized weight in isolation to reduce the error of the decoded block.
///
/// Returns the number of weights that changed.
pub fn realign_weights(
    decode_mode: DecodeMode,
    bsd: &BlockSizeDescriptor,
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    scb: &mut SymbolicCompressedBlock,
) -> usize {
    let BlockType::Normal { block_mode } = scb.block_type else {
        return 0;
    };
    let Some(mode) = bsd.block_mode(block_mode).copied() else {
        return 0;
    };

    let table = &bsd.decimation_tables[mode.decimation];
    let partition = bsd.partition_table(scb.partition_count).get(scb.partition_index);
    let endpoints: Vec<_> = scb
        .endpoints()
        .iter()
        .map(|e| unpack_color_endpoints(decode_mode, e, scb.color_quantization_level))
        .collect();

    let context = PlaneContext {
        decode_mode,
        block,
        ewb,
        table,
        partition,
        endpoints: &endpoints,
        plane2_component: mode.dual_plane.then_some(scb.plane2_color_component),
    };

    let count = table.weight_count;
    let plane2 = scb.plane2_weights;
    let mut adjustments = realign_plane(
        &context,
        mode.weight_level,
        &mut scb.plane1_weights[..count],
        &plane2[..count],
        false,
    );
    if mode.dual_plane {
        let plane1 = scb.plane1_weights;
        adjustments += realign_plane(
            &context,
            mode.weight_level,
            &mut scb.plane2_weights[..count],
            &plane1[..count],
            true,
        );
    }
    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color_format::{EndpointFormat, EndpointPayload},
        compress::CompressionParams,
        decompress::decompress_symbolic_block,
        image_block::compute_imageblock_difference,
        quantization::QUANT_256,
        Quality,
    };

    fn gradient_block() -> ImageBlock {
        let data: Vec<u8> = (0..16u8)
            .flat_map(|i| [i * 17, i * 17, i * 17, 255])
            .collect();
        ImageBlock::from_rgba8(&data, 4, 4, 0, 0, 4, 4)
    }

    fn block_error(
        bsd: &BlockSizeDescriptor,
        block: &ImageBlock,
        ewb: &ErrorWeightBlock,
        scb: &SymbolicCompressedBlock,
    ) -> f32 {
        let decoded = decompress_symbolic_block(DecodeMode::Ldr, bsd, scb);
        compute_imageblock_difference(block, &decoded, ewb)
    }

    fn gray_scb(block_mode: u16, weights: &[u8]) -> SymbolicCompressedBlock {
        let mut scb = SymbolicCompressedBlock {
            block_type: BlockType::Normal { block_mode },
            color_quantization_level: QUANT_256,
            ..Default::default()
        };
        scb.endpoints[0] = EndpointPayload::new(EndpointFormat::Rgb, &[0, 255, 0, 255, 0, 255]);
        scb.plane1_weights[..weights.len()].copy_from_slice(weights);
        scb
    }

    #[test]
    fn realign_reduces_error() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let block = gradient_block();
        let ewb = ErrorWeightBlock::new(&block, &CompressionParams::new(Quality::Normal, 16));

        // Start from poor weights on a full resolution grid with 16 weight values.
        let mode = bsd.block_mode_index(4, 4, false, 8).unwrap();
        let mut scb = gray_scb(mode, &[8; 16]);

        let before = block_error(&bsd, &block, &ewb, &scb);
        let adjustments = realign_weights(DecodeMode::Ldr, &bsd, &block, &ewb, &mut scb);
        let after = block_error(&bsd, &block, &ewb, &scb);
        assert!(adjustments > 0);
        assert!(after < before);

        // The nearest of the 16 weight values for each texel has the same rank.
        let expected: Vec<u8> = (0..16).collect();
        assert_eq!(&expected[..], &scb.plane1_weights[..16]);
    }

    #[test]
    fn realign_converges() {
        let bsd = BlockSizeDescriptor::new(6, 6);
        let data: Vec<u8> = (0..36u8)
            .flat_map(|i| [i * 7, 255 - i * 5, (i as u32 * 13 % 200) as u8, 255])
            .collect();
        let block = ImageBlock::from_rgba8(&data, 6, 6, 0, 0, 6, 6);
        let ewb = ErrorWeightBlock::new(&block, &CompressionParams::new(Quality::Normal, 36));

        let mode = bsd.block_mode_index(4, 4, false, 5).unwrap();
        let mut scb = gray_scb(mode, &[3; 16]);

        let mut error = block_error(&bsd, &block, &ewb, &scb);
        let mut iterations = 0;
        while realign_weights(DecodeMode::Ldr, &bsd, &block, &ewb, &mut scb) > 0 {
            let new_error = block_error(&bsd, &block, &ewb, &scb);
            assert!(new_error <= error);
            error = new_error;
            iterations += 1;
            assert!(iterations < 100);
        }
    }

    #[test]
    fn realign_dual_plane() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        // Alpha is the reverse of the color gradient.
        let data: Vec<u8> = (0..16u8)
            .flat_map(|i| [i * 17, i * 17, i * 17, 255 - i * 17])
            .collect();
        let block = ImageBlock::from_rgba8(&data, 4, 4, 0, 0, 4, 4);
        let ewb = ErrorWeightBlock::new(&block, &CompressionParams::new(Quality::Normal, 16));

        let mode = bsd.block_mode_index(4, 4, true, 2).unwrap();
        let mut scb = gray_scb(mode, &[0; 16]);
        scb.endpoints[0] = EndpointPayload::new(
            EndpointFormat::Rgba,
            &[0, 255, 0, 255, 0, 255, 255, 0],
        );
        scb.plane2_color_component = 3;

        let before = block_error(&bsd, &block, &ewb, &scb);
        realign_weights(DecodeMode::Ldr, &bsd, &block, &ewb, &mut scb);
        let after = block_error(&bsd, &block, &ewb, &scb);
        assert!(after < before);
        assert_eq!(3, scb.plane1_weights[15]);
        assert_eq!(3, scb.plane2_weights[15]);
    }

    #[test]
    fn realign_constant_block() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let block = gradient_block();
        let ewb = ErrorWeightBlock::new(&block, &CompressionParams::new(Quality::Normal, 16));
        let mut scb = SymbolicCompressedBlock::constant_unorm16([0; 4]);
        assert_eq!(0, realign_weights(DecodeMode::Ldr, &bsd, &block, &ewb, &mut scb));
    }
}
