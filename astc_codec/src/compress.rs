use log::{trace, warn};
use sf16_rs::{f32_to_f16, RoundingMode};

use crate::{
    block_size::{BlockSizeDescriptor, MAX_WEIGHTS_PER_BLOCK},
    color_format::{DecodeMode, EndpointFormat, EndpointPayload},
    color_quantize::pack_color_endpoints,
    decompress::decompress_symbolic_block,
    format_selection::{
        compute_ideal_endpoint_formats, format_family, FormatCandidate, ModeCandidate,
    },
    ideal_endpoints::{
        compute_endpoints_and_ideal_weights_1_plane, compute_endpoints_and_ideal_weights_2_planes,
        compute_error_of_weight_set, compute_ideal_quantized_weights_for_decimation_table,
        compute_ideal_weights_for_decimation_table, recompute_ideal_colors, unquantized_weights,
        RecomputedColors,
    },
    image_block::{
        compute_imageblock_difference, prepare_block_statistics, BlockStatistics, ErrorWeightBlock,
        ImageBlock,
    },
    partition::{find_best_partitionings, PartitionInfo},
    physical::{physical_to_symbolic, symbolic_to_physical},
    symbolic::{BlockType, SymbolicCompressedBlock},
    weight_align::realign_weights,
    Quality,
};

/// Errors for the first mode 0 pass are scaled to favor the more thorough second pass.
const MODE0_FAST_ERROR_MULTIPLIER: f32 = 2.5;


const BLOCK_MODE_COUNT: usize = 2048;

/// Search limits and error targets derived from a [Quality].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct CompressionParams {
    /// The maximum number of partition indices scored for each partition count.
    pub partition_search_limit: usize,
    /// Skip 3 and 4 partitions when 2 partitions are worse than 1 partition by this ratio.
    pub partition_1_to_2_limit: f32,
    /// Skip dual plane modes when channels are more correlated than this value.
    pub lowest_correlation_cutoff: f32,
    /// The highest block mode percentile to search after the first pass.
    pub block_mode_cutoff: f32,
    /// The maximum number of endpoint and weight refinement iterations per candidate.
    pub max_refinement_iters: usize,
    /// Stop searching once the error per unit of error weight is below this value.
    pub texel_avg_error_limit: f32,
    pub channel_weights: [f32; 4],
}

impl CompressionParams {
    pub fn new(quality: Quality, texel_count: usize) -> Self {
        let log_texels = (texel_count as f32).log10();
        let target_db = |a: f32, b: f32| (a - 35.0 * log_texels).max(b - 19.0 * log_texels);

        let (partition_search_limit, partition_1_to_2_limit, cutoff, max_refinement_iters, db) =
            match quality {
                Quality::Fast => (4, 1.0, 0.5, 1, target_db(85.0, 63.0)),
                Quality::Normal => (25, 1.2, 0.75, 2, target_db(95.0, 70.0)),
                Quality::Slow => (100, 2.5, 0.95, 4, target_db(105.0, 77.0)),
            };

        Self {
            partition_search_limit,
            partition_1_to_2_limit,
            lowest_correlation_cutoff: cutoff,
            block_mode_cutoff: cutoff,
            max_refinement_iters,
            texel_avg_error_limit: 0.1f32.powf(db * 0.1) * 65535.0 * 65535.0,
            channel_weights: [1.0; 4],
        }
    }
}

/// Counts of the chosen block types for diagnostics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BlockModeHistogram {
    /// The number of normal blocks for each 11-bit block mode.
    pub block_modes: Vec<u32>,
    pub constant_blocks: u32,
    pub error_blocks: u32,
}

impl Default for BlockModeHistogram {
    fn default() -> Self {
        Self {
            block_modes: vec![0; BLOCK_MODE_COUNT],
            constant_blocks: 0,
            error_blocks: 0,
        }
    }
}

impl BlockModeHistogram {
    pub fn record(&mut self, block: &SymbolicCompressedBlock) {
        match block.block_type {
            BlockType::Normal { block_mode } => self.block_modes[block_mode as usize] += 1,
            BlockType::ConstantUnorm16(_) | BlockType::ConstantF16(_) => self.constant_blocks += 1,
            BlockType::Error => self.error_blocks += 1,
        }
    }

    pub fn merge(&mut self, other: &Self) {
        for (count, other) in self.block_modes.iter_mut().zip(&other.block_modes) {
            *count += other;
        }
        self.constant_blocks += other.constant_blocks;
        self.error_blocks += other.error_blocks;
    }

    /// The total number of recorded blocks.
    pub fn total(&self) -> u32 {
        self.block_modes.iter().sum::<u32>() + self.constant_blocks + self.error_blocks
    }

    /// The most frequently used block mode and its count.
    pub fn most_common(&self) -> Option<(u16, u32)> {
        self.block_modes
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .max_by_key(|(i, c)| (**c, std::cmp::Reverse(*i)))
            .map(|(i, c)| (i as u16, *c))
    }
}

/// Per encoder settings and statistics shared by every compressed block.
///
/// Parallel encoders [fork](CompressionContext::fork) a context for each worker
/// and [merge](CompressionContext::merge) the results afterwards.
#[derive(Debug, Default, Clone)]
pub struct CompressionContext {
    /// Log the error of each candidate class at the trace level.
    pub print_diagnostics: bool,
    /// Encode color channels with HDR endpoint formats.
    pub rgb_force_use_of_hdr: bool,
    /// Encode the alpha channel with HDR endpoint formats.
    pub alpha_force_use_of_hdr: bool,
    pub histogram: BlockModeHistogram,
}

impl CompressionContext {
    /// A context with the same settings and an empty histogram.
    pub fn fork(&self) -> Self {
        Self {
            print_diagnostics: self.print_diagnostics,
            rgb_force_use_of_hdr: self.rgb_force_use_of_hdr,
            alpha_force_use_of_hdr: self.alpha_force_use_of_hdr,
            histogram: BlockModeHistogram::default(),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.histogram.merge(&other.histogram);
    }
}

#[derive(Debug, Clone, Copy)]
struct BestBlock {
    block: SymbolicCompressedBlock,
    /// The scaled error used for comparisons and early outs.
    score: f32,
}

impl Default for BestBlock {
    fn default() -> Self {
        Self {
            block: SymbolicCompressedBlock::error(),
            score: f32::INFINITY,
        }
    }
}

impl BestBlock {
    fn update(&mut self, candidate: Option<(SymbolicCompressedBlock, f32)>, multiplier: f32) {
        if let Some((block, error)) = candidate {
            if error * multiplier < self.score {
                *self = Self {
                    block,
                    score: error * multiplier,
                };
            }
        }
    }
}

struct BlockSearch<'a> {
    decode_mode: DecodeMode,
    bsd: &'a BlockSizeDescriptor,
    params: &'a CompressionParams,
    block: &'a ImageBlock,
    ewb: &'a ErrorWeightBlock,
    formats: &'static [EndpointFormat],
    print_diagnostics: bool,
}

impl BlockSearch<'_> {
    fn good_enough(&self, best: &BestBlock) -> bool {
        best.score / self.ewb.error_weight_sum < self.params.texel_avg_error_limit
    }

    fn trace(&self, class: &str, candidate: &Option<(SymbolicCompressedBlock, f32)>) {
        if self.print_diagnostics {
            match candidate {
                Some((block, error)) => trace!("{class}: error {error}, {:?}", block.block_type),
                None => trace!("{class}: no valid candidates"),
            }
        }
    }

    // A channel only benefits from its own weights if it adds information.
    fn separate_component_useful(&self, component: usize) -> bool {
        if component == 3 {
            self.block.uses_alpha()
        } else {
            !self.block.grayscale
        }
    }

    fn search(&self) -> BestBlock {
        let mut best = BestBlock::default();

        // Mode 0 with only the most common block modes before the full search.
        for (cutoff, multiplier) in [
            (0.0, MODE0_FAST_ERROR_MULTIPLIER),
            (self.params.block_mode_cutoff, 1.0),
        ] {
            let candidate = self.compress_fixed_partition(1, 0, None, cutoff);
            self.trace("1 partition", &candidate);
            best.update(candidate, multiplier);
            if self.good_enough(&best) {
                return best;
            }
        }

        let statistics = prepare_block_statistics(self.block, self.ewb);
        let try_dual_plane = dual_plane_allowed(&statistics, self.params);
        if try_dual_plane {
            for component in (0..4).filter(|c| self.separate_component_useful(*c)) {
                let candidate = self.compress_fixed_partition(
                    1,
                    0,
                    Some(component),
                    self.params.block_mode_cutoff,
                );
                self.trace("1 partition dual plane", &candidate);
                best.update(candidate, 1.0);
                if self.good_enough(&best) {
                    return best;
                }
            }
        }

        let best_1_partition = best.score;
        for partition_count in 2..=4 {
            let partitionings = find_best_partitionings(
                self.bsd,
                self.block,
                self.ewb,
                partition_count,
                self.params.partition_search_limit,
            );

            let mut best_for_count = BestBlock::default();
            for index in &partitionings.single_plane {
                let candidate = self.compress_fixed_partition(
                    partition_count,
                    *index,
                    None,
                    self.params.block_mode_cutoff,
                );
                self.trace("multiple partitions", &candidate);
                best_for_count.update(candidate, 1.0);
                best.update(candidate, 1.0);
                if self.good_enough(&best) {
                    return best;
                }
            }

            // 4 partitions with dual plane never fit the color and weight bits.
            if partition_count < 4 && try_dual_plane {
                for (index, component) in &partitionings.dual_plane {
                    if !self.separate_component_useful(*component) {
                        continue;
                    }
                    let candidate = self.compress_fixed_partition(
                        partition_count,
                        *index,
                        Some(*component),
                        self.params.block_mode_cutoff,
                    );
                    self.trace("multiple partitions dual plane", &candidate);
                    best_for_count.update(candidate, 1.0);
                    best.update(candidate, 1.0);
                    if self.good_enough(&best) {
                        return best;
                    }
                }
            }

            if partition_count == 2
                && !statistics.is_normal_map
                && best_for_count.score > best_1_partition * self.params.partition_1_to_2_limit
            {
                break;
            }
        }

        best
    }

    fn compress_fixed_partition(
        &self,
        partition_count: usize,
        partition_index: u16,
        separate_component: Option<usize>,
        mode_cutoff: f32,
    ) -> Option<(SymbolicCompressedBlock, f32)> {
        let partition = self.bsd.partition_table(partition_count).get(partition_index);
        let dual_plane = separate_component.is_some();

        let (plane1, plane2) = match separate_component {
            Some(component) => {
                let (plane1, plane2) = compute_endpoints_and_ideal_weights_2_planes(
                    self.block,
                    self.ewb,
                    partition,
                    partition_count,
                    component,
                );
                (plane1, Some(plane2))
            }
            None => (
                compute_endpoints_and_ideal_weights_1_plane(
                    self.block,
                    self.ewb,
                    partition,
                    partition_count,
                ),
                None,
            ),
        };

        // Modes with the same weight grid share the unquantized ideal weights.
        let mut decimated_weights = vec![None; self.bsd.decimation_tables.len()];
        let mut candidates = Vec::new();
        for mode in self
            .bsd
            .block_modes
            .iter()
            .filter(|m| m.dual_plane == dual_plane && m.percentile <= mode_cutoff)
        {
            let table = &self.bsd.decimation_tables[mode.decimation];
            let count = table.weight_count;
            let (ideal1, ideal2) = *decimated_weights[mode.decimation].get_or_insert_with(|| {
                (
                    compute_ideal_weights_for_decimation_table(&plane1, table),
                    plane2
                        .as_ref()
                        .map(|p| compute_ideal_weights_for_decimation_table(p, table))
                        .unwrap_or([0.0; MAX_WEIGHTS_PER_BLOCK]),
                )
            });

            let plane1_weights = compute_ideal_quantized_weights_for_decimation_table(
                &ideal1[..count],
                mode.weight_level,
            );
            let mut weight_error = compute_error_of_weight_set(
                &plane1,
                table,
                &unquantized_weights(&plane1_weights[..count], mode.weight_level),
            );

            let mut plane2_weights = [0; MAX_WEIGHTS_PER_BLOCK];
            if let Some(plane2) = &plane2 {
                plane2_weights = compute_ideal_quantized_weights_for_decimation_table(
                    &ideal2[..count],
                    mode.weight_level,
                );
                weight_error += compute_error_of_weight_set(
                    plane2,
                    table,
                    &unquantized_weights(&plane2_weights[..count], mode.weight_level),
                );
            }

            candidates.push(ModeCandidate {
                mode: *mode,
                plane1_weights,
                plane2_weights,
                weight_error,
            });
        }

        let formats = compute_ideal_endpoint_formats(
            self.decode_mode,
            self.ewb,
            partition,
            &plane1,
            plane2.as_ref().zip(separate_component),
            &candidates,
            self.formats,
        );

        formats
            .iter()
            .filter_map(|f| {
                self.refine_candidate(
                    partition,
                    partition_index,
                    &candidates[f.candidate],
                    f,
                    separate_component,
                )
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    // Alternate between fitting endpoints to the weights and weights to the endpoints.
    fn refine_candidate(
        &self,
        partition: &PartitionInfo,
        partition_index: u16,
        candidate: &ModeCandidate,
        format: &FormatCandidate,
        separate_component: Option<usize>,
    ) -> Option<(SymbolicCompressedBlock, f32)> {
        let mode = &candidate.mode;
        let table = &self.bsd.decimation_tables[mode.decimation];
        let count = table.weight_count;
        let partition_count = partition.partition_count;

        let mut block = SymbolicCompressedBlock {
            block_type: BlockType::Normal {
                block_mode: mode.mode_index,
            },
            partition_count,
            partition_index: if partition_count > 1 { partition_index } else { 0 },
            plane1_weights: candidate.plane1_weights,
            plane2_weights: candidate.plane2_weights,
            plane2_color_component: separate_component.unwrap_or_default(),
            ..Default::default()
        };

        let mut best: Option<(SymbolicCompressedBlock, f32)> = None;
        for _ in 0..self.params.max_refinement_iters {
            let colors = recompute_ideal_colors(
                self.block,
                self.ewb,
                partition,
                partition_count,
                table,
                mode.weight_level,
                &block.plane1_weights[..count],
                separate_component.map(|c| (&block.plane2_weights[..count], c)),
            );
            self.pack_endpoints(&mut block, &colors, format);

            let adjustments =
                realign_weights(self.decode_mode, self.bsd, self.block, self.ewb, &mut block);

            let decoded = decompress_symbolic_block(self.decode_mode, self.bsd, &block);
            let error = compute_imageblock_difference(self.block, &decoded, self.ewb);
            if best.map(|(_, e)| error < e).unwrap_or(true) {
                best = Some((block, error));
            }

            if adjustments == 0 {
                break;
            }
        }
        best
    }

    fn pack_endpoints(
        &self,
        block: &mut SymbolicCompressedBlock,
        colors: &RecomputedColors,
        format: &FormatCandidate,
    ) {
        let partition_count = block.partition_count;
        let pack = |level| {
            let mut endpoints = [EndpointPayload::default(); 4];
            for (p, endpoint) in endpoints.iter_mut().enumerate().take(partition_count) {
                *endpoint = pack_color_endpoints(
                    self.decode_mode,
                    colors.endpoints.endpt0[p],
                    colors.endpoints.endpt1[p],
                    colors.rgbs[p],
                    colors.rgbo[p],
                    format.formats[p],
                    level,
                );
            }
            endpoints
        };
        let same_format = |endpoints: &[EndpointPayload; 4]| {
            endpoints[..partition_count]
                .iter()
                .all(|e| e.format == endpoints[0].format)
        };

        // Partitions may pick different delta or range variants of the requested format.
        let mixed = pack(format.color_level_mod);
        if partition_count > 1 && same_format(&mixed) {
            let matched = pack(format.color_level);
            if same_format(&matched) {
                block.endpoints = matched;
                block.color_formats_matched = true;
                block.color_quantization_level = format.color_level;
                return;
            }
        }
        block.endpoints = mixed;
        block.color_formats_matched = false;
        block.color_quantization_level = format.color_level_mod;
    }

    fn constant_block(&self, color: [f32; 4], orig: [f32; 4]) -> SymbolicCompressedBlock {
        if self.formats[0].is_hdr() {
            let color = orig.map(|c| f32_to_f16(c, RoundingMode::NearestEven));
            SymbolicCompressedBlock::constant_f16(color)
        } else {
            let color = color.map(|c| c.round().clamp(0.0, 65535.0) as u16);
            SymbolicCompressedBlock::constant_unorm16(color)
        }
    }
}

/// Dual plane modes only pay for their extra weights when channels are decorrelated.
///
/// Normal maps always consider dual plane modes since the third channel is derived.
fn dual_plane_allowed(statistics: &BlockStatistics, params: &CompressionParams) -> bool {
    statistics.is_normal_map || statistics.lowest_correlation <= params.lowest_correlation_cutoff
}

/// Find the lowest error encoding of `block` searching block modes,
/// partitionings, and endpoint formats in order of increasing cost.
///
/// Returns the block and its error divided by the sum of the error weights.
pub fn compress_symbolic_block(
    ctx: &mut CompressionContext,
    decode_mode: DecodeMode,
    bsd: &BlockSizeDescriptor,
    params: &CompressionParams,
    block: &ImageBlock,
) -> (SymbolicCompressedBlock, f32) {
    let ewb = ErrorWeightBlock::new(block, params);
    let search = BlockSearch {
        decode_mode,
        bsd,
        params,
        block,
        ewb: &ewb,
        formats: format_family(decode_mode, ctx.rgb_force_use_of_hdr, ctx.alpha_force_use_of_hdr),
        print_diagnostics: ctx.print_diagnostics,
    };

    let scb = if block.is_constant() {
        search.constant_block(block.work_data[0], block.orig_data[0])
    } else {
        let best = search.search();
        if best.block.is_error() {
            // Every block has a valid flat encoding.
            let orig = average(&block.orig_data[..block.texel_count]);
            search.constant_block(block.average(), orig)
        } else {
            best.block
        }
    };

    let decoded = decompress_symbolic_block(decode_mode, bsd, &scb);
    let error = compute_imageblock_difference(block, &decoded, &ewb);

    let physical = symbolic_to_physical(bsd, &scb);
    if physical_to_symbolic(bsd, physical) != scb {
        warn!("Physical encoding does not match symbolic block {scb:?}");
    }

    ctx.histogram.record(&scb);
    (scb, error / ewb.error_weight_sum.max(f32::EPSILON))
}

fn average(texels: &[[f32; 4]]) -> [f32; 4] {
    let mut sum = [0.0; 4];
    let mut count = 0;
    for texel in texels.iter().filter(|t| t.iter().all(|c| !c.is_nan())) {
        for c in 0..4 {
            sum[c] += texel[c];
        }
        count += 1;
    }
    sum.map(|s| s / count.max(1) as f32)
}
