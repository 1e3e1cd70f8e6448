use std::collections::HashMap;

use crate::{
    block_size::{BlockMode, MAX_WEIGHTS_PER_BLOCK},
    color_format::{DecodeMode, EndpointFormat},
    color_quantize::pack_color_endpoints,
    color_unquantize::unpack_color_endpoints,
    ideal_endpoints::{representative_colors, EndpointsAndWeights},
    image_block::ErrorWeightBlock,
    partition::PartitionInfo,
    physical::{color_bits, MAX_COLOR_VALUES},
    quantization::{color_level_for_bits, QUANT_6},
};

/// The number of block modes kept for refinement.
pub const TUNE_CANDIDATE_LIMIT: usize = 4;

const LDR_FORMATS: [EndpointFormat; 6] = [
    EndpointFormat::Rgb,
    EndpointFormat::Rgba,
    EndpointFormat::RgbScale,
    EndpointFormat::RgbScaleAlpha,
    EndpointFormat::Luminance,
    EndpointFormat::LuminanceAlpha,
];

const HDR_FORMATS: [EndpointFormat; 4] = [
    EndpointFormat::HdrRgb,
    EndpointFormat::HdrRgbLdrAlpha,
    EndpointFormat::HdrRgbScale,
    EndpointFormat::HdrLuminanceLargeRange,
];

const HDR_ALPHA_FORMATS: [EndpointFormat; 4] = [
    EndpointFormat::HdrRgb,
    EndpointFormat::HdrRgba,
    EndpointFormat::HdrRgbScale,
    EndpointFormat::HdrLuminanceLargeRange,
];

/// The formats to try in order of preference.
pub fn format_family(decode_mode: DecodeMode, rgb_hdr: bool, alpha_hdr: bool) -> &'static [EndpointFormat] {
    match (decode_mode, rgb_hdr, alpha_hdr) {
        (DecodeMode::Hdr, true, true) => &HDR_ALPHA_FORMATS,
        (DecodeMode::Hdr, true, false) => &HDR_FORMATS,
        _ => &LDR_FORMATS,
    }
}

/// A block mode worth refining along with its estimated error from weight quantization.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ModeCandidate {
    pub mode: BlockMode,
    /// Quantized weight ranks for each plane.
    pub plane1_weights: [u8; MAX_WEIGHTS_PER_BLOCK],
    pub plane2_weights: [u8; MAX_WEIGHTS_PER_BLOCK],
    pub weight_error: f32,
}

/// The chosen endpoint formats and color levels for a block mode.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct FormatCandidate {
    /// Index into the candidates passed to [compute_ideal_endpoint_formats].
    pub candidate: usize,
    pub formats: [EndpointFormat; 4],
    /// The color level when every partition shares a single CEM.
    pub color_level: usize,
    /// The color level when partitions store their own CEM.
    pub color_level_mod: usize,
    pub error: f32,
}

struct ColorErrorCache<'a> {
    decode_mode: DecodeMode,
    ewb: &'a ErrorWeightBlock,
    partition: &'a PartitionInfo,
    plane1: &'a EndpointsAndWeights,
    plane2: Option<(&'a EndpointsAndWeights, usize)>,
    errors: HashMap<(usize, EndpointFormat, usize), f32>,
}

impl ColorErrorCache<'_> {
    fn error(&mut self, partition: usize, format: EndpointFormat, level: usize) -> f32 {
        if let Some(error) = self.errors.get(&(partition, format, level)) {
            return *error;
        }
        let error = self.compute_error(partition, format, level);
        self.errors.insert((partition, format, level), error);
        error
    }

    // Quantize the ideal endpoints and measure the change of the ideal interpolated colors.
    fn compute_error(&self, partition: usize, format: EndpointFormat, level: usize) -> f32 {
        let e0 = self.plane1.endpoints.endpt0[partition];
        let e1 = self.plane1.endpoints.endpt1[partition];
        let (rgbs, rgbo) = representative_colors(e0, e1);
        let payload = pack_color_endpoints(self.decode_mode, e0, e1, rgbs, rgbo, format, level);
        let unpacked = unpack_color_endpoints(self.decode_mode, &payload, level);
        if unpacked.nan_endpoint {
            return f32::INFINITY;
        }

        let d0 = unpacked.endpoint0.map(|c| c as f32);
        let d1 = unpacked.endpoint1.map(|c| c as f32);
        self.partition
            .texels(partition)
            .iter()
            .map(|t| {
                let t = *t as usize;
                (0..4)
                    .map(|c| {
                        let w = match self.plane2 {
                            Some((plane2, component)) if component == c => plane2.weights[t],
                            _ => self.plane1.weights[t],
                        };
                        let ideal = e0[c] + (e1[c] - e0[c]) * w;
                        let decoded = d0[c] + (d1[c] - d0[c]) * w;
                        let diff = decoded - ideal;
                        diff * diff * self.ewb.error_weights[t][c]
                    })
                    .sum::<f32>()
            })
            .sum()
    }
}

/// Choose the endpoint formats and color levels for each candidate block mode.
///
/// Every partition uses the same format from `formats`.
/// Returns the [TUNE_CANDIDATE_LIMIT] candidates with the lowest combined
/// weight and color error sorted from best to worst.
pub fn compute_ideal_endpoint_formats(
    decode_mode: DecodeMode,
    ewb: &ErrorWeightBlock,
    partition: &PartitionInfo,
    plane1: &EndpointsAndWeights,
    plane2: Option<(&EndpointsAndWeights, usize)>,
    candidates: &[ModeCandidate],
    formats: &[EndpointFormat],
) -> Vec<FormatCandidate> {
    let partition_count = partition.partition_count;
    let mut cache = ColorErrorCache {
        decode_mode,
        ewb,
        partition,
        plane1,
        plane2,
        errors: HashMap::new(),
    };

    let mut best = Vec::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let mode = &candidate.mode;
        debug_assert!((0.0..=1.0).contains(&mode.percentile));

        let mut best_for_mode: Option<FormatCandidate> = None;
        for format in formats {
            let count = partition_count * format.value_count();
            if count > MAX_COLOR_VALUES {
                continue;
            }

            let matched_bits = color_bits(partition_count, mode.weight_bits, mode.dual_plane, true);
            let mixed_bits = color_bits(partition_count, mode.weight_bits, mode.dual_plane, false);
            let (Some(level), Some(level_mod)) = (
                color_level_for_bits(count, matched_bits),
                color_level_for_bits(count, mixed_bits),
            ) else {
                continue;
            };
            if level_mod < QUANT_6 {
                continue;
            }

            let color_error: f32 = (0..partition_count)
                .map(|p| cache.error(p, *format, level))
                .sum();
            let error = candidate.weight_error + color_error;

            // Ties keep the earlier format.
            if best_for_mode.map(|b| error < b.error).unwrap_or(true) {
                best_for_mode = Some(FormatCandidate {
                    candidate: i,
                    formats: [*format; 4],
                    color_level: level,
                    color_level_mod: level_mod,
                    error,
                });
            }
        }
        best.extend(best_for_mode.filter(|b| b.error.is_finite()));
    }

    best.sort_by(|a, b| a.error.total_cmp(&b.error));
    best.truncate(TUNE_CANDIDATE_LIMIT);
    best
}
