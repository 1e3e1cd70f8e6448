//! Unquantized endpoint and weight estimates used to seed the block mode search.
use crate::{
    block_size::{DecimationTable, MAX_TEXELS_PER_BLOCK, MAX_WEIGHTS_PER_BLOCK},
    image_block::{ErrorWeightBlock, ImageBlock},
    partition::PartitionInfo,
    quantization::{quantize_weight, unquantize_weight},
};

const POWER_ITERATIONS: usize = 8;

/// A line through the weighted mean of a set of texels.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct LineFit {
    pub mean: [f32; 4],
    /// A unit vector or zero if the texels are all equal.
    pub direction: [f32; 4],
    /// The weighted squared distance of the texels from the line.
    pub residual: f32,
}

fn dot(a: [f32; 4], b: [f32; 4]) -> f32 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

fn normalize(v: [f32; 4]) -> Option<[f32; 4]> {
    let length = dot(v, v).sqrt();
    (length > 1e-10).then(|| v.map(|x| x / length))
}

/// Fit a line to `texels` using only the enabled `channels`.
pub fn fit_line(
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    texels: &[u8],
    channels: [bool; 4],
) -> LineFit {
    let mask = |v: [f32; 4]| -> [f32; 4] {
        let mut v = v;
        for c in 0..4 {
            if !channels[c] {
                v[c] = 0.0;
            }
        }
        v
    };

    let mut weight_sum = 0.0;
    let mut sum = [0.0; 4];
    for t in texels {
        let weight = ewb.texel_weights[*t as usize].max(1e-6);
        let texel = block.work_data[*t as usize];
        weight_sum += weight;
        for c in 0..4 {
            sum[c] += texel[c] * weight;
        }
    }
    if texels.is_empty() {
        return LineFit {
            mean: [0.0; 4],
            direction: [0.0; 4],
            residual: 0.0,
        };
    }
    let mean = mask(sum.map(|s| s / weight_sum));

    let mut covariance = [[0.0f32; 4]; 4];
    let mut min = [f32::MAX; 4];
    let mut max = [f32::MIN; 4];
    for t in texels {
        let weight = ewb.texel_weights[*t as usize].max(1e-6);
        let texel = mask(block.work_data[*t as usize]);
        for a in 0..4 {
            min[a] = min[a].min(texel[a]);
            max[a] = max[a].max(texel[a]);
            let da = texel[a] - mean[a];
            for b in 0..4 {
                covariance[a][b] += da * (texel[b] - mean[b]) * weight;
            }
        }
    }

    // Start from the bounding box diagonal and refine towards the principal axis.
    let mut direction = normalize(std::array::from_fn(|c| max[c] - min[c])).unwrap_or([0.0; 4]);
    for _ in 0..POWER_ITERATIONS {
        let next = std::array::from_fn(|a| dot(covariance[a], direction));
        match normalize(next) {
            Some(next) => direction = next,
            None => break,
        }
    }

    // The perpendicular distance cancels badly in f32 for values near 65535.
    let residual = texels
        .iter()
        .map(|t| {
            let weight = ewb.texel_weights[*t as usize] as f64;
            let texel = mask(block.work_data[*t as usize]);
            let offset: [f64; 4] = std::array::from_fn(|c| (texel[c] - mean[c]) as f64);
            let along: f64 = (0..4).map(|c| offset[c] * direction[c] as f64).sum();
            let length: f64 = offset.iter().map(|o| o * o).sum();
            (length - along * along).max(0.0) * weight
        })
        .sum::<f64>() as f32;

    LineFit {
        mean,
        direction,
        residual,
    }
}

/// The endpoint colors of each partition in the working color space.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Endpoints {
    pub partition_count: usize,
    pub endpt0: [[f32; 4]; 4],
    pub endpt1: [[f32; 4]; 4],
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            partition_count: 1,
            endpt0: [[0.0; 4]; 4],
            endpt1: [[0.0; 4]; 4],
        }
    }
}

/// Endpoints with the ideal unquantized weight for each texel.
#[derive(Debug, Clone)]
pub struct EndpointsAndWeights {
    pub endpoints: Endpoints,
    /// Weights from `0.0` to `1.0` for each texel.
    pub weights: [f32; MAX_TEXELS_PER_BLOCK],
    /// The error increase per unit of squared weight error for each texel.
    pub weight_error_scale: [f32; MAX_TEXELS_PER_BLOCK],
}

impl EndpointsAndWeights {
    fn new(partition_count: usize) -> Self {
        Self {
            endpoints: Endpoints {
                partition_count,
                ..Default::default()
            },
            weights: [0.0; MAX_TEXELS_PER_BLOCK],
            weight_error_scale: [0.0; MAX_TEXELS_PER_BLOCK],
        }
    }
}

fn rgb_sum(color: [f32; 4]) -> f32 {
    color[0] + color[1] + color[2]
}

fn fit_partition_line(
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    texels: &[u8],
    channels: [bool; 4],
    eai: &mut EndpointsAndWeights,
    partition: usize,
) {
    let line = fit_line(block, ewb, texels, channels);

    let project = |t: u8| {
        let texel = block.work_data[t as usize];
        (0..4)
            .filter(|c| channels[*c])
            .map(|c| (texel[c] - line.mean[c]) * line.direction[c])
            .sum::<f32>()
    };
    let (low, high) = texels.iter().fold((f32::MAX, f32::MIN), |(low, high), t| {
        let p = project(*t);
        (low.min(p), high.max(p))
    });

    let mut e0 = eai.endpoints.endpt0[partition];
    let mut e1 = eai.endpoints.endpt1[partition];
    for c in (0..4).filter(|c| channels[*c]) {
        e0[c] = (line.mean[c] + line.direction[c] * low).clamp(0.0, 65535.0);
        e1[c] = (line.mean[c] + line.direction[c] * high).clamp(0.0, 65535.0);
    }

    let range = high - low;
    let mut swap = rgb_sum(e0) > rgb_sum(e1);
    if !channels[0] || !channels[1] || !channels[2] {
        // Only order by the channels this plane controls.
        let sum = |e: [f32; 4]| (0..4).filter(|c| channels[*c]).map(|c| e[c]).sum::<f32>();
        swap = sum(e0) > sum(e1);
    }
    for t in texels {
        let w = if range > 1e-7 {
            (project(*t) - low) / range
        } else {
            0.0
        };
        eai.weights[*t as usize] = if swap { 1.0 - w } else { w };
    }
    if swap {
        for c in (0..4).filter(|c| channels[*c]) {
            std::mem::swap(&mut e0[c], &mut e1[c]);
        }
    }

    for t in texels {
        let error_weights = ewb.error_weights[*t as usize];
        eai.weight_error_scale[*t as usize] = (0..4)
            .filter(|c| channels[*c])
            .map(|c| error_weights[c] * (e1[c] - e0[c]) * (e1[c] - e0[c]))
            .sum();
    }

    eai.endpoints.endpt0[partition] = e0;
    eai.endpoints.endpt1[partition] = e1;
}

pub fn compute_endpoints_and_ideal_weights_1_plane(
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    partition: &PartitionInfo,
    partition_count: usize,
) -> EndpointsAndWeights {
    let mut eai = EndpointsAndWeights::new(partition_count);
    for p in 0..partition_count {
        fit_partition_line(block, ewb, partition.texels(p), [true; 4], &mut eai, p);
    }
    eai
}

/// Fit plane 1 to every channel except `separate_component` and plane 2 to the remaining channel.
pub fn compute_endpoints_and_ideal_weights_2_planes(
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    partition: &PartitionInfo,
    partition_count: usize,
    separate_component: usize,
) -> (EndpointsAndWeights, EndpointsAndWeights) {
    let mut plane1 = EndpointsAndWeights::new(partition_count);
    let mut plane2 = EndpointsAndWeights::new(partition_count);

    let mut channels1 = [true; 4];
    channels1[separate_component] = false;
    let mut channels2 = [false; 4];
    channels2[separate_component] = true;

    for p in 0..partition_count {
        let texels = partition.texels(p);
        fit_partition_line(block, ewb, texels, channels1, &mut plane1, p);
        fit_partition_line(block, ewb, texels, channels2, &mut plane2, p);

        // Both planes share the same endpoints.
        let c = separate_component;
        plane1.endpoints.endpt0[p][c] = plane2.endpoints.endpt0[p][c];
        plane1.endpoints.endpt1[p][c] = plane2.endpoints.endpt1[p][c];
        for c in (0..4).filter(|c| *c != separate_component) {
            plane2.endpoints.endpt0[p][c] = plane1.endpoints.endpt0[p][c];
            plane2.endpoints.endpt1[p][c] = plane1.endpoints.endpt1[p][c];
        }
    }
    (plane1, plane2)
}

/// Estimate the weights for a reduced weight grid from the ideal per texel weights.
pub fn compute_ideal_weights_for_decimation_table(
    eai: &EndpointsAndWeights,
    table: &DecimationTable,
) -> [f32; MAX_WEIGHTS_PER_BLOCK] {
    let mut weights = [0.0; MAX_WEIGHTS_PER_BLOCK];

    for (w, (texels, factors)) in table
        .weight_texels
        .iter()
        .zip(&table.weight_texel_factors)
        .enumerate()
    {
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for (t, f) in texels.iter().zip(factors) {
            let scale = f * eai.weight_error_scale[*t as usize].max(1e-10);
            sum += eai.weights[*t as usize] * scale;
            weight_sum += scale;
        }
        weights[w] = if weight_sum > 0.0 { sum / weight_sum } else { 0.0 };
    }

    if table.weight_count == table.texel_count {
        return weights;
    }

    // A single Jacobi step towards the least squares solution of the infill.
    let mut refined = weights;
    for (w, (texels, factors)) in table
        .weight_texels
        .iter()
        .zip(&table.weight_texel_factors)
        .enumerate()
    {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (t, f) in texels.iter().zip(factors) {
            let t = *t as usize;
            let scale = eai.weight_error_scale[t].max(1e-10);
            let error = eai.weights[t] - table.texel_weight_f32(t, &weights);
            numerator += f * scale * error;
            denominator += f * f * scale;
        }
        if denominator > 0.0 {
            refined[w] = (weights[w] + numerator / denominator).clamp(0.0, 1.0);
        }
    }
    refined
}

/// Quantize each weight to the nearest rank at `weight_level`.
pub fn compute_ideal_quantized_weights_for_decimation_table(
    weights: &[f32],
    weight_level: usize,
) -> [u8; MAX_WEIGHTS_PER_BLOCK] {
    let mut ranks = [0; MAX_WEIGHTS_PER_BLOCK];
    for (rank, w) in ranks.iter_mut().zip(weights) {
        *rank = quantize_weight(weight_level, *w);
    }
    ranks
}

pub fn unquantized_weights(ranks: &[u8], weight_level: usize) -> [f32; MAX_WEIGHTS_PER_BLOCK] {
    let mut weights = [0.0; MAX_WEIGHTS_PER_BLOCK];
    for (w, r) in weights.iter_mut().zip(ranks) {
        *w = unquantize_weight(weight_level, *r) as f32 / 64.0;
    }
    weights
}

/// The scaled squared error between the ideal texel weights and the infilled `weights`.
pub fn compute_error_of_weight_set(
    eai: &EndpointsAndWeights,
    table: &DecimationTable,
    weights: &[f32],
) -> f32 {
    (0..table.texel_count)
        .map(|t| {
            let diff = table.texel_weight_f32(t, weights) - eai.weights[t];
            diff * diff * eai.weight_error_scale[t]
        })
        .sum()
}

/// Endpoints refit to quantized weights along with derived representative colors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RecomputedColors {
    pub endpoints: Endpoints,
    /// The second endpoint with a scale factor from `0.0` to `1.0` for the first endpoint.
    pub rgbs: [[f32; 4]; 4],
    /// The second endpoint with an offset subtracted for the first endpoint.
    pub rgbo: [[f32; 4]; 4],
}

/// Least squares refit of the endpoints given the final unquantized weights.
#[allow(clippy::too_many_arguments)]
pub fn recompute_ideal_colors(
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    partition: &PartitionInfo,
    partition_count: usize,
    table: &DecimationTable,
    weight_level: usize,
    plane1_weights: &[u8],
    plane2_weights: Option<(&[u8], usize)>,
) -> RecomputedColors {
    let plane1 = unquantized_weights(plane1_weights, weight_level);
    let plane2 = plane2_weights.map(|(w, c)| (unquantized_weights(w, weight_level), c));

    let mut colors = RecomputedColors {
        endpoints: Endpoints {
            partition_count,
            ..Default::default()
        },
        rgbs: [[0.0; 4]; 4],
        rgbo: [[0.0; 4]; 4],
    };

    for p in 0..partition_count {
        let texels = partition.texels(p);
        let mut e0 = [0.0; 4];
        let mut e1 = [0.0; 4];
        for c in 0..4 {
            let weights = match &plane2 {
                Some((w, component)) if *component == c => w,
                _ => &plane1,
            };

            let (mut s00, mut s01, mut s11) = (0.0f64, 0.0f64, 0.0f64);
            let (mut r0, mut r1) = (0.0f64, 0.0f64);
            let (mut sum, mut weight_sum) = (0.0f64, 0.0f64);
            for t in texels {
                let t = *t as usize;
                let tw = ewb.error_weights[t][c].max(1e-6) as f64;
                let w = table.texel_weight_f32(t, weights) as f64;
                let x = block.work_data[t][c] as f64;
                s00 += tw * (1.0 - w) * (1.0 - w);
                s01 += tw * (1.0 - w) * w;
                s11 += tw * w * w;
                r0 += tw * (1.0 - w) * x;
                r1 += tw * w * x;
                sum += tw * x;
                weight_sum += tw;
            }

            let det = s00 * s11 - s01 * s01;
            let (a, b) = if det.abs() > 1e-10 * (s00 * s11).max(1e-30) {
                ((r0 * s11 - r1 * s01) / det, (r1 * s00 - r0 * s01) / det)
            } else {
                let mean = if weight_sum > 0.0 { sum / weight_sum } else { 0.0 };
                (mean, mean)
            };
            e0[c] = (a as f32).clamp(0.0, 65535.0);
            e1[c] = (b as f32).clamp(0.0, 65535.0);
        }

        let (rgbs, rgbo) = representative_colors(e0, e1);
        colors.endpoints.endpt0[p] = e0;
        colors.endpoints.endpt1[p] = e1;
        colors.rgbs[p] = rgbs;
        colors.rgbo[p] = rgbo;
    }
    colors
}

/// The RGB scale and HDR RGB offset representatives for a pair of endpoints.
///
/// Both use the second endpoint's color with a scale or offset for the first endpoint.
pub fn representative_colors(e0: [f32; 4], e1: [f32; 4]) -> ([f32; 4], [f32; 4]) {
    let rgb0 = [e0[0], e0[1], e0[2], 0.0];
    let rgb1 = [e1[0], e1[1], e1[2], 0.0];
    let scale = (dot(rgb0, rgb1) / dot(rgb1, rgb1).max(1e-10)).clamp(0.0, 1.0);
    let offset = ((e1[0] - e0[0]) + (e1[1] - e0[1]) + (e1[2] - e0[2])) / 3.0;
    (
        [e1[0], e1[1], e1[2], scale],
        [e1[0], e1[1], e1[2], offset.max(0.0)],
    )
}
