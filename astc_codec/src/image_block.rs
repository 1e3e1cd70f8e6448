use sf16_rs::{f16_to_f32, f32_to_f16, RoundingMode};

use crate::{block_size::MAX_TEXELS_PER_BLOCK, compress::CompressionParams, lns::float_to_lns};

/// The texels of a single block in their original and working representations.
///
/// Working values are in the range `0.0` to `65535.0`.
/// Channels flagged as LNS store the logarithmic encoding instead of UNORM16.
#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub xdim: usize,
    pub ydim: usize,
    pub texel_count: usize,
    /// The source values as floats, normalized to `0.0` to `1.0` for LDR data.
    pub orig_data: [[f32; 4]; MAX_TEXELS_PER_BLOCK],
    pub work_data: [[f32; 4]; MAX_TEXELS_PER_BLOCK],
    pub rgb_lns: [bool; MAX_TEXELS_PER_BLOCK],
    pub alpha_lns: [bool; MAX_TEXELS_PER_BLOCK],
    pub nan_texel: [bool; MAX_TEXELS_PER_BLOCK],
    pub data_min: [f32; 4],
    pub data_max: [f32; 4],
    /// `true` if red, green, and blue are equal for every texel.
    pub grayscale: bool,
}

impl ImageBlock {
    pub fn new(xdim: usize, ydim: usize) -> Self {
        debug_assert!(xdim * ydim <= MAX_TEXELS_PER_BLOCK);
        Self {
            xdim,
            ydim,
            texel_count: xdim * ydim,
            orig_data: [[0.0; 4]; MAX_TEXELS_PER_BLOCK],
            work_data: [[0.0; 4]; MAX_TEXELS_PER_BLOCK],
            rgb_lns: [false; MAX_TEXELS_PER_BLOCK],
            alpha_lns: [false; MAX_TEXELS_PER_BLOCK],
            nan_texel: [false; MAX_TEXELS_PER_BLOCK],
            data_min: [0.0; 4],
            data_max: [0.0; 4],
            grayscale: true,
        }
    }

    /// Load the block at pixel `(x, y)` from tightly packed RGBA8 data.
    ///
    /// Texels outside the image repeat the closest edge pixel.
    pub fn from_rgba8(
        data: &[u8],
        width: usize,
        height: usize,
        x: usize,
        y: usize,
        xdim: usize,
        ydim: usize,
    ) -> Self {
        let mut block = Self::new(xdim, ydim);
        for ty in 0..ydim {
            for tx in 0..xdim {
                let px = (x + tx).min(width - 1);
                let py = (y + ty).min(height - 1);
                let offset = (py * width + px) * 4;
                let texel = ty * xdim + tx;
                for c in 0..4 {
                    let value = data[offset + c];
                    block.orig_data[texel][c] = value as f32 / 255.0;
                    block.work_data[texel][c] = value as f32 * 257.0;
                }
            }
        }
        block.update_statistics();
        block
    }

    /// Load the block at pixel `(x, y)` from tightly packed RGBA float data.
    ///
    /// LNS channels keep the full range of the input after rounding to binary16.
    /// Other channels are clamped to `0.0` to `1.0`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_rgbaf32(
        data: &[f32],
        width: usize,
        height: usize,
        x: usize,
        y: usize,
        xdim: usize,
        ydim: usize,
        rgb_lns: bool,
        alpha_lns: bool,
    ) -> Self {
        let mut block = Self::new(xdim, ydim);
        for ty in 0..ydim {
            for tx in 0..xdim {
                let px = (x + tx).min(width - 1);
                let py = (y + ty).min(height - 1);
                let offset = (py * width + px) * 4;
                let texel = ty * xdim + tx;

                block.rgb_lns[texel] = rgb_lns;
                block.alpha_lns[texel] = alpha_lns;
                for c in 0..4 {
                    let value = data[offset + c];
                    let lns = if c < 3 { rgb_lns } else { alpha_lns };
                    if value.is_nan() {
                        block.nan_texel[texel] = true;
                        continue;
                    }
                    block.orig_data[texel][c] = value;
                    block.work_data[texel][c] = if lns {
                        let half = f32_to_f16(value.max(0.0), RoundingMode::NearestEven);
                        float_to_lns(f16_to_f32(half))
                    } else {
                        value.clamp(0.0, 1.0) * 65535.0
                    };
                }
            }
        }
        block.update_statistics();
        block
    }

    pub fn update_statistics(&mut self) {
        let mut data_min = [f32::MAX; 4];
        let mut data_max = [f32::MIN; 4];
        let mut grayscale = true;
        for texel in &self.work_data[..self.texel_count] {
            for c in 0..4 {
                data_min[c] = data_min[c].min(texel[c]);
                data_max[c] = data_max[c].max(texel[c]);
            }
            if texel[0] != texel[1] || texel[0] != texel[2] {
                grayscale = false;
            }
        }
        self.data_min = data_min;
        self.data_max = data_max;
        self.grayscale = grayscale;
    }

    pub fn is_constant(&self) -> bool {
        self.data_min == self.data_max && !self.has_nan()
    }

    pub fn uses_alpha(&self) -> bool {
        self.data_min[3] != self.data_max[3]
    }

    pub fn has_nan(&self) -> bool {
        self.nan_texel[..self.texel_count].iter().any(|n| *n)
    }

    /// `true` if the color channels of every texel are LNS encoded.
    pub fn is_rgb_lns(&self) -> bool {
        self.rgb_lns[..self.texel_count].iter().all(|l| *l)
    }

    pub fn is_alpha_lns(&self) -> bool {
        self.alpha_lns[..self.texel_count].iter().all(|l| *l)
    }

    pub fn average(&self) -> [f32; 4] {
        let mut sum = [0.0; 4];
        for texel in &self.work_data[..self.texel_count] {
            for c in 0..4 {
                sum[c] += texel[c];
            }
        }
        sum.map(|s| s / self.texel_count as f32)
    }
}

/// Per texel and per channel factors for the weighted squared error.
#[derive(Debug, Clone)]
pub struct ErrorWeightBlock {
    pub error_weights: [[f32; 4]; MAX_TEXELS_PER_BLOCK],
    /// The average of [error_weights](#structfield.error_weights) for each texel.
    pub texel_weights: [f32; MAX_TEXELS_PER_BLOCK],
    pub error_weight_sum: f32,
}

impl ErrorWeightBlock {
    pub fn new(block: &ImageBlock, params: &CompressionParams) -> Self {
        let mut error_weights = [[0.0; 4]; MAX_TEXELS_PER_BLOCK];
        let mut texel_weights = [0.0; MAX_TEXELS_PER_BLOCK];
        for i in 0..block.texel_count {
            // NaN texels are decoded as NaN, so they never contribute error.
            if !block.nan_texel[i] {
                error_weights[i] = params.channel_weights;
                texel_weights[i] = params.channel_weights.iter().sum::<f32>() / 4.0;
            }
        }
        Self {
            error_weights,
            texel_weights,
            error_weight_sum: texel_weights[..block.texel_count].iter().sum(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BlockStatistics {
    /// The smallest absolute correlation between any two channels.
    pub lowest_correlation: f32,
    pub is_normal_map: bool,
}

pub fn prepare_block_statistics(block: &ImageBlock, ewb: &ErrorWeightBlock) -> BlockStatistics {
    let count = block.texel_count;

    // Accumulate in f64 to avoid cancellation with values up to 65535.
    let mut weight_sum = 0.0f64;
    let mut sums = [0.0f64; 4];
    let mut products = [[0.0f64; 4]; 4];
    for i in 0..count {
        let weight = ewb.texel_weights[i] as f64;
        let texel = block.work_data[i].map(|v| v as f64);
        weight_sum += weight;
        for a in 0..4 {
            sums[a] += texel[a] * weight;
            for b in 0..4 {
                products[a][b] += texel[a] * texel[b] * weight;
            }
        }
    }

    let inv = 1.0 / weight_sum.max(1e-7);
    let mut covariance = [[0.0f64; 4]; 4];
    for a in 0..4 {
        for b in 0..4 {
            covariance[a][b] = products[a][b] * inv - sums[a] * sums[b] * inv * inv;
        }
    }

    let mut lowest_correlation = 1.0f32;
    for a in 0..4 {
        for b in a + 1..4 {
            let variance = (covariance[a][a] * covariance[b][b]).max(1e-30);
            let correlation = covariance[a][b] / variance.sqrt();
            lowest_correlation = lowest_correlation.min(correlation.abs() as f32);
        }
    }

    // Normal maps store unit vectors with channels remapped from -1.0 to 1.0.
    let deviation: f32 = block.work_data[..count]
        .iter()
        .map(|t| {
            let v = [0, 1, 2].map(|c| t[c] * (2.0 / 65535.0) - 1.0);
            (v[0] * v[0] + v[1] * v[1] + v[2] * v[2] - 1.0).abs()
        })
        .sum();
    let is_normal_map = deviation / (count as f32) < 0.2;

    BlockStatistics {
        lowest_correlation,
        is_normal_map,
    }
}

/// The weighted squared error between the working values of two blocks.
pub fn compute_imageblock_difference(
    block: &ImageBlock,
    decoded: &ImageBlock,
    ewb: &ErrorWeightBlock,
) -> f32 {
    (0..block.texel_count)
        .map(|i| {
            (0..4)
                .map(|c| {
                    let diff = block.work_data[i][c] - decoded.work_data[i][c];
                    diff * diff * ewb.error_weights[i][c]
                })
                .sum::<f32>()
        })
        .sum()
}
