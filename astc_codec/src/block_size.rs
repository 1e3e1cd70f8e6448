use crate::{
    partition::PartitionTable,
    quantization::{ise_bit_count, WEIGHT_LEVEL_COUNT},
};

pub const MAX_TEXELS_PER_BLOCK: usize = 144;
pub const MAX_WEIGHTS_PER_BLOCK: usize = 64;

const MIN_WEIGHT_BITS: usize = 24;
const MAX_WEIGHT_BITS: usize = 96;

/// The weight grid and quantization described by an 11-bit block mode.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DecodedBlockMode {
    pub grid_x: usize,
    pub grid_y: usize,
    pub dual_plane: bool,
    pub weight_level: usize,
}

impl DecodedBlockMode {
    pub fn weight_count(&self) -> usize {
        self.grid_x * self.grid_y * if self.dual_plane { 2 } else { 1 }
    }

    pub fn weight_bits(&self) -> usize {
        ise_bit_count(self.weight_count(), self.weight_level)
    }
}

/// Decode the 2D block mode bits or [None] for reserved and illegal encodings.
pub fn decode_block_mode(mode: u16) -> Option<DecodedBlockMode> {
    let mode = mode as usize;
    let base = (mode >> 4) & 1;
    let high_precision = (mode >> 9) & 1;
    let mut dual_plane = (mode >> 10) & 1;
    let a = (mode >> 5) & 3;

    let (quant_mode, grid_x, grid_y, high_precision) = if mode & 3 != 0 {
        let quant_mode = base | ((mode & 3) << 1);
        let b = (mode >> 7) & 3;
        let (x, y) = match (mode >> 2) & 3 {
            0 => (b + 4, a + 2),
            1 => (b + 8, a + 2),
            2 => (a + 2, b + 8),
            _ => {
                let b = b & 1;
                if mode & 0x100 != 0 {
                    (b + 2, a + 2)
                } else {
                    (a + 2, b + 6)
                }
            }
        };
        (quant_mode, x, y, high_precision)
    } else {
        let quant_mode = ((mode >> 1) & 6) | base;
        if (mode >> 2) & 3 == 0 {
            return None;
        }
        let b = (mode >> 9) & 3;
        match (mode >> 7) & 3 {
            0 => (quant_mode, 12, a + 2, high_precision),
            1 => (quant_mode, a + 2, 12, high_precision),
            2 => {
                // The dual plane and precision bits are reused for the grid height.
                dual_plane = 0;
                (quant_mode, a + 6, b + 6, 0)
            }
            _ => match (mode >> 5) & 3 {
                0 => (quant_mode, 6, 10, high_precision),
                1 => (quant_mode, 10, 6, high_precision),
                _ => return None,
            },
        }
    };

    let decoded = DecodedBlockMode {
        grid_x,
        grid_y,
        dual_plane: dual_plane != 0,
        weight_level: quant_mode - 2 + 6 * high_precision,
    };
    if decoded.weight_count() > MAX_WEIGHTS_PER_BLOCK {
        return None;
    }
    let bits = decoded.weight_bits();
    if !(MIN_WEIGHT_BITS..=MAX_WEIGHT_BITS).contains(&bits) {
        return None;
    }
    Some(decoded)
}

/// The bilinear infill from a grid of weights to the texels of a block.
#[derive(Debug, Clone)]
pub struct DecimationTable {
    pub grid_x: usize,
    pub grid_y: usize,
    pub texel_count: usize,
    pub weight_count: usize,
    /// Up to 4 weight indices for each texel.
    pub texel_weights: Vec<[u8; 4]>,
    /// Integer factors for [texel_weights](#structfield.texel_weights) that sum to 16.
    pub texel_weight_factors: Vec<[u8; 4]>,
    /// The texels influenced by each weight.
    pub weight_texels: Vec<Vec<u8>>,
    /// The factor of each texel in [weight_texels](#structfield.weight_texels) from `0.0` to `1.0`.
    pub weight_texel_factors: Vec<Vec<f32>>,
}

impl DecimationTable {
    pub fn new(xdim: usize, ydim: usize, grid_x: usize, grid_y: usize) -> Self {
        let texel_count = xdim * ydim;
        let weight_count = grid_x * grid_y;

        let x_scale = (1024 + xdim / 2) / (xdim - 1);
        let y_scale = (1024 + ydim / 2) / (ydim - 1);

        let mut texel_weights = vec![[0u8; 4]; texel_count];
        let mut texel_weight_factors = vec![[0u8; 4]; texel_count];
        let mut weight_texels = vec![Vec::new(); weight_count];
        let mut weight_texel_factors = vec![Vec::new(); weight_count];

        for y in 0..ydim {
            for x in 0..xdim {
                let texel = y * xdim + x;

                let grid_s = (x_scale * x * (grid_x - 1) + 32) >> 6;
                let grid_t = (y_scale * y * (grid_y - 1) + 32) >> 6;
                let (js, fs) = (grid_s >> 4, grid_s & 0xF);
                let (jt, ft) = (grid_t >> 4, grid_t & 0xF);

                let w11 = (fs * ft + 8) >> 4;
                let factors = [16 + w11 - fs - ft, fs - w11, ft - w11, w11];
                let base = js + jt * grid_x;
                let indices = [base, base + 1, base + grid_x, base + grid_x + 1];

                let mut slot = 0;
                for (index, factor) in indices.into_iter().zip(factors) {
                    if factor == 0 || index >= weight_count {
                        continue;
                    }
                    texel_weights[texel][slot] = index as u8;
                    texel_weight_factors[texel][slot] = factor as u8;
                    weight_texels[index].push(texel as u8);
                    weight_texel_factors[index].push(factor as f32 / 16.0);
                    slot += 1;
                }
            }
        }

        Self {
            grid_x,
            grid_y,
            texel_count,
            weight_count,
            texel_weights,
            texel_weight_factors,
            weight_texels,
            weight_texel_factors,
        }
    }

    /// The infilled integer weight for `texel` from unquantized weights in the range `0` to `64`.
    pub fn texel_weight_int(&self, texel: usize, weights: &[u8]) -> u32 {
        let sum: u32 = self.texel_weights[texel]
            .iter()
            .zip(self.texel_weight_factors[texel])
            .map(|(i, f)| weights[*i as usize] as u32 * f as u32)
            .sum();
        (sum + 8) >> 4
    }

    /// The infilled weight for `texel` from float weights.
    pub fn texel_weight_f32(&self, texel: usize, weights: &[f32]) -> f32 {
        self.texel_weights[texel]
            .iter()
            .zip(self.texel_weight_factors[texel])
            .map(|(i, f)| weights[*i as usize] * f as f32)
            .sum::<f32>()
            / 16.0
    }
}

/// A block mode that is legal for a particular block footprint.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BlockMode {
    /// The 11-bit block mode stored in the physical block.
    pub mode_index: u16,
    /// The index into [BlockSizeDescriptor::decimation_tables].
    pub decimation: usize,
    pub weight_level: usize,
    pub dual_plane: bool,
    pub weight_bits: usize,
    /// The precedence of the weight grid from `0.0` for the densest grid to `1.0`.
    pub percentile: f32,
}

/// Precomputed tables for all weight grids, block modes, and partitionings of a block footprint.
#[derive(Debug)]
pub struct BlockSizeDescriptor {
    pub xdim: usize,
    pub ydim: usize,
    pub texel_count: usize,
    pub decimation_tables: Vec<DecimationTable>,
    pub decimation_percentiles: Vec<f32>,
    pub block_modes: Vec<BlockMode>,
    mode_lookup: Vec<Option<u16>>,
    partition_tables: Vec<PartitionTable>,
}

impl BlockSizeDescriptor {
    pub fn new(xdim: usize, ydim: usize) -> Self {
        let mut decimation_tables: Vec<DecimationTable> = Vec::new();
        let mut modes = Vec::new();

        for mode in 0..2048u16 {
            let Some(decoded) = decode_block_mode(mode) else {
                continue;
            };
            // Weight grids larger than the block are illegal.
            if decoded.grid_x > xdim || decoded.grid_y > ydim {
                continue;
            }

            let decimation = match decimation_tables
                .iter()
                .position(|d| d.grid_x == decoded.grid_x && d.grid_y == decoded.grid_y)
            {
                Some(i) => i,
                None => {
                    decimation_tables.push(DecimationTable::new(
                        xdim,
                        ydim,
                        decoded.grid_x,
                        decoded.grid_y,
                    ));
                    decimation_tables.len() - 1
                }
            };
            modes.push((mode, decimation, decoded));
        }

        let max_area = decimation_tables
            .iter()
            .map(|d| d.weight_count)
            .max()
            .unwrap_or(1);
        let decimation_percentiles: Vec<f32> = decimation_tables
            .iter()
            .map(|d| 1.0 - d.weight_count as f32 / max_area as f32)
            .collect();

        let mut mode_lookup = vec![None; 2048];
        let block_modes = modes
            .into_iter()
            .enumerate()
            .map(|(i, (mode, decimation, decoded))| {
                mode_lookup[mode as usize] = Some(i as u16);
                BlockMode {
                    mode_index: mode,
                    decimation,
                    weight_level: decoded.weight_level,
                    dual_plane: decoded.dual_plane,
                    weight_bits: decoded.weight_bits(),
                    percentile: decimation_percentiles[decimation],
                }
            })
            .collect();

        let partition_tables = (1..=4)
            .map(|count| PartitionTable::new(xdim, ydim, count))
            .collect();

        Self {
            xdim,
            ydim,
            texel_count: xdim * ydim,
            decimation_tables,
            decimation_percentiles,
            block_modes,
            mode_lookup,
            partition_tables,
        }
    }

    /// The block mode for the 11-bit `mode` or [None] if it is not legal for this footprint.
    pub fn block_mode(&self, mode: u16) -> Option<&BlockMode> {
        let index = (*self.mode_lookup.get(mode as usize)?)?;
        self.block_modes.get(index as usize)
    }

    /// Find the first 11-bit block mode with the given weight grid and quantization.
    pub fn block_mode_index(
        &self,
        grid_x: usize,
        grid_y: usize,
        dual_plane: bool,
        weight_level: usize,
    ) -> Option<u16> {
        debug_assert!(weight_level < WEIGHT_LEVEL_COUNT);
        self.block_modes
            .iter()
            .find(|m| {
                let d = &self.decimation_tables[m.decimation];
                d.grid_x == grid_x
                    && d.grid_y == grid_y
                    && m.dual_plane == dual_plane
                    && m.weight_level == weight_level
            })
            .map(|m| m.mode_index)
    }

    pub fn partition_table(&self, partition_count: usize) -> &PartitionTable {
        &self.partition_tables[partition_count - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_modes() {
        assert_eq!(
            Some(DecodedBlockMode {
                grid_x: 4,
                grid_y: 4,
                dual_plane: false,
                weight_level: 8
            }),
            decode_block_mode(578)
        );
        assert_eq!(
            Some(DecodedBlockMode {
                grid_x: 3,
                grid_y: 3,
                dual_plane: true,
                weight_level: 5
            }),
            decode_block_mode(1471)
        );
    }

    #[test]
    fn decode_reserved_modes() {
        // The low bits are zero and bits 2 and 3 are also zero.
        assert_eq!(None, decode_block_mode(0));
        assert_eq!(None, decode_block_mode(0x1C0 | 0x40));
        // 12x5 weights need more than 96 bits.
        assert_eq!(None, decode_block_mode(0x6C));
    }

    #[test]
    fn decimation_identity() {
        let table = DecimationTable::new(4, 4, 4, 4);
        for texel in 0..16 {
            assert_eq!([texel as u8, 0, 0, 0], table.texel_weights[texel]);
            assert_eq!([16, 0, 0, 0], table.texel_weight_factors[texel]);
        }
    }

    #[test]
    fn decimation_factors_sum_to_16() {
        for (xdim, ydim, gx, gy) in [(6, 6, 4, 4), (8, 5, 5, 3), (12, 12, 6, 5), (5, 5, 2, 2)] {
            let table = DecimationTable::new(xdim, ydim, gx, gy);
            for factors in &table.texel_weight_factors {
                assert_eq!(16, factors.iter().map(|f| *f as u32).sum::<u32>());
            }
            let texel_refs: usize = table.weight_texels.iter().map(|t| t.len()).sum();
            let weight_refs: usize = table
                .texel_weight_factors
                .iter()
                .map(|f| f.iter().filter(|f| **f > 0).count())
                .sum();
            assert_eq!(weight_refs, texel_refs);
        }
    }

    #[test]
    fn infill_corners() {
        let table = DecimationTable::new(8, 8, 3, 3);
        let weights: Vec<u8> = (0..9).map(|i| i * 8).collect();
        assert_eq!(0, table.texel_weight_int(0, &weights));
        assert_eq!(64, table.texel_weight_int(63, &weights));
    }

    #[test]
    fn descriptor_4x4() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        assert_eq!(16, bsd.texel_count);
        assert!(bsd
            .decimation_tables
            .iter()
            .all(|d| d.grid_x <= 4 && d.grid_y <= 4));

        let mode = bsd.block_mode(578).unwrap();
        assert_eq!(0.0, mode.percentile);
        assert_eq!(8, mode.weight_level);
        assert!(!mode.dual_plane);

        assert_eq!(None, bsd.block_mode(0));
        assert_eq!(Some(578), bsd.block_mode_index(4, 4, false, 8));
    }

    #[test]
    fn descriptor_rejects_large_grids() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        // A 6x10 weight grid only fits larger footprints.
        let mode = (0..2048u16)
            .find(|m| {
                decode_block_mode(*m)
                    .map(|d| d.grid_x == 6 && d.grid_y == 10)
                    .unwrap_or_default()
            })
            .unwrap();
        assert_eq!(None, bsd.block_mode(mode));
        assert!(BlockSizeDescriptor::new(6, 10).block_mode(mode).is_some());
    }
}
