use std::collections::HashSet;

use crate::{
    block_size::{BlockSizeDescriptor, MAX_TEXELS_PER_BLOCK},
    ideal_endpoints::fit_line,
    image_block::{ErrorWeightBlock, ImageBlock},
};

pub const PARTITION_INDEX_COUNT: usize = 1024;

/// Blocks with fewer texels than this use doubled coordinates for the partition hash.
const SMALL_BLOCK_TEXELS: usize = 31;

fn hash52(seed: u32) -> u32 {
    let mut p = seed;
    p ^= p >> 15;
    p = p.wrapping_sub(p << 17);
    p = p.wrapping_add(p << 7);
    p = p.wrapping_add(p << 4);
    p ^= p >> 5;
    p = p.wrapping_add(p << 16);
    p ^= p >> 7;
    p ^= p >> 3;
    p ^= p << 6;
    p ^= p >> 17;
    p
}

/// The partition from `0` to `partition_count - 1` for the texel at `(x, y, z)`.
pub fn select_partition(
    seed: u32,
    x: u32,
    y: u32,
    z: u32,
    partition_count: u32,
    small_block: bool,
) -> u8 {
    let (x, y, z) = if small_block {
        (x << 1, y << 1, z << 1)
    } else {
        (x, y, z)
    };

    let seed = seed + (partition_count - 1) * 1024;
    let rnum = hash52(seed);

    let mut seeds = [
        rnum,
        rnum >> 4,
        rnum >> 8,
        rnum >> 12,
        rnum >> 16,
        rnum >> 20,
        rnum >> 24,
        rnum >> 28,
        rnum >> 18,
        rnum >> 22,
        rnum >> 26,
        (rnum >> 30) | (rnum << 2),
    ]
    .map(|s| (s & 0xF) * (s & 0xF));

    let (sh1, sh2) = if seed & 1 != 0 {
        (
            if seed & 2 != 0 { 4 } else { 5 },
            if partition_count == 3 { 6 } else { 5 },
        )
    } else {
        (
            if partition_count == 3 { 6 } else { 5 },
            if seed & 2 != 0 { 4 } else { 5 },
        )
    };
    let sh3 = if seed & 0x10 != 0 { sh1 } else { sh2 };

    for (i, s) in seeds.iter_mut().enumerate() {
        *s >>= match i {
            0..=7 if i % 2 == 0 => sh1,
            0..=7 => sh2,
            _ => sh3,
        };
    }

    let line = |a: u32, b: u32, c: u32, offset: u32| {
        a.wrapping_mul(x)
            .wrapping_add(b.wrapping_mul(y))
            .wrapping_add(c.wrapping_mul(z))
            .wrapping_add(rnum >> offset)
            & 0x3F
    };
    let a = line(seeds[0], seeds[1], seeds[10], 14);
    let b = if partition_count > 1 {
        line(seeds[2], seeds[3], seeds[11], 10)
    } else {
        0
    };
    let c = if partition_count > 2 {
        line(seeds[4], seeds[5], seeds[8], 6)
    } else {
        0
    };
    let d = if partition_count > 3 {
        line(seeds[6], seeds[7], seeds[9], 2)
    } else {
        0
    };

    if a >= b && a >= c && a >= d {
        0
    } else if b >= c && b >= d {
        1
    } else if c >= d {
        2
    } else {
        3
    }
}

/// The assignment of texels to partitions for one partition index.
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    /// The number of partitions with at least one texel.
    pub partition_count: usize,
    pub partition_of_texel: [u8; MAX_TEXELS_PER_BLOCK],
    pub texel_counts: [usize; 4],
    pub texels_of_partition: [[u8; MAX_TEXELS_PER_BLOCK]; 4],
}

impl PartitionInfo {
    fn new(xdim: usize, ydim: usize, seed: u32, partition_count: usize) -> Self {
        let texel_count = xdim * ydim;
        let small_block = texel_count < SMALL_BLOCK_TEXELS;

        let mut info = Self {
            partition_count: 0,
            partition_of_texel: [0; MAX_TEXELS_PER_BLOCK],
            texel_counts: [0; 4],
            texels_of_partition: [[0; MAX_TEXELS_PER_BLOCK]; 4],
        };
        for y in 0..ydim {
            for x in 0..xdim {
                let texel = y * xdim + x;
                let partition = if partition_count == 1 {
                    0
                } else {
                    select_partition(
                        seed,
                        x as u32,
                        y as u32,
                        0,
                        partition_count as u32,
                        small_block,
                    )
                };
                let p = partition as usize;
                info.partition_of_texel[texel] = partition;
                info.texels_of_partition[p][info.texel_counts[p]] = texel as u8;
                info.texel_counts[p] += 1;
            }
        }
        info.partition_count = info.texel_counts.iter().filter(|c| **c > 0).count();
        info
    }

    pub fn texels(&self, partition: usize) -> &[u8] {
        &self.texels_of_partition[partition][..self.texel_counts[partition]]
    }

    // Relabel partitions in order of first use to detect equivalent indices.
    fn canonical_labels(&self, texel_count: usize) -> Vec<u8> {
        let mut mapping = [u8::MAX; 4];
        let mut next = 0;
        self.partition_of_texel[..texel_count]
            .iter()
            .map(|p| {
                let label = &mut mapping[*p as usize];
                if *label == u8::MAX {
                    *label = next;
                    next += 1;
                }
                *label
            })
            .collect()
    }
}

/// All partitionings of a block footprint for a single partition count.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    pub partition_count: usize,
    partitions: Vec<PartitionInfo>,
    /// Partition indices with no empty partitions and no equivalent lower index.
    pub usable_indices: Vec<u16>,
}

impl PartitionTable {
    pub fn new(xdim: usize, ydim: usize, partition_count: usize) -> Self {
        if partition_count == 1 {
            return Self {
                partition_count,
                partitions: vec![PartitionInfo::new(xdim, ydim, 0, 1)],
                usable_indices: vec![0],
            };
        }

        let partitions: Vec<_> = (0..PARTITION_INDEX_COUNT as u32)
            .map(|seed| PartitionInfo::new(xdim, ydim, seed, partition_count))
            .collect();

        let mut seen = HashSet::new();
        let usable_indices = partitions
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.partition_count == partition_count
                    && seen.insert(p.canonical_labels(xdim * ydim))
            })
            .map(|(i, _)| i as u16)
            .collect();

        Self {
            partition_count,
            partitions,
            usable_indices,
        }
    }

    /// The partitioning for `index`, which is always `0` for a single partition.
    pub fn get(&self, index: u16) -> &PartitionInfo {
        &self.partitions[index as usize % self.partitions.len()]
    }
}

/// The most promising partition indices for a single partition count.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct BestPartitionings {
    pub single_plane: Vec<u16>,
    /// Partition indices paired with the channel stored in the second weight plane.
    pub dual_plane: Vec<(u16, usize)>,
}

/// Rank up to `search_limit` partitionings by how well each partition fits a line.
pub fn find_best_partitionings(
    bsd: &BlockSizeDescriptor,
    block: &ImageBlock,
    ewb: &ErrorWeightBlock,
    partition_count: usize,
    search_limit: usize,
) -> BestPartitionings {
    const CANDIDATES: usize = 2;

    let table = bsd.partition_table(partition_count);

    let mut single = Vec::new();
    let mut dual = Vec::new();
    for index in table.usable_indices.iter().take(search_limit) {
        let info = table.get(*index);
        let residual = |channels: [bool; 4]| -> f32 {
            (0..partition_count)
                .map(|p| fit_line(block, ewb, info.texels(p), channels).residual)
                .sum()
        };

        single.push((residual([true; 4]), *index));
        for component in 0..4 {
            let mut channels = [true; 4];
            channels[component] = false;
            dual.push((residual(channels), (*index, component)));
        }
    }

    single.sort_by(|a, b| a.0.total_cmp(&b.0));
    dual.sort_by(|a, b| a.0.total_cmp(&b.0));

    BestPartitionings {
        single_plane: single.into_iter().take(CANDIDATES).map(|s| s.1).collect(),
        dual_plane: dual.into_iter().take(CANDIDATES).map(|d| d.1).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compress::CompressionParams, Quality};

    #[test]
    fn select_partition_in_range() {
        for count in 1..=4 {
            for seed in (0..1024).step_by(37) {
                for y in 0..12 {
                    for x in 0..12 {
                        assert!(select_partition(seed, x, y, 0, count, false) < count as u8);
                    }
                }
            }
        }
    }

    #[test]
    fn select_partition_single() {
        for seed in 0..1024 {
            assert_eq!(0, select_partition(seed, 3, 2, 0, 1, true));
        }
    }

    #[test]
    fn partition_table_single() {
        let table = PartitionTable::new(4, 4, 1);
        assert_eq!(vec![0], table.usable_indices);
        assert_eq!(16, table.get(0).texels(0).len());
        assert_eq!(1, table.get(0).partition_count);
    }

    #[test]
    fn partition_table_usable_indices() {
        for count in 2..=4 {
            let table = PartitionTable::new(6, 6, count);
            assert!(!table.usable_indices.is_empty());
            assert!(table.usable_indices.len() <= PARTITION_INDEX_COUNT);

            let mut seen = HashSet::new();
            for index in &table.usable_indices {
                let info = table.get(*index);
                assert_eq!(count, info.partition_count);
                assert_eq!(36, info.texel_counts.iter().sum::<usize>());
                assert!(seen.insert(info.canonical_labels(36)));
            }
        }
    }

    #[test]
    fn texel_lists_match_labels() {
        let table = PartitionTable::new(5, 4, 3);
        let info = table.get(table.usable_indices[0]);
        for p in 0..3 {
            for t in info.texels(p) {
                assert_eq!(p as u8, info.partition_of_texel[*t as usize]);
            }
        }
    }

    #[test]
    fn best_partitionings_split_colors() {
        // Two flat colors in a partition pattern are fit exactly by that partitioning.
        let bsd = BlockSizeDescriptor::new(4, 4);
        let table = bsd.partition_table(2);
        let expected = table.usable_indices[5];
        let info = table.get(expected);

        let data: Vec<u8> = (0..16)
            .flat_map(|t| {
                if info.partition_of_texel[t] == 0 {
                    [255, 0, 0, 255]
                } else {
                    [0, 40, 255, 255]
                }
            })
            .collect();
        let block = ImageBlock::from_rgba8(&data, 4, 4, 0, 0, 4, 4);
        let ewb = ErrorWeightBlock::new(&block, &CompressionParams::new(Quality::Normal, 16));

        let best = find_best_partitionings(&bsd, &block, &ewb, 2, 1024);
        assert_eq!(2, best.single_plane.len());
        assert_eq!(2, best.dual_plane.len());

        // Each partition is a single point, so the residual is zero.
        let residual: f32 = (0..2)
            .map(|p| fit_line(&block, &ewb, info.texels(p), [true; 4]).residual)
            .sum();
        assert_eq!(0.0, residual);
        let best_info = table.get(best.single_plane[0]);
        let best_residual: f32 = (0..2)
            .map(|p| fit_line(&block, &ewb, best_info.texels(p), [true; 4]).residual)
            .sum();
        assert_eq!(0.0, best_residual);
    }
}
