use crate::{
    block_size::{decode_block_mode, DecodedBlockMode, MAX_WEIGHTS_PER_BLOCK},
    color_format::EndpointPayload,
};

/// The kind of content stored in a [SymbolicCompressedBlock].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum BlockType {
    /// An invalid candidate or a physical block with an illegal encoding.
    #[default]
    Error,
    /// A single UNORM16 color for every texel.
    ConstantUnorm16([u16; 4]),
    /// A single FP16 color for every texel.
    ConstantF16([u16; 4]),
    /// Interpolated endpoints using the 11-bit block mode.
    Normal { block_mode: u16 },
}

/// An unpacked compressed block with quantized values stored as ranks.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SymbolicCompressedBlock {
    pub block_type: BlockType,
    pub partition_count: usize,
    pub partition_index: u16,
    pub endpoints: [EndpointPayload; 4],
    /// `true` if every partition uses the same format stored as a single CEM.
    pub color_formats_matched: bool,
    pub color_quantization_level: usize,
    pub plane1_weights: [u8; MAX_WEIGHTS_PER_BLOCK],
    pub plane2_weights: [u8; MAX_WEIGHTS_PER_BLOCK],
    /// The channel using the second plane of weights for dual plane blocks.
    pub plane2_color_component: usize,
}

impl Default for SymbolicCompressedBlock {
    fn default() -> Self {
        Self {
            block_type: BlockType::Error,
            partition_count: 1,
            partition_index: 0,
            endpoints: [EndpointPayload::default(); 4],
            color_formats_matched: false,
            color_quantization_level: 0,
            plane1_weights: [0; MAX_WEIGHTS_PER_BLOCK],
            plane2_weights: [0; MAX_WEIGHTS_PER_BLOCK],
            plane2_color_component: 0,
        }
    }
}

impl SymbolicCompressedBlock {
    pub fn error() -> Self {
        Self::default()
    }

    pub fn constant_unorm16(color: [u16; 4]) -> Self {
        Self {
            block_type: BlockType::ConstantUnorm16(color),
            ..Default::default()
        }
    }

    pub fn constant_f16(color: [u16; 4]) -> Self {
        Self {
            block_type: BlockType::ConstantF16(color),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.block_type == BlockType::Error
    }

    /// The weight grid and weight quantization for normal blocks.
    pub fn block_mode(&self) -> Option<DecodedBlockMode> {
        match self.block_type {
            BlockType::Normal { block_mode } => decode_block_mode(block_mode),
            _ => None,
        }
    }

    pub fn is_dual_plane(&self) -> bool {
        self.block_mode().is_some_and(|m| m.dual_plane)
    }

    pub fn endpoints(&self) -> &[EndpointPayload] {
        &self.endpoints[..self.partition_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_error() {
        let block = SymbolicCompressedBlock::default();
        assert!(block.is_error());
        assert_eq!(None, block.block_mode());
        assert!(!block.is_dual_plane());
        assert_eq!(1, block.endpoints().len());
    }

    #[test]
    fn constant_blocks() {
        let block = SymbolicCompressedBlock::constant_unorm16([1, 2, 3, 4]);
        assert!(matches!(block.block_type, BlockType::ConstantUnorm16([1, 2, 3, 4])));
        assert!(!block.is_error());
        assert_eq!(None, block.block_mode());

        let block = SymbolicCompressedBlock::constant_f16([0x3C00; 4]);
        assert!(matches!(block.block_type, BlockType::ConstantF16(_)));
    }

    #[test]
    fn dual_plane_from_block_mode() {
        let block = SymbolicCompressedBlock {
            block_type: BlockType::Normal { block_mode: 1471 },
            ..Default::default()
        };
        assert!(block.is_dual_plane());
        let mode = block.block_mode().unwrap();
        assert_eq!((3, 3), (mode.grid_x, mode.grid_y));

        let block = SymbolicCompressedBlock {
            block_type: BlockType::Normal { block_mode: 578 },
            ..Default::default()
        };
        assert!(!block.is_dual_plane());
    }
}
