use strum::{EnumIter, FromRepr};

use crate::{color_format::DecodeMode, CompressSurfaceError, DecompressSurfaceError};

/// The size in bytes of a compressed block for every footprint.
pub const BLOCK_SIZE_IN_BYTES: usize = 16;

/// The 2D block dimensions in pixels supported by ASTC.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromRepr, EnumIter)]
pub enum BlockFootprint {
    B4x4,
    B5x4,
    B5x5,
    B6x5,
    B6x6,
    B8x5,
    B8x6,
    B8x8,
    B10x5,
    B10x6,
    B10x8,
    B10x10,
    B12x10,
    B12x12,
}

impl BlockFootprint {
    /// The width and height of the block in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            BlockFootprint::B4x4 => (4, 4),
            BlockFootprint::B5x4 => (5, 4),
            BlockFootprint::B5x5 => (5, 5),
            BlockFootprint::B6x5 => (6, 5),
            BlockFootprint::B6x6 => (6, 6),
            BlockFootprint::B8x5 => (8, 5),
            BlockFootprint::B8x6 => (8, 6),
            BlockFootprint::B8x8 => (8, 8),
            BlockFootprint::B10x5 => (10, 5),
            BlockFootprint::B10x6 => (10, 6),
            BlockFootprint::B10x8 => (10, 8),
            BlockFootprint::B10x10 => (10, 10),
            BlockFootprint::B12x10 => (12, 10),
            BlockFootprint::B12x12 => (12, 12),
        }
    }
}

/// An ASTC compressed surface.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Surface<T> {
    /// The width of the surface in pixels.
    pub width: u32,
    /// The height of the surface in pixels.
    pub height: u32,
    /// The depth of the surface in pixels.
    /// This must be `1` since only 2D footprints are supported.
    pub depth: u32,
    pub footprint: BlockFootprint,
    /// The profile used to interpret decoded endpoints.
    pub decode_mode: DecodeMode,
    /// Blocks of [BLOCK_SIZE_IN_BYTES] bytes ordered by row from the top left.
    ///
    /// Partial blocks on the right and bottom edges are included.
    pub data: T,
}

impl<T: AsRef<[u8]>> Surface<T> {
    /// The number of blocks in each dimension including partial blocks.
    pub fn blocks(&self) -> (usize, usize) {
        let (block_width, block_height) = self.footprint.dimensions();
        (
            (self.width as usize).div_ceil(block_width as usize),
            (self.height as usize).div_ceil(block_height as usize),
        )
    }

    pub(crate) fn validate(&self) -> Result<usize, DecompressSurfaceError> {
        let width = self.width;
        let height = self.height;
        let depth = self.depth;

        if width == 0 || height == 0 || depth == 0 {
            return Err(DecompressSurfaceError::ZeroSizedSurface {
                width,
                height,
                depth,
            });
        }
        if depth != 1 {
            return Err(DecompressSurfaceError::UnsupportedDepth { depth });
        }

        let overflow = || DecompressSurfaceError::PixelCountWouldOverflow {
            width,
            height,
            depth,
        };
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(4))
            .ok_or_else(overflow)?;

        let (blocks_x, blocks_y) = self.blocks();
        let expected = blocks_x
            .checked_mul(blocks_y)
            .and_then(|b| b.checked_mul(BLOCK_SIZE_IN_BYTES))
            .ok_or_else(overflow)?;

        let actual = self.data.as_ref().len();
        if expected > actual {
            return Err(DecompressSurfaceError::NotEnoughData { expected, actual });
        }

        Ok(expected)
    }
}

/// An uncompressed RGBA8 surface with 4 bytes per pixel.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceRgba8<T> {
    /// The width of the surface in pixels.
    pub width: u32,
    /// The height of the surface in pixels.
    pub height: u32,
    /// The depth of the surface in pixels.
    /// This should be `1` for 2D surfaces.
    pub depth: u32,
    /// Pixels ordered by row from the top left.
    pub data: T,
}

impl<T: AsRef<[u8]>> SurfaceRgba8<T> {
    pub(crate) fn validate(&self, footprint: BlockFootprint) -> Result<(), CompressSurfaceError> {
        validate_uncompressed(
            self.width,
            self.height,
            self.depth,
            footprint,
            self.data.as_ref().len(),
        )
    }
}

/// An uncompressed RGBA surface with 4 `f32` per pixel.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceRgba32Float<T> {
    /// The width of the surface in pixels.
    pub width: u32,
    /// The height of the surface in pixels.
    pub height: u32,
    /// The depth of the surface in pixels.
    /// This should be `1` for 2D surfaces.
    pub depth: u32,
    /// Pixels ordered by row from the top left.
    pub data: T,
}

impl<T: AsRef<[f32]>> SurfaceRgba32Float<T> {
    pub(crate) fn validate(&self, footprint: BlockFootprint) -> Result<(), CompressSurfaceError> {
        validate_uncompressed(
            self.width,
            self.height,
            self.depth,
            footprint,
            self.data.as_ref().len(),
        )
    }
}

/// An uncompressed RGBA surface with 4 [half::f16] per pixel.
#[derive(Debug, PartialEq)]
pub struct SurfaceRgba16Float<T> {
    /// The width of the surface in pixels.
    pub width: u32,
    /// The height of the surface in pixels.
    pub height: u32,
    /// The depth of the surface in pixels.
    /// This should be `1` for 2D surfaces.
    pub depth: u32,
    /// Pixels ordered by row from the top left.
    pub data: T,
}

fn validate_uncompressed(
    width: u32,
    height: u32,
    depth: u32,
    footprint: BlockFootprint,
    actual: usize,
) -> Result<(), CompressSurfaceError> {
    if width == 0 || height == 0 || depth == 0 {
        return Err(CompressSurfaceError::ZeroSizedSurface {
            width,
            height,
            depth,
        });
    }
    if depth != 1 {
        return Err(CompressSurfaceError::UnsupportedDepth { depth });
    }

    let (block_width, block_height) = footprint.dimensions();
    if width % block_width != 0 || height % block_height != 0 {
        return Err(CompressSurfaceError::NonIntegralDimensionsInBlocks {
            width,
            height,
            block_width,
            block_height,
        });
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|p| p.checked_mul(4))
        .ok_or(CompressSurfaceError::PixelCountWouldOverflow {
            width,
            height,
            depth,
        })?;
    if expected > actual {
        return Err(CompressSurfaceError::NotEnoughData { expected, actual });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn footprints_are_supported_sizes() {
        for footprint in BlockFootprint::iter() {
            let (w, h) = footprint.dimensions();
            assert!((4..=12).contains(&w) && (4..=12).contains(&h));
            assert!(w >= h);
        }
        assert_eq!(14, BlockFootprint::iter().count());
    }

    #[test]
    fn blocks_include_partial_blocks() {
        let surface = Surface {
            width: 13,
            height: 5,
            depth: 1,
            footprint: BlockFootprint::B6x5,
            decode_mode: DecodeMode::Ldr,
            data: [0u8; 3 * 16],
        };
        assert_eq!((3, 1), surface.blocks());
        assert_eq!(48, surface.validate().unwrap());
    }

    #[test]
    fn validate_not_enough_data() {
        let surface = Surface {
            width: 8,
            height: 8,
            depth: 1,
            footprint: BlockFootprint::B4x4,
            decode_mode: DecodeMode::Ldr,
            data: [0u8; 48],
        };
        assert!(matches!(
            surface.validate(),
            Err(DecompressSurfaceError::NotEnoughData {
                expected: 64,
                actual: 48
            })
        ));
    }

    #[test]
    fn validate_uncompressed_non_integral() {
        let surface = SurfaceRgba8 {
            width: 6,
            height: 4,
            depth: 1,
            data: [0u8; 6 * 4 * 4],
        };
        assert!(matches!(
            surface.validate(BlockFootprint::B4x4),
            Err(CompressSurfaceError::NonIntegralDimensionsInBlocks {
                width: 6,
                height: 4,
                block_width: 4,
                block_height: 4
            })
        ));
        assert!(surface.validate(BlockFootprint::B6x5).is_err());
    }

    #[test]
    fn validate_uncompressed_depth() {
        let surface = SurfaceRgba32Float {
            width: 4,
            height: 4,
            depth: 2,
            data: vec![0.0; 4 * 4 * 2 * 4],
        };
        assert!(matches!(
            surface.validate(BlockFootprint::B4x4),
            Err(CompressSurfaceError::UnsupportedDepth { depth: 2 })
        ));
    }
}
