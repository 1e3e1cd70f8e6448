use half::f16;
use log::debug;
use rayon::prelude::*;

use crate::{
    block_size::BlockSizeDescriptor,
    decompress::decompress_symbolic_block,
    physical::physical_to_symbolic,
    surface::{SurfaceRgba16Float, BLOCK_SIZE_IN_BYTES},
    DecompressSurfaceError, Surface, SurfaceRgba32Float, SurfaceRgba8,
};

impl<T: AsRef<[u8]>> Surface<T> {
    /// Decode all blocks from `surface` to RGBA8.
    ///
    /// Values are clamped to the range `0.0` to `1.0` before converting.
    pub fn decode_rgba8(&self) -> Result<SurfaceRgba8<Vec<u8>>, DecompressSurfaceError> {
        let data = decode_surface(self)?;

        Ok(SurfaceRgba8 {
            width: self.width,
            height: self.height,
            depth: self.depth,
            data,
        })
    }

    /// Decode all blocks from `surface` to RGBAF32.
    ///
    /// Non HDR blocks are normalized to the range `0.0` to `1.0`.
    pub fn decode_rgbaf32(&self) -> Result<SurfaceRgba32Float<Vec<f32>>, DecompressSurfaceError> {
        let data = decode_surface(self)?;

        Ok(SurfaceRgba32Float {
            width: self.width,
            height: self.height,
            depth: self.depth,
            data,
        })
    }

    /// Decode all blocks from `surface` to RGBAF16.
    pub fn decode_rgbaf16(&self) -> Result<SurfaceRgba16Float<Vec<f16>>, DecompressSurfaceError> {
        let data = decode_surface(self)?;

        Ok(SurfaceRgba16Float {
            width: self.width,
            height: self.height,
            depth: self.depth,
            data,
        })
    }
}

fn decode_surface<T, P>(surface: &Surface<T>) -> Result<Vec<P>, DecompressSurfaceError>
where
    T: AsRef<[u8]>,
    P: Decode,
{
    let size = surface.validate()?;

    let (xdim, ydim) = surface.footprint.dimensions();
    let xdim = xdim as usize;
    let ydim = ydim as usize;
    let width = surface.width as usize;
    let height = surface.height as usize;
    let (blocks_x, blocks_y) = surface.blocks();
    let decode_mode = surface.decode_mode;

    let bsd = BlockSizeDescriptor::new(xdim, ydim);
    let blocks: &[[u8; BLOCK_SIZE_IN_BYTES]] = bytemuck::cast_slice(&surface.data.as_ref()[..size]);

    // Each row of blocks writes to its own rows of pixels.
    let mut pixels = vec![[P::default(); 4]; width * height];
    pixels
        .par_chunks_mut(width * ydim)
        .zip(blocks.par_chunks(blocks_x))
        .for_each(|(rows, row_blocks)| {
            let row_count = rows.len() / width;
            for (bx, block) in row_blocks.iter().enumerate() {
                let scb = physical_to_symbolic(&bsd, *block);
                let decoded = decompress_symbolic_block(decode_mode, &bsd, &scb);

                // Partial blocks are cropped to the surface dimensions.
                let columns = xdim.min(width - bx * xdim);
                for ty in 0..ydim.min(row_count) {
                    for tx in 0..columns {
                        let texel = decoded.orig_data[ty * xdim + tx];
                        rows[ty * width + bx * xdim + tx] = texel.map(P::from_f32);
                    }
                }
            }
        });

    debug!(
        "Decoded {} blocks with footprint {xdim}x{ydim} and decode mode {decode_mode:?}",
        blocks_x * blocks_y
    );

    Ok(bytemuck::cast_slice(&pixels).to_vec())
}

trait Decode: bytemuck::Pod + Default + Send + Sync {
    fn from_f32(value: f32) -> Self;
}

impl Decode for u8 {
    fn from_f32(value: f32) -> Self {
        // NaN converts to 0.
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl Decode for f32 {
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl Decode for f16 {
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color_format::DecodeMode, physical::symbolic_to_physical, symbolic::SymbolicCompressedBlock,
        BlockFootprint,
    };

    fn constant_blocks(bsd: &BlockSizeDescriptor, colors: &[[u16; 4]]) -> Vec<u8> {
        colors
            .iter()
            .flat_map(|c| symbolic_to_physical(bsd, &SymbolicCompressedBlock::constant_unorm16(*c)))
            .collect()
    }

    #[test]
    fn decode_surface_zero_size() {
        let result = Surface {
            width: 0,
            height: 0,
            depth: 0,
            footprint: BlockFootprint::B4x4,
            decode_mode: DecodeMode::Ldr,
            data: &[0u8; 0],
        }
        .decode_rgba8();

        assert!(matches!(
            result,
            Err(DecompressSurfaceError::ZeroSizedSurface {
                width: 0,
                height: 0,
                depth: 0,
            })
        ));
    }

    #[test]
    fn decode_surface_dimensions_overflow() {
        let result = Surface {
            width: u32::MAX,
            height: u32::MAX,
            depth: 1,
            footprint: BlockFootprint::B4x4,
            decode_mode: DecodeMode::Ldr,
            data: &[0u8; 0],
        }
        .decode_rgba8();

        assert!(matches!(
            result,
            Err(DecompressSurfaceError::PixelCountWouldOverflow {
                width: u32::MAX,
                height: u32::MAX,
                depth: 1,
            })
        ));
    }

    #[test]
    fn decode_surface_3d() {
        let result = Surface {
            width: 4,
            height: 4,
            depth: 4,
            footprint: BlockFootprint::B4x4,
            decode_mode: DecodeMode::Ldr,
            data: &[0u8; 64],
        }
        .decode_rgbaf32();

        assert!(matches!(
            result,
            Err(DecompressSurfaceError::UnsupportedDepth { depth: 4 })
        ));
    }

    #[test]
    fn decode_partial_blocks() {
        let bsd = BlockSizeDescriptor::new(4, 4);
        let colors = [
            [0xFFFF, 0, 0, 0xFFFF],
            [0, 0xFFFF, 0, 0xFFFF],
            [0, 0, 0xFFFF, 0xFFFF],
            [0xFFFF, 0xFFFF, 0xFFFF, 0],
        ];
        let surface = Surface {
            width: 5,
            height: 6,
            depth: 1,
            footprint: BlockFootprint::B4x4,
            decode_mode: DecodeMode::Ldr,
            data: constant_blocks(&bsd, &colors),
        };
        let decoded = surface.decode_rgba8().unwrap();
        assert_eq!(5 * 6 * 4, decoded.data.len());

        let pixel = |x: usize, y: usize| &decoded.data[(y * 5 + x) * 4..(y * 5 + x) * 4 + 4];
        assert_eq!(&[255, 0, 0, 255], pixel(3, 3));
        assert_eq!(&[0, 255, 0, 255], pixel(4, 0));
        assert_eq!(&[0, 0, 255, 255], pixel(0, 5));
        assert_eq!(&[255, 255, 255, 0], pixel(4, 5));
    }

    #[test]
    fn decode_float_formats() {
        let bsd = BlockSizeDescriptor::new(6, 6);
        let data: Vec<u8> = symbolic_to_physical(
            &bsd,
            &SymbolicCompressedBlock::constant_f16([0x4400, 0x3C00, 0x3800, 0x3C00]),
        )
        .to_vec();
        let surface = Surface {
            width: 6,
            height: 6,
            depth: 1,
            footprint: BlockFootprint::B6x6,
            decode_mode: DecodeMode::Hdr,
            data,
        };

        let decoded = surface.decode_rgbaf32().unwrap();
        assert_eq!(6 * 6 * 4, decoded.data.len());
        assert_eq!(&[4.0, 1.0, 0.5, 1.0], &decoded.data[..4]);

        let decoded = surface.decode_rgbaf16().unwrap();
        assert_eq!(f16::from_f32(4.0), decoded.data[0]);

        // FP16 constant blocks are an error in LDR mode.
        let decoded = Surface {
            decode_mode: DecodeMode::LdrSrgb,
            ..surface
        }
        .decode_rgba8()
        .unwrap();
        assert_eq!(&[255, 0, 255, 255], &decoded.data[..4]);
    }
}
