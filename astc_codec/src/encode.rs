use log::debug;
use rayon::prelude::*;

use crate::{
    block_size::BlockSizeDescriptor,
    color_format::DecodeMode,
    compress::{compress_symbolic_block, CompressionContext, CompressionParams},
    image_block::ImageBlock,
    physical::symbolic_to_physical,
    surface::BLOCK_SIZE_IN_BYTES,
    BlockFootprint, CompressSurfaceError, Quality, Surface, SurfaceRgba32Float, SurfaceRgba8,
};

impl<T: AsRef<[u8]>> SurfaceRgba8<T> {
    /// Encode an RGBA8 surface using blocks of `footprint` pixels.
    ///
    /// The width and height must be a multiple of the footprint dimensions.
    pub fn encode(
        &self,
        footprint: BlockFootprint,
        decode_mode: DecodeMode,
        quality: Quality,
    ) -> Result<Surface<Vec<u8>>, CompressSurfaceError> {
        let mut ctx = CompressionContext::default();
        self.encode_with_context(footprint, decode_mode, quality, &mut ctx)
    }

    /// Encode the surface like [encode](Self::encode) with the settings in `ctx`.
    ///
    /// The block modes of the encoded blocks are added to the histogram of `ctx`.
    pub fn encode_with_context(
        &self,
        footprint: BlockFootprint,
        decode_mode: DecodeMode,
        quality: Quality,
        ctx: &mut CompressionContext,
    ) -> Result<Surface<Vec<u8>>, CompressSurfaceError> {
        self.validate(footprint)?;

        let width = self.width as usize;
        let height = self.height as usize;
        let rgba8 = self.data.as_ref();
        let data = encode_blocks(
            width,
            height,
            footprint,
            decode_mode,
            quality,
            ctx,
            |x, y, xdim, ydim| ImageBlock::from_rgba8(rgba8, width, height, x, y, xdim, ydim),
        );

        Ok(Surface {
            width: self.width,
            height: self.height,
            depth: self.depth,
            footprint,
            decode_mode,
            data,
        })
    }
}

impl<T: AsRef<[f32]>> SurfaceRgba32Float<T> {
    /// Encode an RGBA float surface using blocks of `footprint` pixels.
    ///
    /// Color channels use HDR endpoints for [DecodeMode::Hdr]
    /// and are clamped to `0.0` to `1.0` otherwise.
    /// The width and height must be a multiple of the footprint dimensions.
    pub fn encode(
        &self,
        footprint: BlockFootprint,
        decode_mode: DecodeMode,
        quality: Quality,
    ) -> Result<Surface<Vec<u8>>, CompressSurfaceError> {
        let mut ctx = CompressionContext {
            rgb_force_use_of_hdr: decode_mode == DecodeMode::Hdr,
            ..Default::default()
        };
        self.encode_with_context(footprint, decode_mode, quality, &mut ctx)
    }

    /// Encode the surface like [encode](Self::encode) with the settings in `ctx`.
    ///
    /// The block modes of the encoded blocks are added to the histogram of `ctx`.
    pub fn encode_with_context(
        &self,
        footprint: BlockFootprint,
        decode_mode: DecodeMode,
        quality: Quality,
        ctx: &mut CompressionContext,
    ) -> Result<Surface<Vec<u8>>, CompressSurfaceError> {
        self.validate(footprint)?;

        let width = self.width as usize;
        let height = self.height as usize;
        let rgba = self.data.as_ref();
        let hdr = decode_mode == DecodeMode::Hdr;
        let rgb_lns = hdr && ctx.rgb_force_use_of_hdr;
        let alpha_lns = hdr && ctx.alpha_force_use_of_hdr;
        let data = encode_blocks(
            width,
            height,
            footprint,
            decode_mode,
            quality,
            ctx,
            |x, y, xdim, ydim| {
                ImageBlock::from_rgbaf32(rgba, width, height, x, y, xdim, ydim, rgb_lns, alpha_lns)
            },
        );

        Ok(Surface {
            width: self.width,
            height: self.height,
            depth: self.depth,
            footprint,
            decode_mode,
            data,
        })
    }
}

fn encode_blocks<F>(
    width: usize,
    height: usize,
    footprint: BlockFootprint,
    decode_mode: DecodeMode,
    quality: Quality,
    ctx: &mut CompressionContext,
    load_block: F,
) -> Vec<u8>
where
    F: Fn(usize, usize, usize, usize) -> ImageBlock + Sync,
{
    let (xdim, ydim) = footprint.dimensions();
    let xdim = xdim as usize;
    let ydim = ydim as usize;
    let blocks_x = width / xdim;
    let blocks_y = height / ydim;

    let bsd = BlockSizeDescriptor::new(xdim, ydim);
    let params = CompressionParams::new(quality, xdim * ydim);

    // Blocks are independent, so each worker only needs its own histogram.
    let template = ctx.fork();
    let mut data = vec![0u8; blocks_x * blocks_y * BLOCK_SIZE_IN_BYTES];
    let contexts: Vec<_> = data
        .par_chunks_exact_mut(BLOCK_SIZE_IN_BYTES)
        .enumerate()
        .fold(
            || template.fork(),
            |mut local, (i, output)| {
                let block = load_block((i % blocks_x) * xdim, (i / blocks_x) * ydim, xdim, ydim);
                let (scb, _) =
                    compress_symbolic_block(&mut local, decode_mode, &bsd, &params, &block);
                output.copy_from_slice(&symbolic_to_physical(&bsd, &scb));
                local
            },
        )
        .collect();

    let mut histogram = template.histogram;
    for local in &contexts {
        histogram.merge(&local.histogram);
        ctx.merge(local);
    }

    debug!(
        "Encoded {} blocks with footprint {xdim}x{ydim} and decode mode {decode_mode:?}",
        blocks_x * blocks_y
    );
    debug!(
        "{} constant blocks, {} error blocks, most common block mode {:?}",
        histogram.constant_blocks,
        histogram.error_blocks,
        histogram.most_common()
    );

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{physical::physical_to_symbolic, symbolic::BlockType};

    #[test]
    fn encode_zero_size() {
        let result = SurfaceRgba8 {
            width: 0,
            height: 0,
            depth: 1,
            data: &[0u8; 0],
        }
        .encode(BlockFootprint::B4x4, DecodeMode::Ldr, Quality::Fast);

        assert!(matches!(
            result,
            Err(CompressSurfaceError::ZeroSizedSurface {
                width: 0,
                height: 0,
                depth: 1
            })
        ));
    }

    #[test]
    fn encode_not_enough_data() {
        let result = SurfaceRgba8 {
            width: 4,
            height: 4,
            depth: 1,
            data: &[0u8; 32],
        }
        .encode(BlockFootprint::B4x4, DecodeMode::Ldr, Quality::Fast);

        assert!(matches!(
            result,
            Err(CompressSurfaceError::NotEnoughData {
                expected: 64,
                actual: 32
            })
        ));
    }

    #[test]
    fn encode_non_integral_dimensions() {
        let result = SurfaceRgba8 {
            width: 5,
            height: 4,
            depth: 1,
            data: &[0u8; 5 * 4 * 4],
        }
        .encode(BlockFootprint::B4x4, DecodeMode::Ldr, Quality::Fast);

        assert!(matches!(
            result,
            Err(CompressSurfaceError::NonIntegralDimensionsInBlocks {
                width: 5,
                height: 4,
                block_width: 4,
                block_height: 4
            })
        ));
    }

    #[test]
    fn encode_constant_blocks() {
        let data = [10u8, 20, 30, 255].repeat(8 * 4);
        let surface = SurfaceRgba8 {
            width: 8,
            height: 4,
            depth: 1,
            data,
        };
        let mut ctx = CompressionContext::default();
        let encoded = surface
            .encode_with_context(BlockFootprint::B4x4, DecodeMode::Ldr, Quality::Fast, &mut ctx)
            .unwrap();

        assert_eq!(32, encoded.data.len());
        assert_eq!(2, ctx.histogram.constant_blocks);
        assert_eq!(2, ctx.histogram.total());

        let bsd = BlockSizeDescriptor::new(4, 4);
        let block: [u8; 16] = encoded.data[16..].try_into().unwrap();
        assert_eq!(
            BlockType::ConstantUnorm16([10 * 257, 20 * 257, 30 * 257, 65535]),
            physical_to_symbolic(&bsd, block).block_type
        );
    }

    #[test]
    fn encode_decode_gradient() {
        // Every block has colors along a single line.
        let data: Vec<u8> = (0..8 * 8)
            .flat_map(|i| {
                let t = (i % 8) * 16 + (i / 8) * 4;
                [t as u8, (255 - t) as u8, (t / 2) as u8, 255]
            })
            .collect();
        let surface = SurfaceRgba8 {
            width: 8,
            height: 8,
            depth: 1,
            data: data.clone(),
        };
        let encoded = surface
            .encode(BlockFootprint::B4x4, DecodeMode::Ldr, Quality::Normal)
            .unwrap();
        assert_eq!(4 * 16, encoded.data.len());

        let decoded = encoded.decode_rgba8().unwrap();
        assert_eq!((8, 8, 1), (decoded.width, decoded.height, decoded.depth));
        for (a, b) in data.iter().zip(&decoded.data) {
            assert!((*a as i32 - *b as i32).abs() <= 8, "{a} {b}");
        }
    }

    #[test]
    fn encode_hdr_constant() {
        let surface = SurfaceRgba32Float {
            width: 4,
            height: 4,
            depth: 1,
            data: [4.0, 2.0, 0.25, 1.0].repeat(16),
        };
        let encoded = surface
            .encode(BlockFootprint::B4x4, DecodeMode::Hdr, Quality::Fast)
            .unwrap();

        let decoded = encoded.decode_rgbaf32().unwrap();
        assert_eq!(&[4.0, 2.0, 0.25, 1.0], &decoded.data[..4]);

        // Values outside the unorm range are clamped.
        let decoded = encoded.decode_rgba8().unwrap();
        assert_eq!(&[255, 255, 64, 255], &decoded.data[..4]);
    }
}
