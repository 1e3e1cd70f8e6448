//! An encoder and decoder for ASTC compressed texture blocks.
//!
//! Surfaces are compressed with [SurfaceRgba8::encode] or [SurfaceRgba32Float::encode]
//! and decompressed with [Surface::decode_rgba8], [Surface::decode_rgbaf32],
//! or [Surface::decode_rgbaf16].
//! Only 2D block footprints are supported.
//!
//! ```rust
//! use astc_codec::{BlockFootprint, DecodeMode, Quality, SurfaceRgba8};
//!
//! let surface = SurfaceRgba8 {
//!     width: 8,
//!     height: 8,
//!     depth: 1,
//!     data: vec![128u8; 8 * 8 * 4],
//! };
//! let encoded = surface.encode(BlockFootprint::B4x4, DecodeMode::Ldr, Quality::Fast)?;
//! let decoded = encoded.decode_rgba8()?;
//! assert_eq!(8 * 8 * 4, decoded.data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The block level modules work with a single [symbolic::SymbolicCompressedBlock]
//! at a time for applications that manage their own surface layout.
use strum::{EnumIter, FromRepr};

pub mod block_size;
pub mod color_format;
pub mod color_quantize;
pub mod color_unquantize;
pub mod compress;
pub mod decompress;
pub mod format_selection;
pub mod ideal_endpoints;
pub mod image_block;
pub mod ise;
pub mod lns;
pub mod partition;
pub mod physical;
pub mod quantization;
pub mod symbolic;
pub mod weight_align;

mod decode;
mod encode;
mod error;
mod surface;

pub use color_format::{DecodeMode, EndpointFormat};
pub use compress::{
    compress_symbolic_block, BlockModeHistogram, CompressionContext, CompressionParams,
};
#[cfg(feature = "image")]
pub use error::CreateImageError;
pub use error::{CompressSurfaceError, DecompressSurfaceError};
pub use surface::{
    BlockFootprint, Surface, SurfaceRgba16Float, SurfaceRgba32Float, SurfaceRgba8,
    BLOCK_SIZE_IN_BYTES,
};

/// The conversion quality when converting to compressed formats.
///
/// Higher quality settings search more block modes and partitionings
/// and run significantly slower.
/// ASTC uses a fixed compression ratio for each footprint,
/// so lower quality settings do not use less space than slower ones.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromRepr, EnumIter)]
pub enum Quality {
    /// Faster exports with slightly lower quality.
    Fast,
    /// Normal export speed and quality.
    Normal,
    /// Slower exports for slightly higher quality.
    Slow,
}

#[cfg(feature = "image")]
/// Encode `image` to ASTC blocks of `footprint` pixels.
pub fn astc_from_image(
    image: &image::RgbaImage,
    footprint: BlockFootprint,
    decode_mode: DecodeMode,
    quality: Quality,
) -> Result<Surface<Vec<u8>>, CompressSurfaceError> {
    SurfaceRgba8 {
        width: image.width(),
        height: image.height(),
        depth: 1,
        data: image.as_raw(),
    }
    .encode(footprint, decode_mode, quality)
}

#[cfg(feature = "image")]
/// Encode the floating point `image` to ASTC blocks of `footprint` pixels.
///
/// Use [DecodeMode::Hdr] to preserve values outside the range `0.0` to `1.0`.
pub fn astc_from_imagef32(
    image: &image::Rgba32FImage,
    footprint: BlockFootprint,
    decode_mode: DecodeMode,
    quality: Quality,
) -> Result<Surface<Vec<u8>>, CompressSurfaceError> {
    SurfaceRgba32Float {
        width: image.width(),
        height: image.height(),
        depth: 1,
        data: image.as_raw(),
    }
    .encode(footprint, decode_mode, quality)
}

#[cfg(feature = "image")]
/// Decode all blocks from `surface` to an RGBA8 image.
pub fn image_from_astc<T: AsRef<[u8]>>(
    surface: &Surface<T>,
) -> Result<image::RgbaImage, CreateImageError> {
    let decoded = surface.decode_rgba8()?;
    let data_length = decoded.data.len();

    let image = image::RgbaImage::from_raw(decoded.width, decoded.height, decoded.data).ok_or(
        CreateImageError::InvalidSurfaceDimensions {
            width: decoded.width,
            height: decoded.height,
            data_length,
        },
    )?;

    Ok(image)
}

#[cfg(feature = "image")]
/// Decode all blocks from `surface` to an RGBA floating point image.
pub fn imagef32_from_astc<T: AsRef<[u8]>>(
    surface: &Surface<T>,
) -> Result<image::Rgba32FImage, CreateImageError> {
    let decoded = surface.decode_rgbaf32()?;
    let data_length = decoded.data.len();

    let image = image::Rgba32FImage::from_raw(decoded.width, decoded.height, decoded.data)
        .ok_or(CreateImageError::InvalidSurfaceDimensions {
            width: decoded.width,
            height: decoded.height,
            data_length,
        })?;

    Ok(image)
}
