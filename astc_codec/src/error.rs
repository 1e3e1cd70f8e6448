use thiserror::Error;

#[cfg(feature = "image")]
#[derive(Debug, Error)]
pub enum CreateImageError {
    #[error("data length {data_length} is not valid for a {width}x{height} image")]
    InvalidSurfaceDimensions {
        width: u32,
        height: u32,
        data_length: usize,
    },

    #[error("error decompressing surface: {0}")]
    DecompressSurface(#[from] DecompressSurfaceError),
}

#[derive(Debug, Error)]
pub enum CompressSurfaceError {
    #[error("surface dimensions {width} x {height} x {depth} contain no pixels")]
    ZeroSizedSurface { width: u32, height: u32, depth: u32 },

    #[error("surface pixel count {width} x {height} x {depth} would overflow")]
    PixelCountWouldOverflow { width: u32, height: u32, depth: u32 },

    #[error("surface dimensions {width} x {height} are not divisibly by the block dimensions {block_width} x {block_height}")]
    NonIntegralDimensionsInBlocks {
        width: u32,
        height: u32,
        block_width: u32,
        block_height: u32,
    },

    #[error("expected surface to have at least {expected} values but found {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    #[error("surface depth {depth} is not supported by 2D block footprints")]
    UnsupportedDepth { depth: u32 },
}

#[derive(Debug, Error)]
pub enum DecompressSurfaceError {
    #[error("surface dimensions {width} x {height} x {depth} contain no pixels")]
    ZeroSizedSurface { width: u32, height: u32, depth: u32 },

    #[error("surface pixel count {width} x {height} x {depth} would overflow")]
    PixelCountWouldOverflow { width: u32, height: u32, depth: u32 },

    #[error("expected surface to have at least {expected} bytes but found {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    #[error("surface depth {depth} is not supported by 2D block footprints")]
    UnsupportedDepth { depth: u32 },
}
