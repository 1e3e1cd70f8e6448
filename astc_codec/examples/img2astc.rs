use astc_codec::{BlockFootprint, CompressionContext, DecodeMode, Quality, SurfaceRgba8};
use strum::IntoEnumIterator;

// Compress an image and save the decompressed result for comparison.
// cargo run --release --example img2astc input.png output.png 6x6 slow
fn main() {
    env_logger::init();

    let args: Vec<_> = std::env::args().collect();

    // Don't assume the image comes with an alpha channel.
    let image = image::open(&args[1]).unwrap().to_rgba8();

    let dimensions = args.get(3).map(String::as_str).unwrap_or("4x4");
    let footprint = BlockFootprint::iter()
        .find(|f| {
            let (w, h) = f.dimensions();
            format!("{w}x{h}") == dimensions
        })
        .unwrap();

    let quality = match args.get(4).map(String::as_str) {
        Some("slow") => Quality::Slow,
        Some("normal") => Quality::Normal,
        _ => Quality::Fast,
    };

    // Encoding requires whole blocks.
    let (block_width, block_height) = footprint.dimensions();
    let width = image.width() / block_width * block_width;
    let height = image.height() / block_height * block_height;
    let image = image::imageops::crop_imm(&image, 0, 0, width, height).to_image();

    let surface = SurfaceRgba8 {
        width,
        height,
        depth: 1,
        data: image.as_raw(),
    };

    let mut ctx = CompressionContext::default();
    let start = std::time::Instant::now();
    let astc = surface
        .encode_with_context(footprint, DecodeMode::Ldr, quality, &mut ctx)
        .unwrap();
    println!("Compressed data in {:?}", start.elapsed());
    println!(
        "{} blocks, {} constant, most common block mode {:?}",
        ctx.histogram.total(),
        ctx.histogram.constant_blocks,
        ctx.histogram.most_common()
    );

    let start = std::time::Instant::now();
    let output = astc_codec::image_from_astc(&astc).unwrap();
    println!("Decompressed data in {:?}", start.elapsed());

    output.save(&args[2]).unwrap();
}
