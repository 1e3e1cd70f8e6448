#![no_main]

use libfuzzer_sys::fuzz_target;

type Input = (
    astc_codec::SurfaceRgba32Float<Vec<f32>>,
    astc_codec::BlockFootprint,
    astc_codec::DecodeMode,
    astc_codec::Quality,
);

fuzz_target!(|input: Input| {
    let (surface, footprint, decode_mode, quality) = input;
    let _result = surface.encode(footprint, decode_mode, quality);
});
