#![no_main]

use astc_codec::{
    block_size::BlockSizeDescriptor,
    decompress::decompress_symbolic_block,
    physical::{physical_to_symbolic, symbolic_to_physical},
    BlockFootprint, DecodeMode,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (BlockFootprint, DecodeMode, [u8; 16])| {
    let (footprint, decode_mode, block) = input;
    let (xdim, ydim) = footprint.dimensions();
    let bsd = BlockSizeDescriptor::new(xdim as usize, ydim as usize);

    let scb = physical_to_symbolic(&bsd, block);
    let _decoded = decompress_symbolic_block(decode_mode, &bsd, &scb);

    // Any block that decodes successfully has a canonical encoding.
    if !scb.is_error() {
        let encoded = symbolic_to_physical(&bsd, &scb);
        assert_eq!(scb, physical_to_symbolic(&bsd, encoded));
    }
});
