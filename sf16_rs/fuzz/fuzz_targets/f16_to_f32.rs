#![no_main]

extern crate libfuzzer_sys;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|bits: u16| {
    let expected = half::f16::from_bits(bits).to_f32();
    let actual = sf16_rs::f16_to_f32(bits);

    if expected.is_nan() {
        assert!(actual.is_nan());
    } else {
        assert_eq!(expected.to_bits(), actual.to_bits());
    }
});
