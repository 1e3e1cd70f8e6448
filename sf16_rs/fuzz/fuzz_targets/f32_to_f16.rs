#![no_main]

extern crate libfuzzer_sys;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|bits: u32| {
    let value = f32::from_bits(bits);
    let actual = sf16_rs::f32_to_f16(value, sf16_rs::RoundingMode::NearestEven);

    // NaN payloads are allowed to differ.
    if value.is_nan() {
        assert_eq!(0x7C00, actual & 0x7C00);
        assert_ne!(0, actual & 0x03FF);
    } else {
        let expected = half::f16::from_f32(value).to_bits();
        assert_eq!(expected, actual);
    }
});
