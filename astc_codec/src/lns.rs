//! The logarithmic encoding used for HDR endpoints and weights.
//!
//! LNS values are 16-bit with a 5-bit exponent and an 11-bit piecewise linear mantissa.
//! Interpolating in this domain approximates interpolating the logarithm.

/// Convert a float to LNS in the range `0.0` to `65535.0`.
pub fn float_to_lns(value: f32) -> f32 {
    // Values below 2^-26 underflow.
    if value.is_nan() || value <= 1.0 / 67108864.0 {
        return 0.0;
    }
    if value.abs() >= 65536.0 {
        return 65535.0;
    }

    let (fraction, exponent) = frexp(value);
    let (mantissa, exponent) = if exponent < -13 {
        (value * 33554432.0, 0)
    } else {
        ((fraction - 0.5) * 4096.0, exponent + 14)
    };

    let mantissa = if mantissa < 384.0 {
        mantissa * 4.0 / 3.0
    } else if mantissa <= 1408.0 {
        mantissa + 128.0
    } else {
        (mantissa + 512.0) * 4.0 / 5.0
    };

    mantissa + exponent as f32 * 2048.0 + 1.0
}

/// Convert an LNS value to the bits of a binary16 float.
///
/// The result is clamped to the largest finite binary16 value.
pub fn lns_to_sf16(value: u16) -> u16 {
    let mantissa = value & 0x7FF;
    let exponent = value >> 11;
    let mantissa = if mantissa < 512 {
        3 * mantissa
    } else if mantissa < 1536 {
        4 * mantissa - 512
    } else {
        5 * mantissa - 2048
    };
    ((exponent << 10) | (mantissa >> 3)).min(0x7BFF)
}

// Split a positive normal value into a fraction in [0.5, 1.0) and a power of two.
fn frexp(value: f32) -> (f32, i32) {
    let bits = value.to_bits();
    let exponent = ((bits >> 23) & 0xFF) as i32 - 126;
    let fraction = f32::from_bits((bits & 0x807F_FFFF) | (126 << 23));
    (fraction, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf16_rs::{f16_to_f32, f32_to_f16, RoundingMode};

    #[test]
    fn float_to_lns_powers_of_two() {
        assert_eq!(30721.0, float_to_lns(1.0));
        assert_eq!(32769.0, float_to_lns(2.0));
        assert_eq!(31873.0, float_to_lns(1.5));
    }

    #[test]
    fn float_to_lns_limits() {
        assert_eq!(0.0, float_to_lns(0.0));
        assert_eq!(0.0, float_to_lns(-1.0));
        assert_eq!(0.0, float_to_lns(f32::NAN));
        assert_eq!(65535.0, float_to_lns(65536.0));
        assert_eq!(65535.0, float_to_lns(f32::INFINITY));
    }

    #[test]
    fn lns_to_sf16_exact_values() {
        assert_eq!(0x3C00, lns_to_sf16(30720));
        assert_eq!(0x3C00, lns_to_sf16(30721));
        assert_eq!(0x4000, lns_to_sf16(32769));
        assert_eq!(0x3E00, lns_to_sf16(31873));
        assert_eq!(0x7BFF, lns_to_sf16(0xFFFF));
    }

    #[test]
    fn lns_round_trip_is_close() {
        let mut value = 0.001f32;
        while value < 60000.0 {
            let lns = float_to_lns(value).round() as u16;
            let decoded = f16_to_f32(lns_to_sf16(lns));
            let expected = f16_to_f32(f32_to_f16(value, RoundingMode::NearestEven));
            approx::assert_relative_eq!(expected, decoded, max_relative = 0.002);
            value *= 1.37;
        }
    }

    #[test]
    fn lns_is_monotonic() {
        let mut previous = 0;
        for lns in 0..=u16::MAX {
            let f16 = lns_to_sf16(lns);
            assert!(f16 >= previous, "{lns}");
            previous = f16;
        }
    }
}
