#![no_std]
//! A safe, no_std, pure Rust implementation of IEEE-754 binary16 conversions.
//!
//! Unlike a plain `as` cast, [f32_to_f16] takes an explicit [RoundingMode].
//! This matters for HDR texture data where magnitudes must round the same way
//! on every platform.

/// The rounding applied when a binary32 value is not exactly representable as binary16.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RoundingMode {
    /// Truncate the magnitude.
    TowardZero,
    /// Round toward positive infinity.
    TowardPositive,
    /// Round toward negative infinity.
    TowardNegative,
    /// Round to the nearest value with ties going to an even mantissa.
    NearestEven,
    /// Round to the nearest value with ties going away from zero.
    NearestAway,
}

const F16_EXP_MASK: u16 = 0x7C00;
const F16_QUIET_BIT: u16 = 0x0200;
const F16_MAX_FINITE: u16 = 0x7BFF;

/// Converts the binary16 bits in `value` to an `f32`.
///
/// Every binary16 value is exactly representable, so this never rounds.
/// Signaling NaN inputs are returned as quiet NaN with the same payload.
pub fn f16_to_f32(value: u16) -> f32 {
    let sign = ((value & 0x8000) as u32) << 16;
    let exp = ((value >> 10) & 0x1F) as u32;
    let mant = (value & 0x3FF) as u32;

    let bits = match (exp, mant) {
        (0, 0) => sign,
        (0, _) => {
            // Normalize the subnormal mantissa.
            let shift = mant.leading_zeros() - 21;
            let mant = (mant << shift) & 0x3FF;
            let exp = 127 - 15 + 1 - shift;
            sign | (exp << 23) | (mant << 13)
        }
        (0x1F, 0) => sign | 0x7F80_0000,
        (0x1F, _) => sign | 0x7FC0_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

/// Converts `value` to binary16 bits using the given rounding `mode`.
///
/// Overflow follows IEEE-754 rather than always saturating to infinity.
/// The nearest modes and the directed mode pointing away from zero produce infinity.
/// Rounding toward zero or toward the opposite infinity produces the largest
/// finite value of `0x7BFF` or `0xFBFF` for negative values.
/// NaN inputs are quieted and keep the top bits of their payload.
pub fn f32_to_f16(value: f32, mode: RoundingMode) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = (bits >> 23) & 0xFF;
    let mant = bits & 0x7F_FFFF;
    let negative = sign != 0;

    if exp == 0xFF {
        if mant != 0 {
            return sign | F16_EXP_MASK | F16_QUIET_BIT | (mant >> 13) as u16;
        }
        return sign | F16_EXP_MASK;
    }
    if exp == 0 && mant == 0 {
        return sign;
    }

    let e = exp as i32 - 127;
    if e > 15 {
        return sign | overflow(negative, mode);
    }

    // The magnitude is split into a truncated result and the discarded remainder.
    // The remainder is compared against half of the last kept unit.
    let (result, rem, half) = if exp == 0 {
        // f32 subnormals are far below the smallest f16 subnormal.
        (0u32, 1u32, 2u32)
    } else {
        let m = mant | 0x80_0000;
        if e >= -14 {
            let result = (((e + 14) as u32) << 10) + (m >> 13);
            (result, m & 0x1FFF, 0x1000)
        } else {
            let shift = (13 + (-14 - e)) as u32;
            if shift >= 32 {
                (0, m, 1 << 31)
            } else {
                (m >> shift, m & ((1 << shift) - 1), 1 << (shift - 1))
            }
        }
    };

    let round_up = match mode {
        RoundingMode::TowardZero => false,
        RoundingMode::TowardPositive => rem != 0 && !negative,
        RoundingMode::TowardNegative => rem != 0 && negative,
        RoundingMode::NearestEven => rem > half || (rem == half && result & 1 != 0),
        RoundingMode::NearestAway => rem >= half,
    };

    // A carry out of the mantissa correctly bumps the exponent and may reach infinity.
    let result = if round_up { result + 1 } else { result };
    sign | result as u16
}

fn overflow(negative: bool, mode: RoundingMode) -> u16 {
    match mode {
        RoundingMode::NearestEven | RoundingMode::NearestAway => F16_EXP_MASK,
        RoundingMode::TowardPositive if !negative => F16_EXP_MASK,
        RoundingMode::TowardNegative if negative => F16_EXP_MASK,
        _ => F16_MAX_FINITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [RoundingMode; 5] = [
        RoundingMode::TowardZero,
        RoundingMode::TowardPositive,
        RoundingMode::TowardNegative,
        RoundingMode::NearestEven,
        RoundingMode::NearestAway,
    ];

    #[test]
    fn f16_to_f32_all_values() {
        for bits in 0..=u16::MAX {
            let expected = half::f16::from_bits(bits).to_f32();
            let actual = f16_to_f32(bits);
            if expected.is_nan() {
                assert!(actual.is_nan());
            } else {
                assert_eq!(expected.to_bits(), actual.to_bits(), "{bits:#06x}");
            }
        }
    }

    #[test]
    fn round_trip_all_finite_values() {
        for bits in 0..=u16::MAX {
            if bits & F16_EXP_MASK == F16_EXP_MASK {
                continue;
            }
            for mode in MODES {
                assert_eq!(bits, f32_to_f16(f16_to_f32(bits), mode));
            }
        }
    }

    #[test]
    fn nearest_even_matches_half() {
        // Walk a spread of binary32 bit patterns including subnormal and overflow ranges.
        let mut bits = 0u32;
        while bits < 0x7F80_0000 {
            for sign in [0, 0x8000_0000] {
                let value = f32::from_bits(bits | sign);
                let expected = half::f16::from_f32(value).to_bits();
                assert_eq!(
                    expected,
                    f32_to_f16(value, RoundingMode::NearestEven),
                    "{value}"
                );
            }
            bits += 0x1F3F;
        }
    }

    #[test]
    fn ties() {
        // 1 + 2^-11 is halfway between 1.0 and the next f16.
        let tie = 1.0 + 2.0f32.powi(-11);
        assert_eq!(0x3C00, f32_to_f16(tie, RoundingMode::NearestEven));
        assert_eq!(0x3C01, f32_to_f16(tie, RoundingMode::NearestAway));
        assert_eq!(0x3C00, f32_to_f16(tie, RoundingMode::TowardZero));
        assert_eq!(0x3C01, f32_to_f16(tie, RoundingMode::TowardPositive));
        assert_eq!(0xBC01, f32_to_f16(-tie, RoundingMode::TowardNegative));
        assert_eq!(0xBC00, f32_to_f16(-tie, RoundingMode::TowardPositive));
    }

    #[test]
    fn directed_modes_bound_the_value() {
        let mut bits = 0x3380_0000u32;
        while bits < 0x477F_E000 {
            let value = f32::from_bits(bits);
            let up = f16_to_f32(f32_to_f16(value, RoundingMode::TowardPositive));
            let down = f16_to_f32(f32_to_f16(value, RoundingMode::TowardNegative));
            let zero = f16_to_f32(f32_to_f16(-value, RoundingMode::TowardZero));
            assert!(up >= value, "{value}");
            assert!(down <= value, "{value}");
            assert!(zero >= -value, "{value}");
            bits += 0x3F71;
        }
    }

    #[test]
    fn tiny_values() {
        assert_eq!(0x0000, f32_to_f16(1e-10, RoundingMode::NearestEven));
        assert_eq!(0x8000, f32_to_f16(-1e-10, RoundingMode::NearestEven));
        assert_eq!(0x0001, f32_to_f16(1e-10, RoundingMode::TowardPositive));
        assert_eq!(0x8001, f32_to_f16(-1e-10, RoundingMode::TowardNegative));
        assert_eq!(0x0000, f32_to_f16(2.0f32.powi(-25), RoundingMode::NearestEven));
        assert_eq!(0x0001, f32_to_f16(2.0f32.powi(-25), RoundingMode::NearestAway));
        assert_eq!(0x0002, f32_to_f16(1.5 * 2.0f32.powi(-24), RoundingMode::NearestEven));
        assert_eq!(0x0002, f32_to_f16(2.5 * 2.0f32.powi(-24), RoundingMode::NearestEven));

        let subnormal = f32::from_bits(1);
        assert_eq!(0x0000, f32_to_f16(subnormal, RoundingMode::NearestAway));
        assert_eq!(0x0001, f32_to_f16(subnormal, RoundingMode::TowardPositive));
    }

    #[test]
    fn overflow_per_mode() {
        assert_eq!(0x7C00, f32_to_f16(65520.0, RoundingMode::NearestEven));
        assert_eq!(0x7BFF, f32_to_f16(65519.0, RoundingMode::NearestEven));
        assert_eq!(0x7BFF, f32_to_f16(1e9, RoundingMode::TowardZero));
        assert_eq!(0x7C00, f32_to_f16(1e9, RoundingMode::TowardPositive));
        assert_eq!(0x7BFF, f32_to_f16(1e9, RoundingMode::TowardNegative));
        assert_eq!(0xFC00, f32_to_f16(-1e9, RoundingMode::TowardNegative));
        assert_eq!(0xFBFF, f32_to_f16(-1e9, RoundingMode::TowardPositive));
        assert_eq!(0xFC00, f32_to_f16(-1e9, RoundingMode::NearestAway));
    }

    #[test]
    fn infinity_and_nan() {
        for mode in MODES {
            assert_eq!(0x7C00, f32_to_f16(f32::INFINITY, mode));
            assert_eq!(0xFC00, f32_to_f16(f32::NEG_INFINITY, mode));

            let nan = f32_to_f16(f32::NAN, mode);
            assert_eq!(F16_EXP_MASK, nan & F16_EXP_MASK);
            assert_ne!(0, nan & F16_QUIET_BIT);

            // Signaling NaN with only low payload bits still becomes NaN.
            let signaling = f32_to_f16(f32::from_bits(0x7F80_0001), mode);
            assert_eq!(0x7E00, signaling);
        }
        assert!(f16_to_f32(0x7C01).is_nan());
        assert_eq!(f32::INFINITY, f16_to_f32(0x7C00));
        assert_eq!(f32::NEG_INFINITY, f16_to_f32(0xFC00));
    }

    #[test]
    fn signed_zero() {
        assert_eq!(0x8000, f32_to_f16(-0.0, RoundingMode::NearestEven));
        assert_eq!(0x0000, f32_to_f16(0.0, RoundingMode::TowardNegative));
        assert_eq!((-0.0f32).to_bits(), f16_to_f32(0x8000).to_bits());
    }
}
