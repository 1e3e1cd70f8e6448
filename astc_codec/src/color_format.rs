use strum::{EnumIter, FromRepr};

/// The color endpoint mode for a partition.
///
/// The discriminant is the 4-bit CEM stored in the physical block.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash, FromRepr, EnumIter)]
#[repr(u8)]
pub enum EndpointFormat {
    #[default]
    Luminance = 0,
    LuminanceDelta = 1,
    HdrLuminanceLargeRange = 2,
    HdrLuminanceSmallRange = 3,
    LuminanceAlpha = 4,
    LuminanceAlphaDelta = 5,
    RgbScale = 6,
    HdrRgbScale = 7,
    Rgb = 8,
    RgbDelta = 9,
    RgbScaleAlpha = 10,
    HdrRgb = 11,
    Rgba = 12,
    RgbaDelta = 13,
    HdrRgbLdrAlpha = 14,
    HdrRgba = 15,
}

impl EndpointFormat {
    /// The class from `0` to `3` that determines the number of values.
    pub fn class(self) -> usize {
        self as usize / 4
    }

    /// The number of quantized values stored for a partition.
    pub fn value_count(self) -> usize {
        2 * (self.class() + 1)
    }

    pub fn is_hdr(self) -> bool {
        matches!(
            self,
            Self::HdrLuminanceLargeRange
                | Self::HdrLuminanceSmallRange
                | Self::HdrRgbScale
                | Self::HdrRgb
                | Self::HdrRgbLdrAlpha
                | Self::HdrRgba
        )
    }
}

/// How decoded endpoints and interpolated colors are interpreted.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, FromRepr, EnumIter)]
pub enum DecodeMode {
    /// UNORM8 data where HDR endpoints decode to an error color.
    #[default]
    Ldr,
    /// UNORM8 data in the sRGB color space.
    LdrSrgb,
    /// Float data where endpoints may use LNS.
    Hdr,
}

/// The quantized endpoint values for a single partition.
///
/// Values are ranks at the block's color quantization level.
/// Only the first [EndpointFormat::value_count] values are used and the rest are zero.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct EndpointPayload {
    pub format: EndpointFormat,
    pub values: [u8; 8],
}

impl EndpointPayload {
    pub fn new(format: EndpointFormat, values: &[u8]) -> Self {
        debug_assert_eq!(format.value_count(), values.len());
        let mut payload = Self {
            format,
            values: [0; 8],
        };
        payload.values[..values.len()].copy_from_slice(values);
        payload
    }

    pub fn values(&self) -> &[u8] {
        &self.values[..self.format.value_count()]
    }
}

/// A high bit of an HDR field stored in the spare bits of another byte.
///
/// The same tables drive both packing and unpacking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExtraBit {
    /// A bit mask of the HDR modes that store this bit.
    pub modes: u8,
    /// The index of the spare bit in the payload.
    pub source: u8,
    pub field: u8,
    pub shift: u8,
}

const fn extra(modes: u8, source: u8, field: u8, shift: u8) -> ExtraBit {
    ExtraBit {
        modes,
        source,
        field,
        shift,
    }
}

/// Fields are red, green, blue, and scale for HDR RGB scale endpoints.
pub(crate) const HDR_RGBO_EXTRA_BITS: [ExtraBit; 17] = [
    extra(0x30, 0, 1, 6),
    extra(0x3A, 1, 1, 5),
    extra(0x30, 2, 2, 6),
    extra(0x3A, 3, 2, 5),
    extra(0x3D, 6, 3, 5),
    extra(0x2D, 5, 3, 6),
    extra(0x04, 4, 3, 7),
    extra(0x3B, 4, 0, 6),
    extra(0x04, 3, 0, 6),
    extra(0x10, 5, 0, 7),
    extra(0x0F, 2, 0, 7),
    extra(0x05, 1, 0, 8),
    extra(0x0A, 0, 0, 8),
    extra(0x05, 0, 0, 9),
    extra(0x02, 6, 0, 9),
    extra(0x01, 3, 0, 10),
    extra(0x02, 5, 0, 10),
];
pub(crate) const HDR_RGBO_BASE_BITS: [u32; 4] = [6, 5, 5, 5];
pub(crate) const HDR_RGBO_SHIFTS: [u32; 6] = [1, 1, 2, 3, 4, 5];

/// Fields are `a`, `c`, `b0`, `b1`, `d0`, and `d1` for HDR RGB endpoints.
pub(crate) const HDR_RGB_EXTRA_BITS: [ExtraBit; 17] = [
    extra(0xA4, 0, 0, 9),
    extra(0x08, 2, 0, 9),
    extra(0x50, 4, 0, 9),
    extra(0x50, 5, 0, 10),
    extra(0xA0, 1, 0, 10),
    extra(0xC0, 2, 0, 11),
    extra(0x04, 1, 1, 6),
    extra(0xE8, 3, 1, 6),
    extra(0x20, 2, 1, 7),
    extra(0x5B, 0, 2, 6),
    extra(0x5B, 1, 3, 6),
    extra(0x12, 2, 2, 7),
    extra(0x12, 3, 3, 7),
    extra(0xAF, 4, 4, 5),
    extra(0xAF, 5, 5, 5),
    extra(0x05, 2, 4, 6),
    extra(0x05, 3, 5, 6),
];
pub(crate) const HDR_RGB_BASE_BITS: [u32; 6] = [9, 6, 6, 6, 5, 5];

/// The shift applied to every HDR RGB field for `mode`.
pub(crate) fn hdr_rgb_shift(mode: usize) -> u32 {
    ((mode as u32) >> 1) ^ 3
}

/// The total bits of `field` in `mode` including bits stored elsewhere.
pub(crate) fn field_bit_count(rows: &[ExtraBit], base_bits: &[u32], mode: usize, field: usize) -> u32 {
    rows.iter()
        .filter(|r| r.modes & (1 << mode) != 0 && r.field as usize == field)
        .map(|r| r.shift as u32 + 1)
        .fold(base_bits[field], u32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn format_value_counts() {
        assert_eq!(2, EndpointFormat::Luminance.value_count());
        assert_eq!(4, EndpointFormat::RgbScale.value_count());
        assert_eq!(4, EndpointFormat::HdrRgbScale.value_count());
        assert_eq!(6, EndpointFormat::HdrRgb.value_count());
        assert_eq!(8, EndpointFormat::Rgba.value_count());
    }

    #[test]
    fn format_from_cem() {
        for (i, format) in EndpointFormat::iter().enumerate() {
            assert_eq!(Some(format), EndpointFormat::from_repr(i as u8));
        }
        assert_eq!(None, EndpointFormat::from_repr(16));
        assert_eq!(6, EndpointFormat::iter().filter(|f| f.is_hdr()).count());
    }

    #[test]
    fn payload_unused_values_are_zero() {
        let payload = EndpointPayload::new(EndpointFormat::Rgb, &[1, 2, 3, 4, 5, 6]);
        assert_eq!([1, 2, 3, 4, 5, 6, 0, 0], payload.values);
        assert_eq!(&[1, 2, 3, 4, 5, 6], payload.values());
    }

    #[test]
    fn hdr_rgbo_field_bits() {
        let bits: Vec<_> = (0..6)
            .map(|m| (0..4).map(|f| field_bit_count(&HDR_RGBO_EXTRA_BITS, &HDR_RGBO_BASE_BITS, m, f)).collect::<Vec<_>>())
            .collect();
        assert_eq!(
            vec![
                vec![11, 5, 5, 7],
                vec![11, 6, 6, 5],
                vec![10, 5, 5, 8],
                vec![9, 6, 6, 7],
                vec![8, 7, 7, 6],
                vec![7, 7, 7, 7]
            ],
            bits
        );
    }

    #[test]
    fn hdr_rgb_field_bits() {
        // The two delta fields always have the same width.
        let deltas = [7, 6, 7, 6, 5, 6, 5, 6];
        for (mode, bits) in deltas.into_iter().enumerate() {
            assert_eq!(bits, field_bit_count(&HDR_RGB_EXTRA_BITS, &HDR_RGB_BASE_BITS, mode, 4));
            assert_eq!(bits, field_bit_count(&HDR_RGB_EXTRA_BITS, &HDR_RGB_BASE_BITS, mode, 5));
        }
        assert_eq!(12, field_bit_count(&HDR_RGB_EXTRA_BITS, &HDR_RGB_BASE_BITS, 7, 0));
        assert_eq!(3, hdr_rgb_shift(0));
        assert_eq!(0, hdr_rgb_shift(7));
    }
}
