//! Quantization of endpoint colors into the values for each endpoint format.
//!
//! Input colors are in the working range `0.0` to `65535.0`.
//! LDR formats divide by 257 to work with 8-bit values.
//! HDR formats work with the 12-bit LNS values used by the decoder.
//!
//! Functions prefixed with `try_` return [None] if the encoding cannot represent the colors.
use crate::{
    color_format::{
        field_bit_count, hdr_rgb_shift, DecodeMode, EndpointFormat, EndpointPayload,
        HDR_RGBO_BASE_BITS, HDR_RGBO_EXTRA_BITS, HDR_RGBO_SHIFTS, HDR_RGB_BASE_BITS,
        HDR_RGB_EXTRA_BITS,
    },
    color_unquantize::{bit_transfer_signed, blue_contract},
    quantization::{
        quantize_color, quantize_color_constrained, quantize_color_f32, unquantize_color,
    },
};

/// The last quantization level that can benefit from delta encodings.
const MAX_DELTA_LEVEL: usize = 18;

const MAX_ORDERING_ITERATIONS: usize = 1536;

fn unorm8(color: [f32; 4]) -> [f32; 4] {
    color.map(|c| c / 257.0)
}

fn unq(level: usize, rank: u8) -> i32 {
    unquantize_color(level, rank) as i32
}

/// Quantize the RGB channels of both colors as `[r0, r1, g0, g1, b0, b1]`.
///
/// The colors move apart until the first endpoint has the smaller sum.
pub fn quantize_rgb(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 6] {
    let c0 = unorm8(color0);
    let c1 = unorm8(color1);

    let quantize =
        |v: f32, addon: f32| quantize_color(level, (v + addon).floor().clamp(0.0, 255.0) as u8);

    let mut addon0 = 0.5;
    let mut addon1 = 0.5;
    let mut ranks = [0; 6];
    for _ in 0..MAX_ORDERING_ITERATIONS {
        ranks = [
            quantize(c0[0], addon0),
            quantize(c1[0], addon1),
            quantize(c0[1], addon0),
            quantize(c1[1], addon1),
            quantize(c0[2], addon0),
            quantize(c1[2], addon1),
        ];
        let sum0 = unq(level, ranks[0]) + unq(level, ranks[2]) + unq(level, ranks[4]);
        let sum1 = unq(level, ranks[1]) + unq(level, ranks[3]) + unq(level, ranks[5]);
        if sum0 <= sum1 {
            break;
        }
        addon0 -= 0.2;
        addon1 += 0.2;
    }
    ranks
}

pub fn quantize_rgba(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 8] {
    let [r0, r1, g0, g1, b0, b1] = quantize_rgb(color0, color1, level);
    let a0 = quantize_color_f32(level, color0[3] / 257.0);
    let a1 = quantize_color_f32(level, color1[3] / 257.0);
    [r0, r1, g0, g1, b0, b1, a0, a1]
}

fn inverse_blue_contract(c: [f32; 4]) -> Option<[f32; 4]> {
    let r = c[0] + (c[0] - c[2]);
    let g = c[1] + (c[1] - c[2]);
    ((0.0..=255.0).contains(&r) && (0.0..=255.0).contains(&g)).then_some([r, g, c[2], c[3]])
}

fn rgb_sum(c: [i32; 4]) -> i32 {
    c[0] + c[1] + c[2]
}

/// Store the colors swapped so the decoder applies blue contraction.
pub fn try_quantize_rgb_blue_contract(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 6]> {
    let c0 = inverse_blue_contract(unorm8(color0))?;
    let c1 = inverse_blue_contract(unorm8(color1))?;

    let q0 = [0, 1, 2].map(|c| quantize_color_f32(level, c0[c]));
    let q1 = [0, 1, 2].map(|c| quantize_color_f32(level, c1[c]));
    let u0 = q0.map(|r| unq(level, r));
    let u1 = q1.map(|r| unq(level, r));

    // The decoder only applies blue contraction if the stored second color has the smaller sum.
    if u0[0] + u0[1] + u0[2] >= u1[0] + u1[1] + u1[2] {
        return None;
    }

    let e0 = blue_contract([u0[0], u0[1], u0[2], 0]);
    let e1 = blue_contract([u1[0], u1[1], u1[2], 0]);
    if rgb_sum(e0) > rgb_sum(e1) {
        return None;
    }

    Some([q1[0], q0[0], q1[1], q0[1], q1[2], q0[2]])
}

pub fn try_quantize_rgba_blue_contract(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 8]> {
    let [r1, r0, g1, g0, b1, b0] = try_quantize_rgb_blue_contract(color0, color1, level)?;
    let a0 = quantize_color_f32(level, color0[3] / 257.0);
    let a1 = quantize_color_f32(level, color1[3] / 257.0);
    Some([r1, r0, g1, g0, b1, b0, a1, a0])
}

/// A base and signed offset sharing the top bit of the base.
#[derive(Debug, Clone, Copy)]
struct DeltaChannel {
    base_rank: u8,
    offset_rank: u8,
    base: i32,
    offset: i32,
}

fn try_delta_channel(level: usize, base: f32, target: f32) -> Option<DeltaChannel> {
    let base9 = (base.round() as i32) << 1;
    let base_rank = quantize_color(level, (base9 & 0xFF) as u8);
    let base9 = unq(level, base_rank) | (base9 & 0x100);

    let delta9 = ((target.round() as i32) << 1) - base9;
    if !(-64..=63).contains(&delta9) {
        return None;
    }

    // The top bit of the base moves into the offset byte.
    let packed = (delta9 & 0x7F) | ((base9 & 0x100) >> 1);
    let offset_rank = quantize_color(level, packed as u8);
    let unquantized = unq(level, offset_rank);
    if (packed ^ unquantized) & 0xC0 != 0 {
        return None;
    }

    let (offset, base) = bit_transfer_signed(unquantized, unq(level, base_rank));
    if !(0..=255).contains(&(base + offset)) {
        return None;
    }
    Some(DeltaChannel {
        base_rank,
        offset_rank,
        base,
        offset,
    })
}

fn try_delta_channels(
    level: usize,
    base: [f32; 4],
    target: [f32; 4],
) -> Option<[DeltaChannel; 3]> {
    Some([
        try_delta_channel(level, base[0], target[0])?,
        try_delta_channel(level, base[1], target[1])?,
        try_delta_channel(level, base[2], target[2])?,
    ])
}

fn delta_ranks(channels: &[DeltaChannel; 3]) -> [u8; 6] {
    [
        channels[0].base_rank,
        channels[0].offset_rank,
        channels[1].base_rank,
        channels[1].offset_rank,
        channels[2].base_rank,
        channels[2].offset_rank,
    ]
}

/// Store the first color as a base and the second color as a signed offset.
pub fn try_quantize_rgb_delta(color0: [f32; 4], color1: [f32; 4], level: usize) -> Option<[u8; 6]> {
    let channels = try_delta_channels(level, unorm8(color0), unorm8(color1))?;

    // A negative offset sum would tell the decoder to apply blue contraction.
    if channels.iter().map(|c| c.offset).sum::<i32>() < 0 {
        return None;
    }
    Some(delta_ranks(&channels))
}

/// Store the second color as a base and the first color as a signed offset with blue contraction.
pub fn try_quantize_rgb_delta_blue_contract(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 6]> {
    let c0 = inverse_blue_contract(unorm8(color0))?;
    let c1 = inverse_blue_contract(unorm8(color1))?;
    let channels = try_delta_channels(level, c1, c0)?;

    if channels.iter().map(|c| c.offset).sum::<i32>() >= 0 {
        return None;
    }

    let base = [channels[0].base, channels[1].base, channels[2].base, 0];
    let target = [
        base[0] + channels[0].offset,
        base[1] + channels[1].offset,
        base[2] + channels[2].offset,
        0,
    ];
    if rgb_sum(blue_contract(target)) > rgb_sum(blue_contract(base)) {
        return None;
    }
    Some(delta_ranks(&channels))
}

pub fn try_quantize_rgba_delta(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 8]> {
    let [r0, r1, g0, g1, b0, b1] = try_quantize_rgb_delta(color0, color1, level)?;
    let alpha = try_delta_channel(level, color0[3] / 257.0, color1[3] / 257.0)?;
    Some([r0, r1, g0, g1, b0, b1, alpha.base_rank, alpha.offset_rank])
}

pub fn try_quantize_rgba_delta_blue_contract(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 8]> {
    let [r0, r1, g0, g1, b0, b1] = try_quantize_rgb_delta_blue_contract(color0, color1, level)?;
    // The base is the second color for every channel including alpha.
    let alpha = try_delta_channel(level, color1[3] / 257.0, color0[3] / 257.0)?;
    Some([r0, r1, g0, g1, b0, b1, alpha.base_rank, alpha.offset_rank])
}

fn luminance(color: [f32; 4]) -> f32 {
    (color[0] + color[1] + color[2]) / (3.0 * 257.0)
}

pub fn quantize_luminance(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 2] {
    let mut lum0 = luminance(color0);
    let mut lum1 = luminance(color1);
    if lum0 > lum1 {
        let average = (lum0 + lum1) * 0.5;
        lum0 = average;
        lum1 = average;
    }
    [quantize_color_f32(level, lum0), quantize_color_f32(level, lum1)]
}

// At high precision, nearly equal values are pushed apart to keep some of the difference.
fn separate(v0: f32, v1: f32) -> (f32, f32) {
    if (v0 - v1).abs() >= 3.0 {
        return (v0, v1);
    }
    let (v0, v1) = if v0 < v1 {
        (v0 - 0.5, v1 + 0.5)
    } else {
        (v0 + 0.5, v1 - 0.5)
    };
    (v0.clamp(0.0, 255.0), v1.clamp(0.0, 255.0))
}

pub fn quantize_luminance_alpha(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 4] {
    let mut lum = (luminance(color0), luminance(color1));
    let mut alpha = (color0[3] / 257.0, color1[3] / 257.0);
    if level > MAX_DELTA_LEVEL {
        lum = separate(lum.0, lum.1);
        alpha = separate(alpha.0, alpha.1);
    }
    [
        quantize_color_f32(level, lum.0),
        quantize_color_f32(level, lum.1),
        quantize_color_f32(level, alpha.0),
        quantize_color_f32(level, alpha.1),
    ]
}

pub fn try_quantize_luminance_alpha_delta(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 4]> {
    let lum = try_delta_channel(level, luminance(color0), luminance(color1))?;
    let alpha = try_delta_channel(level, color0[3] / 257.0, color1[3] / 257.0)?;
    Some([lum.base_rank, lum.offset_rank, alpha.base_rank, alpha.offset_rank])
}

/// Quantize a color and a scale factor from `0.0` to `1.0` for the first endpoint.
pub fn quantize_rgbs(rgbs: [f32; 4], level: usize) -> [u8; 4] {
    let c = unorm8(rgbs);
    let rgb = [0, 1, 2].map(|i| quantize_color_f32(level, c[i]));

    // Adjust the scale to compensate for the quantized color.
    let old_sum = c[0] + c[1] + c[2];
    let new_sum: i32 = rgb.iter().map(|r| unq(level, *r)).sum();
    let scale = (rgbs[3] * (old_sum + 1e-10) / (new_sum as f32 + 1e-10)).clamp(0.0, 1.0);
    let scale_index = ((scale * 256.0 + 0.5).floor() as i32).min(255);

    [rgb[0], rgb[1], rgb[2], quantize_color(level, scale_index as u8)]
}

pub fn quantize_rgbs_alpha(color0: [f32; 4], color1: [f32; 4], rgbs: [f32; 4], level: usize) -> [u8; 6] {
    let [r, g, b, s] = quantize_rgbs(rgbs, level);
    let a0 = quantize_color_f32(level, color0[3] / 257.0);
    let a1 = quantize_color_f32(level, color1[3] / 257.0);
    [r, g, b, s, a0, a1]
}

// Quantize bytes that must keep the masked bits or give up on the current mode.
fn quantize_bytes<const N: usize>(level: usize, bytes: [i32; N], masks: [u8; N]) -> Option<[u8; N]> {
    let mut ranks = [0; N];
    for i in 0..N {
        ranks[i] = quantize_color_constrained(level, bytes[i] as u8, masks[i])?;
    }
    Some(ranks)
}

// Like quantize_bytes but falls back to the nearest value for levels too coarse to keep the bits.
fn quantize_bytes_fallback<const N: usize>(level: usize, bytes: [i32; N], masks: [u8; N]) -> [u8; N] {
    std::array::from_fn(|i| {
        quantize_color_constrained(level, bytes[i] as u8, masks[i])
            .unwrap_or_else(|| quantize_color(level, bytes[i] as u8))
    })
}

fn round_shifted(value: f32, shift: u32) -> i32 {
    (value / (1 << shift) as f32).round() as i32
}

fn pack_hdr_rgbo(mode: usize, major: usize, fields: [i32; 4]) -> [i32; 4] {
    let mode_value = match mode {
        0..=3 => (major << 2) | mode,
        4 => 0xC | major,
        _ => 0xF,
    } as i32;

    let mut spare = [0; 7];
    for bit in HDR_RGBO_EXTRA_BITS.iter().filter(|b| b.modes & (1 << mode) != 0) {
        spare[bit.source as usize] = (fields[bit.field as usize] >> bit.shift) & 1;
    }

    [
        (fields[0] & 0x3F) | ((mode_value & 3) << 6),
        (fields[1] & 0x1F) | (((mode_value >> 2) & 1) << 7) | (spare[0] << 6) | (spare[1] << 5),
        (fields[2] & 0x1F) | (((mode_value >> 3) & 1) << 7) | (spare[2] << 6) | (spare[3] << 5),
        (fields[3] & 0x1F) | (spare[4] << 7) | (spare[5] << 6) | (spare[6] << 5),
    ]
}

/// Quantize an HDR color with an offset subtracted for the first endpoint.
///
/// The most precise of the 5 modes is chosen with a direct encoding as the fallback.
pub fn quantize_hdr_rgbo(rgbo: [f32; 4], level: usize) -> [u8; 4] {
    let [r, g, b, offset] = rgbo.map(|c| c.clamp(0.0, 65535.0) / 16.0);

    let major = if g > r && g >= b {
        1
    } else if b > r && b > g {
        2
    } else {
        0
    };
    let channels = match major {
        1 => [g, r, b],
        2 => [b, g, r],
        _ => [r, g, b],
    };

    for mode in 0..5 {
        let shift = HDR_RGBO_SHIFTS[mode];
        let bits: [u32; 4] =
            std::array::from_fn(|f| field_bit_count(&HDR_RGBO_EXTRA_BITS, &HDR_RGBO_BASE_BITS, mode, f));

        let red = round_shifted(channels[0], shift);
        if red >= 1 << bits[0] {
            continue;
        }
        let red_quantized = (red << shift) as f32;
        let green = round_shifted(red_quantized - channels[1], shift).max(0);
        let blue = round_shifted(red_quantized - channels[2], shift).max(0);
        let scale = round_shifted(offset, shift).max(0);
        if green >= 1 << bits[1] || blue >= 1 << bits[2] || scale >= 1 << bits[3] {
            continue;
        }

        let bytes = pack_hdr_rgbo(mode, major, [red, green, blue, scale]);
        if let Some(ranks) = quantize_bytes(level, bytes, [0xC0, 0xE0, 0xE0, 0xE0]) {
            return ranks;
        }
    }

    quantize_hdr_rgbo_direct(rgbo, level)
}

// The lowest precision mode with 7 bits for each field.
fn quantize_hdr_rgbo_direct(rgbo: [f32; 4], level: usize) -> [u8; 4] {
    let fields = rgbo.map(|c| round_shifted(c.clamp(0.0, 65535.0) / 16.0, 5).clamp(0, 127));
    let bytes = pack_hdr_rgbo(5, 0, fields);
    quantize_bytes_fallback(level, bytes, [0xC0, 0x80, 0x80, 0x00])
}

fn pack_hdr_rgb(mode: usize, major: usize, fields: [i32; 6]) -> [i32; 6] {
    let mut spare = [0; 6];
    for bit in HDR_RGB_EXTRA_BITS.iter().filter(|b| b.modes & (1 << mode) != 0) {
        spare[bit.source as usize] = (fields[bit.field as usize] >> bit.shift) & 1;
    }
    let (mode, major) = (mode as i32, major as i32);
    [
        fields[0] & 0xFF,
        (((fields[0] >> 8) & 1) << 6) | (fields[1] & 0x3F) | ((mode & 1) << 7),
        (fields[2] & 0x3F) | (spare[0] << 6) | (((mode >> 1) & 1) << 7),
        (fields[3] & 0x3F) | (spare[1] << 6) | (((mode >> 2) & 1) << 7),
        (fields[4] & 0x1F) | (spare[4] << 5) | (spare[2] << 6) | ((major & 1) << 7),
        (fields[5] & 0x1F) | (spare[5] << 5) | (spare[3] << 6) | (((major >> 1) & 1) << 7),
    ]
}

/// Quantize two HDR colors using the most precise of the 8 modes.
///
/// Colors that fit no mode use the direct encoding, so this never fails.
pub fn quantize_hdr_rgb(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 6] {
    let c0 = color0.map(|c| c.clamp(0.0, 65535.0) / 16.0);
    let c1 = color1.map(|c| c.clamp(0.0, 65535.0) / 16.0);

    let major = if c1[1] > c1[0] && c1[1] >= c1[2] {
        1
    } else if c1[2] > c1[0] && c1[2] > c1[1] {
        2
    } else {
        0
    };
    let swizzle = |c: [f32; 4]| match major {
        1 => [c[1], c[0], c[2]],
        2 => [c[2], c[1], c[0]],
        _ => [c[0], c[1], c[2]],
    };
    let (s0, s1) = (swizzle(c0), swizzle(c1));

    for mode in (0..8).rev() {
        let bits: [u32; 6] =
            std::array::from_fn(|f| field_bit_count(&HDR_RGB_EXTRA_BITS, &HDR_RGB_BASE_BITS, mode, f));
        let shift = hdr_rgb_shift(mode);

        let a = round_shifted(s1[0], shift);
        if a >= 1 << bits[0] {
            continue;
        }
        let a_quantized = (a << shift) as f32;
        let b0 = round_shifted(a_quantized - s1[1], shift).max(0);
        let b1 = round_shifted(a_quantized - s1[2], shift).max(0);
        if b0 >= 1 << bits[2] || b1 >= 1 << bits[3] {
            continue;
        }
        let c = round_shifted(a_quantized - s0[0], shift).max(0);
        if c >= 1 << bits[1] {
            continue;
        }

        let base = a_quantized - ((c << shift) as f32);
        let d0 = round_shifted(base - ((b0 << shift) as f32) - s0[1], shift);
        let d1 = round_shifted(base - ((b1 << shift) as f32) - s0[2], shift);
        let limit = 1 << (bits[4] - 1);
        if !(-limit..limit).contains(&d0) || !(-limit..limit).contains(&d1) {
            continue;
        }

        let mask = (1 << bits[4]) - 1;
        let bytes = pack_hdr_rgb(mode, major, [a, c, b0, b1, d0 & mask, d1 & mask]);
        if let Some(ranks) = quantize_bytes(level, bytes, [0x00, 0xC0, 0xC0, 0xC0, 0xE0, 0xE0]) {
            return ranks;
        }
    }

    quantize_hdr_rgb_direct(color0, color1, level)
}

// Direct encoding with 8-bit red and green and 7-bit blue.
fn quantize_hdr_rgb_direct(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 6] {
    let c0 = color0.map(|c| c.clamp(0.0, 65535.0) / 16.0);
    let c1 = color1.map(|c| c.clamp(0.0, 65535.0) / 16.0);
    let bytes = [
        round_shifted(c0[0], 4).clamp(0, 255),
        round_shifted(c1[0], 4).clamp(0, 255),
        round_shifted(c0[1], 4).clamp(0, 255),
        round_shifted(c1[1], 4).clamp(0, 255),
        round_shifted(c0[2], 5).clamp(0, 127) | 0x80,
        round_shifted(c1[2], 5).clamp(0, 127) | 0x80,
    ];
    quantize_bytes_fallback(level, bytes, [0x00, 0x00, 0x00, 0x00, 0x80, 0x80])
}

/// Quantize HDR alpha as a base and offset or directly if the offset is too large.
pub fn quantize_hdr_alpha(alpha0: f32, alpha1: f32, level: usize) -> [u8; 2] {
    let a0 = alpha0.clamp(0.0, 65535.0) / 16.0;
    let a1 = alpha1.clamp(0.0, 65535.0) / 16.0;

    for select in (0..3).rev() {
        let shift = 4 - select;
        let base = round_shifted(a0, shift);
        if base >= 1 << (8 + select) {
            continue;
        }
        let delta = round_shifted(a1, shift) - base;
        let limit = 32 >> select;
        if !(-limit..limit).contains(&delta) {
            continue;
        }

        let v6 = (base & 0x7F) | ((select as i32 & 1) << 7);
        let v7 = ((base >> 7) << (6 - select)) | (delta & (0x3F >> select)) | ((select as i32 >> 1) << 7);
        let mask7 = !(0x3Fu8 >> select);
        if let Some(ranks) = quantize_bytes(level, [v6, v7], [0x80, mask7]) {
            return ranks;
        }
    }

    let bytes = [
        round_shifted(a0, 5).clamp(0, 127) | 0x80,
        round_shifted(a1, 5).clamp(0, 127) | 0x80,
    ];
    quantize_bytes_fallback(level, bytes, [0x80, 0x80])
}

pub fn quantize_hdr_rgb_ldr_alpha(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 8] {
    let [v0, v1, v2, v3, v4, v5] = quantize_hdr_rgb(color0, color1, level);
    let a0 = quantize_color_f32(level, color0[3] / 257.0);
    let a1 = quantize_color_f32(level, color1[3] / 257.0);
    [v0, v1, v2, v3, v4, v5, a0, a1]
}

pub fn quantize_hdr_rgb_alpha(color0: [f32; 4], color1: [f32; 4], level: usize) -> [u8; 8] {
    let [v0, v1, v2, v3, v4, v5] = quantize_hdr_rgb(color0, color1, level);
    let [v6, v7] = quantize_hdr_alpha(color0[3], color1[3], level);
    [v0, v1, v2, v3, v4, v5, v6, v7]
}

fn hdr_luminance_pair(color0: [f32; 4], color1: [f32; 4]) -> (i32, i32) {
    let mut lum0 = (color0[0] + color0[1] + color0[2]) / 3.0;
    let mut lum1 = (color1[0] + color1[1] + color1[2]) / 3.0;
    if lum1 < lum0 {
        let average = (lum0 + lum1) * 0.5;
        lum0 = average;
        lum1 = average;
    }
    (
        (lum0.round() as i32).clamp(0, 65535),
        (lum1.round() as i32).clamp(0, 65535),
    )
}

/// The result of trying each precision of the HDR luminance small range encoding.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubmodeResult {
    HighPrecision([u8; 2]),
    LowPrecision([u8; 2]),
    Failed,
}

fn luminance_small_range_high(lum0: i32, lum1: i32, level: usize) -> Option<[u8; 2]> {
    let low = ((lum0 + 16) >> 5).min(2047);
    let high = ((lum1 + 16) >> 5).min(2047);

    let v0 = quantize_color(level, (low & 0x7F) as u8);
    let v0_unquantized = unq(level, v0);
    // The top bit selects the low precision encoding.
    if v0_unquantized & 0x80 != 0 {
        return None;
    }
    let low = (low & !0x7F) | (v0_unquantized & 0x7F);

    let diff = high - low;
    if !(0..=15).contains(&diff) {
        return None;
    }
    let packed = ((low >> 3) & 0xF0) | diff;
    let v1 = quantize_color(level, packed as u8);
    if (unq(level, v1) ^ packed) & 0xF0 != 0 {
        return None;
    }
    Some([v0, v1])
}

fn luminance_small_range_low(lum0: i32, lum1: i32, level: usize) -> Option<[u8; 2]> {
    let low = ((lum0 + 32) >> 6).min(1023);
    let high = ((lum1 + 32) >> 6).min(1023);

    let v0 = quantize_color(level, ((low & 0x7F) | 0x80) as u8);
    let v0_unquantized = unq(level, v0);
    if v0_unquantized & 0x80 == 0 {
        return None;
    }
    let low = (low & !0x7F) | (v0_unquantized & 0x7F);

    let diff = high - low;
    if !(0..=31).contains(&diff) {
        return None;
    }
    let packed = ((low >> 2) & 0xE0) | diff;
    let v1 = quantize_color(level, packed as u8);
    if (unq(level, v1) ^ packed) & 0xE0 != 0 {
        return None;
    }
    Some([v0, v1])
}

pub fn quantize_hdr_luminance_small_range_submode(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> SubmodeResult {
    let (lum0, lum1) = hdr_luminance_pair(color0, color1);
    if lum1 - lum0 > 2048 {
        return SubmodeResult::Failed;
    }
    if let Some(values) = luminance_small_range_high(lum0, lum1, level) {
        return SubmodeResult::HighPrecision(values);
    }
    match luminance_small_range_low(lum0, lum1, level) {
        Some(values) => SubmodeResult::LowPrecision(values),
        None => SubmodeResult::Failed,
    }
}

pub fn try_quantize_hdr_luminance_small_range(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> Option<[u8; 2]> {
    match quantize_hdr_luminance_small_range_submode(color0, color1, level) {
        SubmodeResult::HighPrecision(v) | SubmodeResult::LowPrecision(v) => Some(v),
        SubmodeResult::Failed => None,
    }
}

/// Quantize HDR luminance using whichever ordering of the values decodes more accurately.
pub fn quantize_hdr_luminance_large_range(
    color0: [f32; 4],
    color1: [f32; 4],
    level: usize,
) -> [u8; 2] {
    let (lum0, lum1) = hdr_luminance_pair(color0, color1);

    let upper = [(lum0 + 128) >> 8, (lum1 + 128) >> 8].map(|v| v.min(255));
    let lower = [(lum1 + 256) >> 8, lum0 >> 8].map(|v| v.min(255));

    let upper_decoded = (upper[0] << 8, upper[1] << 8);
    let lower_decoded = ((lower[1] << 8) + 128, (lower[0] << 8) - 128);

    let error = |(d0, d1): (i32, i32)| (d0 - lum0).pow(2) + (d1 - lum1).pow(2);
    let values = if error(upper_decoded) <= error(lower_decoded) {
        upper
    } else {
        lower
    };
    values.map(|v| quantize_color(level, v as u8))
}

/// Quantize the endpoints of a partition to `format` at color `level`.
///
/// The returned payload may use a delta or sub-mode variant of the requested format.
pub fn pack_color_endpoints(
    decode_mode: DecodeMode,
    color0: [f32; 4],
    color1: [f32; 4],
    rgbs: [f32; 4],
    rgbo: [f32; 4],
    format: EndpointFormat,
    level: usize,
) -> EndpointPayload {
    debug_assert!(!format.is_hdr() || decode_mode == DecodeMode::Hdr);

    // Clamp LDR inputs to the valid range.
    let color0 = color0.map(|c| c.clamp(0.0, 65535.0));
    let color1 = color1.map(|c| c.clamp(0.0, 65535.0));
    let delta = level <= MAX_DELTA_LEVEL;

    match format {
        EndpointFormat::Rgb => {
            if delta {
                if let Some(v) = try_quantize_rgb_delta_blue_contract(color0, color1, level) {
                    return EndpointPayload::new(EndpointFormat::RgbDelta, &v);
                }
                if let Some(v) = try_quantize_rgb_delta(color0, color1, level) {
                    return EndpointPayload::new(EndpointFormat::RgbDelta, &v);
                }
            }
            let v = try_quantize_rgb_blue_contract(color0, color1, level)
                .unwrap_or_else(|| quantize_rgb(color0, color1, level));
            EndpointPayload::new(EndpointFormat::Rgb, &v)
        }
        EndpointFormat::Rgba => {
            if delta {
                if let Some(v) = try_quantize_rgba_delta_blue_contract(color0, color1, level) {
                    return EndpointPayload::new(EndpointFormat::RgbaDelta, &v);
                }
                if let Some(v) = try_quantize_rgba_delta(color0, color1, level) {
                    return EndpointPayload::new(EndpointFormat::RgbaDelta, &v);
                }
            }
            let v = try_quantize_rgba_blue_contract(color0, color1, level)
                .unwrap_or_else(|| quantize_rgba(color0, color1, level));
            EndpointPayload::new(EndpointFormat::Rgba, &v)
        }
        EndpointFormat::RgbScale => EndpointPayload::new(format, &quantize_rgbs(rgbs, level)),
        EndpointFormat::RgbScaleAlpha => {
            EndpointPayload::new(format, &quantize_rgbs_alpha(color0, color1, rgbs, level))
        }
        EndpointFormat::Luminance => {
            EndpointPayload::new(format, &quantize_luminance(color0, color1, level))
        }
        EndpointFormat::LuminanceAlpha => {
            if delta {
                if let Some(v) = try_quantize_luminance_alpha_delta(color0, color1, level) {
                    return EndpointPayload::new(EndpointFormat::LuminanceAlphaDelta, &v);
                }
            }
            EndpointPayload::new(format, &quantize_luminance_alpha(color0, color1, level))
        }
        EndpointFormat::HdrRgbScale => EndpointPayload::new(format, &quantize_hdr_rgbo(rgbo, level)),
        EndpointFormat::HdrRgb => EndpointPayload::new(format, &quantize_hdr_rgb(color0, color1, level)),
        EndpointFormat::HdrRgbLdrAlpha => {
            EndpointPayload::new(format, &quantize_hdr_rgb_ldr_alpha(color0, color1, level))
        }
        EndpointFormat::HdrRgba => {
            EndpointPayload::new(format, &quantize_hdr_rgb_alpha(color0, color1, level))
        }
        EndpointFormat::HdrLuminanceLargeRange | EndpointFormat::HdrLuminanceSmallRange => {
            match try_quantize_hdr_luminance_small_range(color0, color1, level) {
                Some(v) => EndpointPayload::new(EndpointFormat::HdrLuminanceSmallRange, &v),
                None => EndpointPayload::new(
                    EndpointFormat::HdrLuminanceLargeRange,
                    &quantize_hdr_luminance_large_range(color0, color1, level),
                ),
            }
        }
        EndpointFormat::LuminanceDelta
        | EndpointFormat::LuminanceAlphaDelta
        | EndpointFormat::RgbDelta
        | EndpointFormat::RgbaDelta => {
            unreachable!("{format:?} is only selected while packing")
        }
    }
}
