use crate::{
    color_format::{
        field_bit_count, hdr_rgb_shift, DecodeMode, EndpointFormat, EndpointPayload,
        HDR_RGBO_EXTRA_BITS, HDR_RGBO_SHIFTS, HDR_RGB_BASE_BITS, HDR_RGB_EXTRA_BITS,
    },
    quantization::unquantize_color,
};

/// The decoded endpoints of a partition as 16-bit values.
///
/// HDR channels hold LNS values and LDR channels hold UNORM16 values.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct UnpackedEndpoints {
    pub rgb_hdr: bool,
    pub alpha_hdr: bool,
    /// HDR endpoints decoded in an LDR mode produce NaN texels.
    pub nan_endpoint: bool,
    pub endpoint0: [u16; 4],
    pub endpoint1: [u16; 4],
}

// Channels are 8-bit for LDR and 16-bit for HDR before expansion.
struct RawEndpoints {
    rgb_hdr: bool,
    alpha_hdr: bool,
    e0: [i32; 4],
    e1: [i32; 4],
}

fn ldr(e0: [i32; 4], e1: [i32; 4]) -> RawEndpoints {
    RawEndpoints {
        rgb_hdr: false,
        alpha_hdr: false,
        e0,
        e1,
    }
}

fn clamp_unorm8(c: [i32; 4]) -> [i32; 4] {
    c.map(|v| v.clamp(0, 255))
}

pub(crate) fn blue_contract(c: [i32; 4]) -> [i32; 4] {
    [(c[0] + c[2]) >> 1, (c[1] + c[2]) >> 1, c[2], c[3]]
}

/// Move the top bit of `a` into `b` and return `a` as a signed 6-bit value.
pub(crate) fn bit_transfer_signed(a: i32, b: i32) -> (i32, i32) {
    let b = (b >> 1) | (a & 0x80);
    let a = (a >> 1) & 0x3F;
    let a = if a & 0x20 != 0 { a - 0x40 } else { a };
    (a, b)
}

fn sign_extend(value: i32, bits: u32) -> i32 {
    let value = value & ((1 << bits) - 1);
    if value >> (bits - 1) != 0 {
        value - (1 << bits)
    } else {
        value
    }
}

pub(crate) fn decode_hdr_luminance_large_range(v0: i32, v1: i32) -> (i32, i32) {
    let (y0, y1) = if v1 >= v0 {
        (v0 << 4, v1 << 4)
    } else {
        ((v1 << 4) + 8, (v0 << 4) - 8)
    };
    (y0 << 4, y1 << 4)
}

pub(crate) fn decode_hdr_luminance_small_range(v0: i32, v1: i32) -> (i32, i32) {
    let (y0, d) = if v0 & 0x80 != 0 {
        (((v1 & 0xE0) << 4) | ((v0 & 0x7F) << 2), (v1 & 0x1F) << 2)
    } else {
        (((v1 & 0xF0) << 4) | ((v0 & 0x7F) << 1), (v1 & 0x0F) << 1)
    };
    let y1 = (y0 + d).min(0xFFF);
    (y0 << 4, y1 << 4)
}

/// The mode and major component of HDR RGB scale endpoints.
pub(crate) fn hdr_rgbo_mode(v: [i32; 4]) -> (usize, usize) {
    let mode_value = ((v[0] & 0xC0) >> 6) | ((v[1] & 0x80) >> 5) | ((v[2] & 0x80) >> 4);
    if mode_value & 0xC != 0xC {
        ((mode_value & 3) as usize, (mode_value >> 2) as usize)
    } else if mode_value != 0xF {
        (4, (mode_value & 3) as usize)
    } else {
        (5, 0)
    }
}

pub(crate) fn decode_hdr_rgbo(v: [i32; 4]) -> ([i32; 3], [i32; 3]) {
    let (mode, major) = hdr_rgbo_mode(v);

    let mut fields = [v[0] & 0x3F, v[1] & 0x1F, v[2] & 0x1F, v[3] & 0x1F];
    let spare = [
        (v[1] >> 6) & 1,
        (v[1] >> 5) & 1,
        (v[2] >> 6) & 1,
        (v[2] >> 5) & 1,
        (v[3] >> 7) & 1,
        (v[3] >> 6) & 1,
        (v[3] >> 5) & 1,
    ];
    for bit in HDR_RGBO_EXTRA_BITS.iter().filter(|b| b.modes & (1 << mode) != 0) {
        fields[bit.field as usize] |= spare[bit.source as usize] << bit.shift;
    }

    let [mut r, mut g, mut b, scale] = fields.map(|f| f << HDR_RGBO_SHIFTS[mode]);
    if mode != 5 {
        g = r - g;
        b = r - b;
    }
    match major {
        1 => std::mem::swap(&mut r, &mut g),
        2 => std::mem::swap(&mut r, &mut b),
        _ => (),
    }

    let e1 = [r, g, b].map(|c| c.clamp(0, 0xFFF));
    let e0 = [r - scale, g - scale, b - scale].map(|c| c.clamp(0, 0xFFF));
    (e0.map(|c| c << 4), e1.map(|c| c << 4))
}

/// The mode of HDR RGB endpoints or [None] for the direct encoding.
pub(crate) fn hdr_rgb_mode(v: [i32; 6]) -> (Option<usize>, usize) {
    let major = (((v[4] & 0x80) >> 7) | ((v[5] & 0x80) >> 6)) as usize;
    if major == 3 {
        return (None, major);
    }
    let mode = ((v[1] & 0x80) >> 7) | ((v[2] & 0x80) >> 6) | ((v[3] & 0x80) >> 5);
    (Some(mode as usize), major)
}

pub(crate) fn decode_hdr_rgb(v: [i32; 6]) -> ([i32; 3], [i32; 3]) {
    let (mode, major) = hdr_rgb_mode(v);
    let Some(mode) = mode else {
        let e0 = [v[0] << 8, v[2] << 8, (v[4] & 0x7F) << 9];
        let e1 = [v[1] << 8, v[3] << 8, (v[5] & 0x7F) << 9];
        return (e0, e1);
    };

    let mut fields = [
        v[0] | ((v[1] & 0x40) << 2),
        v[1] & 0x3F,
        v[2] & 0x3F,
        v[3] & 0x3F,
        v[4] & 0x1F,
        v[5] & 0x1F,
    ];
    let spare = [
        (v[2] >> 6) & 1,
        (v[3] >> 6) & 1,
        (v[4] >> 6) & 1,
        (v[5] >> 6) & 1,
        (v[4] >> 5) & 1,
        (v[5] >> 5) & 1,
    ];
    for bit in HDR_RGB_EXTRA_BITS.iter().filter(|b| b.modes & (1 << mode) != 0) {
        fields[bit.field as usize] |= spare[bit.source as usize] << bit.shift;
    }

    let delta_bits = field_bit_count(&HDR_RGB_EXTRA_BITS, &HDR_RGB_BASE_BITS, mode, 4);
    fields[4] = sign_extend(fields[4], delta_bits);
    fields[5] = sign_extend(fields[5], delta_bits);

    let [a, c, b0, b1, d0, d1] = fields.map(|f| f << hdr_rgb_shift(mode));
    let mut e1 = [a, a - b0, a - b1].map(|v| v.clamp(0, 0xFFF));
    let mut e0 = [a - c, a - b0 - c - d0, a - b1 - c - d1].map(|v| v.clamp(0, 0xFFF));
    match major {
        1 => {
            e0.swap(0, 1);
            e1.swap(0, 1);
        }
        2 => {
            e0.swap(0, 2);
            e1.swap(0, 2);
        }
        _ => (),
    }
    (e0.map(|c| c << 4), e1.map(|c| c << 4))
}

pub(crate) fn decode_hdr_alpha(v6: i32, v7: i32) -> (i32, i32) {
    let select = ((v6 >> 7) & 1) | ((v7 >> 6) & 2);
    let v6 = v6 & 0x7F;
    let v7 = v7 & 0x7F;
    if select == 3 {
        return (v6 << 9, v7 << 9);
    }

    let a0 = v6 | ((v7 << (select + 1)) & 0x780);
    let d = (v7 & (0x3F >> select)) ^ (32 >> select);
    let d = d - (32 >> select);
    let a0 = a0 << (4 - select);
    let a1 = (a0 + (d << (4 - select))).clamp(0, 0xFFF);
    (a0 << 4, a1 << 4)
}

fn decode_ldr_rgb(v: [i32; 6], alpha: [i32; 2]) -> RawEndpoints {
    let s0 = v[0] + v[2] + v[4];
    let s1 = v[1] + v[3] + v[5];
    if s1 >= s0 {
        ldr([v[0], v[2], v[4], alpha[0]], [v[1], v[3], v[5], alpha[1]])
    } else {
        ldr(
            blue_contract([v[1], v[3], v[5], alpha[1]]),
            blue_contract([v[0], v[2], v[4], alpha[0]]),
        )
    }
}

fn decode_ldr_rgb_delta(v: [i32; 6], alpha: Option<[i32; 2]>) -> RawEndpoints {
    let (d0, b0) = bit_transfer_signed(v[1], v[0]);
    let (d1, b1) = bit_transfer_signed(v[3], v[2]);
    let (d2, b2) = bit_transfer_signed(v[5], v[4]);
    let (alpha_base, alpha_offset) = match alpha {
        Some([a0, a1]) => {
            let (d, b) = bit_transfer_signed(a1, a0);
            (b, b + d)
        }
        None => (255, 255),
    };

    let base = [b0, b1, b2, alpha_base];
    let offset = [b0 + d0, b1 + d1, b2 + d2, alpha_offset];
    if d0 + d1 + d2 >= 0 {
        ldr(base, clamp_unorm8(offset))
    } else {
        ldr(
            clamp_unorm8(blue_contract(offset)),
            clamp_unorm8(blue_contract(base)),
        )
    }
}

fn decode_raw(format: EndpointFormat, v: [i32; 8]) -> RawEndpoints {
    match format {
        EndpointFormat::Luminance => ldr([v[0], v[0], v[0], 255], [v[1], v[1], v[1], 255]),
        EndpointFormat::LuminanceDelta => {
            let l0 = (v[0] >> 2) | (v[1] & 0xC0);
            let l1 = (l0 + (v[1] & 0x3F)).min(255);
            ldr([l0, l0, l0, 255], [l1, l1, l1, 255])
        }
        EndpointFormat::LuminanceAlpha => {
            ldr([v[0], v[0], v[0], v[2]], [v[1], v[1], v[1], v[3]])
        }
        EndpointFormat::LuminanceAlphaDelta => {
            let (d0, l0) = bit_transfer_signed(v[1], v[0]);
            let (d1, a0) = bit_transfer_signed(v[3], v[2]);
            let l1 = (l0 + d0).clamp(0, 255);
            let a1 = (a0 + d1).clamp(0, 255);
            ldr([l0, l0, l0, a0], [l1, l1, l1, a1])
        }
        EndpointFormat::RgbScale => ldr(
            [(v[0] * v[3]) >> 8, (v[1] * v[3]) >> 8, (v[2] * v[3]) >> 8, 255],
            [v[0], v[1], v[2], 255],
        ),
        EndpointFormat::RgbScaleAlpha => ldr(
            [(v[0] * v[3]) >> 8, (v[1] * v[3]) >> 8, (v[2] * v[3]) >> 8, v[4]],
            [v[0], v[1], v[2], v[5]],
        ),
        EndpointFormat::Rgb => decode_ldr_rgb([v[0], v[1], v[2], v[3], v[4], v[5]], [255, 255]),
        EndpointFormat::Rgba => decode_ldr_rgb([v[0], v[1], v[2], v[3], v[4], v[5]], [v[6], v[7]]),
        EndpointFormat::RgbDelta => {
            decode_ldr_rgb_delta([v[0], v[1], v[2], v[3], v[4], v[5]], None)
        }
        EndpointFormat::RgbaDelta => {
            decode_ldr_rgb_delta([v[0], v[1], v[2], v[3], v[4], v[5]], Some([v[6], v[7]]))
        }
        EndpointFormat::HdrLuminanceLargeRange => {
            let (y0, y1) = decode_hdr_luminance_large_range(v[0], v[1]);
            hdr_rgb_ldr_alpha([y0; 3], [y1; 3], [255, 255])
        }
        EndpointFormat::HdrLuminanceSmallRange => {
            let (y0, y1) = decode_hdr_luminance_small_range(v[0], v[1]);
            hdr_rgb_ldr_alpha([y0; 3], [y1; 3], [255, 255])
        }
        EndpointFormat::HdrRgbScale => {
            let (e0, e1) = decode_hdr_rgbo([v[0], v[1], v[2], v[3]]);
            hdr_rgb_ldr_alpha(e0, e1, [255, 255])
        }
        EndpointFormat::HdrRgb => {
            let (e0, e1) = decode_hdr_rgb([v[0], v[1], v[2], v[3], v[4], v[5]]);
            hdr_rgb_ldr_alpha(e0, e1, [255, 255])
        }
        EndpointFormat::HdrRgbLdrAlpha => {
            let (e0, e1) = decode_hdr_rgb([v[0], v[1], v[2], v[3], v[4], v[5]]);
            hdr_rgb_ldr_alpha(e0, e1, [v[6], v[7]])
        }
        EndpointFormat::HdrRgba => {
            let (e0, e1) = decode_hdr_rgb([v[0], v[1], v[2], v[3], v[4], v[5]]);
            let (a0, a1) = decode_hdr_alpha(v[6], v[7]);
            RawEndpoints {
                rgb_hdr: true,
                alpha_hdr: true,
                e0: [e0[0], e0[1], e0[2], a0],
                e1: [e1[0], e1[1], e1[2], a1],
            }
        }
    }
}

fn hdr_rgb_ldr_alpha(e0: [i32; 3], e1: [i32; 3], alpha: [i32; 2]) -> RawEndpoints {
    RawEndpoints {
        rgb_hdr: true,
        alpha_hdr: false,
        e0: [e0[0], e0[1], e0[2], alpha[0]],
        e1: [e1[0], e1[1], e1[2], alpha[1]],
    }
}

/// Decode the endpoints of a partition from its quantized values at color `level`.
pub fn unpack_color_endpoints(
    decode_mode: DecodeMode,
    payload: &EndpointPayload,
    level: usize,
) -> UnpackedEndpoints {
    let mut values = [0i32; 8];
    for (v, rank) in values.iter_mut().zip(payload.values()) {
        *v = unquantize_color(level, *rank) as i32;
    }
    let raw = decode_raw(payload.format, values);

    if raw.rgb_hdr && decode_mode != DecodeMode::Hdr {
        let (color, nan_endpoint) = match decode_mode {
            DecodeMode::LdrSrgb => ([0xFF00, 0x0000, 0xFF00, 0xFF00], false),
            _ => ([0xFFFF; 4], true),
        };
        return UnpackedEndpoints {
            rgb_hdr: false,
            alpha_hdr: false,
            nan_endpoint,
            endpoint0: color,
            endpoint1: color,
        };
    }

    let expand = |v: i32| -> u16 {
        if decode_mode == DecodeMode::LdrSrgb {
            (v << 8) as u16
        } else {
            (v * 257) as u16
        }
    };
    let convert = |e: [i32; 4]| -> [u16; 4] {
        std::array::from_fn(|c| {
            let hdr = if c < 3 { raw.rgb_hdr } else { raw.alpha_hdr };
            if hdr {
                e[c] as u16
            } else {
                expand(e[c])
            }
        })
    };

    UnpackedEndpoints {
        rgb_hdr: raw.rgb_hdr,
        alpha_hdr: raw.alpha_hdr,
        nan_endpoint: false,
        endpoint0: convert(raw.e0),
        endpoint1: convert(raw.e1),
    }
}
