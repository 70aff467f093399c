// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Area-averaging resampling.
//!
//! Each output pixel is the mean of the source area it covers, with partial
//! source pixels weighted by their covered fraction. The filter is separable
//! and applied horizontally, then vertically.
//!
//! When upscaling, an output pixel covers less than one source pixel, so it
//! takes the value of that pixel, or a coverage-weighted blend of the two
//! neighbours it straddles. Upscaling is allowed but produces blocky output.

use crate::core::Resolution;

/// Contributions of source samples to one output sample.
type Taps = Vec<(usize, f32)>;

fn axis_taps(src_len: u32, dst_len: u32) -> Vec<Taps> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    (0..dst_len)
        .map(|o| {
            let start = f64::from(o) * scale;
            let end = (start + scale).min(f64::from(src_len));
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len as usize);
            let mut taps = Vec::with_capacity(last - first);
            for s in first..last {
                let overlap = (end.min(s as f64 + 1.0) - start.max(s as f64)).max(0.0);
                if overlap > 0.0 {
                    taps.push((s, (overlap / scale) as f32));
                }
            }
            taps
        })
        .collect()
}

/// Resize an interleaved 8-bit image with area averaging.
///
/// `pixels` must hold `src.width * src.height * channels` bytes.
pub fn resize_area(pixels: &[u8], src: Resolution, dst: Resolution, channels: usize) -> Vec<u8> {
    if src == dst {
        return pixels.to_vec();
    }
    if dst.is_empty() || src.is_empty() {
        return Vec::new();
    }

    let (sw, sh) = (src.width as usize, src.height as usize);
    let (dw, dh) = (dst.width as usize, dst.height as usize);
    let x_taps = axis_taps(src.width, dst.width);
    let y_taps = axis_taps(src.height, dst.height);

    // Horizontal pass: sh rows of dw pixels.
    let mut horizontal = vec![0f32; sh * dw * channels];
    for y in 0..sh {
        let src_row = &pixels[y * sw * channels..(y + 1) * sw * channels];
        let dst_row = &mut horizontal[y * dw * channels..(y + 1) * dw * channels];
        for (x, taps) in x_taps.iter().enumerate() {
            for c in 0..channels {
                dst_row[x * channels + c] = taps
                    .iter()
                    .map(|&(s, w)| f32::from(src_row[s * channels + c]) * w)
                    .sum();
            }
        }
    }

    // Vertical pass.
    let row_len = dw * channels;
    let mut out = vec![0u8; dh * row_len];
    for (y, taps) in y_taps.iter().enumerate() {
        let dst_row = &mut out[y * row_len..(y + 1) * row_len];
        for (i, value) in dst_row.iter_mut().enumerate() {
            let acc: f32 = taps
                .iter()
                .map(|&(s, w)| horizontal[s * row_len + i] * w)
                .sum();
            *value = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
