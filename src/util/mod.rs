// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

pub use v_frame::math::*;
pub use v_frame::pixel::*;

/// Copies a `w`x`h` rectangle between two row-major grids.
///
/// Both grids are addressed as `row * stride + col`; the rectangle starts at
/// (`src_x`, `src_y`) in `src` and lands at (`dst_x`, `dst_y`) in `dst`.
#[inline]
pub fn copy_rect<U: Copy>(
  dst: &mut [U], dst_stride: usize, dst_x: usize, dst_y: usize, src: &[U],
  src_stride: usize, src_x: usize, src_y: usize, w: usize, h: usize,
) {
  for r in 0..h {
    let d = (dst_y + r) * dst_stride + dst_x;
    let s = (src_y + r) * src_stride + src_x;
    dst[d..d + w].copy_from_slice(&src[s..s + w]);
  }
}

/// Fills a `w`x`h` rectangle of a row-major grid with `value`.
#[inline]
pub fn fill_rect<U: Copy>(
  dst: &mut [U], stride: usize, x: usize, y: usize, w: usize, h: usize,
  value: U,
) {
  for row in dst.chunks_mut(stride).skip(y).take(h) {
    row[x..x + w].fill(value);
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn copy_rect_moves_only_the_rectangle() {
    let src: Vec<u8> = (0..16).collect();
    let mut dst = vec![0u8; 36];

    copy_rect(&mut dst, 6, 1, 2, &src, 4, 1, 1, 2, 2);

    assert_eq!(&dst[13..15], &[5, 6]);
    assert_eq!(&dst[19..21], &[9, 10]);
    assert_eq!(dst.iter().filter(|&&v| v != 0).count(), 4);
  }

  #[test]
  fn fill_rect_clips_to_rows() {
    let mut dst = vec![0u16; 12];
    fill_rect(&mut dst, 4, 2, 1, 2, 5, 7);
    assert_eq!(dst, [0, 0, 0, 0, 0, 0, 7, 7, 0, 0, 7, 7]);
  }
}
